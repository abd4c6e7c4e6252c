//! Reconciliation engine for external server declarations.
//!
//! A declared record goes through [`defaults`], [`gate`] and
//! [`registry::validate`] before [`planner::plan`] diffs it against the last
//! known state. Backend answers are turned back into state by
//! [`projector::project`]. [`reconciler::Reconciler`] sequences all of this
//! against a [`framework::Backend`].

pub mod attributes;
pub mod codec;
pub mod defaults;
pub mod diagnostics;
pub mod error;
pub mod framework;
pub mod gate;
pub mod planner;
pub mod projector;
pub mod reconciler;
pub mod registry;

pub use diagnostics::Diagnostic;
pub use error::{BackendError, EngineError};
pub use framework::Backend;
pub use reconciler::{Lifecycle, Mode, Outcome, Preview, ReadOutcome, Reconciler};
