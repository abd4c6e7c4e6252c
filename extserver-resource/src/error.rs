//! Engine error types.
//!
//! Everything except [`EngineError::NotFound`] and [`EngineError::Backend`]
//! is detected before the remote store is contacted.

use extserver_core::{Identifier, ProductVersion, Variant};
use thiserror::Error;

/// Failure reported by a [`crate::framework::Backend`].
#[derive(Debug, Error)]
pub enum BackendError {
    /// The remote store has no object with this identifier.
    #[error("external server '{0}' not found")]
    NotFound(Identifier),

    /// Anything else: connection, authentication, rejected request, ...
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown external server type '{value}'")]
    UnknownVariant { value: String },

    #[error("invalid value '{value}' for {attribute}; expected one of: {}", allowed.join(", "))]
    InvalidEnumValue {
        attribute: String,
        value: String,
        allowed: &'static [&'static str],
    },

    #[error("{attribute} requires product version {min_version} or later")]
    UnsupportedAttribute {
        attribute: String,
        min_version: ProductVersion,
    },

    #[error("external server type '{variant}' requires product version {min_version} or later")]
    UnsupportedVariant {
        variant: Variant,
        min_version: ProductVersion,
    },

    #[error("unknown attribute '{attribute}'")]
    UnknownAttribute { attribute: String },

    #[error("attribute '{attribute}' does not apply to external server type '{variant}'")]
    AttributeNotApplicable { attribute: String, variant: Variant },

    #[error("attribute '{attribute}' is required for external server type '{variant}'")]
    MissingRequiredAttribute { attribute: String, variant: Variant },

    #[error("attribute '{attribute}' must be a {expected}, got {found}")]
    InvalidAttributeType {
        attribute: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The type of an existing object can only change by replacing it.
    #[error("external server '{identifier}' cannot change type from '{from}' to '{to}' in place")]
    VariantChanged {
        identifier: Identifier,
        from: Variant,
        to: Variant,
    },

    #[error("external server identifier cannot change from '{from}' to '{to}'")]
    IdentifierChanged { from: Identifier, to: Identifier },

    /// The object to adopt does not exist. Adoption never creates.
    #[error("external server '{identifier}' is declared as pre-existing, but the remote store does not have it")]
    AdoptionTargetMissing { identifier: Identifier },

    /// The object vanished remotely; the caller should drop its state and recreate.
    #[error("external server '{identifier}' no longer exists in the remote store")]
    NotFound { identifier: Identifier },

    #[error("could not {operation}")]
    Backend {
        operation: String,
        #[source]
        source: anyhow::Error,
    },
}

impl EngineError {
    /// Whether the caller can continue by re-reading or recreating.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::NotFound { .. })
    }

    pub fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Whether this error was raised before anything was sent to the remote store.
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            EngineError::NotFound { .. }
                | EngineError::Backend { .. }
                | EngineError::AdoptionTargetMissing { .. }
        )
    }

    pub(crate) fn backend(operation: String, source: BackendError) -> Self {
        match source {
            BackendError::NotFound(identifier) => EngineError::NotFound { identifier },
            BackendError::Transport(source) => EngineError::Backend { operation, source },
        }
    }
}
