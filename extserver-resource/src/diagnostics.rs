use std::fmt;

use extserver_core::Identifier;
use serde::Serialize;

/// Something worth telling the operator that does not stop reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Diagnostic {
    /// The remote store echoed an equivalent value in another spelling.
    FormatMismatch {
        attribute: String,
        expected: String,
        returned: String,
    },
    /// An update found the remote object already matching the plan.
    NothingToConverge { identifier: Identifier },
    /// An adopted object was dropped from state but left in place remotely.
    Forgotten { identifier: Identifier },
}

impl Diagnostic {
    /// Emit as a `tracing` warning.
    pub fn log(&self) {
        tracing::warn!("{}", self);
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::FormatMismatch {
                attribute,
                expected,
                returned,
            } => write!(
                f,
                "{}: the remote store returned {:?} for the configured {:?}; consider using the returned format",
                attribute, returned, expected
            ),
            Diagnostic::NothingToConverge { identifier } => write!(
                f,
                "external server '{}' already matches its declaration; nothing to converge",
                identifier
            ),
            Diagnostic::Forgotten { identifier } => write!(
                f,
                "external server '{}' is externally owned; removed from state only",
                identifier
            ),
        }
    }
}
