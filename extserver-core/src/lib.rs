//! Types shared between the reconciliation engine, the backends that talk to
//! the remote configuration store, and the `extserver` CLI.
//!
//! Nothing in here knows which attributes exist; that table lives in
//! `extserver-resource`.

pub mod operation;
pub mod record;
pub mod value;
pub mod variant;
pub mod version;

pub use operation::{AttributeOperation, OperationKind, WireOperation, WireOperationKind};
pub use record::{ConnectorRecord, Identifier};
pub use value::AttributeValue;
pub use variant::Variant;
pub use version::ProductVersion;

use anyhow::Result;

/// Facade for state files
pub fn record_to_json(r: &ConnectorRecord) -> Result<String> {
    serde_json::to_string(r).map_err(|e| e.into())
}

/// Facade for state files
pub fn record_from_json(s: &str) -> Result<ConnectorRecord> {
    serde_json::from_str(s).map_err(|e| e.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_roundtrip() {
        let r = ConnectorRecord::new(Identifier::new("aws").unwrap(), Variant::AmazonAws)
            .with("aws_region_name", AttributeValue::string("eu-west-1"));
        let s = record_to_json(&r).unwrap();
        eprintln!("{}", s);
        assert_eq!(record_from_json(&s).unwrap(), r);
    }

    #[test]
    fn test_record_json_rejects_unknown_variant() {
        let s = r#"{"identifier":"x","variant":"gopher","attributes":{}}"#;
        assert!(record_from_json(s).is_err());
    }
}
