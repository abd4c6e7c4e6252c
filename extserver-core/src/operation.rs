use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{record::wire_name, value::AttributeValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Replace,
    AddElements,
    RemoveElements,
}

/// A single instruction against one attribute of one remote object.
///
/// Produced for one update call and discarded afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeOperation {
    /// Attribute name (snake_case)
    pub path: String,
    pub kind: OperationKind,
    pub value: AttributeValue,
}

impl AttributeOperation {
    pub fn replace<S: Into<String>>(path: S, value: AttributeValue) -> Self {
        AttributeOperation {
            path: path.into(),
            kind: OperationKind::Replace,
            value,
        }
    }

    pub fn add_elements<S: Into<String>>(path: S, value: AttributeValue) -> Self {
        AttributeOperation {
            path: path.into(),
            kind: OperationKind::AddElements,
            value,
        }
    }

    pub fn remove_elements<S: Into<String>>(path: S, value: AttributeValue) -> Self {
        AttributeOperation {
            path: path.into(),
            kind: OperationKind::RemoveElements,
            value,
        }
    }

    pub fn to_wire(&self) -> WireOperation {
        let operation = match self.kind {
            OperationKind::Replace => WireOperationKind::Replace,
            OperationKind::AddElements => WireOperationKind::Add,
            OperationKind::RemoveElements => WireOperationKind::Remove,
        };
        WireOperation {
            operation,
            attribute: wire_name(&self.path),
            value: match &self.value {
                AttributeValue::Absent => None,
                v => Some(v.clone().into()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireOperationKind {
    Replace,
    Add,
    Remove,
}

/// What a transport sends for one [`AttributeOperation`]:
/// `{ "operation": "replace"|"add"|"remove", "attribute": <dash-cased>, "value": ... }`.
///
/// A `replace` without a value resets the attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireOperation {
    pub operation: WireOperationKind,
    pub attribute: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let ops = vec![
            AttributeOperation::add_elements(
                "conjur_server_base_uri",
                AttributeValue::set(["https://a"]),
            ),
            AttributeOperation::remove_elements(
                "conjur_server_base_uri",
                AttributeValue::set(["https://b"]),
            ),
            AttributeOperation::replace("trust_store_type", AttributeValue::string("JKS")),
            AttributeOperation::replace("smtp_timeout", AttributeValue::Absent),
        ];
        let wire: Vec<WireOperation> = ops.iter().map(AttributeOperation::to_wire).collect();
        assert_eq!(
            serde_json::to_value(&wire).unwrap(),
            json!([
                {"operation": "add", "attribute": "conjur-server-base-uri", "value": ["https://a"]},
                {"operation": "remove", "attribute": "conjur-server-base-uri", "value": ["https://b"]},
                {"operation": "replace", "attribute": "trust-store-type", "value": "JKS"},
                {"operation": "replace", "attribute": "smtp-timeout"},
            ])
        );
    }
}
