//! Which attributes each external server kind has.
//!
//! [`classify`] is the only place a type string becomes a [`Variant`];
//! everything downstream is parameterized by the resolved variant.

use std::collections::BTreeSet;

use extserver_core::{AttributeValue, ConnectorRecord, Identifier, Variant};
use serde_json::{Map, Value};

use crate::{
    attributes::{attribute, AttributeSpec, ATTRIBUTES},
    codec,
    error::EngineError,
};

pub fn classify(declared_type: &str) -> Result<Variant, EngineError> {
    declared_type
        .parse()
        .map_err(|_| EngineError::UnknownVariant {
            value: declared_type.to_string(),
        })
}

/// Attributes of `v`, in table order.
pub fn applicable_specs(v: Variant) -> impl Iterator<Item = &'static AttributeSpec> {
    ATTRIBUTES.iter().filter(move |a| a.applies_to(v))
}

/// Required attributes of `v`, in table order.
pub fn required_attributes(v: Variant) -> Vec<&'static str> {
    applicable_specs(v)
        .filter(|a| a.is_required_for(v))
        .map(|a| a.name)
        .collect()
}

/// Applicable but not required, in table order.
pub fn optional_attributes(v: Variant) -> Vec<&'static str> {
    applicable_specs(v)
        .filter(|a| !a.is_required_for(v))
        .map(|a| a.name)
        .collect()
}

pub fn applicable_attributes(v: Variant) -> BTreeSet<&'static str> {
    applicable_specs(v).map(|a| a.name).collect()
}

/// Complement of [`applicable_attributes`] over the whole universe.
pub fn not_applicable_attributes(v: Variant) -> BTreeSet<&'static str> {
    ATTRIBUTES
        .iter()
        .filter(|a| !a.applies_to(v))
        .map(|a| a.name)
        .collect()
}

pub fn sensitive_attributes(v: Variant) -> BTreeSet<&'static str> {
    applicable_specs(v)
        .filter(|a| a.sensitive)
        .map(|a| a.name)
        .collect()
}

/// Check a declared record against its variant: every attribute known,
/// applicable, of the right kind, and every required attribute present.
pub fn validate(record: &ConnectorRecord) -> Result<(), EngineError> {
    let variant = record.variant;
    for (name, value) in record.attributes() {
        let spec = attribute(name).ok_or_else(|| EngineError::UnknownAttribute {
            attribute: name.to_string(),
        })?;
        let value = codec::normalize(spec, value)?;
        if !value.is_absent() && !spec.applies_to(variant) {
            return Err(EngineError::AttributeNotApplicable {
                attribute: name.to_string(),
                variant,
            });
        }
    }
    for spec in applicable_specs(variant).filter(|a| a.is_required_for(variant)) {
        if codec::canonical(spec, record.get(spec.name)).is_absent() {
            return Err(EngineError::MissingRequiredAttribute {
                attribute: spec.name.to_string(),
                variant,
            });
        }
    }
    Ok(())
}

/// Build a record from a declaration's type string and JSON attributes.
/// `null` and `""` mean absent. Only shape is checked here; see [`validate`].
pub fn record_from_declaration(
    identifier: Identifier,
    declared_type: &str,
    attributes: &Map<String, Value>,
) -> Result<ConnectorRecord, EngineError> {
    let variant = classify(declared_type)?;
    let mut record = ConnectorRecord::new(identifier, variant);
    for (name, json) in attributes.iter() {
        let spec = attribute(name).ok_or_else(|| EngineError::UnknownAttribute {
            attribute: name.to_string(),
        })?;
        let value = AttributeValue::try_from(json.clone()).map_err(|_| {
            EngineError::InvalidAttributeType {
                attribute: name.to_string(),
                expected: spec.kind.name(),
                found: json_shape(json),
            }
        })?;
        record.set(name.as_str(), codec::canonical(spec, &value));
    }
    Ok(record)
}

fn json_shape(json: &Value) -> &'static str {
    match json {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
