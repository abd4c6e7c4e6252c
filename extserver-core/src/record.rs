use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    value::{AttributeValue, InvalidAttributeValue},
    variant::{ParseVariantError, Variant},
};

/// Caller-assigned name of an external server. Immutable once the object
/// exists; the sole key for read, update and delete.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid external server identifier: {0:?}")]
pub struct InvalidIdentifier(pub String);

impl Identifier {
    pub fn new<S: Into<String>>(s: S) -> Result<Self, InvalidIdentifier> {
        let s = s.into();
        if s.trim().is_empty() || s.chars().any(char::is_control) {
            return Err(InvalidIdentifier(s));
        }
        Ok(Identifier(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = InvalidIdentifier;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Identifier::new(s)
    }
}

impl FromStr for Identifier {
    type Err = InvalidIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Identifier::new(s)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `smtp_timeout` -> `smtp-timeout`
pub fn wire_name(attribute: &str) -> String {
    attribute.replace('_', "-")
}

/// `smtp-timeout` -> `smtp_timeout`
pub fn attribute_name(wire: &str) -> String {
    wire.replace('-', "_")
}

static ABSENT: AttributeValue = AttributeValue::Absent;

/// One external server: its identifier, its kind, and its attributes by
/// (snake_case) name.
///
/// Absent attributes are not stored; [`ConnectorRecord::get`] reports them
/// as [`AttributeValue::Absent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorRecord {
    pub identifier: Identifier,
    pub variant: Variant,
    #[serde(default, deserialize_with = "present_attributes")]
    attributes: BTreeMap<String, AttributeValue>,
}

fn present_attributes<'de, D>(deserializer: D) -> Result<BTreeMap<String, AttributeValue>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut map: BTreeMap<String, AttributeValue> = Deserialize::deserialize(deserializer)?;
    map.retain(|_, v| !v.is_absent());
    Ok(map)
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("wire object is missing the {0:?} field")]
    MissingField(&'static str),
    #[error(transparent)]
    UnknownVariant(#[from] ParseVariantError),
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidIdentifier),
    #[error("attribute {attribute:?} has an invalid value")]
    InvalidValue {
        attribute: String,
        #[source]
        source: InvalidAttributeValue,
    },
}

impl ConnectorRecord {
    pub fn new(identifier: Identifier, variant: Variant) -> Self {
        ConnectorRecord {
            identifier,
            variant,
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style [`ConnectorRecord::set`].
    pub fn with<S: Into<String>>(mut self, name: S, value: AttributeValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> &AttributeValue {
        self.attributes.get(name).unwrap_or(&ABSENT)
    }

    /// Setting [`AttributeValue::Absent`] removes the attribute.
    pub fn set<S: Into<String>>(&mut self, name: S, value: AttributeValue) {
        let name = name.into();
        if value.is_absent() {
            self.attributes.remove(&name);
        } else {
            self.attributes.insert(name, value);
        }
    }

    pub fn remove(&mut self, name: &str) -> AttributeValue {
        self.attributes.remove(name).unwrap_or_default()
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// The remote representation: `type`, `id`, and dash-cased attributes.
    pub fn to_wire(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(
            "type".to_string(),
            Value::String(self.variant.as_str().to_string()),
        );
        map.insert(
            "id".to_string(),
            Value::String(self.identifier.as_str().to_string()),
        );
        for (name, value) in self.attributes.iter() {
            map.insert(wire_name(name), value.clone().into());
        }
        map
    }

    /// Inverse of [`ConnectorRecord::to_wire`]. Attribute names are not
    /// checked here; callers that know the schema drop what they don't know.
    pub fn from_wire(map: &Map<String, Value>) -> Result<Self, WireError> {
        let variant: Variant = map
            .get("type")
            .and_then(Value::as_str)
            .ok_or(WireError::MissingField("type"))?
            .parse()?;
        let identifier = Identifier::new(
            map.get("id")
                .and_then(Value::as_str)
                .ok_or(WireError::MissingField("id"))?,
        )?;
        let mut record = ConnectorRecord::new(identifier, variant);
        for (key, value) in map.iter() {
            if key == "type" || key == "id" {
                continue;
            }
            let name = attribute_name(key);
            let value = AttributeValue::try_from(value.clone()).map_err(|source| {
                WireError::InvalidValue {
                    attribute: name.clone(),
                    source,
                }
            })?;
            record.set(name, value);
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    #[test]
    fn test_identifier_validation() {
        assert!(Identifier::new("relay-1").is_ok());
        assert!(Identifier::new("").is_err());
        assert!(Identifier::new("   ").is_err());
        assert!(Identifier::new("a\nb").is_err());
    }

    #[test]
    fn test_set_absent_removes() {
        let mut r = ConnectorRecord::new(id("relay"), Variant::Smtp)
            .with("server_host_name", AttributeValue::string("mail.example.com"));
        assert_eq!(
            r.get("server_host_name"),
            &AttributeValue::string("mail.example.com")
        );
        r.set("server_host_name", AttributeValue::Absent);
        assert!(r.get("server_host_name").is_absent());
        assert!(r.is_empty());
    }

    #[test]
    fn test_wire_form_is_dash_cased() {
        let r = ConnectorRecord::new(id("vault-1"), Variant::Vault)
            .with("vault_server_base_uri", AttributeValue::set(["https://v"]))
            .with("vault_authentication_method", AttributeValue::string("tok"));
        assert_eq!(
            Value::Object(r.to_wire()),
            json!({
                "type": "vault",
                "id": "vault-1",
                "vault-server-base-uri": ["https://v"],
                "vault-authentication-method": "tok",
            })
        );
        assert_eq!(ConnectorRecord::from_wire(&r.to_wire()).unwrap(), r);
    }

    #[test]
    fn test_from_wire_errors() {
        let no_type = json!({"id": "x"});
        assert!(matches!(
            ConnectorRecord::from_wire(no_type.as_object().unwrap()),
            Err(WireError::MissingField("type"))
        ));
        let bad_type = json!({"type": "gopher", "id": "x"});
        assert!(matches!(
            ConnectorRecord::from_wire(bad_type.as_object().unwrap()),
            Err(WireError::UnknownVariant(_))
        ));
        let bad_value = json!({"type": "smtp", "id": "x", "server-port": 2.5});
        assert!(matches!(
            ConnectorRecord::from_wire(bad_value.as_object().unwrap()),
            Err(WireError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_deserialize_drops_nulls() {
        let r: ConnectorRecord = serde_json::from_value(json!({
            "identifier": "relay",
            "variant": "smtp",
            "attributes": {"smtp_timeout": null, "server_host_name": "h"},
        }))
        .unwrap();
        assert_eq!(
            r,
            ConnectorRecord::new(id("relay"), Variant::Smtp)
                .with("server_host_name", AttributeValue::string("h"))
        );
    }
}
