//! Product version compatibility.
//!
//! Runs before planning: an update must never carry an attribute the target
//! server cannot parse.

use extserver_core::{ConnectorRecord, ProductVersion, Variant};

use crate::{
    attributes::{attribute, AttributeSpec},
    codec,
    error::EngineError,
};

/// Oldest product version this engine talks to.
pub const OLDEST_SUPPORTED: ProductVersion = ProductVersion::new(9, 1, 0, 0);
/// Newest product version this engine knows about.
pub const LATEST: ProductVersion = ProductVersion::new(10, 1, 0, 0);

/// First product version offering an external server kind, if newer than
/// [`OLDEST_SUPPORTED`].
pub fn variant_min_version(v: Variant) -> Option<ProductVersion> {
    match v {
        Variant::Conjur | Variant::Vault | Variant::AmazonAws => {
            Some(ProductVersion::new(9, 2, 0, 0))
        }
        _ => None,
    }
}

pub fn is_supported(spec: &AttributeSpec, version: ProductVersion) -> bool {
    spec.since.map_or(true, |since| version >= since)
}

/// Fail if the variant, or any attribute the plan sets, is newer than `target`.
/// Unknown attribute names are left for validation to report.
pub fn gate(variant: Variant, target: ProductVersion, plan: &ConnectorRecord) -> Result<(), EngineError> {
    if let Some(min_version) = variant_min_version(variant) {
        if target < min_version {
            return Err(EngineError::UnsupportedVariant {
                variant,
                min_version,
            });
        }
    }
    for (name, value) in plan.attributes() {
        let Some(spec) = attribute(name) else {
            continue;
        };
        if codec::canonical(spec, value).is_absent() {
            continue;
        }
        if let Some(min_version) = spec.since.filter(|_| !is_supported(spec, target)) {
            return Err(EngineError::UnsupportedAttribute {
                attribute: name.to_string(),
                min_version,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{attributes::ATTRIBUTES, registry};
    use extserver_core::{AttributeValue, Identifier};

    fn v(s: &str) -> ProductVersion {
        s.parse().unwrap()
    }

    fn record(variant: Variant) -> ConnectorRecord {
        ConnectorRecord::new(Identifier::new("x").unwrap(), variant)
    }

    fn some_value(spec: &AttributeSpec) -> AttributeValue {
        match spec.kind {
            crate::attributes::AttributeKind::Integer => AttributeValue::Integer(1),
            crate::attributes::AttributeKind::Boolean => AttributeValue::Boolean(true),
            k if k.is_set() => AttributeValue::set([k.allowed_values().map_or("x", |a| a[0])]),
            k => AttributeValue::string(k.allowed_values().map_or("x", |a| a[0])),
        }
    }

    #[test]
    fn test_attribute_gate() {
        let plan = record(Variant::Http)
            .with("base_url", AttributeValue::string("https://h"))
            .with("ssl_cert_nickname", AttributeValue::string("server-cert"));
        match gate(Variant::Http, v("9.3"), &plan) {
            Err(EngineError::UnsupportedAttribute {
                attribute,
                min_version,
            }) => {
                assert_eq!(attribute, "ssl_cert_nickname");
                assert_eq!(min_version, v("10.0"));
            }
            other => panic!("unexpected {:?}", other),
        }
        gate(Variant::Http, v("10.0"), &plan).unwrap();
    }

    #[test]
    fn test_absent_newer_attribute_passes() {
        let plan = record(Variant::Http)
            .with("base_url", AttributeValue::string("https://h"))
            .with("ssl_cert_nickname", AttributeValue::string(""));
        gate(Variant::Http, OLDEST_SUPPORTED, &plan).unwrap();
    }

    #[test]
    fn test_variant_gate() {
        assert!(matches!(
            gate(Variant::Vault, v("9.1"), &record(Variant::Vault)),
            Err(EngineError::UnsupportedVariant {
                variant: Variant::Vault,
                ..
            })
        ));
        gate(Variant::Vault, v("9.2"), &record(Variant::Vault)).unwrap();
        gate(Variant::Ldap, OLDEST_SUPPORTED, &record(Variant::Ldap)).unwrap();
    }

    /// Fails iff some set attribute is newer than the target.
    #[test]
    fn test_gate_iff_min_version_exceeds_target() {
        let targets = [v("9.1"), v("9.2"), v("9.3"), v("10.0"), LATEST];
        for variant in Variant::ALL {
            for target in targets {
                let variant_ok = variant_min_version(variant).map_or(true, |m| m <= target);
                for spec in registry::applicable_specs(variant) {
                    let plan = record(variant).with(spec.name, some_value(spec));
                    let expect_ok = variant_ok && spec.since.map_or(true, |m| m <= target);
                    assert_eq!(
                        gate(variant, target, &plan).is_ok(),
                        expect_ok,
                        "{} {} on {}",
                        variant,
                        spec.name,
                        target
                    );
                }
            }
        }
    }

    #[test]
    fn test_latest_supports_everything() {
        for spec in ATTRIBUTES {
            assert!(is_supported(spec, LATEST), "{}", spec.name);
        }
    }
}
