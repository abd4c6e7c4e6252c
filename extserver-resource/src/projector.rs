//! Rebuild a variant-typed record from what the remote store answered.

use extserver_core::{AttributeValue, ConnectorRecord, Variant};

use crate::{attributes::AttributeSpec, codec, diagnostics::Diagnostic, registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionMode {
    Normal,
    /// Projecting an object that was adopted rather than created. Computed
    /// attributes that came back empty get an explicit empty value.
    Adoption,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub record: ConnectorRecord,
    pub diagnostics: Vec<Diagnostic>,
}

/// Project `response` onto `variant`, using `expected` (the plan that was
/// sent, or the prior state) for what the remote store does not report.
///
/// - Sensitive attributes always come from `expected`, never from `response`.
/// - Attributes that don't apply to `variant` are dropped.
/// - A measure echoed in a different spelling is kept as returned and
///   reported as [`Diagnostic::FormatMismatch`].
pub fn project(
    variant: Variant,
    response: &ConnectorRecord,
    expected: &ConnectorRecord,
    mode: ProjectionMode,
) -> Projection {
    let mut record = ConnectorRecord::new(response.identifier.clone(), variant);
    let mut diagnostics = Vec::new();
    for spec in registry::applicable_specs(variant) {
        if spec.sensitive {
            record.set(spec.name, codec::canonical(spec, expected.get(spec.name)));
            continue;
        }
        let sent = expected.get(spec.name);
        let returned = response.get(spec.name);
        if codec::format_mismatch(spec, sent, returned) {
            diagnostics.push(Diagnostic::FormatMismatch {
                attribute: spec.name.to_string(),
                expected: sent.as_str().unwrap_or_default().to_string(),
                returned: returned.as_str().unwrap_or_default().to_string(),
            });
        }
        let value = codec::canonical(spec, returned);
        let value = match mode {
            ProjectionMode::Adoption if value.is_absent() && spec.computed => sentinel(spec),
            _ => value,
        };
        record.set(spec.name, value);
    }
    for d in diagnostics.iter() {
        d.log();
    }
    Projection {
        record,
        diagnostics,
    }
}

/// The explicit empty value of a textual or set attribute. Other kinds
/// have no empty spelling and stay absent.
fn sentinel(spec: &AttributeSpec) -> AttributeValue {
    if spec.kind.is_textual() {
        AttributeValue::string("")
    } else if spec.kind.is_set() {
        AttributeValue::StringSet(Default::default())
    } else {
        AttributeValue::Absent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{attributes::ATTRIBUTES, planner};
    use extserver_core::Identifier;

    fn record(variant: Variant) -> ConnectorRecord {
        ConnectorRecord::new(Identifier::new("x").unwrap(), variant)
    }

    /// A buggy backend that echoes every attribute in the universe.
    fn everything(variant: Variant, text: &str) -> ConnectorRecord {
        ATTRIBUTES.iter().fold(record(variant), |r, spec| {
            let value = if spec.kind.is_set() {
                AttributeValue::set([text])
            } else {
                AttributeValue::string(text)
            };
            r.with(spec.name, value)
        })
    }

    #[test]
    fn test_secrets_never_leak() {
        for v in Variant::ALL {
            let response = everything(v, "leaked");
            for expected in [record(v), everything(v, "sent")] {
                let p = project(v, &response, &expected, ProjectionMode::Normal);
                for name in registry::sensitive_attributes(v) {
                    assert_eq!(p.record.get(name), expected.get(name), "{} {}", v, name);
                }
            }
        }
    }

    #[test]
    fn test_inapplicable_attributes_forced_absent() {
        for v in Variant::ALL {
            let p = project(v, &everything(v, "x"), &record(v), ProjectionMode::Normal);
            for name in registry::not_applicable_attributes(v) {
                assert!(p.record.get(name).is_absent(), "{} leaked into {}", name, v);
            }
        }
        let smtp = record(Variant::Smtp)
            .with("server_host_name", AttributeValue::string("mail"))
            .with("bind_dn", AttributeValue::string("cn=leak"));
        let p = project(Variant::Smtp, &smtp, &record(Variant::Smtp), ProjectionMode::Normal);
        assert_eq!(
            p.record,
            record(Variant::Smtp).with("server_host_name", AttributeValue::string("mail"))
        );
    }

    #[test]
    fn test_adoption_sentinel() {
        let response = record(Variant::Ldap).with("server_host_name", AttributeValue::string("dir"));
        let normal = project(Variant::Ldap, &response, &record(Variant::Ldap), ProjectionMode::Normal);
        assert!(normal.record.get("connection_security").is_absent());

        let adopted = project(Variant::Ldap, &response, &record(Variant::Ldap), ProjectionMode::Adoption);
        assert_eq!(adopted.record.get("connection_security"), &AttributeValue::string(""));
        assert_eq!(
            adopted.record.get("defunct_connection_result_code"),
            &AttributeValue::StringSet(Default::default())
        );
        // no empty spelling for integers
        assert!(adopted.record.get("server_port").is_absent());
        // not computed
        assert!(adopted.record.get("bind_dn").is_absent());
    }

    #[test]
    fn test_adopted_projection_plans_clean() {
        for v in Variant::ALL {
            let response = record(v);
            let adopted = project(v, &response, &record(v), ProjectionMode::Adoption);
            assert_eq!(planner::plan(&record(v), &adopted.record).unwrap(), vec![], "{}", v);
        }
    }

    #[test]
    fn test_format_mismatch_is_reported_not_corrected() {
        let sent = record(Variant::Smtp)
            .with("server_host_name", AttributeValue::string("mail"))
            .with("smtp_timeout", AttributeValue::string("60 s"));
        let response = record(Variant::Smtp)
            .with("server_host_name", AttributeValue::string("mail"))
            .with("smtp_timeout", AttributeValue::string("1 m"));
        let p = project(Variant::Smtp, &response, &sent, ProjectionMode::Normal);
        assert_eq!(p.record.get("smtp_timeout"), &AttributeValue::string("1 m"));
        assert_eq!(
            p.diagnostics,
            vec![Diagnostic::FormatMismatch {
                attribute: "smtp_timeout".to_string(),
                expected: "60 s".to_string(),
                returned: "1 m".to_string(),
            }]
        );
        assert_eq!(planner::plan(&sent, &p.record).unwrap(), vec![]);
    }

    #[test]
    fn test_numeric_strings_become_integers() {
        let response = record(Variant::Syslog).with("server_port", AttributeValue::string("514"));
        let p = project(Variant::Syslog, &response, &record(Variant::Syslog), ProjectionMode::Normal);
        assert_eq!(p.record.get("server_port"), &AttributeValue::Integer(514));
    }
}
