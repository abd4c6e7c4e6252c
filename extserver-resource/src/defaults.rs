//! Server-side defaults for computed attributes, per variant.
//!
//! Filling them into the plan up front means the plan says what the remote
//! store will hold, so the next plan after an apply is empty.

use extserver_core::{AttributeValue, ConnectorRecord, Variant};

use crate::{
    attributes::{attribute, VariantSet, LDAP, PINGDS},
    codec,
};

#[derive(Debug, Clone, Copy)]
enum Fill {
    Str(&'static str),
    Int(i64),
    Bool(bool),
    Set(&'static [&'static str]),
}

impl Fill {
    fn value(self) -> AttributeValue {
        match self {
            Fill::Str(s) => AttributeValue::string(s),
            Fill::Int(i) => AttributeValue::Integer(i),
            Fill::Bool(b) => AttributeValue::Boolean(b),
            Fill::Set(s) => AttributeValue::set(s.iter().copied()),
        }
    }
}

const WEB: VariantSet = VariantSet::of(&[Variant::Http, Variant::PingOneHttp]);

static DEFAULTS: &[(VariantSet, &str, Fill)] = &[
    (LDAP, "server_port", Fill::Int(389)),
    (LDAP, "connection_security", Fill::Str("none")),
    (LDAP, "authentication_method", Fill::Str("simple")),
    (LDAP, "health_check_connect_timeout", Fill::Str("10 s")),
    (LDAP, "max_connection_age", Fill::Str("30 m")),
    (LDAP, "min_expired_connection_age", Fill::Str("250 ms")),
    (LDAP, "connect_timeout", Fill::Str("10 s")),
    (LDAP, "max_response_size", Fill::Str("10 mb")),
    (LDAP, "abandon_on_timeout", Fill::Bool(true)),
    (
        LDAP,
        "defunct_connection_result_code",
        Fill::Set(&[
            "busy",
            "unavailable",
            "unwilling-to-perform",
            "server-down",
            "connect-error",
            "timeout",
        ]),
    ),
    (PINGDS, "verify_credentials_method", Fill::Str("separate-connections")),
    (PINGDS, "use_administrative_operation_control", Fill::Bool(true)),
    (VariantSet::of(&[Variant::Smtp]), "server_port", Fill::Int(25)),
    (VariantSet::of(&[Variant::Smtp]), "smtp_security", Fill::Str("none")),
    (
        VariantSet::of(&[Variant::Jdbc]),
        "transaction_isolation_level",
        Fill::Str("read-committed"),
    ),
    (
        VariantSet::of(&[Variant::Jdbc]),
        "validation_query_timeout",
        Fill::Str("10 s"),
    ),
    (VariantSet::of(&[Variant::Syslog]), "server_port", Fill::Int(514)),
    (VariantSet::of(&[Variant::Syslog]), "transport_mechanism", Fill::Str("udp")),
    (VariantSet::of(&[Variant::Syslog]), "connect_timeout", Fill::Str("10 s")),
    (VariantSet::of(&[Variant::Syslog]), "max_connection_age", Fill::Str("30 m")),
    (
        WEB,
        "hostname_verification_method",
        Fill::Str("verify-with-strict-hostname"),
    ),
    (WEB, "connect_timeout", Fill::Str("10 s")),
    (WEB, "response_timeout", Fill::Str("10 s")),
];

/// The defaults `v` gets, in table order.
pub fn defaults_for(v: Variant) -> impl Iterator<Item = (&'static str, AttributeValue)> {
    DEFAULTS
        .iter()
        .filter(move |(variants, _, _)| variants.contains(v))
        .map(|(_, name, default)| (*name, default.value()))
}

/// Fill every absent attribute that has a default for the plan's variant.
/// Declared values, including ones that equal the default, are kept.
pub fn apply_defaults(plan: &ConnectorRecord) -> ConnectorRecord {
    let mut effective = plan.clone();
    for (name, value) in defaults_for(plan.variant) {
        let declared = match attribute(name) {
            Some(spec) => codec::canonical(spec, plan.get(name)),
            None => plan.get(name).clone(),
        };
        if declared.is_absent() {
            effective.set(name, value);
        }
    }
    effective
}
