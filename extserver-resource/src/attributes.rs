//! The attribute universe: every attribute any external server kind can
//! carry, with its kind, flags, and the kinds it applies to.
//!
//! The order of [`ATTRIBUTES`] is significant. Planning walks it front to
//! back, so it fixes the order of emitted operations.

use extserver_core::{ProductVersion, Variant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    String,
    /// A string restricted to the listed values
    Enum(&'static [&'static str]),
    /// A duration or size such as `"30 s"` or `"10 mb"`
    Measure,
    Integer,
    Boolean,
    Set,
    /// A set whose elements are restricted to the listed values
    EnumSet(&'static [&'static str]),
}

impl AttributeKind {
    pub fn is_set(self) -> bool {
        matches!(self, AttributeKind::Set | AttributeKind::EnumSet(_))
    }

    /// Whether values of this kind are carried as strings.
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            AttributeKind::String | AttributeKind::Enum(_) | AttributeKind::Measure
        )
    }

    pub fn allowed_values(self) -> Option<&'static [&'static str]> {
        match self {
            AttributeKind::Enum(values) | AttributeKind::EnumSet(values) => Some(values),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AttributeKind::String => "string",
            AttributeKind::Enum(_) => "enum",
            AttributeKind::Measure => "measure",
            AttributeKind::Integer => "integer",
            AttributeKind::Boolean => "boolean",
            AttributeKind::Set => "set",
            AttributeKind::EnumSet(_) => "enum-set",
        }
    }
}

/// A set of [`Variant`]s, one bit per [`Variant::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariantSet(u32);

impl VariantSet {
    pub const EMPTY: VariantSet = VariantSet(0);
    pub const ALL: VariantSet = VariantSet::of(&Variant::ALL);

    pub const fn of(variants: &[Variant]) -> Self {
        let mut bits = 0u32;
        let mut i = 0;
        while i < variants.len() {
            bits |= 1 << variants[i].index();
            i += 1;
        }
        VariantSet(bits)
    }

    pub const fn union(self, other: VariantSet) -> Self {
        VariantSet(self.0 | other.0)
    }

    pub const fn contains(self, v: Variant) -> bool {
        self.0 & (1 << v.index()) != 0
    }

    pub fn iter(self) -> impl Iterator<Item = Variant> {
        Variant::ALL.into_iter().filter(move |v| self.contains(*v))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec {
    /// snake_case name; the wire name is the dash-cased form
    pub name: &'static str,
    pub kind: AttributeKind,
    /// Never returned by the remote store on read
    pub sensitive: bool,
    /// The remote store assigns a value when none is given
    pub computed: bool,
    pub applies_to: VariantSet,
    pub required_for: VariantSet,
    /// First product version that knows this attribute
    pub since: Option<ProductVersion>,
}

const fn attr(name: &'static str, kind: AttributeKind, applies_to: VariantSet) -> AttributeSpec {
    AttributeSpec {
        name,
        kind,
        sensitive: false,
        computed: false,
        applies_to,
        required_for: VariantSet::EMPTY,
        since: None,
    }
}

impl AttributeSpec {
    const fn sensitive(self) -> Self {
        AttributeSpec {
            sensitive: true,
            ..self
        }
    }

    const fn computed(self) -> Self {
        AttributeSpec {
            computed: true,
            ..self
        }
    }

    const fn required(self, variants: VariantSet) -> Self {
        AttributeSpec {
            required_for: variants,
            applies_to: self.applies_to.union(variants),
            ..self
        }
    }

    const fn since(self, version: ProductVersion) -> Self {
        AttributeSpec {
            since: Some(version),
            ..self
        }
    }

    pub fn applies_to(&self, v: Variant) -> bool {
        self.applies_to.contains(v)
    }

    pub fn is_required_for(&self, v: Variant) -> bool {
        self.required_for.contains(v)
    }
}

use Variant::*;

/// The eight directory server kinds, which share the LDAP connection attributes.
pub const LDAP: VariantSet = VariantSet::of(&[
    NokiaDs,
    PingIdentityDs,
    ActiveDirectory,
    PingIdentityProxyServer,
    NokiaProxyServer,
    Opendj,
    Ldap,
    OracleUnifiedDirectory,
]);

/// Directory kinds that understand the administrative operation control.
pub const PINGDS: VariantSet = VariantSet::of(&[
    NokiaDs,
    PingIdentityDs,
    NokiaProxyServer,
    PingIdentityProxyServer,
]);

const fn only(v: Variant) -> VariantSet {
    VariantSet::of(&[v])
}

const HTTPS: VariantSet = VariantSet::of(&[Http, PingOneHttp]);
const SECRET_STORES: VariantSet = VariantSet::of(&[Conjur, Vault]);

pub const CONNECTION_SECURITY: &[&str] = &["none", "use-ssl", "use-start-tls"];
pub const AUTHENTICATION_METHOD: &[&str] = &["none", "simple", "external"];
pub const VERIFY_CREDENTIALS_METHOD: &[&str] = &[
    "separate-connections",
    "bind-on-existing-connections",
    "retain-identity-control",
];
pub const DEFUNCT_CONNECTION_RESULT_CODE: &[&str] = &[
    "operations-error",
    "protocol-error",
    "busy",
    "unavailable",
    "unwilling-to-perform",
    "other",
    "server-down",
    "local-error",
    "encoding-error",
    "decoding-error",
    "no-memory",
    "connect-error",
    "timeout",
];
pub const SMTP_SECURITY: &[&str] = &["none", "ssl", "starttls"];
pub const JDBC_DRIVER_TYPE: &[&str] = &["oracle", "postgresql", "mysql", "sqlserver", "other"];
pub const TRANSACTION_ISOLATION_LEVEL: &[&str] = &[
    "read-uncommitted",
    "read-committed",
    "repeatable-read",
    "serializable",
];
pub const TRANSPORT_MECHANISM: &[&str] = &["unencrypted-tcp", "tls-encrypted-tcp", "udp"];
pub const HOSTNAME_VERIFICATION_METHOD: &[&str] = &["verify-with-strict-hostname", "allow-all"];

const V9_3: ProductVersion = ProductVersion::new(9, 3, 0, 0);
const V10_0: ProductVersion = ProductVersion::new(10, 0, 0, 0);

use AttributeKind as K;

pub static ATTRIBUTES: &[AttributeSpec] = &[
    attr("description", K::String, VariantSet::ALL),
    attr("server_host_name", K::String, only(Jdbc)).required(
        LDAP.union(VariantSet::of(&[Smtp, Syslog, HttpProxy])),
    ),
    attr(
        "server_port",
        K::Integer,
        LDAP.union(VariantSet::of(&[Smtp, Jdbc, Syslog])),
    )
    .required(only(HttpProxy))
    .computed(),
    attr("location", K::String, LDAP),
    attr("bind_dn", K::String, LDAP),
    attr(
        "password",
        K::String,
        LDAP.union(VariantSet::of(&[Smtp, Jdbc])),
    )
    .sensitive(),
    attr(
        "passphrase_provider",
        K::String,
        LDAP.union(VariantSet::of(&[Smtp, Jdbc])),
    ),
    attr("connection_security", K::Enum(CONNECTION_SECURITY), LDAP).computed(),
    attr("authentication_method", K::Enum(AUTHENTICATION_METHOD), LDAP).computed(),
    attr(
        "verify_credentials_method",
        K::Enum(VERIFY_CREDENTIALS_METHOD),
        PINGDS,
    )
    .computed(),
    attr("use_administrative_operation_control", K::Boolean, PINGDS).computed(),
    attr("health_check_connect_timeout", K::Measure, LDAP).computed(),
    attr("max_connection_age", K::Measure, LDAP.union(only(Syslog))).computed(),
    attr("min_expired_connection_age", K::Measure, LDAP).computed(),
    attr(
        "connect_timeout",
        K::Measure,
        LDAP.union(only(Syslog)).union(HTTPS),
    )
    .computed(),
    attr("max_response_size", K::Measure, LDAP).computed(),
    attr("key_manager_provider", K::String, LDAP.union(only(Http))),
    attr(
        "trust_manager_provider",
        K::String,
        LDAP.union(only(Syslog)).union(HTTPS),
    ),
    attr("initial_connections", K::Integer, LDAP).computed(),
    attr("max_connections", K::Integer, LDAP).computed(),
    attr(
        "defunct_connection_result_code",
        K::EnumSet(DEFUNCT_CONNECTION_RESULT_CODE),
        LDAP,
    )
    .computed(),
    attr("abandon_on_timeout", K::Boolean, LDAP).computed(),
    attr("smtp_security", K::Enum(SMTP_SECURITY), only(Smtp)).computed(),
    attr("user_name", K::String, VariantSet::of(&[Smtp, Jdbc])),
    attr("smtp_timeout", K::Measure, only(Smtp)).computed(),
    attr("smtp_connection_properties", K::Set, only(Smtp)).since(V9_3),
    attr("jdbc_driver_type", K::Enum(JDBC_DRIVER_TYPE), VariantSet::EMPTY).required(only(Jdbc)),
    attr("jdbc_driver_url", K::String, only(Jdbc)),
    attr("database_name", K::String, only(Jdbc)),
    attr("validation_query", K::String, only(Jdbc)),
    attr("validation_query_timeout", K::Measure, only(Jdbc)).computed(),
    attr("jdbc_connection_properties", K::Set, only(Jdbc)),
    attr(
        "transaction_isolation_level",
        K::Enum(TRANSACTION_ISOLATION_LEVEL),
        only(Jdbc),
    )
    .computed(),
    attr(
        "transport_mechanism",
        K::Enum(TRANSPORT_MECHANISM),
        only(Syslog),
    )
    .computed(),
    attr("basic_authentication_username", K::String, only(HttpProxy)),
    attr(
        "basic_authentication_passphrase_provider",
        K::String,
        only(HttpProxy),
    ),
    attr("base_url", K::String, VariantSet::EMPTY).required(only(Http)),
    attr(
        "hostname_verification_method",
        K::Enum(HOSTNAME_VERIFICATION_METHOD),
        HTTPS,
    )
    .computed(),
    attr("ssl_cert_nickname", K::String, only(Http)).since(V10_0),
    attr("response_timeout", K::Measure, HTTPS).computed(),
    attr("conjur_server_base_uri", K::Set, VariantSet::EMPTY).required(only(Conjur)),
    attr("conjur_authentication_method", K::String, VariantSet::EMPTY).required(only(Conjur)),
    attr("conjur_account_name", K::String, VariantSet::EMPTY).required(only(Conjur)),
    attr("trust_store_file", K::String, SECRET_STORES),
    attr("trust_store_pin", K::String, SECRET_STORES).sensitive(),
    attr("trust_store_type", K::String, SECRET_STORES),
    attr("aws_access_key_id", K::String, only(AmazonAws)),
    attr("aws_secret_access_key", K::String, only(AmazonAws)).sensitive(),
    attr("aws_region_name", K::String, VariantSet::EMPTY).required(only(AmazonAws)),
    attr("http_proxy_external_server", K::String, only(AmazonAws)).since(V9_3),
    attr("vault_server_base_uri", K::Set, VariantSet::EMPTY).required(only(Vault)),
    attr("vault_authentication_method", K::String, VariantSet::EMPTY).required(only(Vault)),
];

pub fn attribute(name: &str) -> Option<&'static AttributeSpec> {
    ATTRIBUTES.iter().find(|a| a.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_names_are_unique_and_snake_case() {
        let mut seen = BTreeSet::new();
        for a in ATTRIBUTES {
            assert!(seen.insert(a.name), "duplicate attribute {}", a.name);
            assert!(!a.name.contains('-'), "{} is not snake_case", a.name);
        }
    }

    #[test]
    fn test_required_implies_applicable() {
        for a in ATTRIBUTES {
            for v in a.required_for.iter() {
                assert!(a.applies_to(v), "{} required but not applicable for {}", a.name, v);
            }
        }
    }

    #[test]
    fn test_every_attribute_applies_somewhere() {
        for a in ATTRIBUTES {
            assert_ne!(a.applies_to, VariantSet::EMPTY, "{} is orphaned", a.name);
        }
    }

    #[test]
    fn test_sensitive_attributes() {
        let sensitive: Vec<_> = ATTRIBUTES
            .iter()
            .filter(|a| a.sensitive)
            .map(|a| a.name)
            .collect();
        assert_eq!(
            sensitive,
            vec!["password", "trust_store_pin", "aws_secret_access_key"]
        );
        // A secret can't have a server-assigned default we would read back
        assert!(ATTRIBUTES.iter().all(|a| !(a.sensitive && a.computed)));
    }

    #[test]
    fn test_variant_set() {
        let s = VariantSet::of(&[Smtp, Vault]);
        assert!(s.contains(Smtp));
        assert!(s.contains(Vault));
        assert!(!s.contains(Ldap));
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![Smtp, Vault]);
        assert_eq!(VariantSet::ALL.iter().count(), 17);
        assert_eq!(LDAP.iter().count(), 8);
    }

    #[test]
    fn test_lookup() {
        assert_eq!(attribute("smtp_timeout").unwrap().kind, K::Measure);
        assert!(attribute("smtp-timeout").is_none());
    }
}
