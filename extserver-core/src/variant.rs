use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of an external server.
///
/// This is a closed set. The kebab-case name is both the wire discriminator
/// (`"type"` on the remote object) and the classification key for
/// declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Variant {
    Smtp,
    NokiaDs,
    PingIdentityDs,
    ActiveDirectory,
    Jdbc,
    Syslog,
    PingIdentityProxyServer,
    HttpProxy,
    NokiaProxyServer,
    Opendj,
    Ldap,
    PingOneHttp,
    Http,
    OracleUnifiedDirectory,
    Conjur,
    AmazonAws,
    Vault,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown external server type: '{0}'")]
pub struct ParseVariantError(pub String);

impl Variant {
    pub const ALL: [Variant; 17] = [
        Variant::Smtp,
        Variant::NokiaDs,
        Variant::PingIdentityDs,
        Variant::ActiveDirectory,
        Variant::Jdbc,
        Variant::Syslog,
        Variant::PingIdentityProxyServer,
        Variant::HttpProxy,
        Variant::NokiaProxyServer,
        Variant::Opendj,
        Variant::Ldap,
        Variant::PingOneHttp,
        Variant::Http,
        Variant::OracleUnifiedDirectory,
        Variant::Conjur,
        Variant::AmazonAws,
        Variant::Vault,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Smtp => "smtp",
            Variant::NokiaDs => "nokia-ds",
            Variant::PingIdentityDs => "ping-identity-ds",
            Variant::ActiveDirectory => "active-directory",
            Variant::Jdbc => "jdbc",
            Variant::Syslog => "syslog",
            Variant::PingIdentityProxyServer => "ping-identity-proxy-server",
            Variant::HttpProxy => "http-proxy",
            Variant::NokiaProxyServer => "nokia-proxy-server",
            Variant::Opendj => "opendj",
            Variant::Ldap => "ldap",
            Variant::PingOneHttp => "ping-one-http",
            Variant::Http => "http",
            Variant::OracleUnifiedDirectory => "oracle-unified-directory",
            Variant::Conjur => "conjur",
            Variant::AmazonAws => "amazon-aws",
            Variant::Vault => "vault",
        }
    }

    /// Position in [`Variant::ALL`]; stable, used for bit sets.
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for Variant {
    type Err = ParseVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variant::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| ParseVariantError(s.to_string()))
    }
}

impl TryFrom<String> for Variant {
    type Error = ParseVariantError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Variant> for &'static str {
    fn from(v: Variant) -> Self {
        v.as_str()
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_variants_roundtrip_through_names() {
        for v in Variant::ALL {
            assert_eq!(v.as_str().parse::<Variant>().unwrap(), v);
        }
    }

    #[test]
    fn test_index_matches_position() {
        for (i, v) in Variant::ALL.iter().enumerate() {
            assert_eq!(v.index(), i);
        }
    }

    #[test]
    fn test_unknown_variant() {
        let e = "ldaps".parse::<Variant>().unwrap_err();
        assert_eq!(e, ParseVariantError("ldaps".to_string()));
        // Classification is case sensitive, like the wire discriminator
        assert!("SMTP".parse::<Variant>().is_err());
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&Variant::PingIdentityProxyServer).unwrap();
        assert_eq!(json, "\"ping-identity-proxy-server\"");
        let v: Variant = serde_json::from_str("\"amazon-aws\"").unwrap();
        assert_eq!(v, Variant::AmazonAws);
        assert!(serde_json::from_str::<Variant>("\"amazon\"").is_err());
    }
}
