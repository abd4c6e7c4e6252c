use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A product version such as `9.3.0.0`. Missing trailing components are
/// zero, so `10.1` == `10.1.0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductVersion([u16; 4]);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid product version {0:?}: expected up to four dot-separated numbers")]
pub struct ParseVersionError(pub String);

impl ProductVersion {
    pub const fn new(major: u16, minor: u16, patch: u16, build: u16) -> Self {
        ProductVersion([major, minor, patch, build])
    }
}

impl FromStr for ProductVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseVersionError(s.to_string());
        let mut parts = [0u16; 4];
        let mut count = 0;
        for part in s.trim().split('.') {
            if count == parts.len() {
                return Err(err());
            }
            parts[count] = part.parse().map_err(|_| err())?;
            count += 1;
        }
        Ok(ProductVersion(parts))
    }
}

impl TryFrom<String> for ProductVersion {
    type Error = ParseVersionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ProductVersion> for String {
    fn from(v: ProductVersion) -> Self {
        v.to_string()
    }
}

impl fmt::Display for ProductVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{}.{}.{}.{}", a, b, c, d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_and_long_forms() {
        assert_eq!(
            "10.1".parse::<ProductVersion>().unwrap(),
            ProductVersion::new(10, 1, 0, 0)
        );
        assert_eq!(
            "9.3.0.2".parse::<ProductVersion>().unwrap(),
            ProductVersion::new(9, 3, 0, 2)
        );
        assert_eq!(ProductVersion::new(9, 3, 0, 2).to_string(), "9.3.0.2");
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "ten", "9..1", "9.1.0.0.0", "9.-1"] {
            assert!(bad.parse::<ProductVersion>().is_err(), "{:?}", bad);
        }
    }

    #[test]
    fn test_ordering_is_numeric() {
        let v9_3: ProductVersion = "9.3".parse().unwrap();
        let v10_0: ProductVersion = "10.0".parse().unwrap();
        assert!(v9_3 < v10_0);
        assert!(ProductVersion::new(9, 3, 0, 1) > v9_3);
    }
}
