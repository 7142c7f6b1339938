use core::fmt;
use std::str::FromStr;

use anyhow::{bail, Error};
use serde::{Deserialize, Serialize};

/// Revision of the OID4VCI draft a wallet or issuer speaks.
///
/// Variants are ordered, so `version < OpenId4VciVersion::Ver1_0_11` selects the
/// legacy single-type wire encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OpenId4VciVersion {
    #[serde(rename = "v1.0.08")]
    Ver1_0_08,
    #[serde(rename = "v1.0.09")]
    Ver1_0_09,
    #[default]
    #[serde(rename = "v1.0.11")]
    Ver1_0_11,
}

impl OpenId4VciVersion {
    pub fn is_v11_or_higher(self) -> bool {
        self >= OpenId4VciVersion::Ver1_0_11
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OpenId4VciVersion::Ver1_0_08 => "v1.0.08",
            OpenId4VciVersion::Ver1_0_09 => "v1.0.09",
            OpenId4VciVersion::Ver1_0_11 => "v1.0.11",
        }
    }
}

impl fmt::Display for OpenId4VciVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl FromStr for OpenId4VciVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "v1.0.08" => OpenId4VciVersion::Ver1_0_08,
            "v1.0.09" => OpenId4VciVersion::Ver1_0_09,
            "v1.0.11" => OpenId4VciVersion::Ver1_0_11,
            _ => bail!("unknown OID4VCI version '{s}'"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_ordered() {
        assert!(OpenId4VciVersion::Ver1_0_08 < OpenId4VciVersion::Ver1_0_09);
        assert!(!OpenId4VciVersion::Ver1_0_09.is_v11_or_higher());
        assert!(OpenId4VciVersion::Ver1_0_11.is_v11_or_higher());
        assert_eq!(OpenId4VciVersion::default(), OpenId4VciVersion::Ver1_0_11);
    }

    #[test]
    fn parses_display_form() {
        for v in [
            OpenId4VciVersion::Ver1_0_08,
            OpenId4VciVersion::Ver1_0_09,
            OpenId4VciVersion::Ver1_0_11,
        ] {
            assert_eq!(v.to_string().parse::<OpenId4VciVersion>().unwrap(), v);
        }
        assert!("v2".parse::<OpenId4VciVersion>().is_err());
    }
}
