use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const FORMAT_JWT_VC_JSON: &str = "jwt_vc_json";
const FORMAT_JWT_VC_JSON_LD: &str = "jwt_vc_json-ld";
const FORMAT_LDP_VC: &str = "ldp_vc";

// Identifiers used by drafts prior to v1.0.11.
const LEGACY_JWT: &str = "jwt";
const LEGACY_JWT_VC: &str = "jwt_vc";
const LEGACY_LDP: &str = "ldp";
const LEGACY_LDP_VC: &str = "ldp_vc";

/// Credential formats an issuer can be asked for.
///
/// Only these three identifiers are representable; anything else fails to
/// parse with [UnsupportedFormat]. `mso_mdoc` is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CredentialFormat {
    /// W3C VC secured as a JWT, payload not processed as JSON-LD.
    JwtVcJson,
    /// W3C VC secured as a JWT, payload processed as JSON-LD.
    JwtVcJsonLd,
    /// W3C VC secured with a Data Integrity / Linked Data proof.
    LdpVc,
}

/// A format identifier that is not one of the supported [CredentialFormat]s.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid format of credential to be issued: {0}")]
pub struct UnsupportedFormat(pub String);

impl CredentialFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialFormat::JwtVcJson => FORMAT_JWT_VC_JSON,
            CredentialFormat::JwtVcJsonLd => FORMAT_JWT_VC_JSON_LD,
            CredentialFormat::LdpVc => FORMAT_LDP_VC,
        }
    }

    /// Maps a pre-v1.0.11 identifier forward to its current format.
    ///
    /// `jwt_vc`/`jwt` become `jwt_vc_json`; `ldp_vc`/`ldp` become `jwt_vc_json-ld`.
    /// Returns `None` for identifiers that are not legacy aliases.
    pub fn from_legacy(s: &str) -> Option<Self> {
        match s {
            LEGACY_JWT_VC | LEGACY_JWT => Some(CredentialFormat::JwtVcJson),
            LEGACY_LDP_VC | LEGACY_LDP => Some(CredentialFormat::JwtVcJsonLd),
            _ => None,
        }
    }

    /// The identifier a pre-v1.0.11 wallet or issuer expects for this format.
    pub fn to_legacy(&self) -> &'static str {
        match self {
            CredentialFormat::JwtVcJson => LEGACY_JWT_VC,
            CredentialFormat::JwtVcJsonLd => LEGACY_LDP_VC,
            CredentialFormat::LdpVc => LEGACY_LDP_VC,
        }
    }

    /// Whether the issued credential is a compact JWT string rather than a JSON object.
    pub fn is_jwt(&self) -> bool {
        match self {
            CredentialFormat::JwtVcJson | CredentialFormat::JwtVcJsonLd => true,
            CredentialFormat::LdpVc => false,
        }
    }
}

impl FromStr for CredentialFormat {
    type Err = UnsupportedFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            FORMAT_JWT_VC_JSON => Ok(CredentialFormat::JwtVcJson),
            FORMAT_JWT_VC_JSON_LD => Ok(CredentialFormat::JwtVcJsonLd),
            FORMAT_LDP_VC => Ok(CredentialFormat::LdpVc),
            _ => Err(UnsupportedFormat(s.to_owned())),
        }
    }
}

impl TryFrom<String> for CredentialFormat {
    type Error = UnsupportedFormat;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CredentialFormat> for String {
    fn from(format: CredentialFormat) -> Self {
        format.as_str().to_owned()
    }
}

impl fmt::Display for CredentialFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}
