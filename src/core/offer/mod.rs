use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{core::credential_format::CredentialFormat, utils::NonEmptyVec};

/// Grant type URN of the pre-authorized code flow.
pub const PRE_AUTHORIZED_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:pre-authorized_code";

const CREDENTIAL_OFFER: &str = "credential_offer";

/// A Credential Offer (v1.0.11), sent by value inside the offer URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialOfferPayload {
    pub credential_issuer: String,
    pub credentials: Vec<OfferedCredential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grants: Option<Grants>,
}

/// An entry of `credentials`: either an id into the issuer metadata or an inline
/// format/types pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OfferedCredential {
    Id(String),
    Format(CredentialOfferFormat),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialOfferFormat {
    pub format: CredentialFormat,
    pub types: NonEmptyVec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grants {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_code: Option<GrantAuthorizationCode>,
    #[serde(
        rename = "urn:ietf:params:oauth:grant-type:pre-authorized_code",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub pre_authorized_code: Option<GrantPreAuthorizedCode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantAuthorizationCode {
    /// Opaque value binding a later Authorization Request to this offer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantPreAuthorizedCode {
    #[serde(rename = "pre-authorized_code")]
    pub pre_authorized_code: String,
    /// Whether the token request must carry a `user_pin`. Defaults to `false`.
    #[serde(default)]
    pub user_pin_required: bool,
}

impl CredentialOfferPayload {
    pub fn pre_authorized_grant(&self) -> Option<&GrantPreAuthorizedCode> {
        self.grants.as_ref()?.pre_authorized_code.as_ref()
    }

    pub fn issuer_state(&self) -> Option<&str> {
        self.grants
            .as_ref()?
            .authorization_code
            .as_ref()?
            .issuer_state
            .as_deref()
    }

    pub fn user_pin_required(&self) -> bool {
        self.pre_authorized_grant()
            .is_some_and(|grant| grant.user_pin_required)
    }

    /// Encode the offer by value, e.g. `openid-credential-offer://?credential_offer=%7B...`.
    pub fn to_uri(&self, scheme: &str) -> Result<String> {
        let json = serde_json::to_string(self).context("unable to serialize credential offer")?;
        let query = serde_urlencoded::to_string(&[(CREDENTIAL_OFFER, json.as_str())][..])?;
        Ok(format!("{scheme}?{query}"))
    }

    /// Parse an offer passed by value in a URI.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let url = Url::parse(uri).context("credential offer is not a valid URI")?;
        let Some((_, json)) = url.query_pairs().find(|(k, _)| k == CREDENTIAL_OFFER) else {
            bail!("'{CREDENTIAL_OFFER}' parameter is missing")
        };
        serde_json::from_str(&json).context("'credential_offer' could not be parsed")
    }
}
