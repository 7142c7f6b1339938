use chrono::TimeDelta;
use serde::Deserialize;

const DEFAULT_EXPIRES_IN: u64 = 300;
const DEFAULT_USER_PIN_LENGTH: usize = 4;
const DEFAULT_OFFER_SCHEME: &str = "openid-credential-offer://";

/// Longest `user_pin` the token endpoint accepts.
pub(crate) const MAX_USER_PIN_LENGTH: usize = 8;

/// Issuer configuration. All durations are in seconds.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct IssuerConfig {
    /// The Credential Issuer identifier, used as the expected `aud` of proofs.
    pub credential_issuer: String,
    pub credential_endpoint: Option<String>,
    /// Lifetime of a `c_nonce`.
    pub c_nonce_expires_in: u64,
    /// Lifetime of an offer URI binding.
    pub uri_expires_in: u64,
    /// Number of digits in a generated user PIN, 1 to 8.
    pub user_pin_length: usize,
    pub credential_offer_scheme: String,
    pub token: TokenEndpointOpts,
}

/// Options consumed by the token endpoint.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TokenEndpointOpts {
    /// `iss` claim of issued access tokens.
    pub access_token_issuer: String,
    pub token_expires_in: u64,
    pub pre_authorized_code_expiration_duration: u64,
    /// Polling interval returned to the wallet. Falls back to `token_expires_in`.
    pub interval: Option<u64>,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            credential_issuer: String::new(),
            credential_endpoint: None,
            c_nonce_expires_in: DEFAULT_EXPIRES_IN,
            uri_expires_in: DEFAULT_EXPIRES_IN,
            user_pin_length: DEFAULT_USER_PIN_LENGTH,
            credential_offer_scheme: DEFAULT_OFFER_SCHEME.to_owned(),
            token: TokenEndpointOpts::default(),
        }
    }
}

impl Default for TokenEndpointOpts {
    fn default() -> Self {
        Self {
            access_token_issuer: String::new(),
            token_expires_in: DEFAULT_EXPIRES_IN,
            pre_authorized_code_expiration_duration: DEFAULT_EXPIRES_IN,
            interval: None,
        }
    }
}

impl IssuerConfig {
    pub fn c_nonce_max_age(&self) -> TimeDelta {
        seconds(self.c_nonce_expires_in)
    }

    pub fn uri_max_age(&self) -> TimeDelta {
        seconds(self.uri_expires_in)
    }
}

impl TokenEndpointOpts {
    pub fn pre_authorized_code_max_age(&self) -> TimeDelta {
        seconds(self.pre_authorized_code_expiration_duration)
    }

    pub fn interval(&self) -> u64 {
        self.interval.unwrap_or(self.token_expires_in)
    }
}

fn seconds(s: u64) -> TimeDelta {
    TimeDelta::try_seconds(i64::try_from(s).unwrap_or(i64::MAX)).unwrap_or(TimeDelta::MAX)
}
