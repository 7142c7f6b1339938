use anyhow::{Context, Result};
use http::{
    header::{CACHE_CONTROL, CONTENT_TYPE},
    Response, StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::core::{
    error::{DetailField, ErrorCode, ErrorResponse},
    offer::PRE_AUTHORIZED_CODE_GRANT,
};

/// Prefix of the error reported for an unknown pre-authorized code or issuer state.
pub const STATE_MISSING_ERROR: &str = "issuer state or pre-authorized key not found";

const AUTHORIZATION_CODE_GRANT: &str = "authorization_code";

/// Token Request, as posted by a wallet in `application/x-www-form-urlencoded` form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_type: Option<String>,
    #[serde(
        rename = "pre-authorized_code",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub pre_authorized_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_pin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantType {
    PreAuthorizedCode,
    AuthorizationCode,
    Other(String),
}

impl From<&str> for GrantType {
    fn from(s: &str) -> Self {
        match s {
            PRE_AUTHORIZED_CODE_GRANT => GrantType::PreAuthorizedCode,
            AUTHORIZATION_CODE_GRANT => GrantType::AuthorizationCode,
            _ => GrantType::Other(s.to_owned()),
        }
    }
}

impl TokenRequest {
    /// A pre-authorized code Token Request.
    pub fn pre_authorized(code: impl Into<String>, user_pin: Option<String>) -> Self {
        Self {
            grant_type: Some(PRE_AUTHORIZED_CODE_GRANT.to_owned()),
            pre_authorized_code: Some(code.into()),
            user_pin,
        }
    }

    /// Parse a form encoded request body. Empty values are treated as absent.
    pub fn from_form(body: &str) -> Result<Self, TokenError> {
        let request: Self = serde_urlencoded::from_str(body)
            .map_err(|e| TokenError::MalformedRequest(e.to_string()))?;
        Ok(Self {
            grant_type: request.grant_type.filter(|s| !s.is_empty()),
            pre_authorized_code: request.pre_authorized_code.filter(|s| !s.is_empty()),
            user_pin: request.user_pin.filter(|s| !s.is_empty()),
        })
    }

    pub fn to_form(&self) -> Result<String> {
        serde_urlencoded::to_string(self).context("unable to encode token request")
    }

    pub fn grant_type(&self) -> Option<GrantType> {
        self.grant_type.as_deref().map(GrantType::from)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    #[default]
    Bearer,
}

/// Successful Token Response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub token_type: TokenType,
    /// Lifetime of the access token in seconds.
    pub expires_in: u64,
    pub c_nonce: String,
    pub c_nonce_expires_in: u64,
    pub authorization_pending: bool,
    pub interval: u64,
}

/// Reasons a Token Request is refused.
///
/// Variants are listed in the order the token endpoint checks for them.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("{0}")]
    MalformedRequest(String),

    #[error("pre-authorized_code is required")]
    MissingPreAuthorizedCode,

    #[error("unsupported grant_type")]
    UnsupportedGrantType,

    #[error("{} ({})", STATE_MISSING_ERROR, .0)]
    StateMissing(String),

    #[error("User pin is required")]
    UserPinRequired,

    #[error("User pin is not required")]
    UserPinNotRequired,

    #[error("PIN must consist of maximum 8 numeric characters")]
    InvalidPinFormat,

    #[error("PIN is invalid")]
    InvalidPin,

    #[error("pre-authorized_code is expired")]
    Expired,

    /// A collaborator (state store, signer) failed.
    #[error("{0:#}")]
    Internal(anyhow::Error),
}

impl TokenError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TokenError::MalformedRequest(_)
            | TokenError::MissingPreAuthorizedCode
            | TokenError::StateMissing(_)
            | TokenError::UserPinRequired
            | TokenError::UserPinNotRequired
            | TokenError::Internal(_) => ErrorCode::InvalidRequest,
            TokenError::UnsupportedGrantType
            | TokenError::InvalidPinFormat
            | TokenError::InvalidPin
            | TokenError::Expired => ErrorCode::InvalidGrant,
        }
    }

    fn detail_field(&self) -> DetailField {
        match self {
            TokenError::MalformedRequest(_)
            | TokenError::MissingPreAuthorizedCode
            | TokenError::UnsupportedGrantType
            | TokenError::UserPinRequired
            | TokenError::UserPinNotRequired => DetailField::Description,
            TokenError::StateMissing(_)
            | TokenError::InvalidPinFormat
            | TokenError::InvalidPin
            | TokenError::Expired
            | TokenError::Internal(_) => DetailField::Message,
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse::new(self.code(), self.detail_field(), self.to_string())
    }
}

/// Outcome of the token endpoint, ready to be written to the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TokenEndpointResponse {
    Issued(AccessTokenResponse),
    Rejected(ErrorResponse),
}

impl From<Result<AccessTokenResponse, TokenError>> for TokenEndpointResponse {
    fn from(result: Result<AccessTokenResponse, TokenError>) -> Self {
        match result {
            Ok(response) => TokenEndpointResponse::Issued(response),
            Err(e) => TokenEndpointResponse::Rejected(e.to_error_response()),
        }
    }
}

impl TokenEndpointResponse {
    pub fn status_code(&self) -> StatusCode {
        match self {
            TokenEndpointResponse::Issued(_) => StatusCode::OK,
            TokenEndpointResponse::Rejected(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// JSON response with `Cache-Control: no-store`, as RFC 6749 requires for token responses.
    pub fn into_http_response(self) -> Result<Response<Vec<u8>>> {
        let body = serde_json::to_vec(&self).context("unable to serialize token response")?;
        Response::builder()
            .status(self.status_code())
            .header(CONTENT_TYPE, "application/json")
            .header(CACHE_CONTROL, "no-store")
            .body(body)
            .context("unable to construct token response")
    }
}
