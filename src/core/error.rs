use core::fmt;

use serde::{Deserialize, Serialize};

const INVALID_REQUEST: &str = "invalid_request";
const INVALID_GRANT: &str = "invalid_grant";
const INVALID_CLIENT: &str = "invalid_client";
const UNSUPPORTED_GRANT_TYPE: &str = "unsupported_grant_type";
const INVALID_TOKEN: &str = "invalid_token";
const INVALID_PROOF: &str = "invalid_proof";
const UNSUPPORTED_CREDENTIAL_FORMAT: &str = "unsupported_credential_format";
const UNSUPPORTED_CREDENTIAL_TYPE: &str = "unsupported_credential_type";
const SERVER_ERROR: &str = "server_error";

/// OAuth 2.0 and OID4VCI error codes returned in the `error` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCode {
    InvalidRequest,
    InvalidGrant,
    InvalidClient,
    UnsupportedGrantType,
    InvalidToken,
    InvalidProof,
    UnsupportedCredentialFormat,
    UnsupportedCredentialType,
    ServerError,
    Other(String),
}

impl From<String> for ErrorCode {
    fn from(s: String) -> Self {
        match s.as_str() {
            INVALID_REQUEST => ErrorCode::InvalidRequest,
            INVALID_GRANT => ErrorCode::InvalidGrant,
            INVALID_CLIENT => ErrorCode::InvalidClient,
            UNSUPPORTED_GRANT_TYPE => ErrorCode::UnsupportedGrantType,
            INVALID_TOKEN => ErrorCode::InvalidToken,
            INVALID_PROOF => ErrorCode::InvalidProof,
            UNSUPPORTED_CREDENTIAL_FORMAT => ErrorCode::UnsupportedCredentialFormat,
            UNSUPPORTED_CREDENTIAL_TYPE => ErrorCode::UnsupportedCredentialType,
            SERVER_ERROR => ErrorCode::ServerError,
            _ => ErrorCode::Other(s),
        }
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::InvalidRequest => INVALID_REQUEST,
            ErrorCode::InvalidGrant => INVALID_GRANT,
            ErrorCode::InvalidClient => INVALID_CLIENT,
            ErrorCode::UnsupportedGrantType => UNSUPPORTED_GRANT_TYPE,
            ErrorCode::InvalidToken => INVALID_TOKEN,
            ErrorCode::InvalidProof => INVALID_PROOF,
            ErrorCode::UnsupportedCredentialFormat => UNSUPPORTED_CREDENTIAL_FORMAT,
            ErrorCode::UnsupportedCredentialType => UNSUPPORTED_CREDENTIAL_TYPE,
            ErrorCode::ServerError => SERVER_ERROR,
            ErrorCode::Other(s) => s,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

/// Error body returned by the token and credential endpoints.
///
/// Two names for the human readable detail are in circulation, `error_description`
/// (RFC 6749) and `error_message`. Servers populate one of them; clients should read
/// [ErrorResponse::description], which accepts either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

/// Which detail field an error is reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailField {
    Description,
    Message,
}

impl ErrorResponse {
    pub fn new(error: ErrorCode, field: DetailField, detail: impl Into<String>) -> Self {
        let detail = Some(detail.into());
        let (error_description, error_message) = match field {
            DetailField::Description => (detail, None),
            DetailField::Message => (None, detail),
        };
        Self {
            error,
            error_description,
            error_message,
            error_uri: None,
        }
    }

    /// The error detail, whichever field carried it.
    pub fn description(&self) -> Option<&str> {
        self.error_description
            .as_deref()
            .or(self.error_message.as_deref())
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(d) => write!(f, "{}: {d}", self.error),
            None => self.error.fmt(f),
        }
    }
}

impl std::error::Error for ErrorResponse {}
