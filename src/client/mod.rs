//! Wallet side: requesting tokens and credentials from an issuer.

use std::sync::Arc;

use http::{header::CONTENT_TYPE, Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::{
    core::{
        credential::{
            to_wire_request, CredentialRequestError, CredentialResponse, UniformCredentialRequest,
        },
        credential_format::CredentialFormat,
        error::ErrorResponse,
        proof::ProofInput,
        token::{AccessTokenResponse, TokenRequest},
        util::{bearer_json_request, AsyncHttpClient},
        version::OpenId4VciVersion,
    },
    utils::NonEmptyVec,
};

pub use builder::CredentialRequestClientBuilder;

mod builder;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("url is not valid: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Request(#[from] CredentialRequestError),

    #[error("{0:#}")]
    Transport(anyhow::Error),

    #[error("issuer rejected the request ({status}): {error}")]
    Rejected {
        status: StatusCode,
        error: ErrorResponse,
    },

    #[error("unexpected response ({status}): {reason}")]
    UnexpectedResponse { status: StatusCode, reason: String },
}

/// One credential type or several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialTypes {
    Single(String),
    Many(Vec<String>),
}

impl CredentialTypes {
    fn is_empty(&self) -> bool {
        match self {
            CredentialTypes::Single(_) => false,
            CredentialTypes::Many(types) => types.is_empty(),
        }
    }

    fn into_vec(self) -> Vec<String> {
        match self {
            CredentialTypes::Single(t) => vec![t],
            CredentialTypes::Many(types) => types,
        }
    }
}

impl From<&str> for CredentialTypes {
    fn from(t: &str) -> Self {
        CredentialTypes::Single(t.to_owned())
    }
}

impl From<String> for CredentialTypes {
    fn from(t: String) -> Self {
        CredentialTypes::Single(t)
    }
}

impl From<Vec<String>> for CredentialTypes {
    fn from(types: Vec<String>) -> Self {
        CredentialTypes::Many(types)
    }
}

/// Per-call overrides of the client defaults.
#[derive(Debug, Clone)]
pub struct CredentialRequestInput {
    pub proof_input: ProofInput,
    pub credential_types: Option<CredentialTypes>,
    pub format: Option<String>,
}

impl CredentialRequestInput {
    pub fn new(proof_input: impl Into<ProofInput>) -> Self {
        Self {
            proof_input: proof_input.into(),
            credential_types: None,
            format: None,
        }
    }

    pub fn with_credential_types(mut self, types: impl Into<CredentialTypes>) -> Self {
        self.credential_types = Some(types.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// Requests credentials from a Credential Endpoint.
#[derive(Debug, Clone)]
pub struct CredentialRequestClient {
    credential_endpoint: String,
    credential_types: Vec<String>,
    format: Option<String>,
    token: String,
    version: OpenId4VciVersion,
    http_client: Arc<dyn AsyncHttpClient + Send + Sync>,
}

impl CredentialRequestClient {
    pub fn builder() -> CredentialRequestClientBuilder {
        CredentialRequestClientBuilder::default()
    }

    pub fn credential_endpoint(&self) -> &str {
        &self.credential_endpoint
    }

    pub fn version(&self) -> OpenId4VciVersion {
        self.version
    }

    /// Build a request with a freshly resolved proof and send it.
    pub async fn acquire_credentials_using_proof(
        &self,
        input: CredentialRequestInput,
    ) -> Result<CredentialResponse, ClientError> {
        let request = self.create_credential_request(input, self.version).await?;
        self.acquire_credentials_using_request(request).await
    }

    /// Send a request, encoded for the client's version, with the access token as bearer.
    pub async fn acquire_credentials_using_request(
        &self,
        request: UniformCredentialRequest,
    ) -> Result<CredentialResponse, ClientError> {
        let endpoint = valid_url(&self.credential_endpoint)?;
        let wire = to_wire_request(request, self.version);

        debug!("acquiring credential from {endpoint}");
        let request = bearer_json_request(endpoint.as_str(), &self.token, &wire)
            .map_err(ClientError::Transport)?;
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(ClientError::Transport)?;
        parse_response(response)
    }

    /// Assemble a uniform request from per-call input and the client defaults.
    ///
    /// # Errors
    /// See [CredentialRequestError]; proof errors come from the builder or from
    /// re-wrapping a pre-built proof.
    pub async fn create_credential_request(
        &self,
        input: CredentialRequestInput,
        version: OpenId4VciVersion,
    ) -> Result<UniformCredentialRequest, CredentialRequestError> {
        let format = resolve_format(input.format.as_deref().or(self.format.as_deref()), version)?;

        let types = match input.credential_types {
            Some(types) if !types.is_empty() => types.into_vec(),
            _ => self.credential_types.clone(),
        };
        let types = NonEmptyVec::maybe_new(types).ok_or(CredentialRequestError::MissingTypes)?;
        if !version.is_v11_or_higher() && types.len() > 1 {
            return Err(CredentialRequestError::TooManyTypes {
                version,
                count: types.len(),
            });
        }

        let proof = input.proof_input.resolve(version).await?;

        Ok(UniformCredentialRequest::new(format, types, proof))
    }
}

fn resolve_format(
    format: Option<&str>,
    version: OpenId4VciVersion,
) -> Result<CredentialFormat, CredentialRequestError> {
    let format = format.ok_or(CredentialRequestError::MissingFormat)?;
    if !version.is_v11_or_higher() {
        if let Some(format) = CredentialFormat::from_legacy(format) {
            return Ok(format);
        }
    }
    Ok(format.parse()?)
}

fn valid_url(url: &str) -> Result<Url, ClientError> {
    match Url::parse(url) {
        Ok(url) if matches!(url.scheme(), "https" | "http") => Ok(url),
        _ => {
            debug!("invalid endpoint: {url}");
            Err(ClientError::InvalidUrl(url.to_owned()))
        }
    }
}

fn parse_response<T: DeserializeOwned>(response: Response<Vec<u8>>) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return serde_json::from_slice(response.body()).map_err(|e| {
            ClientError::UnexpectedResponse {
                status,
                reason: e.to_string(),
            }
        });
    }
    match serde_json::from_slice::<ErrorResponse>(response.body()) {
        Ok(error) => Err(ClientError::Rejected { status, error }),
        Err(_) => Err(ClientError::UnexpectedResponse {
            status,
            reason: String::from_utf8_lossy(response.body()).into_owned(),
        }),
    }
}

/// Redeem a pre-authorized code at a Token Endpoint.
pub async fn request_access_token(
    http_client: &(dyn AsyncHttpClient + Send + Sync),
    token_endpoint: &str,
    request: &TokenRequest,
) -> Result<AccessTokenResponse, ClientError> {
    let endpoint = valid_url(token_endpoint)?;
    let body = request.to_form().map_err(ClientError::Transport)?;
    let request = Request::builder()
        .method(Method::POST)
        .uri(endpoint.as_str())
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(body.into_bytes())
        .map_err(|e| ClientError::Transport(e.into()))?;

    debug!("requesting access token from {endpoint}");
    let response = http_client
        .execute(request)
        .await
        .map_err(ClientError::Transport)?;
    parse_response(response)
}
