use std::sync::Arc;

use anyhow::{bail, Result};

use crate::core::{
    offer::{CredentialOfferPayload, OfferedCredential},
    token::AccessTokenResponse,
    util::{AsyncHttpClient, ReqwestClient},
    version::OpenId4VciVersion,
};

use super::CredentialRequestClient;

/// Builder struct for [CredentialRequestClient].
#[derive(Debug, Clone, Default)]
pub struct CredentialRequestClientBuilder {
    credential_endpoint: Option<String>,
    credential_types: Vec<String>,
    format: Option<String>,
    token: Option<String>,
    version: Option<OpenId4VciVersion>,
    http_client: Option<Arc<dyn AsyncHttpClient + Send + Sync>>,
}

impl CredentialRequestClientBuilder {
    /// Build the client. The version defaults to v1.0.11 and the HTTP client to a
    /// [ReqwestClient].
    pub fn build(self) -> Result<CredentialRequestClient> {
        let Self {
            credential_endpoint,
            credential_types,
            format,
            token,
            version,
            http_client,
        } = self;

        let Some(credential_endpoint) = credential_endpoint else {
            bail!("credential endpoint is required, see `with_credential_endpoint`")
        };

        let Some(token) = token else {
            bail!("access token is required, see `with_token`")
        };

        let http_client = match http_client {
            Some(http_client) => http_client,
            None => Arc::new(ReqwestClient::new()?),
        };

        Ok(CredentialRequestClient {
            credential_endpoint,
            credential_types,
            format,
            token,
            version: version.unwrap_or_default(),
            http_client,
        })
    }

    /// Take defaults from a Credential Offer: the endpoint `<credential_issuer>/credential`
    /// and the format and types of its first inline credential.
    pub fn from_credential_offer(offer: &CredentialOfferPayload) -> Self {
        let mut builder = Self::default().with_credential_endpoint(format!(
            "{}/credential",
            offer.credential_issuer.trim_end_matches('/')
        ));
        let inline = offer.credentials.iter().find_map(|c| match c {
            OfferedCredential::Format(f) => Some(f),
            OfferedCredential::Id(_) => None,
        });
        if let Some(inline) = inline {
            builder = builder
                .with_format(inline.format.as_str())
                .with_credential_types(inline.types.to_vec());
        }
        builder
    }

    pub fn with_credential_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.credential_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_credential_types(mut self, types: Vec<String>) -> Self {
        self.credential_types = types;
        self
    }

    /// Default format. Legacy identifiers are accepted for pre-v1.0.11 issuers.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_token_response(self, response: &AccessTokenResponse) -> Self {
        self.with_token(response.access_token.clone())
    }

    pub fn with_version(mut self, version: OpenId4VciVersion) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_http_client(mut self, client: Arc<dyn AsyncHttpClient + Send + Sync>) -> Self {
        self.http_client = Some(client);
        self
    }
}
