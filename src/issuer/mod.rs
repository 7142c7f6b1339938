use std::{fmt::Debug, sync::Arc};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::{
    config::{IssuerConfig, MAX_USER_PIN_LENGTH},
    core::{
        credential::{IssuedCredential, UniformCredentialRequest},
        jwt::{Jwt, JwtSigner},
    },
};

use state::{CNonceState, CredentialOfferSession, MemoryStates, StateError, StateStore, URIState};

pub mod credential;
pub mod offer;
pub mod state;
pub mod token;

/// Produces the credential for an accepted Credential Request.
#[async_trait]
pub trait CredentialSupplier: Debug + Send + Sync {
    /// `holder` is the decoded proof of possession; its `kid` or `jwk` header names
    /// the key the credential should be bound to.
    async fn supply(
        &self,
        request: &UniformCredentialRequest,
        session: &CredentialOfferSession,
        holder: &Jwt,
    ) -> Result<IssuedCredential>;
}

/// Checks the signature of a proof of possession JWT.
#[async_trait]
pub trait ProofVerifier: Debug + Send + Sync {
    async fn verify(&self, compact: &str, decoded: &Jwt) -> Result<()>;
}

/// An OpenID4VCI credential issuer.
#[derive(Debug, Clone)]
pub struct VcIssuer {
    config: IssuerConfig,
    access_token_signer: Arc<dyn JwtSigner>,
    sessions: Arc<dyn StateStore<CredentialOfferSession>>,
    c_nonces: Arc<dyn StateStore<CNonceState>>,
    uris: Arc<dyn StateStore<URIState>>,
    proof_verifier: Option<Arc<dyn ProofVerifier>>,
}

impl VcIssuer {
    /// Build a new issuer.
    pub fn builder() -> VcIssuerBuilder {
        VcIssuerBuilder::default()
    }

    pub fn config(&self) -> &IssuerConfig {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<dyn StateStore<CredentialOfferSession>> {
        &self.sessions
    }

    pub fn c_nonces(&self) -> &Arc<dyn StateStore<CNonceState>> {
        &self.c_nonces
    }

    pub fn uris(&self) -> &Arc<dyn StateStore<URIState>> {
        &self.uris
    }

    /// Purge expired entries from all three stores.
    ///
    /// Nothing calls this on a timer; an application runs it periodically, or
    /// before lookups, as it sees fit. Returns the number of entries removed.
    pub async fn clear_expired(&self) -> Result<usize, StateError> {
        let sessions = self
            .sessions
            .clear_expired(self.config.token.pre_authorized_code_max_age())
            .await?;
        let c_nonces = self
            .c_nonces
            .clear_expired(self.config.c_nonce_max_age())
            .await?;
        let uris = self.uris.clear_expired(self.config.uri_max_age()).await?;
        debug!(sessions, c_nonces, uris, "cleared expired issuer state");
        Ok(sessions + c_nonces + uris)
    }
}

/// Builder struct for [VcIssuer].
#[derive(Debug, Clone, Default)]
pub struct VcIssuerBuilder {
    config: Option<IssuerConfig>,
    access_token_signer: Option<Arc<dyn JwtSigner>>,
    sessions: Option<Arc<dyn StateStore<CredentialOfferSession>>>,
    c_nonces: Option<Arc<dyn StateStore<CNonceState>>>,
    uris: Option<Arc<dyn StateStore<URIState>>>,
    proof_verifier: Option<Arc<dyn ProofVerifier>>,
}

impl VcIssuerBuilder {
    /// Build the issuer.
    pub fn build(self) -> Result<VcIssuer> {
        let Self {
            config,
            access_token_signer,
            sessions,
            c_nonces,
            uris,
            proof_verifier,
        } = self;

        let Some(config) = config else {
            bail!("issuer configuration is required, see `with_config`")
        };

        if config.credential_issuer.is_empty() {
            bail!("credential_issuer must be configured")
        }

        if !(1..=MAX_USER_PIN_LENGTH).contains(&config.user_pin_length) {
            bail!(
                "user_pin_length must be between 1 and {MAX_USER_PIN_LENGTH}, found {}",
                config.user_pin_length
            )
        }

        let Some(access_token_signer) = access_token_signer else {
            bail!("access token signer is required, see `with_access_token_signer`")
        };

        let Some(sessions) = sessions else {
            bail!("session store is required, see `with_session_store`")
        };

        let Some(c_nonces) = c_nonces else {
            bail!("c_nonce store is required, see `with_c_nonce_store`")
        };

        // Offer URIs are only needed when the issuer mints offers itself.
        let uris = uris.unwrap_or_else(|| Arc::new(MemoryStates::<URIState>::new()));

        Ok(VcIssuer {
            config,
            access_token_signer,
            sessions,
            c_nonces,
            uris,
            proof_verifier,
        })
    }

    pub fn with_config(mut self, config: IssuerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the callback that signs access tokens.
    pub fn with_access_token_signer(mut self, signer: Arc<dyn JwtSigner>) -> Self {
        self.access_token_signer = Some(signer);
        self
    }

    pub fn with_session_store(
        mut self,
        store: Arc<dyn StateStore<CredentialOfferSession>>,
    ) -> Self {
        self.sessions = Some(store);
        self
    }

    pub fn with_c_nonce_store(mut self, store: Arc<dyn StateStore<CNonceState>>) -> Self {
        self.c_nonces = Some(store);
        self
    }

    pub fn with_uri_store(mut self, store: Arc<dyn StateStore<URIState>>) -> Self {
        self.uris = Some(store);
        self
    }

    /// Verify proof signatures at the credential endpoint. Without one, proofs are
    /// only checked for their `c_nonce` and audience.
    pub fn with_proof_verifier(mut self, verifier: Arc<dyn ProofVerifier>) -> Self {
        self.proof_verifier = Some(verifier);
        self
    }

    /// Use fresh [MemoryStates] for all three stores.
    pub fn with_memory_stores(self) -> Self {
        self.with_session_store(Arc::new(MemoryStates::<CredentialOfferSession>::new()))
            .with_c_nonce_store(Arc::new(MemoryStates::<CNonceState>::new()))
            .with_uri_store(Arc::new(MemoryStates::<URIState>::new()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::jwt::P256Signer;
    use p256::ecdsa::SigningKey;

    pub(crate) const ISSUER: &str = "https://credential-issuer.example.com";

    pub(crate) fn config() -> IssuerConfig {
        let mut config = IssuerConfig {
            credential_issuer: ISSUER.into(),
            ..IssuerConfig::default()
        };
        config.token.access_token_issuer = ISSUER.into();
        config
    }

    pub(crate) fn signer() -> Arc<P256Signer> {
        Arc::new(P256Signer::new(SigningKey::random(&mut rand::thread_rng())).unwrap())
    }

    pub(crate) fn issuer() -> VcIssuer {
        VcIssuer::builder()
            .with_config(config())
            .with_access_token_signer(signer())
            .with_memory_stores()
            .build()
            .unwrap()
    }

    #[test]
    fn builder_requires_collaborators() {
        let err = VcIssuer::builder()
            .with_config(config())
            .with_memory_stores()
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("with_access_token_signer"));

        let err = VcIssuer::builder()
            .with_config(config())
            .with_access_token_signer(signer())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("with_session_store"));

        let err = VcIssuer::builder()
            .with_config(IssuerConfig::default())
            .with_access_token_signer(signer())
            .with_memory_stores()
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("credential_issuer"));
    }

    #[test]
    fn user_pin_length_must_be_redeemable() {
        for user_pin_length in [0, 9] {
            let err = VcIssuer::builder()
                .with_config(IssuerConfig {
                    user_pin_length,
                    ..config()
                })
                .with_access_token_signer(signer())
                .with_memory_stores()
                .build()
                .unwrap_err();
            assert!(err.to_string().contains("user_pin_length"));
        }

        VcIssuer::builder()
            .with_config(IssuerConfig {
                user_pin_length: MAX_USER_PIN_LENGTH,
                ..config()
            })
            .with_access_token_signer(signer())
            .with_memory_stores()
            .build()
            .unwrap();
    }

    #[tokio::test]
    async fn clear_expired_sweeps_every_store() {
        use chrono::DateTime;

        let issuer = issuer();
        issuer
            .c_nonces()
            .set(
                "stale",
                CNonceState {
                    c_nonce: "stale".into(),
                    created_at: DateTime::UNIX_EPOCH,
                    pre_authorized_code: None,
                    issuer_state: None,
                },
            )
            .await
            .unwrap();
        issuer
            .uris()
            .set(
                "openid-credential-offer://?credential_offer=x",
                URIState {
                    uri: "openid-credential-offer://?credential_offer=x".into(),
                    created_at: DateTime::UNIX_EPOCH,
                    pre_authorized_code: None,
                    issuer_state: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(issuer.clear_expired().await.unwrap(), 2);
        assert!(!issuer.c_nonces().has("stale").await.unwrap());
    }
}
