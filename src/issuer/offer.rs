use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::{
    core::offer::{
        CredentialOfferPayload, GrantAuthorizationCode, GrantPreAuthorizedCode, Grants,
        OfferedCredential,
    },
    utils::gen_pin,
};

use super::{
    state::{CredentialOfferSession, StateEntry, URIState},
    VcIssuer,
};

/// The grant an offer is redeemable with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferGrant {
    /// Pre-authorized code flow. A code is generated when none is given.
    PreAuthorizedCode {
        code: Option<String>,
        user_pin_required: bool,
    },
    /// Authorization code flow, bound to the offer by `issuer_state`.
    AuthorizationCode { issuer_state: Option<String> },
}

#[derive(Debug, Clone)]
pub struct CredentialOfferOpts {
    pub credentials: Vec<OfferedCredential>,
    pub grant: OfferGrant,
}

/// A freshly minted offer.
#[derive(Debug, Clone)]
pub struct CredentialOfferUri {
    pub uri: String,
    pub session: CredentialOfferSession,
    /// To be shown to the user out of band; the wallet never receives it with the offer.
    pub user_pin: Option<String>,
    pub user_pin_length: Option<usize>,
    pub user_pin_required: bool,
}

impl VcIssuer {
    /// Mint a Credential Offer and store its session.
    pub async fn create_credential_offer_uri(
        &self,
        opts: CredentialOfferOpts,
    ) -> Result<CredentialOfferUri> {
        if opts.credentials.is_empty() {
            bail!("a credential offer must name at least one credential")
        }

        let (grants, user_pin_required) = match opts.grant {
            OfferGrant::PreAuthorizedCode {
                code,
                user_pin_required,
            } => {
                let pre_authorized_code =
                    code.unwrap_or_else(|| Uuid::new_v4().to_string());
                let grants = Grants {
                    pre_authorized_code: Some(GrantPreAuthorizedCode {
                        pre_authorized_code,
                        user_pin_required,
                    }),
                    ..Grants::default()
                };
                (grants, user_pin_required)
            }
            OfferGrant::AuthorizationCode { issuer_state } => {
                let issuer_state = issuer_state.unwrap_or_else(|| Uuid::new_v4().to_string());
                let grants = Grants {
                    authorization_code: Some(GrantAuthorizationCode {
                        issuer_state: Some(issuer_state),
                    }),
                    ..Grants::default()
                };
                (grants, false)
            }
        };

        let credential_offer = CredentialOfferPayload {
            credential_issuer: self.config.credential_issuer.clone(),
            credentials: opts.credentials,
            grants: Some(grants),
        };

        let user_pin = user_pin_required.then(|| gen_pin(self.config.user_pin_length));
        let session = CredentialOfferSession::new(credential_offer, user_pin.clone());
        let Some(key) = session.key().map(ToOwned::to_owned) else {
            bail!("credential offer has neither a pre-authorized code nor an issuer state")
        };

        let uri = session
            .credential_offer
            .to_uri(&self.config.credential_offer_scheme)?;

        self.sessions
            .set(&key, session.clone())
            .await
            .context("unable to store credential offer session")?;
        self.uris
            .set(
                &uri,
                URIState {
                    uri: uri.clone(),
                    created_at: Utc::now(),
                    pre_authorized_code: session.pre_authorized_code.clone(),
                    issuer_state: session.issuer_state.clone(),
                },
            )
            .await
            .context("unable to store credential offer uri")?;
        debug!("created credential offer");

        Ok(CredentialOfferUri {
            uri,
            session,
            user_pin,
            user_pin_length: user_pin_required.then_some(self.config.user_pin_length),
            user_pin_required,
        })
    }

    /// Resolve an offer URI to its session.
    pub async fn session_for_uri(&self, uri: &str) -> Result<CredentialOfferSession> {
        let state = self.uris.get_asserted(uri).await?;
        if state.is_expired(self.config.uri_max_age(), Utc::now()) {
            bail!("credential offer uri has expired")
        }
        let Some(key) = state.session_key() else {
            bail!("credential offer uri is not bound to a session")
        };
        Ok(self.sessions.get_asserted(key).await?)
    }
}
