use chrono::Utc;
use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::{
    core::{
        credential::{
            from_wire_request, to_wire_response, CredentialRequest, CredentialRequestError,
            CredentialResponse, UniformCredentialResponse,
        },
        error::{DetailField, ErrorCode, ErrorResponse},
        jwt::Jwt,
        proof::ProofError,
        token::STATE_MISSING_ERROR,
        version::OpenId4VciVersion,
    },
    utils::gen_nonce,
};

use super::{
    state::{CNonceState, IssueStatus, StateEntry},
    CredentialSupplier, VcIssuer,
};

/// Reasons a Credential Request is refused.
#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error(transparent)]
    Request(#[from] CredentialRequestError),

    #[error("proof is not a valid JWT: {0:#}")]
    MalformedProof(anyhow::Error),

    #[error("proof does not contain a c_nonce")]
    MissingNonce,

    #[error("c_nonce is unknown or has expired")]
    InvalidNonce,

    #[error("proof audience {found} does not match credential issuer {expected}")]
    AudienceMismatch { expected: String, found: String },

    #[error("proof signature could not be verified: {0:#}")]
    ProofVerification(anyhow::Error),

    #[error("{} ({})", STATE_MISSING_ERROR, .0)]
    StateMissing(String),

    #[error("credential could not be issued: {0:#}")]
    Supplier(anyhow::Error),

    /// A collaborator (state store) failed.
    #[error("{0:#}")]
    Internal(anyhow::Error),
}

impl IssueError {
    pub fn code(&self) -> ErrorCode {
        match self {
            IssueError::Request(CredentialRequestError::UnsupportedFormat(_)) => {
                ErrorCode::UnsupportedCredentialFormat
            }
            IssueError::MalformedProof(_)
            | IssueError::MissingNonce
            | IssueError::InvalidNonce
            | IssueError::AudienceMismatch { .. }
            | IssueError::ProofVerification(_)
            | IssueError::Request(CredentialRequestError::Proof(_)) => ErrorCode::InvalidProof,
            IssueError::Supplier(_) => ErrorCode::ServerError,
            IssueError::Request(_)
            | IssueError::StateMissing(_)
            | IssueError::Internal(_) => ErrorCode::InvalidRequest,
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        let field = match self {
            IssueError::StateMissing(_) | IssueError::Supplier(_) | IssueError::Internal(_) => {
                DetailField::Message
            }
            _ => DetailField::Description,
        };
        ErrorResponse::new(self.code(), field, self.to_string())
    }
}

impl VcIssuer {
    /// Handle a JSON Credential Request body sent by a wallet speaking `version`.
    pub async fn credential(
        &self,
        body: Json,
        version: OpenId4VciVersion,
        supplier: &dyn CredentialSupplier,
    ) -> Result<CredentialResponse, ErrorResponse> {
        let result = match CredentialRequest::from_json(body, version) {
            Ok(request) => self.issue_credential(request, version, supplier).await,
            Err(e) => Err(IssueError::Request(e)),
        };
        result.map_err(|e| {
            match &e {
                IssueError::Supplier(_) | IssueError::Internal(_) => {
                    warn!("credential request failed: {e}")
                }
                _ => debug!(error = %e.code(), "credential request rejected"),
            }
            e.to_error_response()
        })
    }

    /// Issue a credential for a request whose access token the caller has already checked.
    ///
    /// The proof must carry a live `c_nonce` from this issuer, which is consumed; the
    /// response carries a fresh one for the next request.
    pub async fn issue_credential(
        &self,
        request: CredentialRequest,
        version: OpenId4VciVersion,
        supplier: &dyn CredentialSupplier,
    ) -> Result<CredentialResponse, IssueError> {
        let request = from_wire_request(request)?;
        if request.proof.proof_type.is_none() {
            return Err(CredentialRequestError::from(ProofError::InvalidProofType).into());
        }
        if request.proof.jwt.is_empty() {
            return Err(CredentialRequestError::from(ProofError::NoJwtProvided).into());
        }

        let proof = Jwt::decode_unverified(&request.proof.jwt).map_err(IssueError::MalformedProof)?;
        if let Some(verifier) = &self.proof_verifier {
            verifier
                .verify(&request.proof.jwt, &proof)
                .await
                .map_err(IssueError::ProofVerification)?;
        }

        let c_nonce = proof.payload.nonce.as_deref().ok_or(IssueError::MissingNonce)?;
        let nonce_state = self
            .c_nonces
            .get(c_nonce)
            .await
            .map_err(|e| IssueError::Internal(e.into()))?
            .filter(|state| !state.is_expired(self.config.c_nonce_max_age(), Utc::now()))
            .ok_or(IssueError::InvalidNonce)?;

        if let Some(aud) = &proof.payload.aud {
            if aud != &self.config.credential_issuer {
                return Err(IssueError::AudienceMismatch {
                    expected: self.config.credential_issuer.clone(),
                    found: aud.clone(),
                });
            }
        }

        let key = nonce_state
            .session_key()
            .ok_or_else(|| IssueError::StateMissing(c_nonce.to_owned()))?;
        let mut session = self
            .sessions
            .get(key)
            .await
            .map_err(|e| IssueError::Internal(e.into()))?
            .ok_or_else(|| IssueError::StateMissing(key.to_owned()))?;

        let credential = supplier
            .supply(&request, &session, &proof)
            .await
            .map_err(IssueError::Supplier)?;
        if !credential.matches(request.format) {
            warn!("supplier returned a credential not encoded as {}", request.format);
            return Err(IssueError::Supplier(anyhow::anyhow!(
                "credential encoding does not match format {}",
                request.format
            )));
        }

        self.c_nonces
            .delete(c_nonce)
            .await
            .map_err(|e| IssueError::Internal(e.into()))?;
        let next_nonce = gen_nonce();
        self.c_nonces
            .set(
                &next_nonce,
                CNonceState {
                    c_nonce: next_nonce.clone(),
                    created_at: Utc::now(),
                    pre_authorized_code: nonce_state.pre_authorized_code.clone(),
                    issuer_state: nonce_state.issuer_state.clone(),
                },
            )
            .await
            .map_err(|e| IssueError::Internal(e.into()))?;

        session.update_status(IssueStatus::CredentialIssued);
        self.sessions
            .set(key, session)
            .await
            .map_err(|e| IssueError::Internal(e.into()))?;
        debug!("issued {} credential for {version}", request.format);

        Ok(to_wire_response(
            UniformCredentialResponse {
                format: request.format,
                credential: Some(credential),
                acceptance_token: None,
                c_nonce: Some(next_nonce),
                c_nonce_expires_in: Some(self.config.c_nonce_expires_in),
            },
            version,
        ))
    }
}
