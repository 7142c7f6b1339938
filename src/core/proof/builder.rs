use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as Json;
use tracing::debug;

use crate::core::{
    jwt::{Jwt, JwtHeader, JwtPayload, JwtSigner},
    token::AccessTokenResponse,
    version::OpenId4VciVersion,
};

use super::{ProofError, ProofOfPossession, ProofType, PROOF_JWT_TYP};

/// Builder for a JWT [ProofOfPossession].
///
/// Collects the key reference, the audience and the `c_nonce`, then signs them
/// through a [JwtSigner] in [build](Self::build). A builder obtained from
/// [from_proof](Self::from_proof) returns the existing proof without re-signing.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct ProofOfPossessionBuilder {
    proof: Option<ProofOfPossession>,
    signer: Option<Arc<dyn JwtSigner>>,
    kid: Option<String>,
    jwk: Option<Json>,
    client_id: Option<String>,
    issuer: Option<String>,
    c_nonce: Option<String>,
    jti: Option<String>,
    typ: Option<String>,
}

impl ProofOfPossessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already signed proof for use in a request of the given version.
    ///
    /// # Errors
    /// [ProofError::InvalidProofType] when `proof_type` is absent and
    /// [ProofError::NoJwtProvided] when the JWT is empty.
    pub fn from_proof(
        proof: ProofOfPossession,
        version: OpenId4VciVersion,
    ) -> Result<Self, ProofError> {
        let Some(ProofType::Jwt) = proof.proof_type else {
            return Err(ProofError::InvalidProofType);
        };
        if proof.jwt.is_empty() {
            return Err(ProofError::NoJwtProvided);
        }
        debug!("reusing pre-built proof for {version}");
        Ok(Self {
            proof: Some(proof),
            ..Self::default()
        })
    }

    pub fn with_signer(mut self, signer: Arc<dyn JwtSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Key identifier, typically a DID URL. Mutually exclusive with [with_jwk](Self::with_jwk).
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    pub fn with_jwk(mut self, jwk: Json) -> Self {
        self.jwk = Some(jwk);
        self
    }

    /// `iss` of the proof; omitted for anonymous pre-authorized access.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// The Credential Issuer identifier, used as `aud`.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_c_nonce(mut self, c_nonce: impl Into<String>) -> Self {
        self.c_nonce = Some(c_nonce.into());
        self
    }

    /// Take the `c_nonce` from a Token Response.
    pub fn with_access_token_response(self, response: &AccessTokenResponse) -> Self {
        self.with_c_nonce(response.c_nonce.clone())
    }

    pub fn with_jti(mut self, jti: impl Into<String>) -> Self {
        self.jti = Some(jti.into());
        self
    }

    /// Override the `typ` header (defaults to `openid4vci-proof+jwt`).
    pub fn with_typ(mut self, typ: impl Into<String>) -> Self {
        self.typ = Some(typ.into());
        self
    }

    pub async fn build(self) -> Result<ProofOfPossession, ProofError> {
        if let Some(proof) = self.proof {
            return Ok(proof);
        }

        let signer = self.signer.ok_or(ProofError::MissingSigner)?;
        if self.kid.is_some() == self.jwk.is_some() {
            return Err(ProofError::KidOrJwk);
        }
        let aud = self.issuer.ok_or(ProofError::MissingAudience)?;

        let jwt = Jwt {
            header: JwtHeader {
                typ: Some(self.typ.unwrap_or_else(|| PROOF_JWT_TYP.to_owned())),
                alg: Some(signer.alg().to_owned()),
                kid: self.kid.clone(),
                jwk: self.jwk,
            },
            payload: JwtPayload {
                iss: self.client_id,
                aud: Some(aud),
                iat: Some(Utc::now().timestamp()),
                nonce: self.c_nonce,
                jti: self.jti,
                ..JwtPayload::default()
            },
        };

        debug!("signing proof of possession");
        let jwt = signer
            .sign(&jwt, self.kid.as_deref())
            .await
            .map_err(ProofError::Signing)?;

        Ok(ProofOfPossession::jwt(jwt))
    }
}
