use serde::{Deserialize, Serialize};

use crate::core::version::OpenId4VciVersion;

pub use self::builder::ProofOfPossessionBuilder;

mod builder;

/// `typ` header of a proof JWT.
pub const PROOF_JWT_TYP: &str = "openid4vci-proof+jwt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofType {
    Jwt,
}

/// The `proof` member of a Credential Request.
///
/// `proof_type` is optional here only so that proofs received from elsewhere can
/// be inspected; [ProofOfPossessionBuilder::from_proof] refuses one without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOfPossession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_type: Option<ProofType>,
    #[serde(default)]
    pub jwt: String,
}

impl ProofOfPossession {
    pub fn jwt(jwt: impl Into<String>) -> Self {
        Self {
            proof_type: Some(ProofType::Jwt),
            jwt: jwt.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProofError {
    #[error("proof_type is missing from the proof of possession")]
    InvalidProofType,

    #[error("no JWT provided in the proof of possession")]
    NoJwtProvided,

    #[error("exactly one of kid or jwk must be present")]
    KidOrJwk,

    #[error("the credential issuer (aud) is required, see `with_issuer`")]
    MissingAudience,

    #[error("a signer is required, see `with_signer`")]
    MissingSigner,

    #[error("proof can't be constructed: {0:#}")]
    Signing(anyhow::Error),
}

/// Proof input of a credential request: a builder still to be signed, or a
/// proof that was signed earlier.
#[derive(Debug, Clone)]
pub enum ProofInput {
    Builder(ProofOfPossessionBuilder),
    Proof(ProofOfPossession),
}

impl ProofInput {
    /// Produce the proof to embed in a request for `version`. May suspend on the signer.
    pub async fn resolve(self, version: OpenId4VciVersion) -> Result<ProofOfPossession, ProofError> {
        match self {
            ProofInput::Builder(builder) => builder.build().await,
            ProofInput::Proof(proof) => {
                ProofOfPossessionBuilder::from_proof(proof, version)?
                    .build()
                    .await
            }
        }
    }
}

impl From<ProofOfPossessionBuilder> for ProofInput {
    fn from(builder: ProofOfPossessionBuilder) -> Self {
        ProofInput::Builder(builder)
    }
}

impl From<ProofOfPossession> for ProofInput {
    fn from(proof: ProofOfPossession) -> Self {
        ProofInput::Proof(proof)
    }
}
