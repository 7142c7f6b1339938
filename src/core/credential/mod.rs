//! Credential Request and Response types, and the adapter between the single
//! internal shape and the wire encodings of each draft.
//!
//! Drafts up to v1.0.09 request exactly one credential `type` and use the legacy
//! format identifiers (`jwt_vc`, `ldp_vc`). From v1.0.11 on a request carries a
//! `types` array, or a `credential_definition` for JSON-LD formats, and the
//! current identifiers. [UniformCredentialRequest] is the v1.0.11 shape and is
//! what the rest of the crate works with; [to_wire_request] and
//! [from_wire_request] convert at the edge.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::{
    core::{
        credential_format::{CredentialFormat, UnsupportedFormat},
        proof::{ProofError, ProofOfPossession},
        version::OpenId4VciVersion,
    },
    utils::NonEmptyVec,
};

/// The base type every W3C credential carries; never the type a wallet asks for.
pub const VERIFIABLE_CREDENTIAL: &str = "VerifiableCredential";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDefinition {
    #[serde(rename = "@context", default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<Json>,
    pub types: NonEmptyVec<String>,
    #[serde(
        rename = "credentialSubject",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub credential_subject: Option<Json>,
}

/// How a v1.0.11 request names the credential it wants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CredentialSelector {
    Types {
        types: NonEmptyVec<String>,
        #[serde(
            rename = "credentialSubject",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        credential_subject: Option<Json>,
    },
    Definition {
        credential_definition: CredentialDefinition,
    },
}

impl CredentialSelector {
    pub fn types(&self) -> &NonEmptyVec<String> {
        match self {
            CredentialSelector::Types { types, .. } => types,
            CredentialSelector::Definition {
                credential_definition,
            } => &credential_definition.types,
        }
    }
}

/// Version independent Credential Request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniformCredentialRequest {
    pub format: CredentialFormat,
    #[serde(flatten)]
    pub credential: CredentialSelector,
    pub proof: ProofOfPossession,
}

impl UniformCredentialRequest {
    pub fn new(
        format: CredentialFormat,
        types: NonEmptyVec<String>,
        proof: ProofOfPossession,
    ) -> Self {
        Self {
            format,
            credential: CredentialSelector::Types {
                types,
                credential_subject: None,
            },
            proof,
        }
    }

    pub fn types(&self) -> &NonEmptyVec<String> {
        self.credential.types()
    }
}

/// Credential Request of drafts v1.0.08 and v1.0.09.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRequestV1_0_08 {
    #[serde(rename = "type")]
    pub credential_type: String,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<ProofOfPossession>,
}

/// A Credential Request as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CredentialRequest {
    V1_0_11(UniformCredentialRequest),
    V1_0_08(CredentialRequestV1_0_08),
}

impl CredentialRequest {
    /// Parse a request body sent by a wallet speaking `version`.
    ///
    /// An unknown `format` is reported as [CredentialRequestError::UnsupportedFormat]
    /// for every version, before the rest of the body is looked at.
    pub fn from_json(
        body: Json,
        version: OpenId4VciVersion,
    ) -> Result<Self, CredentialRequestError> {
        let malformed = |source| CredentialRequestError::Malformed { version, source };
        if version.is_v11_or_higher() {
            if let Some(format) = body.get("format").and_then(Json::as_str) {
                format.parse::<CredentialFormat>()?;
            }
            serde_json::from_value(body)
                .map(CredentialRequest::V1_0_11)
                .map_err(malformed)
        } else {
            serde_json::from_value(body)
                .map(CredentialRequest::V1_0_08)
                .map_err(malformed)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialRequestError {
    #[error("invalid {version} credential request: {source}")]
    Malformed {
        version: OpenId4VciVersion,
        source: serde_json::Error,
    },

    #[error("format of credential to be issued is missing")]
    MissingFormat,

    #[error(transparent)]
    UnsupportedFormat(#[from] UnsupportedFormat),

    #[error("credential type(s) need to be provided")]
    MissingTypes,

    #[error("only a single credential type is supported for {version}, found {count}")]
    TooManyTypes {
        version: OpenId4VciVersion,
        count: usize,
    },

    #[error("proof is missing from the credential request")]
    MissingProof,

    #[error(transparent)]
    Proof(#[from] ProofError),
}

/// Encode a uniform request for a wallet/issuer pair speaking `version`.
///
/// From v1.0.11 on this is the identity. Before, the format is mapped to its legacy
/// identifier and the type list collapses to a single `type`: the first entry that is
/// not `VerifiableCredential`, or the first type of the credential definition.
pub fn to_wire_request(
    uniform: UniformCredentialRequest,
    version: OpenId4VciVersion,
) -> CredentialRequest {
    if version.is_v11_or_higher() {
        return CredentialRequest::V1_0_11(uniform);
    }

    let credential_type = match &uniform.credential {
        CredentialSelector::Types { types, .. } => types
            .iter()
            .find(|t| t.as_str() != VERIFIABLE_CREDENTIAL)
            .unwrap_or(types.head()),
        CredentialSelector::Definition {
            credential_definition,
        } => credential_definition.types.head(),
    }
    .clone();

    CredentialRequest::V1_0_08(CredentialRequestV1_0_08 {
        credential_type,
        format: uniform.format.to_legacy().to_owned(),
        proof: Some(uniform.proof),
    })
}

/// Normalize a received request to the uniform shape.
pub fn from_wire_request(
    request: CredentialRequest,
) -> Result<UniformCredentialRequest, CredentialRequestError> {
    match request {
        CredentialRequest::V1_0_11(uniform) => Ok(uniform),
        CredentialRequest::V1_0_08(legacy) => {
            let format = match CredentialFormat::from_legacy(&legacy.format) {
                Some(format) => format,
                None => legacy.format.parse()?,
            };
            let proof = legacy.proof.ok_or(CredentialRequestError::MissingProof)?;
            Ok(UniformCredentialRequest::new(
                format,
                NonEmptyVec::new(legacy.credential_type),
                proof,
            ))
        }
    }
}

/// An issued credential: a compact JWT for JWT formats, a JSON object for `ldp_vc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IssuedCredential {
    Jwt(String),
    LinkedData(Map<String, Json>),
}

impl IssuedCredential {
    pub(crate) fn matches(&self, format: CredentialFormat) -> bool {
        matches!(
            (self, format.is_jwt()),
            (IssuedCredential::Jwt(_), true) | (IssuedCredential::LinkedData(_), false)
        )
    }
}

/// Version independent Credential Response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformCredentialResponse {
    pub format: CredentialFormat,
    /// `None` for deferred issuance, in which case `acceptance_token` is set.
    pub credential: Option<IssuedCredential>,
    pub acceptance_token: Option<String>,
    pub c_nonce: Option<String>,
    pub c_nonce_expires_in: Option<u64>,
}

/// A Credential Response as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialResponse {
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<IssuedCredential>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c_nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c_nonce_expires_in: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialResponseError {
    #[error(transparent)]
    UnsupportedFormat(#[from] UnsupportedFormat),

    #[error("credential encoding does not match format {0}")]
    EncodingMismatch(CredentialFormat),
}

/// Encode a uniform response for a wallet speaking `version`.
pub fn to_wire_response(
    response: UniformCredentialResponse,
    version: OpenId4VciVersion,
) -> CredentialResponse {
    let format = if version.is_v11_or_higher() {
        response.format.as_str()
    } else {
        response.format.to_legacy()
    };
    CredentialResponse {
        format: format.to_owned(),
        credential: response.credential,
        acceptance_token: response.acceptance_token,
        c_nonce: response.c_nonce,
        c_nonce_expires_in: response.c_nonce_expires_in,
    }
}

impl CredentialResponse {
    /// Interpret the response, accepting legacy format identifiers.
    pub fn into_uniform(self) -> Result<UniformCredentialResponse, CredentialResponseError> {
        let format = match CredentialFormat::from_legacy(&self.format) {
            // `ldp_vc` is both a legacy alias and a current identifier; the
            // credential encoding disambiguates.
            Some(legacy) if !matches!(self.credential, Some(IssuedCredential::LinkedData(_))) => {
                legacy
            }
            _ => self.format.parse()?,
        };

        if let Some(credential) = &self.credential {
            if !credential.matches(format) {
                return Err(CredentialResponseError::EncodingMismatch(format));
            }
        }

        Ok(UniformCredentialResponse {
            format,
            credential: self.credential,
            acceptance_token: self.acceptance_token,
            c_nonce: self.c_nonce,
            c_nonce_expires_in: self.c_nonce_expires_in,
        })
    }
}
