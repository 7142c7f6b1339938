#![allow(dead_code)]

use std::sync::Arc;

use oid4vci::{
    config::{IssuerConfig, TokenEndpointOpts},
    core::{jwt::P256Signer, offer::CredentialOfferPayload},
    issuer::{
        state::{CNonceState, CredentialOfferSession, MemoryStates},
        VcIssuer,
    },
};
use p256::ecdsa::SigningKey;
use serde_json::json;

pub const CREDENTIAL_ISSUER: &str = "https://credential-issuer";
pub const ACCESS_TOKEN_ISSUER: &str = "https://www.example.com";

pub fn signer() -> Arc<P256Signer> {
    Arc::new(P256Signer::new(SigningKey::random(&mut rand::thread_rng())).unwrap())
}

pub fn config() -> IssuerConfig {
    IssuerConfig {
        credential_issuer: CREDENTIAL_ISSUER.into(),
        c_nonce_expires_in: 300,
        token: TokenEndpointOpts {
            access_token_issuer: ACCESS_TOKEN_ISSUER.into(),
            token_expires_in: 300_000,
            pre_authorized_code_expiration_duration: 2,
            interval: None,
        },
        ..IssuerConfig::default()
    }
}

/// A pre-authorized code offer for a university degree.
pub fn offer(code: &str, user_pin_required: bool) -> CredentialOfferPayload {
    serde_json::from_value(json!({
        "credential_issuer": CREDENTIAL_ISSUER,
        "credentials": [
            {
                "format": "jwt_vc_json",
                "types": ["VerifiableCredential", "UniversityDegreeCredential"]
            }
        ],
        "grants": {
            "urn:ietf:params:oauth:grant-type:pre-authorized_code": {
                "pre-authorized_code": code,
                "user_pin_required": user_pin_required
            }
        }
    }))
    .unwrap()
}

pub struct Issuer {
    pub issuer: VcIssuer,
    pub signer: Arc<P256Signer>,
    pub sessions: Arc<MemoryStates<CredentialOfferSession>>,
    pub c_nonces: Arc<MemoryStates<CNonceState>>,
}

pub fn issuer() -> Issuer {
    let signer = signer();
    let sessions = Arc::new(MemoryStates::<CredentialOfferSession>::new());
    let c_nonces = Arc::new(MemoryStates::<CNonceState>::new());
    let issuer = VcIssuer::builder()
        .with_config(config())
        .with_access_token_signer(signer.clone())
        .with_session_store(sessions.clone())
        .with_c_nonce_store(c_nonces.clone())
        .build()
        .unwrap();
    Issuer {
        issuer,
        signer,
        sessions,
        c_nonces,
    }
}
