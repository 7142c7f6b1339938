use std::fmt::Debug;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::prelude::*;
use p256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// Unsigned JWT handed to a [JwtSigner].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Jwt {
    pub header: JwtHeader,
    pub payload: JwtPayload,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JwtHeader {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<Json>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JwtPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(flatten)]
    pub claims: Map<String, Json>,
}

impl Jwt {
    /// The base64url `header.payload` string a signature is computed over.
    pub fn signing_input(&self) -> Result<String> {
        let header = serde_json::to_vec(&self.header).context("unable to serialize jwt header")?;
        let payload =
            serde_json::to_vec(&self.payload).context("unable to serialize jwt payload")?;
        Ok(format!(
            "{}.{}",
            BASE64_URL_SAFE_NO_PAD.encode(header),
            BASE64_URL_SAFE_NO_PAD.encode(payload)
        ))
    }

    /// Decode a compact JWS without checking its signature.
    pub fn decode_unverified(compact: &str) -> Result<Self> {
        let (header_b64, payload_b64, _sig_b64) = split_jws(compact)?;
        decode_parts(header_b64, payload_b64)
    }
}

fn split_jws(compact: &str) -> Result<(&str, &str, &str)> {
    let mut parts = compact.split('.');
    let (Some(header), Some(payload), Some(sig), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        bail!("jwt must consist of three '.' separated parts")
    };
    Ok((header, payload, sig))
}

fn decode_parts(header_b64: &str, payload_b64: &str) -> Result<Jwt> {
    let header = BASE64_URL_SAFE_NO_PAD
        .decode(header_b64)
        .context("jwt headers were not valid base64url")?;
    let payload = BASE64_URL_SAFE_NO_PAD
        .decode(payload_b64)
        .context("jwt payload was not valid base64url")?;
    Ok(Jwt {
        header: serde_json::from_slice(&header).context("jwt headers were not valid json")?,
        payload: serde_json::from_slice(&payload).context("jwt payload was not valid json")?,
    })
}

/// Signing callback.
///
/// The issuer uses it to mint access tokens and the wallet to sign proofs of
/// possession. Implementations own the key material and may call out to a KMS.
#[async_trait]
pub trait JwtSigner: Debug + Send + Sync {
    /// The JWS algorithm that will be used to sign.
    fn alg(&self) -> &str;

    /// Sign `jwt`, returning its compact serialization.
    async fn sign(&self, jwt: &Jwt, kid: Option<&str>) -> Result<String>;
}

/// ES256 signer over a P-256 key.
#[derive(Debug)]
pub struct P256Signer {
    key: SigningKey,
    jwk: Json,
}

impl P256Signer {
    pub fn new(key: SigningKey) -> Result<Self> {
        let pk: p256::PublicKey = key.verifying_key().into();
        let jwk = serde_json::from_str(&pk.to_jwk_string())?;
        Ok(Self { key, jwk })
    }

    /// Public key as a JWK.
    pub fn jwk(&self) -> &Json {
        &self.jwk
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.key.verifying_key()
    }
}

#[async_trait]
impl JwtSigner for P256Signer {
    fn alg(&self) -> &str {
        "ES256"
    }

    async fn sign(&self, jwt: &Jwt, kid: Option<&str>) -> Result<String> {
        let mut jwt = jwt.clone();
        jwt.header.alg = Some(self.alg().to_owned());
        if let Some(kid) = kid {
            jwt.header.kid = Some(kid.to_owned());
        }

        let input = jwt.signing_input()?;
        let sig: Signature = self.key.sign(input.as_bytes());
        Ok(format!("{input}.{}", BASE64_URL_SAFE_NO_PAD.encode(sig.to_bytes())))
    }
}

/// Verify an ES256 compact JWS and return its decoded contents.
pub fn verify_es256(compact: &str, key: &VerifyingKey) -> Result<Jwt> {
    let (header_b64, payload_b64, sig_b64) = split_jws(compact)?;
    let jwt = decode_parts(header_b64, payload_b64)?;

    if jwt.header.alg.as_deref() != Some("ES256") {
        bail!("jwt was not signed with ES256")
    }

    let signature = BASE64_URL_SAFE_NO_PAD
        .decode(sig_b64)
        .context("could not decode base64url encoded jwt signature")?;
    let signature =
        Signature::from_slice(&signature).context("jwt signature was not a valid P-256 signature")?;

    let input = [header_b64.as_bytes(), b".", payload_b64.as_bytes()].concat();
    key.verify(&input, &signature)
        .context("jwt signature verification failed")?;

    Ok(jwt)
}
