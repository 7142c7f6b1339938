//! This library provides a Rust implementation of the issuer core of [OID4VCI]
//! (drafts v1.0.08 to v1.0.11), together with the wallet-side request client.
//!
//! [OID4VCI]: <https://openid.net/specs/openid-4-verifiable-credential-issuance-1_0.html>
//!
//! # Issuer Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use oid4vci::config::IssuerConfig;
//! use oid4vci::issuer::VcIssuer;
//! use oid4vci::issuer::offer::{CredentialOfferOpts, OfferGrant};
//!
//! let issuer = VcIssuer::builder()
//!     .with_config(config)
//!     .with_access_token_signer(signer)
//!     .with_session_store(sessions)
//!     .with_c_nonce_store(c_nonces)
//!     .build()?;
//!
//! // Mint an offer and show the user its PIN out of band.
//! let offer = issuer
//!     .create_credential_offer_uri(CredentialOfferOpts {
//!         credentials,
//!         grant: OfferGrant::PreAuthorizedCode { code: None, user_pin_required: true },
//!     })
//!     .await?;
//!
//! // Token endpoint: form body in, JSON out.
//! let response = issuer.token(&form_body).await.into_http_response()?;
//!
//! // Credential endpoint.
//! let response = issuer.credential(json_body, version, &supplier).await;
//! ```
//!
//! The stores are swappable through the [`StateStore`] trait; [`MemoryStates`] is an
//! in-memory implementation for tests.
//!
//! [`StateStore`]: crate::issuer::state::StateStore
//! [`MemoryStates`]: crate::issuer::state::MemoryStates
//!
//! # Wallet Usage
//!
//! ```ignore
//! use oid4vci::client::{request_access_token, CredentialRequestClient, CredentialRequestInput};
//! use oid4vci::core::proof::ProofOfPossessionBuilder;
//! use oid4vci::core::token::TokenRequest;
//!
//! let token = request_access_token(&http, token_endpoint, &TokenRequest::pre_authorized(code, pin)).await?;
//!
//! let client = CredentialRequestClient::builder()
//!     .with_credential_endpoint(credential_endpoint)
//!     .with_token_response(&token)
//!     .with_format("jwt_vc_json")
//!     .with_version(version)
//!     .with_http_client(http)
//!     .build()?;
//!
//! let proof = ProofOfPossessionBuilder::new()
//!     .with_signer(signer)
//!     .with_kid(kid)
//!     .with_issuer(credential_issuer)
//!     .with_access_token_response(&token);
//!
//! let response = client
//!     .acquire_credentials_using_proof(
//!         CredentialRequestInput::new(proof).with_credential_types("UniversityDegreeCredential"),
//!     )
//!     .await?;
//! ```
//!
//! # Versions
//!
//! Internally every Credential Request has the v1.0.11 shape
//! ([`UniformCredentialRequest`]). Wallets and issuers on older drafts are served by
//! converting at the edge, see [`core::credential`].
//!
//! [`UniformCredentialRequest`]: crate::core::credential::UniformCredentialRequest
//! [`core::credential`]: crate::core::credential

pub mod client;
pub mod config;
pub mod core;
pub mod issuer;
pub mod utils;
