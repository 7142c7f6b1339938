//! Token endpoint for the pre-authorized code flow.
//!
//! A request passes through a fixed sequence of checks, the first failure ends it:
//!
//! 1. `pre-authorized_code` present
//! 2. `grant_type` is the pre-authorized code grant
//! 3. a pre-authorized offer exists for the code
//! 4. a `user_pin` is supplied exactly when the offer requires one
//! 5. the PIN is 1 to 8 digits
//! 6. the PIN matches the session
//! 7. the code has not expired
//!
//! Only then is an access token signed and a `c_nonce` stored. The session is read
//! but never written here, so an abandoned request leaves no trace.

use chrono::{TimeDelta, Utc};
use tracing::{debug, warn};

use crate::{
    config::MAX_USER_PIN_LENGTH,
    core::{
        jwt::{Jwt, JwtHeader, JwtPayload},
        token::{
            AccessTokenResponse, GrantType, TokenEndpointResponse, TokenError, TokenRequest,
            TokenType,
        },
    },
    utils::gen_nonce,
};

use super::{
    state::{CNonceState, CredentialOfferSession, StateEntry},
    VcIssuer,
};

impl VcIssuer {
    /// Handle a form encoded Token Request body.
    ///
    /// Never fails: every rejection is carried in the returned value, see
    /// [TokenEndpointResponse::into_http_response].
    pub async fn token(&self, body: &str) -> TokenEndpointResponse {
        let result = match TokenRequest::from_form(body) {
            Ok(request) => self.access_token(&request).await,
            Err(e) => Err(e),
        };
        match &result {
            Err(e @ TokenError::Internal(_)) => warn!("token request failed: {e}"),
            Err(e) => debug!(error = %e.code(), "token request rejected"),
            Ok(_) => {}
        }
        result.into()
    }

    /// Validate a Token Request and, if it passes, issue an access token and a `c_nonce`.
    pub async fn access_token(
        &self,
        request: &TokenRequest,
    ) -> Result<AccessTokenResponse, TokenError> {
        let code = check_grant(request)?;

        let session = self
            .sessions
            .get(code)
            .await
            .map_err(|e| TokenError::Internal(e.into()))?
            .filter(|session| redeemable_with(session, code))
            .ok_or_else(|| TokenError::StateMissing(code.to_owned()))?;

        check_pin(&session, request.user_pin.as_deref())?;

        if session.is_expired(
            self.config.token.pre_authorized_code_max_age(),
            Utc::now(),
        ) {
            return Err(TokenError::Expired);
        }

        self.issue_access_token(code, &session).await
    }

    async fn issue_access_token(
        &self,
        code: &str,
        session: &CredentialOfferSession,
    ) -> Result<AccessTokenResponse, TokenError> {
        let opts = &self.config.token;
        let now = Utc::now();
        let expires_in = opts.token_expires_in;
        let exp = i64::try_from(expires_in)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .map(|exp| exp.timestamp());

        let jwt = Jwt {
            header: JwtHeader {
                typ: Some("JWT".to_owned()),
                ..JwtHeader::default()
            },
            payload: JwtPayload {
                iss: Some(opts.access_token_issuer.clone()),
                sub: Some(code.to_owned()),
                iat: Some(now.timestamp()),
                exp,
                ..JwtPayload::default()
            },
        };

        debug!("signing access token");
        let access_token = self
            .access_token_signer
            .sign(&jwt, None)
            .await
            .map_err(TokenError::Internal)?;

        let c_nonce = gen_nonce();
        self.c_nonces
            .set(
                &c_nonce,
                CNonceState {
                    c_nonce: c_nonce.clone(),
                    created_at: now,
                    pre_authorized_code: session.pre_authorized_code.clone(),
                    issuer_state: session.issuer_state.clone(),
                },
            )
            .await
            .map_err(|e| TokenError::Internal(e.into()))?;

        Ok(AccessTokenResponse {
            access_token,
            token_type: TokenType::Bearer,
            expires_in,
            c_nonce,
            c_nonce_expires_in: self.config.c_nonce_expires_in,
            authorization_pending: false,
            interval: opts.interval(),
        })
    }
}

/// Checks 1 and 2. Returns the pre-authorized code.
fn check_grant(request: &TokenRequest) -> Result<&str, TokenError> {
    let code = request
        .pre_authorized_code
        .as_deref()
        .ok_or(TokenError::MissingPreAuthorizedCode)?;

    match request.grant_type() {
        Some(GrantType::PreAuthorizedCode) => Ok(code),
        _ => Err(TokenError::UnsupportedGrantType),
    }
}

/// The session store is shared with authorization code offers, keyed by their
/// `issuer_state`. Only a pre-authorized offer for this very code may be redeemed.
fn redeemable_with(session: &CredentialOfferSession, code: &str) -> bool {
    session.pre_authorized_code.as_deref() == Some(code)
        && session.credential_offer.pre_authorized_grant().is_some()
}

/// Checks 4 to 6.
fn check_pin(session: &CredentialOfferSession, pin: Option<&str>) -> Result<(), TokenError> {
    let required = session.credential_offer.user_pin_required();
    let pin = match (required, pin) {
        (true, None) => return Err(TokenError::UserPinRequired),
        (false, Some(_)) => return Err(TokenError::UserPinNotRequired),
        (false, None) => return Ok(()),
        (true, Some(pin)) => pin,
    };

    if !is_valid_pin(pin) {
        return Err(TokenError::InvalidPinFormat);
    }

    if session.user_pin.as_deref() != Some(pin) {
        return Err(TokenError::InvalidPin);
    }

    Ok(())
}

fn is_valid_pin(pin: &str) -> bool {
    (1..=MAX_USER_PIN_LENGTH).contains(&pin.len()) && pin.bytes().all(|b| b.is_ascii_digit())
}
