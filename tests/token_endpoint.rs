use chrono::DateTime;
use http::StatusCode;
use oid4vci::{
    core::{
        jwt::verify_es256,
        token::{AccessTokenResponse, STATE_MISSING_ERROR},
    },
    issuer::state::{CredentialOfferSession, StateStore},
};
use serde_json::{json, Value as Json};

mod fixtures;

const CODE_1: &str = "SplxlOBeZQQYbYS6WxSbIA1";
const CODE_2: &str = "SplxlOBeZQQYbYS6WxSbIA2";
const CODE_3: &str = "SplxlOBeZQQYbYS6WxSbIA3";
const PIN: &str = "493536";
const GRANT: &str = "grant_type=urn:ietf:params:oauth:grant-type:pre-authorized_code";

async fn token_server() -> fixtures::Issuer {
    let issuer = fixtures::issuer();

    issuer
        .sessions
        .set(
            CODE_1,
            CredentialOfferSession::new(fixtures::offer(CODE_1, true), Some(PIN.into())),
        )
        .await
        .unwrap();
    issuer
        .sessions
        .set(
            CODE_2,
            CredentialOfferSession::new(fixtures::offer(CODE_2, false), None),
        )
        .await
        .unwrap();
    issuer
        .sessions
        .set(
            CODE_3,
            CredentialOfferSession::new(fixtures::offer(CODE_3, true), Some(PIN.into()))
                .with_created_at(DateTime::UNIX_EPOCH),
        )
        .await
        .unwrap();

    issuer
}

async fn post(issuer: &fixtures::Issuer, body: &str) -> (StatusCode, Json) {
    let response = issuer.issuer.token(body).await.into_http_response().unwrap();
    assert_eq!(response.headers()["cache-control"], "no-store");
    (
        response.status(),
        serde_json::from_slice(response.body()).unwrap(),
    )
}

#[tokio::test]
async fn returns_the_access_token() {
    let issuer = token_server().await;
    let (status, body) = post(
        &issuer,
        &format!("{GRANT}&pre-authorized_code={CODE_1}&user_pin={PIN}"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let response: AccessTokenResponse = serde_json::from_value(body.clone()).unwrap();
    assert_eq!(
        body,
        json!({
            "access_token": response.access_token,
            "token_type": "bearer",
            "expires_in": 300000,
            "c_nonce": response.c_nonce,
            "c_nonce_expires_in": 300,
            "authorization_pending": false,
            "interval": 300000
        })
    );

    let jwt = verify_es256(&response.access_token, issuer.signer.verifying_key()).unwrap();
    assert_eq!(jwt.header.typ.as_deref(), Some("JWT"));
    assert_eq!(jwt.payload.iss.as_deref(), Some(fixtures::ACCESS_TOKEN_ISSUER));

    let nonce = issuer.c_nonces.get_asserted(&response.c_nonce).await.unwrap();
    assert_eq!(nonce.pre_authorized_code.as_deref(), Some(CODE_1));
}

#[tokio::test]
async fn code_can_be_redeemed_again_within_its_window() {
    let issuer = token_server().await;
    let body = format!("{GRANT}&pre-authorized_code={CODE_1}&user_pin={PIN}");

    let (first, _) = post(&issuer, &body).await;
    let (second, _) = post(&issuer, &body).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(issuer.c_nonces.len().await, 2);
}

#[tokio::test]
async fn user_pin_is_required() {
    let issuer = token_server().await;
    let (status, body) = post(&issuer, &format!("{GRANT}&pre-authorized_code={CODE_1}")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "error": "invalid_request", "error_description": "User pin is required" })
    );
}

#[tokio::test]
async fn pre_authorized_code_is_required() {
    let issuer = token_server().await;
    let (status, body) = post(&issuer, &format!("{GRANT}&user_pin={PIN}")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "error": "invalid_request", "error_description": "pre-authorized_code is required" })
    );
}

#[tokio::test]
async fn unsupported_grant_type() {
    let issuer = token_server().await;
    let (status, body) = post(
        &issuer,
        &format!("grant_type=non-existent&pre-authorized_code={CODE_1}&user_pin={PIN}"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "error": "invalid_grant", "error_description": "unsupported grant_type" })
    );
}

#[tokio::test]
async fn pin_does_not_match() {
    let issuer = token_server().await;
    let (status, body) = post(
        &issuer,
        &format!("{GRANT}&pre-authorized_code={CODE_1}&user_pin=493537"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "error": "invalid_grant", "error_message": "PIN is invalid" })
    );
}

#[tokio::test]
async fn pin_must_be_numeric() {
    let issuer = token_server().await;
    for pin in ["invalid", "123456789"] {
        let (status, body) = post(
            &issuer,
            &format!("{GRANT}&pre-authorized_code={CODE_1}&user_pin={pin}"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({
                "error": "invalid_grant",
                "error_message": "PIN must consist of maximum 8 numeric characters"
            })
        );
    }
}

#[tokio::test]
async fn unknown_pre_authorized_code() {
    let issuer = token_server().await;
    let (status, body) = post(
        &issuer,
        &format!("{GRANT}&pre-authorized_code=test&user_pin={PIN}"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "error": "invalid_request", "error_message": format!("{STATE_MISSING_ERROR} (test)") })
    );
}

#[tokio::test]
async fn user_pin_is_not_required() {
    let issuer = token_server().await;
    let (status, body) = post(
        &issuer,
        &format!("{GRANT}&pre-authorized_code={CODE_2}&user_pin={PIN}"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "error": "invalid_request", "error_description": "User pin is not required" })
    );
}

#[tokio::test]
async fn pre_authorized_code_expired() {
    let issuer = token_server().await;
    let (status, body) = post(
        &issuer,
        &format!("{GRANT}&pre-authorized_code={CODE_3}&user_pin={PIN}"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "error": "invalid_grant", "error_message": "pre-authorized_code is expired" })
    );
    assert!(issuer.c_nonces.is_empty().await);
}

#[tokio::test]
async fn expired_sessions_are_purged_on_request() {
    let issuer = token_server().await;
    let removed = issuer.issuer.clear_expired().await.unwrap();

    assert_eq!(removed, 1);
    assert!(!issuer.sessions.has(CODE_3).await.unwrap());
    assert!(issuer.sessions.has(CODE_1).await.unwrap());
}

#[tokio::test]
async fn grant_type_is_checked_before_session_lookup() {
    let issuer = token_server().await;
    let (status, body) = post(
        &issuer,
        "grant_type=authorization_code&pre-authorized_code=test&user_pin=493536",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "error": "invalid_grant", "error_description": "unsupported grant_type" })
    );
}

#[tokio::test]
async fn pin_is_checked_before_expiry() {
    let issuer = token_server().await;

    let (status, body) = post(
        &issuer,
        &format!("{GRANT}&pre-authorized_code={CODE_3}&user_pin=invalid"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({
            "error": "invalid_grant",
            "error_message": "PIN must consist of maximum 8 numeric characters"
        })
    );

    let (status, body) = post(
        &issuer,
        &format!("{GRANT}&pre-authorized_code={CODE_3}&user_pin=493537"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "error": "invalid_grant", "error_message": "PIN is invalid" })
    );
}

#[tokio::test]
async fn pin_policy_is_checked_before_expiry() {
    let issuer = token_server().await;
    let (status, body) = post(&issuer, &format!("{GRANT}&pre-authorized_code={CODE_3}")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "error": "invalid_request", "error_description": "User pin is required" })
    );
}
