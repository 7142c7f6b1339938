use http::StatusCode;
use oid4vci::{
    client::{request_access_token, ClientError},
    core::{token::TokenRequest, util::ReqwestClient},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

const CODE: &str = "SplxlOBeZQQYbYS6WxSbIA1";

/// Answers a single HTTP/1.1 request with `status` (plus any extra header lines) and
/// `body`. The task yields the raw request it received.
async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let task = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        request
    });
    (base, task)
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf).into_owned();
        if n == 0 {
            return text;
        }
        let Some(end) = text.find("\r\n\r\n") else {
            continue;
        };
        let length = text[..end]
            .lines()
            .find_map(|line| {
                line.to_ascii_lowercase()
                    .strip_prefix("content-length:")
                    .map(|v| v.trim().parse::<usize>().unwrap())
            })
            .unwrap_or(0);
        if buf.len() >= end + 4 + length {
            return text;
        }
    }
}

#[tokio::test]
async fn redeems_code_over_http() {
    let (base, server) = serve_once(
        "200 OK",
        r#"{"access_token":"eyJ0eXAiOiJKV1QifQ.e30.c2ln","token_type":"bearer","expires_in":300,"c_nonce":"tZignsnFbp","c_nonce_expires_in":300,"authorization_pending":false,"interval":300}"#,
    )
    .await;

    let response = request_access_token(
        &ReqwestClient::new().unwrap(),
        &format!("{base}/token"),
        &TokenRequest::pre_authorized(CODE, Some("493536".into())),
    )
    .await
    .unwrap();
    assert_eq!(response.c_nonce, "tZignsnFbp");
    assert_eq!(response.expires_in, 300);

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /token HTTP/1.1"));
    assert!(request.contains("content-type: application/x-www-form-urlencoded"));
    assert!(request.contains("user-agent: oid4vci/"));
    assert!(request.contains(&format!("pre-authorized_code={CODE}")));
    assert!(request.contains("user_pin=493536"));
}

#[tokio::test]
async fn error_body_is_surfaced() {
    let (base, _server) = serve_once(
        "400 Bad Request",
        r#"{"error":"invalid_grant","error_message":"PIN is invalid"}"#,
    )
    .await;

    let err = request_access_token(
        &ReqwestClient::new().unwrap(),
        &format!("{base}/token"),
        &TokenRequest::pre_authorized(CODE, Some("493537".into())),
    )
    .await
    .unwrap_err();

    let ClientError::Rejected { status, error } = err else {
        panic!("expected the issuer's error body")
    };
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error.description(), Some("PIN is invalid"));
}

#[tokio::test]
async fn redirects_are_not_followed() {
    let (base, _server) = serve_once(
        "302 Found\r\nlocation: http://127.0.0.1:1/token",
        "",
    )
    .await;

    let err = request_access_token(
        &ReqwestClient::new().unwrap(),
        &format!("{base}/token"),
        &TokenRequest::pre_authorized(CODE, None),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        ClientError::UnexpectedResponse {
            status: StatusCode::FOUND,
            ..
        }
    ));
}
