use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
use http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Method, Request, Response,
};
use serde::Serialize;
use tracing::debug;

/// Generic HTTP client.
///
/// A trait is used here so to facilitate native HTTP/TLS when compiled for mobile applications.
#[async_trait]
pub trait AsyncHttpClient {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>>;
}

impl std::fmt::Debug for dyn AsyncHttpClient + Send + Sync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AsyncHttpClient")
    }
}

/// A JSON `POST` carrying a bearer access token.
pub(crate) fn bearer_json_request<T: Serialize>(
    url: &str,
    access_token: &str,
    body: &T,
) -> Result<Request<Vec<u8>>> {
    let body = serde_json::to_vec(body).context("unable to serialize request body")?;
    Request::builder()
        .method(Method::POST)
        .uri(url)
        .header(AUTHORIZATION, format!("Bearer {access_token}"))
        .header(CONTENT_TYPE, "application/json")
        .header(ACCEPT, "application/json")
        .body(body)
        .context("unable to construct request")
}

const USER_AGENT: &str = concat!("oid4vci/", env!("CARGO_PKG_VERSION"));

/// [AsyncHttpClient] over `reqwest` with rustls.
///
/// Redirects are returned to the caller rather than followed, so a bearer token is
/// never replayed to a host the wallet did not choose.
#[derive(Debug, Clone)]
pub struct ReqwestClient(reqwest::Client);

impl AsRef<reqwest::Client> for ReqwestClient {
    fn as_ref(&self) -> &reqwest::Client {
        &self.0
    }
}

impl ReqwestClient {
    pub fn new() -> Result<Self> {
        reqwest::Client::builder()
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(USER_AGENT)
            .build()
            .context("unable to build http client")
            .map(Self)
    }
}

#[async_trait]
impl AsyncHttpClient for ReqwestClient {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let request = reqwest::Request::try_from(request).context("unable to convert request")?;
        debug!("{} {}", request.method(), request.url());

        let response = self
            .0
            .execute(request)
            .await
            .context("http request failed")?;

        let mut builder = Response::builder()
            .status(response.status())
            .version(response.version());
        builder
            .headers_mut()
            .context("unable to set headers")?
            .extend(response.headers().clone());

        let body = response
            .bytes()
            .await
            .context("failed to read response body")?;
        builder
            .body(body.to_vec())
            .context("unable to construct response")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn bearer_request() {
        let request = bearer_json_request(
            "https://issuer.example.com/credentials",
            "ey.access.token",
            &json!({ "format": "jwt_vc_json" }),
        )
        .unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer ey.access.token");
        assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(request.body(), br#"{"format":"jwt_vc_json"}"#);
    }
}
