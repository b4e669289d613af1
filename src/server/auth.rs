use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;

use crate::{Config, Error, Result};

/// Yields a single authorization verdict for an admin request.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate_request(&self, headers: &HeaderMap) -> Result<bool>;
}

/// Permissive default: every request is authorized.
#[derive(Debug, Default)]
pub struct AllowAll;

#[async_trait]
impl Authenticator for AllowAll {
    async fn authenticate_request(&self, _headers: &HeaderMap) -> Result<bool> {
        Ok(true)
    }
}

/// Returns a fixed verdict. Intended for tests.
#[derive(Debug)]
pub struct StaticAuth(pub bool);

#[async_trait]
impl Authenticator for StaticAuth {
    async fn authenticate_request(&self, _headers: &HeaderMap) -> Result<bool> {
        Ok(self.0)
    }
}

/// Forwards a named request header to a configured endpoint and compares the
/// response status against the expected status code.
///
/// A request without the forwarded header is an unauthorized verdict, not an
/// error.
#[derive(Debug)]
pub struct ForwardAuth {
    client: reqwest::Client,
    url: String,
    method: reqwest::Method,
    header: String,
    success_status: String,
}

impl ForwardAuth {
    const ALLOWED_METHODS: [&'static str; 4] = ["GET", "HEAD", "POST", "PUT"];

    pub fn new(url: &str, method: &str, header: &str, success_status: &str) -> Result<ForwardAuth> {
        let method = method.to_ascii_uppercase();
        if !Self::ALLOWED_METHODS.contains(&method.as_str()) {
            return Err(Error::Config(format!("invalid auth request method {method:?}")));
        }
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|err| Error::Config(format!("invalid auth request method: {err}")))?;

        Ok(ForwardAuth {
            client: reqwest::Client::new(),
            url: url.to_owned(),
            method,
            header: header.to_owned(),
            success_status: success_status.to_owned(),
        })
    }
}

#[async_trait]
impl Authenticator for ForwardAuth {
    async fn authenticate_request(&self, headers: &HeaderMap) -> Result<bool> {
        let Some(value) = headers.get(self.header.as_str()).and_then(|v| v.to_str().ok()) else {
            return Ok(false);
        };

        let response = self
            .client
            .request(self.method.clone(), &self.url)
            .header(self.header.as_str(), value)
            .send()
            .await
            .map_err(|err| Error::Auth(err.to_string()))?;

        Ok(response.status().as_u16().to_string() == self.success_status)
    }
}

/// Build the authenticator an environment's config asks for: the permissive
/// default when no auth forwarding is configured.
pub fn from_config(config: &Config) -> Result<Arc<dyn Authenticator>> {
    if config.auth_url.is_empty()
        && config.auth_method.is_empty()
        && config.auth_header.is_empty()
        && config.auth_success_status.is_empty()
    {
        return Ok(Arc::new(AllowAll));
    }

    Ok(Arc::new(ForwardAuth::new(
        &config.auth_url,
        &config.auth_method,
        &config.auth_header,
        &config.auth_success_status,
    )?))
}

#[cfg(test)]
mod tests {
    use super::ForwardAuth;

    #[test]
    fn test_known_methods_are_accepted() {
        for method in ["GET", "head", "Post", "PUT"] {
            assert!(ForwardAuth::new("http://auth.internal", method, "X-Session", "200").is_ok());
        }
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        assert!(ForwardAuth::new("http://auth.internal", "DELETE", "X-Session", "200").is_err());
    }

    #[tokio::test]
    async fn test_allow_all_authorizes() {
        use super::{AllowAll, Authenticator};

        let verdict = AllowAll
            .authenticate_request(&axum::http::HeaderMap::new())
            .await
            .unwrap();
        assert!(verdict);
    }

    #[tokio::test]
    async fn test_forward_auth_without_header_is_unauthorized() {
        use super::Authenticator;

        let auth = ForwardAuth::new("http://auth.internal", "GET", "X-Session", "200").unwrap();
        let verdict = auth
            .authenticate_request(&axum::http::HeaderMap::new())
            .await
            .unwrap();
        assert!(!verdict);
    }
}
