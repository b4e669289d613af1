use serde::Deserialize;

use crate::{Error, Feature, Result};

const LIVENESS_BANNER: &str = "flipadelphia flips your features";

/// Typed client for one flipadelphia server, used by the `flippy` binary.
#[derive(Debug, Clone)]
pub struct FlippyClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct NamesEnvelope {
    data: Vec<String>,
}

#[derive(Deserialize)]
struct RecordEnvelope {
    data: Feature,
}

impl FlippyClient {
    /// Normalize the URL (scheme defaulted to http, trailing slashes
    /// stripped) and verify the liveness banner before handing the client
    /// out.
    pub async fn connect(url: &str) -> Result<FlippyClient> {
        let client = FlippyClient {
            base_url: normalize_url(url),
            http: reqwest::Client::new(),
        };
        if !client.is_flipadelphia_server().await {
            return Err(Error::Config(format!(
                "{} is not a flipadelphia server",
                client.base_url
            )));
        }
        Ok(client)
    }

    async fn is_flipadelphia_server(&self) -> bool {
        let Ok(response) = self.http.get(&self.base_url).send().await else {
            return false;
        };
        matches!(response.text().await.as_deref(), Ok(LIVENESS_BANNER))
    }

    async fn get_names(&self, path_and_query: &str) -> Result<Vec<String>> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path_and_query))
            .send()
            .await?
            .error_for_status()?;
        let envelope: NamesEnvelope = response.json().await?;
        Ok(envelope.data)
    }

    /// Fetch every scope known to the server.
    pub async fn scopes(&self) -> Result<Vec<String>> {
        self.get_names("/admin/scopes").await
    }

    /// Fetch every feature known to the server.
    pub async fn features(&self) -> Result<Vec<String>> {
        self.get_names("/admin/features").await
    }

    /// Fetch the feature names set on one scope.
    pub async fn scope_features(&self, scope: &str) -> Result<Vec<String>> {
        self.get_names(&format!("/features?scope={scope}")).await
    }

    /// Fetch one assignment record.
    pub async fn scope_feature(&self, scope: &str, feature: &str) -> Result<Feature> {
        let response = self
            .http
            .get(format!("{}/features/{feature}?scope={scope}", self.base_url))
            .send()
            .await?
            .error_for_status()?;
        let envelope: RecordEnvelope = response.json().await?;
        Ok(envelope.data)
    }

    /// Create or update one assignment and return the resulting record.
    pub async fn set_feature(&self, scope: &str, feature: &str, value: &str) -> Result<Feature> {
        let response = self
            .http
            .post(format!("{}/admin/features/{feature}", self.base_url))
            .json(&serde_json::json!({"scope": scope, "value": value}))
            .send()
            .await?
            .error_for_status()?;
        let envelope: RecordEnvelope = response.json().await?;
        Ok(envelope.data)
    }
}

fn normalize_url(url: &str) -> String {
    let url = if url.starts_with("http://") || url.starts_with("https://") {
        url.to_owned()
    } else {
        format!("http://{url}")
    };
    url.trim_end_matches('/').to_owned()
}

#[cfg(test)]
mod tests {
    use super::normalize_url;

    #[test]
    fn test_scheme_is_defaulted() {
        assert_eq!(normalize_url("localhost:3006"), "http://localhost:3006");
    }

    #[test]
    fn test_existing_scheme_is_kept() {
        assert_eq!(
            normalize_url("https://flags.internal"),
            "https://flags.internal"
        );
    }

    #[test]
    fn test_trailing_slashes_are_stripped() {
        assert_eq!(normalize_url("localhost:3006//"), "http://localhost:3006");
    }
}
