use anyhow::Context as AnyhowContext;
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, USER_AGENT},
    Client,
};
use serde::{Deserialize, Serialize};

use super::{GridReport, GridSource};
use crate::location::Location;

fn default_name() -> String {
    "grid-intensity-api".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceConfig {
    /// Label reported in the `gaw-data-source` diagnostics and logs
    #[serde(default = "default_name")]
    pub name: String,

    /// Classification endpoint, queried with `country` or `lat`/`lon`
    #[serde(default)]
    pub endpoint: String,

    /// Filled from the Worker secret, never from the config variable
    #[serde(skip)]
    pub api_key: String,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            endpoint: String::new(),
            api_key: String::new(),
        }
    }
}

/// Classification service reached over HTTP. One request per lookup, no
/// retries.
pub struct HttpGridSource {
    config: DataSourceConfig,
}

impl HttpGridSource {
    pub fn new(config: DataSourceConfig) -> Self {
        Self { config }
    }

    async fn request(&self, location: &Location) -> anyhow::Result<GridReport> {
        anyhow::ensure!(
            !self.config.endpoint.is_empty(),
            "no data source endpoint configured"
        );

        // Timeouts are not supported in WebAssembly; the host bounds the request
        let client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("GridAwareWorker/0.1"));
        if !self.config.api_key.is_empty() {
            let token = HeaderValue::from_str(&self.config.api_key)
                .context("API key is not a valid header value")?;
            headers.insert("auth-token", token);
        }

        let query: Vec<(&str, String)> = match location {
            Location::Country(code) => vec![("country", code.clone())],
            Location::LatLon { lat, lon } => vec![("lat", lat.to_string()), ("lon", lon.to_string())],
        };

        let response = client
            .get(&self.config.endpoint)
            .headers(headers)
            .query(&query)
            .send()
            .await
            .context("Failed to send classification request")?;

        let status = response.status();
        if !status.is_success() {
            return Ok(GridReport::error(format!(
                "{} responded {} ({})",
                self.config.name,
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status")
            )));
        }

        let text = response
            .text()
            .await
            .context("Failed to read classification body")?;
        serde_json::from_str::<GridReport>(&text)
            .with_context(|| format!("Unexpected classification body: {}", text))
    }
}

#[async_trait(?Send)]
impl GridSource for HttpGridSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn classify(&self, location: &Location) -> GridReport {
        match self.request(location).await {
            Ok(report) => report,
            Err(e) => GridReport::error(format!("{:#}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_endpoint_reports_error() {
        let source = HttpGridSource::new(DataSourceConfig::default());
        let report = source
            .classify(&Location::Country("DE".to_string()))
            .await;
        match report {
            GridReport::Error { message } => assert!(message.contains("no data source endpoint")),
            other => panic!("expected error report, got {:?}", other),
        }
    }

    #[test]
    fn test_api_key_is_not_deserialized() {
        let config: DataSourceConfig = serde_json::from_str(
            r#"{"endpoint":"https://grid.example/classify","api_key":"leaked"}"#,
        )
        .unwrap();
        assert_eq!(config.name, "grid-intensity-api");
        assert!(config.api_key.is_empty());
    }
}
