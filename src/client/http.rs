//! API client module
//!
//! Provides `ApiClient` for fetching JSON documents from dataset endpoints.
//! Each fetch is a single GET: no retries, no caching, and no timeout
//! beyond what the operating system applies to the socket.

use crate::config::DatasetName;
use crate::error::{EtlError, Result};
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use url::Url;

/// HTTP client for JSON API sources.
///
/// # Example
/// ```no_run
/// use etl_pipeline::client::ApiClient;
/// use etl_pipeline::config::DatasetName;
/// use url::Url;
///
/// # async fn example() -> etl_pipeline::error::Result<()> {
/// let client = ApiClient::try_new()?;
/// let url = Url::parse("https://api.example.org/resource/gdp?format=json").unwrap();
/// let body = client.get_json(&url, &DatasetName::new("economy")).await?;
/// println!("{}", body["records"]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
}

impl ApiClient {
    /// Create a new client that asks for JSON responses.
    ///
    /// # Errors
    /// Returns a `Config` error if the HTTP client cannot be built
    pub fn try_new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("etlp/", env!("CARGO_PKG_VERSION"))),
        );
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| EtlError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Fetch `url` and parse the body as JSON.
    ///
    /// # Errors
    /// Returns an `Extraction` error tagged with `dataset` when the request
    /// cannot be sent, the status is not 2xx, or the body is not valid JSON
    pub async fn get_json(&self, url: &Url, dataset: &DatasetName) -> Result<Value> {
        log::debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| {
                EtlError::extraction_caused(dataset.as_str(), format!("request to {} failed", url), e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EtlError::extraction(
                dataset.as_str(),
                format!("{} returned {}: {}", url, status, body.trim()),
            ));
        }

        let body = response.text().await.map_err(|e| {
            EtlError::extraction_caused(dataset.as_str(), "failed to read response body", e)
        })?;

        serde_json::from_str(&body).map_err(|e| {
            EtlError::extraction_caused(dataset.as_str(), "response body is not valid JSON", e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single canned HTTP response on a random local port
    async fn serve_once(status: &'static str, body: &'static str) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        Url::parse(&format!("http://{}/data", addr)).unwrap()
    }

    #[tokio::test]
    async fn test_get_json() {
        let url = serve_once("200 OK", r#"{"records": [1, 2]}"#).await;
        let client = ApiClient::try_new().unwrap();

        let body = client.get_json(&url, &"economy".into()).await.unwrap();
        assert_eq!(body["records"][1], 2);
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let url = serve_once("503 Service Unavailable", r#"{"error": "down"}"#).await;
        let client = ApiClient::try_new().unwrap();

        let err = client.get_json(&url, &"economy".into()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Extraction);
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let url = serve_once("200 OK", "<html>not json</html>").await;
        let client = ApiClient::try_new().unwrap();

        let err = client.get_json(&url, &"economy".into()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Extraction);
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{}/data", addr)).unwrap();
        let client = ApiClient::try_new().unwrap();

        let err = client.get_json(&url, &"economy".into()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Extraction);
    }
}
