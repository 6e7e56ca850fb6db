//! API source extractor

use crate::client::ApiClient;
use crate::config::{DatasetName, SourceConfig};
use crate::error::Result;
use crate::record::RawPayload;
use std::sync::Arc;

/// Extractor for JSON API datasets
///
/// Issues one GET to the endpoint configured for the dataset and returns
/// the parsed body.
pub struct ApiExtractor {
    config: Arc<SourceConfig>,
    client: ApiClient,
}

impl ApiExtractor {
    pub fn new(config: Arc<SourceConfig>, client: ApiClient) -> Self {
        Self { config, client }
    }

    /// Fetch the dataset's endpoint
    pub async fn fetch(&self, dataset: &DatasetName) -> Result<RawPayload> {
        let url = self.config.api_endpoint(dataset)?;
        log::info!("Fetching api dataset '{}' from {}", dataset, url);

        let body = self.client.get_json(url, dataset).await?;
        Ok(RawPayload::Json(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_fetch_returns_json_payload() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let body = r#"{"results": []}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });

        let config = SourceConfig::new()
            .with_api("pollution", &format!("http://{}/latest", addr))
            .unwrap();
        let extractor = ApiExtractor::new(Arc::new(config), ApiClient::try_new().unwrap());

        let payload = extractor.fetch(&"pollution".into()).await.unwrap();
        assert_eq!(payload, RawPayload::Json(serde_json::json!({"results": []})));
    }

    #[tokio::test]
    async fn test_unknown_dataset() {
        let extractor = ApiExtractor::new(
            Arc::new(SourceConfig::new()),
            ApiClient::try_new().unwrap(),
        );
        let err = extractor.fetch(&"pollution".into()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
