//! HTTP Packager Client - 调用外部电子书打包服务
//!
//! 外部 API:
//! POST {base_url}/api/package
//! Request: {"format": "epub", "manuscript": {...}}  (JSON)
//! Response: 打包后的文件二进制

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::application::ports::{ArtifactPackagerPort, Manuscript, PackagingError};
use crate::domain::book::PublishFormat;

#[derive(Serialize)]
struct PackageHttpRequest<'a> {
    format: &'static str,
    manuscript: &'a Manuscript,
}

/// HTTP 打包客户端配置
#[derive(Debug, Clone)]
pub struct HttpPackagerClientConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for HttpPackagerClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8300".to_string(),
            timeout_secs: 120,
        }
    }
}

/// HTTP 打包客户端
pub struct HttpPackagerClient {
    client: Client,
    config: HttpPackagerClientConfig,
}

impl HttpPackagerClient {
    pub fn new(config: HttpPackagerClientConfig) -> Result<Self, PackagingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PackagingError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn package_url(&self) -> String {
        format!("{}/api/package", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ArtifactPackagerPort for HttpPackagerClient {
    async fn package(&self, manuscript: &Manuscript, format: PublishFormat) -> Result<Vec<u8>, PackagingError> {
        tracing::debug!(
            url = %self.package_url(),
            format = format.as_str(),
            chapters = manuscript.chapters.len(),
            "Sending packaging request"
        );

        let response = self
            .client
            .post(self.package_url())
            .json(&PackageHttpRequest {
                format: format.as_str(),
                manuscript,
            })
            .send()
            .await
            .map_err(|e| PackagingError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PackagingError::ServiceError(format!("HTTP {}: {}", status, error_text)));
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| PackagingError::ServiceError(format!("Failed to read package: {}", e)))?
            .to_vec();

        tracing::info!(format = format.as_str(), size = data.len(), "Packaging completed");
        Ok(data)
    }
}
