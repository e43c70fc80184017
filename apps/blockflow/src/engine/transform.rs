//! # Transform Service Client
//!
//! HTTP client for the two external Transform Services: text and image.
//! Both accept `{data, instructions, qualityEnabled}`; the text service
//! answers with a JSON string, the image service with a binary payload.
//!
//! No retries and no cancellation of in-flight requests; a failure is
//! reported to the scheduler, which marks the block errored.

use crate::config::ServiceConfig;

// =============================================================================
// ERROR TYPE
// =============================================================================

/// Errors from the transform client layer.
#[derive(Debug)]
pub enum TransformError {
    /// Cannot reach the transform service.
    ConnectionFailed(String),
    /// Service returned a non-success status.
    ServiceError(u16, String),
    /// Failed to parse the response body.
    ParseError(String),
}

impl std::fmt::Display for TransformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionFailed(url) => write!(f, "Cannot connect to transform service at {url}"),
            Self::ServiceError(status, msg) => write!(f, "Transform service error ({status}): {msg}"),
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
        }
    }
}

impl std::error::Error for TransformError {}

// =============================================================================
// CLIENT
// =============================================================================

/// HTTP client that wraps calls to the Transform Services.
#[derive(Debug, Clone)]
pub struct TransformClient {
    http: reqwest::Client,
    text_url: String,
    image_url: String,
    quality_enabled: bool,
}

impl TransformClient {
    /// Create a new client from the service configuration.
    #[must_use]
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            text_url: config.text_url.clone(),
            image_url: config.image_url.clone(),
            quality_enabled: config.quality_enabled,
        }
    }

    /// Build the request body shared by both services.
    fn body(&self, data: &str, instructions: &str) -> serde_json::Value {
        serde_json::json!({
            "data": data,
            "instructions": instructions,
            "qualityEnabled": self.quality_enabled,
        })
    }

    /// Send a POST and surface connection errors and non-success statuses.
    async fn send(
        &self,
        url: &str,
        data: &str,
        instructions: &str,
    ) -> Result<reqwest::Response, TransformError> {
        let resp = self
            .http
            .post(url)
            .json(&self.body(data, instructions))
            .send()
            .await
            .map_err(|e| TransformError::ConnectionFailed(format!("{url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransformError::ServiceError(status.as_u16(), body));
        }
        Ok(resp)
    }

    /// Transform text data, returning the service's transformed string.
    pub async fn transform_text(
        &self,
        data: &str,
        instructions: &str,
    ) -> Result<String, TransformError> {
        let resp = self.send(&self.text_url, data, instructions).await?;
        resp.json::<String>()
            .await
            .map_err(|e| TransformError::ParseError(e.to_string()))
    }

    /// Transform image data, returning the binary image payload.
    pub async fn transform_image(
        &self,
        data: &str,
        instructions: &str,
    ) -> Result<Vec<u8>, TransformError> {
        let resp = self.send(&self.image_url, data, instructions).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| TransformError::ParseError(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
