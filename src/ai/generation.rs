//! Image generation client
//!
//! The generation model itself is an external collaborator. This module only
//! shapes the request and pulls the resulting image URL out of the reply.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::http_client::generation_client;
use super::vision::DecodedImage;
use crate::billing::Quality;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("image generation is not configured")]
    NotConfigured,
    #[error("generation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("generation API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("generation response contained no image")]
    EmptyOutput,
}

/// Everything the generation call needs for one staging request
pub struct GenerationRequest<'a> {
    pub prompt: &'a str,
    pub image: &'a DecodedImage,
    pub mask: Option<&'a DecodedImage>,
    pub quality: Quality,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub image_url: String,
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<GeneratedImage, GenerationError>;
}

#[derive(Debug, Clone)]
pub struct HttpGeneratorConfig {
    pub api_url: String,
    pub api_key: Option<String>,
}

/// Generator that posts JSON to a hosted image-edit endpoint
pub struct HttpImageGenerator {
    config: HttpGeneratorConfig,
}

impl HttpImageGenerator {
    pub fn new(config: HttpGeneratorConfig) -> Self {
        Self { config }
    }
}

#[derive(Serialize)]
struct EditRequest {
    prompt: String,
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mask: Option<String>,
    quality: Quality,
}

/// Providers disagree on the field name; accept the common shapes
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditResponse {
    image_url: Option<String>,
    output: Option<OutputField>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OutputField {
    Single(String),
    Many(Vec<String>),
}

impl EditResponse {
    fn into_url(self) -> Option<String> {
        let output = match self.output {
            Some(OutputField::Single(url)) => Some(url),
            Some(OutputField::Many(urls)) => urls.into_iter().find(|url| !url.is_empty()),
            None => None,
        };
        self.image_url
            .filter(|url| !url.is_empty())
            .or(output)
            .filter(|url| !url.is_empty())
    }
}

#[async_trait]
impl ImageGenerator for HttpImageGenerator {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<GeneratedImage, GenerationError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(GenerationError::NotConfigured)?;

        let body = EditRequest {
            prompt: request.prompt.to_string(),
            image: request.image.to_data_url(),
            mask: request.mask.map(DecodedImage::to_data_url),
            quality: request.quality,
        };

        let response = generation_client()
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EditResponse = response.json().await?;
        let image_url = parsed.into_url().ok_or(GenerationError::EmptyOutput)?;
        debug!(quality = ?request.quality, "Generation call succeeded");
        Ok(GeneratedImage { image_url })
    }
}
