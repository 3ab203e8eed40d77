//! Layout analysis via a vision model
//!
//! Sends the empty-room photo to a chat-completions style vision endpoint and
//! asks for zones to keep clear, preferred placements and free-text notes.
//! Failures never block staging: callers go through `analyze_with_fallback`,
//! which degrades to an empty constraint set.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::http_client::vision_client;
use super::vision::{prepare_image_for_analysis, DecodedImage};

/// Structured placement hints for one uploaded room
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConstraints {
    #[serde(default)]
    pub no_furniture_zones: Vec<String>,
    #[serde(default)]
    pub preferred_placements: Vec<String>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl LayoutConstraints {
    pub fn is_empty(&self) -> bool {
        self.no_furniture_zones.is_empty()
            && self.preferred_placements.is_empty()
            && self.notes.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("layout analyzer is not configured")]
    NotConfigured,
    #[error("layout analysis timed out after {0:?}")]
    Timeout(Duration),
    #[error("layout request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("layout API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("failed to parse layout response: {0}")]
    Parse(String),
    #[error("failed to prepare image: {0}")]
    Image(String),
}

/// Produces layout constraints for an uploaded room photo
#[async_trait]
pub trait LayoutAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        image: &DecodedImage,
        room_label: &str,
    ) -> Result<LayoutConstraints, AnalyzerError>;
}

/// Run the analyzer under a soft timeout; any failure yields empty constraints
pub async fn analyze_with_fallback(
    analyzer: &dyn LayoutAnalyzer,
    image: &DecodedImage,
    room_label: &str,
    timeout: Duration,
) -> LayoutConstraints {
    match tokio::time::timeout(timeout, analyzer.analyze(image, room_label)).await {
        Ok(Ok(constraints)) => {
            debug!(
                zones = constraints.no_furniture_zones.len(),
                placements = constraints.preferred_placements.len(),
                notes = constraints.notes.len(),
                "Layout analysis complete"
            );
            constraints
        }
        Ok(Err(AnalyzerError::NotConfigured)) => {
            debug!("Layout analyzer not configured, staging without constraints");
            LayoutConstraints::default()
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Layout analysis failed, staging without constraints");
            LayoutConstraints::default()
        }
        Err(_) => {
            warn!(error = %AnalyzerError::Timeout(timeout), "Layout analysis failed, staging without constraints");
            LayoutConstraints::default()
        }
    }
}

/// Analyzer configuration
#[derive(Debug, Clone)]
pub struct VisionAnalyzerConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

/// Vision-model analyzer over an OpenAI-compatible chat completions API
pub struct VisionLayoutAnalyzer {
    config: VisionAnalyzerConfig,
}

impl VisionLayoutAnalyzer {
    pub fn new(config: VisionAnalyzerConfig) -> Self {
        Self { config }
    }

    fn build_prompt(room_label: &str) -> String {
        format!(
            r#"You are analyzing a photo of an empty {room} for virtual staging.

Identify where furniture must NOT go and where it would naturally fit.

Respond with ONLY a JSON object:
{{
  "noFurnitureZones": ["areas that must stay clear, e.g. 'in front of the sliding door'"],
  "preferredPlacements": ["natural spots, e.g. 'sofa against the long left wall'"],
  "notes": ["overall size and shape observations, e.g. 'large open plan space', 'narrow galley layout'"]
}}

Keep each entry under 15 words. Describe only what is visible."#,
            room = room_label
        )
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl LayoutAnalyzer for VisionLayoutAnalyzer {
    async fn analyze(
        &self,
        image: &DecodedImage,
        room_label: &str,
    ) -> Result<LayoutConstraints, AnalyzerError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(AnalyzerError::NotConfigured)?;

        let prepared =
            prepare_image_for_analysis(image).map_err(|e| AnalyzerError::Image(e.to_string()))?;

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: Self::build_prompt(room_label),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: prepared.to_data_url(),
                            detail: "low",
                        },
                    },
                ],
            }],
            max_tokens: 400,
            temperature: 0.1,
        };

        let response = vision_client()
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let response: ChatResponse = response.json().await?;
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .ok_or_else(|| AnalyzerError::Parse("empty response".to_string()))?;

        parse_constraints(content)
    }
}

/// Parse the model's reply, tolerating markdown fences around the JSON
pub fn parse_constraints(content: &str) -> Result<LayoutConstraints, AnalyzerError> {
    let json = extract_json_object(content)
        .ok_or_else(|| AnalyzerError::Parse("no JSON object in response".to_string()))?;
    serde_json::from_str(json).map_err(|e| AnalyzerError::Parse(e.to_string()))
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}
