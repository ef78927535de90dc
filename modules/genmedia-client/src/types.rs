use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::GenMediaError;

// --- Public domain types ---

/// Output frame shapes accepted by both the image and video endpoints.
/// `1:1` is only honoured by image generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 3] = [
        AspectRatio::Landscape,
        AspectRatio::Square,
        AspectRatio::Portrait,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "9:16",
        }
    }

    pub fn supports_video(&self) -> bool {
        !matches!(self, AspectRatio::Square)
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = GenMediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == s.trim())
            .ok_or_else(|| GenMediaError::InvalidConfig(format!("unsupported aspect ratio: {s}")))
    }
}

/// Base64 image payload plus its media type, as sent in `inlineData` parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

/// One entry of the script breakdown returned by structured completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SceneDraft {
    pub description: String,
    pub image_prompt: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub(crate) struct SceneBreakdown {
    pub scenes: Vec<SceneDraft>,
}

// --- generateContent wire types ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// Text first, then each image in the order given.
    pub fn with_images(text: &str, images: &[InlineImage]) -> Self {
        let mut parts = Vec::with_capacity(images.len() + 1);
        parts.push(Part::text(text));
        parts.extend(images.iter().cloned().map(Part::inline));
        Self { parts }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineImage>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn inline(image: InlineImage) -> Self {
        Self {
            text: None,
            inline_data: Some(image),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_json_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ImageConfig {
    pub aspect_ratio: String,
    pub image_size: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    fn first_parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or_default()
    }

    /// Concatenated text parts of the first candidate.
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .first_parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }

    pub fn first_inline_image(&self) -> Option<&InlineImage> {
        self.first_parts().iter().find_map(|p| p.inline_data.as_ref())
    }
}

// --- predictLongRunning wire types ---

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PredictVideoRequest {
    pub instances: Vec<VideoInstance>,
    pub parameters: VideoParameters,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct VideoInstance {
    pub prompt: String,
    pub image: VideoImage,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VideoImage {
    pub bytes_base64_encoded: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VideoParameters {
    pub aspect_ratio: String,
    pub resolution: String,
    pub sample_count: u32,
}

/// Handle to a long-running video generation job.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VideoOperation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<OperationError>,
    #[serde(default)]
    pub response: Option<VideoOperationResponse>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoOperationResponse {
    #[serde(default)]
    pub generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoResponse {
    #[serde(default)]
    pub generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratedSample {
    #[serde(default)]
    pub video: Option<VideoRef>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VideoRef {
    #[serde(default)]
    pub uri: Option<String>,
}

impl VideoOperation {
    /// URI of the first generated video, if the job produced one.
    pub fn video_uri(&self) -> Option<&str> {
        self.response
            .as_ref()?
            .generate_video_response
            .as_ref()?
            .generated_samples
            .first()?
            .video
            .as_ref()?
            .uri
            .as_deref()
    }
}
