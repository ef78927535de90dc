use std::fmt;

use chrono::{DateTime, Utc};
use genmedia_client::{AspectRatio, InlineImage, VIDEO_MODEL_FAST, VIDEO_MODEL_QUALITY};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::upload::data_uri_payload;

/// Video models offered to the user, with display labels. The first is the default.
pub const VIDEO_MODELS: [(&str, &str); 2] = [
    (VIDEO_MODEL_FAST, "Veo 3.1 Fast"),
    (VIDEO_MODEL_QUALITY, "Veo 3.1"),
];

pub const DEFAULT_SCENE_COUNT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// --- Scenes ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneStatus {
    Idle,
    Generating,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneItem {
    pub id: ItemId,
    pub description: String,
    pub image_prompt: String,
    pub aspect_ratio: Option<AspectRatio>,
    /// `data:` URI of the rendered image.
    pub image_uri: Option<String>,
    pub status: SceneStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SceneItem {
    pub fn generating(
        description: String,
        image_prompt: String,
        aspect_ratio: AspectRatio,
    ) -> Self {
        Self {
            id: ItemId::new(),
            description,
            image_prompt,
            aspect_ratio: Some(aspect_ratio),
            image_uri: None,
            status: SceneStatus::Generating,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneRequest {
    pub script: String,
    pub scene_count: u32,
    pub aspect_ratio: AspectRatio,
}

impl SceneRequest {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            scene_count: DEFAULT_SCENE_COUNT,
            aspect_ratio: AspectRatio::Square,
        }
    }

    /// At least one scene is always requested.
    pub fn with_scene_count(mut self, scene_count: u32) -> Self {
        self.scene_count = scene_count.max(1);
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SceneRunSummary {
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneOutcome {
    /// Another submission was in flight; nothing changed.
    AlreadyRunning,
    Finished(SceneRunSummary),
}

/// User-supplied image steering the character design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceImage {
    pub data_uri: String,
    pub mime_type: String,
}

impl ReferenceImage {
    pub fn new(data_uri: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data_uri: data_uri.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Payload after the data-URI comma, passed on untouched.
    pub fn inline(&self) -> InlineImage {
        InlineImage::new(&self.mime_type, data_uri_payload(&self.data_uri))
    }
}

// --- Videos ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    Waiting,
    Generating,
    Polling,
    Completed,
    Error,
}

impl VideoStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, VideoStatus::Completed | VideoStatus::Error)
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VideoStatus::Waiting => "waiting",
            VideoStatus::Generating => "generating",
            VideoStatus::Polling => "polling",
            VideoStatus::Completed => "completed",
            VideoStatus::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoItem {
    pub id: ItemId,
    /// Source frame as a `data:` URI.
    pub image_data: String,
    pub mime_type: String,
    pub dialogue: String,
    pub status: VideoStatus,
    /// Coarse: 0, 20 or 100.
    pub progress: u8,
    pub video_uri: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl VideoItem {
    pub fn waiting(image_data: String, mime_type: String) -> Self {
        Self {
            id: ItemId::new(),
            image_data,
            mime_type,
            dialogue: String::new(),
            status: VideoStatus::Waiting,
            progress: 0,
            video_uri: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSettings {
    pub model_id: String,
    pub aspect_ratio: AspectRatio,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            model_id: VIDEO_MODELS[0].0.to_string(),
            aspect_ratio: AspectRatio::Landscape,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
    /// Completed earlier, or removed before the loop reached them.
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    AlreadyRunning,
    EmptyQueue,
    Finished(RunSummary),
}
