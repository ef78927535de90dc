// Test doubles for the studio pipelines.
//
// - MockGenerator (MediaGenerator): scripted replies, records every call
// - MockConnector (GeneratorConnector): hands out one shared MockGenerator
//
// Plus helpers for building scene drafts and data URIs.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use genmedia_client::{AspectRatio, GenMediaError, InlineImage, SceneDraft, VideoOperation};

use crate::error::Result;
use crate::traits::{GeneratorConnector, MediaGenerator};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn scene(description: &str, image_prompt: &str) -> SceneDraft {
    SceneDraft {
        description: description.to_string(),
        image_prompt: image_prompt.to_string(),
    }
}

pub fn png_data_uri(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

/// The image URI MockGenerator returns for a prompt.
pub fn rendered_uri(prompt: &str) -> String {
    png_data_uri(prompt.as_bytes())
}

/// The video URI MockGenerator returns for a source payload.
pub fn video_uri_for(image_data: &str) -> String {
    format!("https://videos.test/{image_data}.mp4")
}

// ---------------------------------------------------------------------------
// MockGenerator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Breakdown {
        script: String,
        references: Vec<InlineImage>,
        scene_count: u32,
    },
    Image {
        prompt: String,
        aspect_ratio: AspectRatio,
        references: Vec<InlineImage>,
    },
    SubmitVideo {
        image_data: String,
        mime_type: String,
        model_id: String,
        aspect_ratio: AspectRatio,
        dialogue: String,
    },
    WaitVideo {
        operation: String,
    },
}

/// Scripted generator. Images succeed unless their prompt was registered
/// with `.fail_image()`; videos succeed unless their source payload was
/// registered with `.fail_video()`. The breakdown fails until `.with_scenes()`.
/// Builder pattern: `.with_scenes()`, `.fail_breakdown()`, `.fail_image()`,
/// `.fail_video()`, `.with_delay()`.
#[derive(Default)]
pub struct MockGenerator {
    scenes: Option<Vec<SceneDraft>>,
    breakdown_status: Option<u16>,
    failing_prompts: HashSet<String>,
    failing_videos: HashMap<String, String>,
    delay: Option<Duration>,
    submitted: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<Call>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scenes(mut self, scenes: Vec<SceneDraft>) -> Self {
        self.scenes = Some(scenes);
        self
    }

    /// Breakdown answers with this HTTP status.
    pub fn fail_breakdown(mut self, status: u16) -> Self {
        self.breakdown_status = Some(status);
        self
    }

    pub fn fail_image(mut self, prompt: &str) -> Self {
        self.failing_prompts.insert(prompt.to_string());
        self
    }

    /// The operation for this source payload finishes with an error.
    pub fn fail_video(mut self, image_data: &str, message: &str) -> Self {
        self.failing_videos
            .insert(image_data.to_string(), message.to_string());
        self
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn image_prompts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Image { prompt, .. } => Some(prompt),
                _ => None,
            })
            .collect()
    }

    pub fn submitted_videos(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SubmitVideo {
                    image_data,
                    dialogue,
                    ..
                } => Some((image_data, dialogue)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl MediaGenerator for MockGenerator {
    async fn complete_structured(
        &self,
        script: &str,
        reference_images: &[InlineImage],
        scene_count: u32,
    ) -> genmedia_client::Result<Vec<SceneDraft>> {
        self.record(Call::Breakdown {
            script: script.to_string(),
            references: reference_images.to_vec(),
            scene_count,
        });
        self.pause().await;

        if let Some(status) = self.breakdown_status {
            return Err(GenMediaError::Api {
                status,
                message: "breakdown rejected".to_string(),
            });
        }
        self.scenes.clone().ok_or(GenMediaError::EmptyResponse)
    }

    async fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
        reference_images: &[InlineImage],
    ) -> genmedia_client::Result<String> {
        self.record(Call::Image {
            prompt: prompt.to_string(),
            aspect_ratio,
            references: reference_images.to_vec(),
        });
        self.pause().await;

        if self.failing_prompts.contains(prompt) {
            return Err(GenMediaError::NoImageData);
        }
        Ok(rendered_uri(prompt))
    }

    async fn submit_video(
        &self,
        image_data: &str,
        mime_type: &str,
        model_id: &str,
        aspect_ratio: AspectRatio,
        dialogue: &str,
    ) -> genmedia_client::Result<VideoOperation> {
        self.record(Call::SubmitVideo {
            image_data: image_data.to_string(),
            mime_type: mime_type.to_string(),
            model_id: model_id.to_string(),
            aspect_ratio,
            dialogue: dialogue.to_string(),
        });

        let name = {
            let mut submitted = self.submitted.lock().unwrap_or_else(PoisonError::into_inner);
            let name = format!("operations/{}", submitted.len() + 1);
            submitted.insert(name.clone(), image_data.to_string());
            name
        };
        Ok(VideoOperation {
            name,
            done: false,
            error: None,
            response: None,
        })
    }

    async fn wait_for_video(&self, operation: VideoOperation) -> genmedia_client::Result<String> {
        self.record(Call::WaitVideo {
            operation: operation.name.clone(),
        });
        self.pause().await;

        let image_data = self
            .submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&operation.name)
            .cloned()
            .unwrap_or_default();

        match self.failing_videos.get(&image_data) {
            Some(message) => Err(GenMediaError::Operation {
                code: 3,
                message: message.clone(),
            }),
            None => Ok(video_uri_for(&image_data)),
        }
    }
}

// ---------------------------------------------------------------------------
// MockConnector
// ---------------------------------------------------------------------------

pub struct MockConnector {
    generator: Arc<MockGenerator>,
    connects: AtomicUsize,
    credentials: Mutex<Vec<String>>,
}

impl MockConnector {
    pub fn new(generator: MockGenerator) -> Self {
        Self {
            generator: Arc::new(generator),
            connects: AtomicUsize::new(0),
            credentials: Mutex::new(Vec::new()),
        }
    }

    pub fn generator(&self) -> &MockGenerator {
        &self.generator
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn credentials(&self) -> Vec<String> {
        self.credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl GeneratorConnector for MockConnector {
    fn connect(&self, credential: &str) -> Result<Arc<dyn MediaGenerator>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(credential.to_string());
        let generator: Arc<dyn MediaGenerator> = self.generator.clone();
        Ok(generator)
    }
}
