pub mod config;
pub mod error;
pub mod retry;
pub mod schema;
pub mod types;
pub mod util;

pub use config::ClientConfig;
pub use error::{GenMediaError, Result};
pub use retry::RetryPolicy;
pub use schema::StructuredOutput;
pub use types::{AspectRatio, InlineImage, SceneDraft, VideoOperation};

use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, ImageConfig,
    PredictVideoRequest, SceneBreakdown, VideoImage, VideoInstance, VideoParameters,
};

/// Fixed output resolution for video jobs.
const VIDEO_RESOLUTION: &str = "720p";
/// Fixed output size for scene images.
const IMAGE_SIZE: &str = "1K";

/// Veo model ids offered for talking-head videos.
pub const VIDEO_MODEL_FAST: &str = "veo-3.1-fast-generate-preview";
pub const VIDEO_MODEL_QUALITY: &str = "veo-3.1-generate-preview";

pub struct GenMediaClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl GenMediaClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(GenMediaError::InvalidConfig("API key is empty".into()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GenMediaError::InvalidConfig(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Break a script into up to `scene_count` scene prompts. The model is
    /// asked for exactly `scene_count`, but the reply length is returned as-is.
    pub async fn complete_structured(
        &self,
        script: &str,
        reference_images: &[InlineImage],
        scene_count: u32,
    ) -> Result<Vec<SceneDraft>> {
        let url = self.model_url(&self.config.text_model, "generateContent");
        let request = GenerateContentRequest {
            contents: vec![Content::with_images(script, reference_images)],
            system_instruction: Some(Content::with_images(&mascot_instruction(scene_count), &[])),
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                response_json_schema: Some(SceneBreakdown::response_schema()),
                ..Default::default()
            }),
        };

        debug!(
            model = %self.config.text_model,
            scene_count,
            references = reference_images.len(),
            "Structured completion request"
        );

        let (url, request) = (&url, &request);
        let scenes = self
            .config
            .retry
            .run("complete_structured", move || async move {
                let resp: GenerateContentResponse = self.post_json(url, request).await?;
                parse_scenes(&resp)
            })
            .await?;

        info!(requested = scene_count, received = scenes.len(), "Script broken into scenes");
        Ok(scenes)
    }

    /// Render one scene. Returns a `data:` URI of the first inline image.
    pub async fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
        reference_images: &[InlineImage],
    ) -> Result<String> {
        let url = self.model_url(&self.config.image_model, "generateContent");
        let request = GenerateContentRequest {
            contents: vec![Content::with_images(prompt, reference_images)],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["IMAGE".to_string()]),
                image_config: Some(ImageConfig {
                    aspect_ratio: aspect_ratio.to_string(),
                    image_size: IMAGE_SIZE.to_string(),
                }),
                ..Default::default()
            }),
        };

        debug!(model = %self.config.image_model, %aspect_ratio, "Image generation request");

        let (url, request) = (&url, &request);
        self.config
            .retry
            .run("generate_image", move || async move {
                let resp: GenerateContentResponse = self.post_json(url, request).await?;
                let image = resp
                    .first_inline_image()
                    .ok_or(GenMediaError::NoImageData)?;
                let mime_type = if image.mime_type.is_empty() {
                    "image/png"
                } else {
                    image.mime_type.as_str()
                };
                Ok(format!("data:{};base64,{}", mime_type, image.data))
            })
            .await
    }

    /// Generate a talking-head video end-to-end: submit, poll, return a
    /// URI fetchable without auth headers.
    pub async fn generate_video(
        &self,
        image_data: &str,
        mime_type: &str,
        model_id: &str,
        aspect_ratio: AspectRatio,
        dialogue: &str,
    ) -> Result<String> {
        let operation = self
            .submit_video(image_data, mime_type, model_id, aspect_ratio, dialogue)
            .await?;
        self.wait_for_video(operation).await
    }

    /// Start an image-to-video job. Not retried: a failed submission is final.
    pub async fn submit_video(
        &self,
        image_data: &str,
        mime_type: &str,
        model_id: &str,
        aspect_ratio: AspectRatio,
        dialogue: &str,
    ) -> Result<VideoOperation> {
        let url = self.model_url(model_id, "predictLongRunning");
        let request = PredictVideoRequest {
            instances: vec![VideoInstance {
                prompt: dialogue_prompt(dialogue),
                image: VideoImage {
                    bytes_base64_encoded: image_data.to_string(),
                    mime_type: mime_type.to_string(),
                },
            }],
            parameters: VideoParameters {
                aspect_ratio: aspect_ratio.to_string(),
                resolution: VIDEO_RESOLUTION.to_string(),
                sample_count: 1,
            },
        };

        let operation: VideoOperation = self.post_json(&url, &request).await?;
        info!(operation = %operation.name, model = model_id, %aspect_ratio, "Video job submitted");
        Ok(operation)
    }

    /// Poll until the job reports done, or the configured deadline passes.
    pub async fn wait_for_video(&self, operation: VideoOperation) -> Result<String> {
        let started = Instant::now();
        let mut operation = operation;

        while !operation.done {
            if let Some(limit) = self.config.poll_timeout {
                let elapsed = started.elapsed();
                if elapsed >= limit {
                    return Err(GenMediaError::Timeout { elapsed });
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;

            let url = format!("{}/{}", self.config.base_url(), operation.name);
            operation = self.get_json(&url).await?;
            debug!(operation = %operation.name, done = operation.done, "Video job polled");
        }

        if let Some(err) = operation.error.take() {
            return Err(GenMediaError::Operation {
                code: err.code,
                message: err.message,
            });
        }

        let uri = operation.video_uri().ok_or(GenMediaError::NoVideoData)?;
        info!(
            operation = %operation.name,
            elapsed_secs = started.elapsed().as_secs(),
            "Video job finished"
        );
        Ok(util::with_api_key(uri, &self.config.api_key))
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.config.base_url(), model, method)
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, url: &str, body: &B) -> Result<T> {
        let resp = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(GenMediaError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.json().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self
            .http
            .get(url)
            .header("x-goog-api-key", &self.config.api_key)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(GenMediaError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.json().await?)
    }
}

fn parse_scenes(resp: &GenerateContentResponse) -> Result<Vec<SceneDraft>> {
    let text = resp.text().ok_or(GenMediaError::EmptyResponse)?;
    let breakdown: SceneBreakdown = serde_json::from_str(util::strip_code_blocks(&text))
        .map_err(|_| GenMediaError::EmptyResponse)?;
    Ok(breakdown.scenes)
}

fn mascot_instruction(scene_count: u32) -> String {
    format!(
        "Act as an expert in designing animated mascots for image generation models. \
Your task is to write exactly {scene_count} visual prompts for the scenes of a script.

CRITICAL INSTRUCTION: The characters in the images MUST BE anthropomorphic personifications \
of the specific objects, food, animals, or concepts mentioned in the script.
- DO NOT generate a generic human or animal mascot standing next to the object.
- The object ITSELF must be the character (e.g., if the script is about a coffee cup, \
the character is a cute 3D coffee cup with eyes, mouth, and limbs).

Style Guidelines (Pixar-Inspired 3D):
- Render the anthropomorphic object in high-quality 3D cute style.
- Materials: smooth, glossy, tactile, and pastel-friendly.
- Lighting: warm, cinematic, soft lighting with subsurface scattering.

Character Design (\"Baby-Schema\" applied to Objects):
- Give the object large, round, glossy eyes centered on its \"face\".
- Add a small, cute mouth capable of expressive smiles or shapes.
- If applicable, give the object small, rounded arms/legs for gesturing.
- Expressions must be highly emotive directly on the object's face.

Context:
- The background is a simplified, stylized environment where that object would exist, \
kept soft and blurry to keep focus on the character.
- The result should look like a premium 3D animated movie frame where everyday objects \
are living, cute characters."
    )
}

fn dialogue_prompt(dialogue: &str) -> String {
    format!(
        "Cinematic video starting from this frame. The character in the image is speaking \
the following dialogue: \"{dialogue}\".
STRICT AUDIO INSTRUCTION: The video must contain ONLY the character's voice speaking the dialogue.
- NO background music.
- NO ambient sounds.
- NO sound effects.
- SILENCE except for the speech.

Ensure the character's mouth movements and facial expressions match the speech perfectly. \
High quality, smooth animation, professional lighting."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_rejected() {
        let config = ClientConfig::builder().api_key("  ").build();
        assert!(matches!(
            GenMediaClient::new(config),
            Err(GenMediaError::InvalidConfig(_))
        ));
    }

    #[test]
    fn dialogue_is_embedded_in_prompt() {
        let prompt = dialogue_prompt("Good morning!");
        assert!(prompt.contains("\"Good morning!\""));
        assert!(prompt.contains("ONLY the character's voice"));
    }

    #[test]
    fn instruction_requests_scene_count() {
        assert!(mascot_instruction(4).contains("exactly 4 visual prompts"));
    }

    #[test]
    fn fenced_json_reply_is_parsed() {
        let resp: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{ "content": { "parts": [{
                "text": "```json\n{\"scenes\":[{\"description\":\"d\",\"imagePrompt\":\"p\"}]}\n```"
            }]}}]
        }))
        .unwrap();

        let scenes = parse_scenes(&resp).unwrap();
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].image_prompt, "p");
    }

    #[test]
    fn reply_missing_required_field_is_empty_response() {
        let resp: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{ "content": { "parts": [{
                "text": "{\"scenes\":[{\"description\":\"d\"}]}"
            }]}}]
        }))
        .unwrap();

        assert!(matches!(parse_scenes(&resp), Err(GenMediaError::EmptyResponse)));
    }
}
