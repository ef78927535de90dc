use std::sync::Arc;

use async_trait::async_trait;
use genmedia_client::{
    AspectRatio, ClientConfig, GenMediaClient, InlineImage, SceneDraft, VideoOperation,
};

use crate::config::StudioConfig;
use crate::error::Result;

/// The remote calls the pipelines depend on.
#[async_trait]
pub trait MediaGenerator: Send + Sync {
    async fn complete_structured(
        &self,
        script: &str,
        reference_images: &[InlineImage],
        scene_count: u32,
    ) -> genmedia_client::Result<Vec<SceneDraft>>;

    async fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
        reference_images: &[InlineImage],
    ) -> genmedia_client::Result<String>;

    async fn submit_video(
        &self,
        image_data: &str,
        mime_type: &str,
        model_id: &str,
        aspect_ratio: AspectRatio,
        dialogue: &str,
    ) -> genmedia_client::Result<VideoOperation>;

    async fn wait_for_video(&self, operation: VideoOperation) -> genmedia_client::Result<String>;
}

/// Binds a credential to a generator. Called once per pipeline run.
pub trait GeneratorConnector: Send + Sync {
    fn connect(&self, credential: &str) -> Result<Arc<dyn MediaGenerator>>;
}

#[async_trait]
impl MediaGenerator for GenMediaClient {
    async fn complete_structured(
        &self,
        script: &str,
        reference_images: &[InlineImage],
        scene_count: u32,
    ) -> genmedia_client::Result<Vec<SceneDraft>> {
        GenMediaClient::complete_structured(self, script, reference_images, scene_count).await
    }

    async fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
        reference_images: &[InlineImage],
    ) -> genmedia_client::Result<String> {
        GenMediaClient::generate_image(self, prompt, aspect_ratio, reference_images).await
    }

    async fn submit_video(
        &self,
        image_data: &str,
        mime_type: &str,
        model_id: &str,
        aspect_ratio: AspectRatio,
        dialogue: &str,
    ) -> genmedia_client::Result<VideoOperation> {
        GenMediaClient::submit_video(self, image_data, mime_type, model_id, aspect_ratio, dialogue)
            .await
    }

    async fn wait_for_video(&self, operation: VideoOperation) -> genmedia_client::Result<String> {
        GenMediaClient::wait_for_video(self, operation).await
    }
}

/// Builds a [`GenMediaClient`] per run from the studio configuration.
pub struct GenMediaConnector {
    config: StudioConfig,
}

impl GenMediaConnector {
    pub fn new(config: StudioConfig) -> Self {
        Self { config }
    }
}

impl GeneratorConnector for GenMediaConnector {
    fn connect(&self, credential: &str) -> Result<Arc<dyn MediaGenerator>> {
        let config: ClientConfig = self.config.client_config(credential);
        let client: Arc<dyn MediaGenerator> = Arc::new(GenMediaClient::new(config)?);
        Ok(client)
    }
}
