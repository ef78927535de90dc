//! Script → scene prompts → one image per scene, strictly in order.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use genmedia_client::{AspectRatio, InlineImage};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::board::{Board, RunGuard, SceneBoard};
use crate::credential::CredentialGuard;
use crate::error::{Result, StudioError};
use crate::traits::{GeneratorConnector, MediaGenerator};
use crate::types::{
    ItemId, ReferenceImage, SceneItem, SceneOutcome, SceneRequest, SceneRunSummary, SceneStatus,
};

/// Render one scene prompt into a `data:` URI.
pub async fn render_scene(
    generator: &dyn MediaGenerator,
    prompt: &str,
    aspect_ratio: AspectRatio,
    reference_images: &[InlineImage],
) -> genmedia_client::Result<String> {
    generator
        .generate_image(prompt, aspect_ratio, reference_images)
        .await
}

pub struct ScenePipeline {
    connector: Arc<dyn GeneratorConnector>,
    guard: CredentialGuard,
    references: Mutex<Vec<ReferenceImage>>,
    board: Board<SceneBoard>,
    running: AtomicBool,
}

impl ScenePipeline {
    pub fn new(connector: Arc<dyn GeneratorConnector>, guard: CredentialGuard) -> Self {
        Self {
            connector,
            guard,
            references: Mutex::new(Vec::new()),
            board: Board::new(SceneBoard::default()),
            running: AtomicBool::new(false),
        }
    }

    // --- Reference images ---

    pub fn add_reference(&self, image: ReferenceImage) {
        self.references_lock().push(image);
    }

    /// Returns the removed image, or `None` if `index` is out of range.
    pub fn remove_reference(&self, index: usize) -> Option<ReferenceImage> {
        let mut refs = self.references_lock();
        (index < refs.len()).then(|| refs.remove(index))
    }

    pub fn clear_references(&self) {
        self.references_lock().clear();
    }

    pub fn references(&self) -> Vec<ReferenceImage> {
        self.references_lock().clone()
    }

    fn references_lock(&self) -> std::sync::MutexGuard<'_, Vec<ReferenceImage>> {
        self.references.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- State ---

    pub fn snapshot(&self) -> SceneBoard {
        self.board.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SceneBoard> {
        self.board.subscribe()
    }

    // --- Run ---

    pub async fn submit(&self, request: SceneRequest) -> Result<SceneOutcome> {
        let Some(_run) = RunGuard::acquire(&self.running) else {
            info!("Scene run already in progress, ignoring submission");
            return Ok(SceneOutcome::AlreadyRunning);
        };

        if request.script.trim().is_empty() {
            return Err(StudioError::EmptyScript);
        }
        let credential = self.guard.resolve()?;
        let generator = self.connector.connect(&credential)?;

        let references: Vec<InlineImage> = self.references().iter().map(|r| r.inline()).collect();

        self.board.update(|b| {
            b.scenes.clear();
            b.batch_error = None;
            b.processing = true;
        });

        info!(
            scene_count = request.scene_count,
            aspect_ratio = %request.aspect_ratio,
            references = references.len(),
            "Breaking script into scenes"
        );

        let drafts = match generator
            .complete_structured(&request.script, &references, request.scene_count)
            .await
        {
            Ok(drafts) => drafts,
            Err(e) => {
                warn!(error = %e, "Scene breakdown failed");
                self.board.update(|b| {
                    b.batch_error = Some(e.to_string());
                    b.processing = false;
                });
                return Err(StudioError::SceneBreakdown(e));
            }
        };

        let ids: Vec<ItemId> = self.board.update(|b| {
            b.scenes = drafts
                .into_iter()
                .map(|d| SceneItem::generating(d.description, d.image_prompt, request.aspect_ratio))
                .collect();
            b.scenes.iter().map(|s| s.id).collect()
        });

        let mut summary = SceneRunSummary::default();
        for (index, id) in ids.into_iter().enumerate() {
            let prompt = self.board.read(|b| {
                b.scene(id)
                    .filter(|s| s.status != SceneStatus::Completed)
                    .map(|s| s.image_prompt.clone())
            });
            let Some(prompt) = prompt else {
                continue;
            };

            let result =
                render_scene(generator.as_ref(), &prompt, request.aspect_ratio, &references).await;

            self.board.update(|b| {
                let Some(scene) = b.scene_mut(id) else {
                    return;
                };
                scene.finished_at = Some(Utc::now());
                match &result {
                    Ok(uri) => {
                        scene.image_uri = Some(uri.clone());
                        scene.status = SceneStatus::Completed;
                        scene.error = None;
                    }
                    Err(e) => {
                        scene.status = SceneStatus::Error;
                        scene.error = Some(e.to_string());
                    }
                }
            });

            match result {
                Ok(_) => {
                    info!(scene = index + 1, item_id = %id, "Scene rendered");
                    summary.completed += 1;
                }
                Err(e) => {
                    warn!(scene = index + 1, item_id = %id, error = %e, "Scene failed");
                    summary.failed += 1;
                }
            }
        }

        self.board.update(|b| b.processing = false);
        info!(completed = summary.completed, failed = summary.failed, "Scene run finished");
        Ok(SceneOutcome::Finished(summary))
    }
}
