//! Persistent queue of still images turned into talking-head videos one at a time.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::board::{Board, RunGuard, VideoBoard};
use crate::credential::CredentialGuard;
use crate::error::{Result, StudioError};
use crate::traits::{GeneratorConnector, MediaGenerator};
use crate::types::{ItemId, RunOutcome, RunSummary, VideoItem, VideoSettings, VideoStatus};
use crate::upload::{data_uri_payload, read_image};

const PROGRESS_STARTED: u8 = 20;
const PROGRESS_DONE: u8 = 100;

/// What one video generation needs, captured when the loop reaches the item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoJob {
    /// Base64 payload of the source frame.
    pub image_data: String,
    pub mime_type: String,
    pub dialogue: String,
}

/// Submit one job and wait for it. `on_submitted` fires once the remote
/// operation has been accepted.
pub async fn produce_video(
    generator: &dyn MediaGenerator,
    job: &VideoJob,
    settings: &VideoSettings,
    on_submitted: impl FnOnce(&str),
) -> genmedia_client::Result<String> {
    let operation = generator
        .submit_video(
            &job.image_data,
            &job.mime_type,
            &settings.model_id,
            settings.aspect_ratio,
            &job.dialogue,
        )
        .await?;
    on_submitted(&operation.name);
    generator.wait_for_video(operation).await
}

pub struct VideoPipeline {
    connector: Arc<dyn GeneratorConnector>,
    guard: CredentialGuard,
    board: Board<VideoBoard>,
    running: AtomicBool,
}

impl VideoPipeline {
    pub fn new(connector: Arc<dyn GeneratorConnector>, guard: CredentialGuard) -> Self {
        Self {
            connector,
            guard,
            board: Board::new(VideoBoard::default()),
            running: AtomicBool::new(false),
        }
    }

    pub fn enqueue(
        &self,
        image_data_uri: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> ItemId {
        let item = VideoItem::waiting(image_data_uri.into(), mime_type.into());
        let id = item.id;
        self.board.update(|b| b.items.insert(id, item));
        info!(item_id = %id, "Image queued for video");
        id
    }

    pub async fn enqueue_file(&self, path: &Path) -> Result<ItemId> {
        let image = read_image(path).await?;
        Ok(self.enqueue(image.data_uri, image.mime_type))
    }

    /// Dialogue can be edited until generation of the item starts.
    pub fn set_dialogue(&self, id: ItemId, dialogue: impl Into<String>) -> Result<()> {
        let dialogue = dialogue.into();
        self.board.update(|b| match b.items.get_mut(&id) {
            None => Err(StudioError::UnknownItem(id)),
            Some(item) if item.status != VideoStatus::Waiting => {
                Err(StudioError::DialogueFrozen(id))
            }
            Some(item) => {
                item.dialogue = dialogue;
                Ok(())
            }
        })
    }

    /// Safe at any time. An in-flight generation for the item is not
    /// cancelled; its result is discarded.
    pub fn remove(&self, id: ItemId) -> bool {
        let removed = self.board.update(|b| b.items.shift_remove(&id).is_some());
        if removed {
            info!(item_id = %id, "Item removed from queue");
        }
        removed
    }

    /// Drop completed and failed items. Returns how many were removed.
    pub fn clear_finished(&self) -> usize {
        self.board.update(|b| {
            let before = b.items.len();
            b.items.retain(|_, item| !item.status.is_finished());
            before - b.items.len()
        })
    }

    pub fn snapshot(&self) -> VideoBoard {
        self.board.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<VideoBoard> {
        self.board.subscribe()
    }

    pub async fn generate_all(&self, settings: &VideoSettings) -> Result<RunOutcome> {
        let Some(_run) = RunGuard::acquire(&self.running) else {
            info!("Video run already in progress, ignoring trigger");
            return Ok(RunOutcome::AlreadyRunning);
        };

        let ids: Vec<ItemId> = self.board.read(|b| b.items.keys().copied().collect());
        if ids.is_empty() {
            return Ok(RunOutcome::EmptyQueue);
        }

        let credential = self.guard.resolve()?;
        if !settings.aspect_ratio.supports_video() {
            return Err(StudioError::UnsupportedAspectRatio(settings.aspect_ratio));
        }
        let generator = self.connector.connect(&credential)?;

        info!(
            items = ids.len(),
            model = %settings.model_id,
            aspect_ratio = %settings.aspect_ratio,
            "Video run started"
        );
        self.board.update(|b| b.running = true);

        let mut summary = RunSummary::default();
        for id in ids {
            let Some(job) = self.start_item(id) else {
                summary.skipped += 1;
                continue;
            };

            let result = produce_video(generator.as_ref(), &job, settings, |operation| {
                info!(item_id = %id, operation, "Polling video job");
                self.update_item(id, |item| item.status = VideoStatus::Polling);
            })
            .await;

            match result {
                Ok(uri) => {
                    info!(item_id = %id, "Video ready");
                    summary.completed += 1;
                    self.update_item(id, |item| {
                        item.status = VideoStatus::Completed;
                        item.progress = PROGRESS_DONE;
                        item.video_uri = Some(uri);
                        item.error = None;
                        item.finished_at = Some(Utc::now());
                    });
                }
                Err(e) => {
                    warn!(item_id = %id, error = %e, "Video generation failed");
                    summary.failed += 1;
                    self.update_item(id, |item| {
                        item.status = VideoStatus::Error;
                        item.progress = 0;
                        item.error = Some(e.to_string());
                        item.finished_at = Some(Utc::now());
                    });
                }
            }
        }

        self.board.update(|b| b.running = false);
        info!(
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            "Video run finished"
        );
        Ok(RunOutcome::Finished(summary))
    }

    /// Mark the item `Generating` and capture its job, or `None` when it was
    /// removed or already completed.
    fn start_item(&self, id: ItemId) -> Option<VideoJob> {
        self.board.update(|b| {
            let item = b.items.get_mut(&id)?;
            if item.status == VideoStatus::Completed {
                return None;
            }
            item.status = VideoStatus::Generating;
            item.progress = PROGRESS_STARTED;
            item.error = None;
            Some(VideoJob {
                image_data: data_uri_payload(&item.image_data).to_string(),
                mime_type: item.mime_type.clone(),
                dialogue: item.dialogue.clone(),
            })
        })
    }

    /// No-op when the item has been removed meanwhile.
    fn update_item(&self, id: ItemId, f: impl FnOnce(&mut VideoItem)) {
        self.board.update(|b| {
            if let Some(item) = b.items.get_mut(&id) {
                f(item);
            }
        });
    }
}
