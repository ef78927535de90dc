use genmedia_client::{AspectRatio, GenMediaError};
use thiserror::Error;

use crate::types::ItemId;

pub type Result<T> = std::result::Result<T, StudioError>;

#[derive(Debug, Error)]
pub enum StudioError {
    #[error("Script is empty")]
    EmptyScript,

    #[error("No API key configured. Run `mascot-studio key set <KEY>` or set API_KEY")]
    MissingCredential,

    #[error("Scene breakdown failed: {0}")]
    SceneBreakdown(#[source] GenMediaError),

    #[error("Dialogue of item {0} can no longer be edited")]
    DialogueFrozen(ItemId),

    #[error("Unknown item {0}")]
    UnknownItem(ItemId),

    #[error("Aspect ratio {0} is not supported for video")]
    UnsupportedAspectRatio(AspectRatio),

    #[error("Unsupported image type: {0}")]
    UnsupportedMediaType(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Credential store error: {0}")]
    CredentialStore(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Generation(#[from] GenMediaError),
}

impl StudioError {
    /// True when the user has to configure a credential before anything can run.
    pub fn needs_configuration(&self) -> bool {
        matches!(self, StudioError::MissingCredential)
    }
}
