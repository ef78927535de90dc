pub mod board;
pub mod config;
pub mod credential;
pub mod error;
pub mod scenes;
pub mod traits;
pub mod types;
pub mod upload;
pub mod videos;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use board::{SceneBoard, VideoBoard};
pub use config::StudioConfig;
pub use credential::{
    CredentialGuard, CredentialStore, FileCredentialStore, MemoryCredentialStore,
};
pub use error::{Result, StudioError};
pub use scenes::{render_scene, ScenePipeline};
pub use traits::{GenMediaConnector, GeneratorConnector, MediaGenerator};
pub use types::*;
pub use videos::{produce_video, VideoJob, VideoPipeline};
