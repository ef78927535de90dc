use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use genmedia_client::AspectRatio;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mascot_studio::config::preview;
use mascot_studio::upload::{decode_data_uri, extension_for_mime, read_image};
use mascot_studio::{
    CredentialGuard, CredentialStore, GenMediaConnector, ItemId, RunOutcome, SceneOutcome,
    ScenePipeline, SceneRequest, SceneStatus, StudioConfig, StudioError, VideoPipeline,
    VideoSettings, VideoStatus, DEFAULT_SCENE_COUNT, VIDEO_MODELS,
};

#[derive(Parser)]
#[command(name = "mascot-studio", about = "Generate mascot scenes and talking-head videos")]
struct Cli {
    /// TOML config file
    #[arg(long, env = "MASCOT_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the stored API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
    /// Break a script into scenes and render one image per scene
    Scenes {
        #[arg(long)]
        script: String,
        #[arg(
            long,
            default_value_t = DEFAULT_SCENE_COUNT,
            value_parser = clap::value_parser!(u32).range(1..)
        )]
        count: u32,
        #[arg(long, default_value = "1:1")]
        aspect: AspectRatio,
        /// Reference image steering the character design (repeatable)
        #[arg(long = "reference")]
        references: Vec<PathBuf>,
        /// Directory to write rendered images to
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Turn still images into talking videos, one after another
    Videos {
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Dialogue for each image, paired by position (repeatable)
        #[arg(long = "dialogue")]
        dialogues: Vec<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long, default_value = "16:9")]
        aspect: AspectRatio,
    },
}

#[derive(Subcommand)]
enum KeyAction {
    Set { key: String },
    Show,
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("mascot_studio=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = StudioConfig::load(cli.config.as_deref())?;
    config.log_summary();

    match run(cli.command, config).await {
        Err(err) if is_missing_credential(&err) => {
            eprintln!("{err}");
            eprintln!("Configure a key first: mascot-studio key set <KEY>");
            std::process::exit(2);
        }
        other => other,
    }
}

fn is_missing_credential(err: &anyhow::Error) -> bool {
    err.downcast_ref::<StudioError>()
        .is_some_and(StudioError::needs_configuration)
}

async fn run(command: Command, config: StudioConfig) -> Result<()> {
    let store: Arc<dyn CredentialStore> = Arc::new(config.credential_store()?);
    let guard = CredentialGuard::new(store.clone());
    let connector = Arc::new(GenMediaConnector::new(config.clone()));

    match command {
        Command::Key { action } => manage_key(action, store.as_ref()),
        Command::Scenes {
            script,
            count,
            aspect,
            references,
            out,
        } => {
            let pipeline = Arc::new(ScenePipeline::new(connector, guard));
            for path in &references {
                let image = read_image(path)
                    .await
                    .with_context(|| format!("reading reference {}", path.display()))?;
                pipeline.add_reference(image);
            }

            let watcher = tokio::spawn(watch_scenes(pipeline.clone()));
            let request = SceneRequest::new(script)
                .with_scene_count(count)
                .with_aspect_ratio(aspect);
            let outcome = pipeline.submit(request).await;
            watcher.abort();

            let SceneOutcome::Finished(summary) = outcome? else {
                println!("A scene run is already in progress");
                return Ok(());
            };

            let board = pipeline.snapshot();
            for (index, scene) in board.scenes.iter().enumerate() {
                println!("Scene {}: {:?} - {}", index + 1, scene.status, scene.description);
                if let Some(err) = &scene.error {
                    println!("  error: {err}");
                }
            }
            if let Some(dir) = out {
                write_scenes(&dir, &board)?;
            }
            println!("{} completed, {} failed", summary.completed, summary.failed);
            Ok(())
        }
        Command::Videos {
            images,
            dialogues,
            model,
            aspect,
        } => {
            let pipeline = Arc::new(VideoPipeline::new(connector, guard));
            for (index, path) in images.iter().enumerate() {
                let id = pipeline
                    .enqueue_file(path)
                    .await
                    .with_context(|| format!("reading image {}", path.display()))?;
                if let Some(dialogue) = dialogues.get(index) {
                    pipeline.set_dialogue(id, dialogue.as_str())?;
                }
            }

            let settings = VideoSettings {
                model_id: model.unwrap_or_else(|| config.video_model.clone()),
                aspect_ratio: aspect,
            };
            match VIDEO_MODELS.iter().find(|(id, _)| *id == settings.model_id) {
                Some((_, label)) => {
                    info!(model = %settings.model_id, label = %label, "Video model selected")
                }
                None => {
                    let offered: Vec<String> = VIDEO_MODELS
                        .iter()
                        .map(|(id, label)| format!("{label} ({id})"))
                        .collect();
                    info!(
                        model = %settings.model_id,
                        offered = %offered.join(", "),
                        "Using a model outside the offered list"
                    );
                }
            }

            let watcher = tokio::spawn(watch_videos(pipeline.clone()));
            let outcome = pipeline.generate_all(&settings).await;
            watcher.abort();

            match outcome? {
                RunOutcome::AlreadyRunning => println!("A video run is already in progress"),
                RunOutcome::EmptyQueue => println!("Nothing queued"),
                RunOutcome::Finished(summary) => {
                    for item in pipeline.snapshot().iter() {
                        match (&item.video_uri, &item.error) {
                            (Some(uri), _) => println!("{}: {}", item.id, uri),
                            (None, Some(err)) => println!("{}: error: {}", item.id, err),
                            (None, None) => println!("{}: {}", item.id, item.status),
                        }
                    }
                    println!(
                        "{} completed, {} failed, {} skipped",
                        summary.completed, summary.failed, summary.skipped
                    );
                }
            }
            Ok(())
        }
    }
}

fn manage_key(action: KeyAction, store: &dyn CredentialStore) -> Result<()> {
    match action {
        KeyAction::Set { key } => {
            store.save(key.trim())?;
            println!("Key saved ({})", preview(key.trim()));
        }
        KeyAction::Show => match store.load()? {
            Some(key) => println!("{}", preview(&key)),
            None => println!("<not set>"),
        },
        KeyAction::Clear => {
            store.clear()?;
            println!("Key cleared");
        }
    }
    Ok(())
}

async fn watch_scenes(pipeline: Arc<ScenePipeline>) {
    let mut rx = pipeline.subscribe();
    let mut seen: HashMap<ItemId, SceneStatus> = HashMap::new();
    while rx.changed().await.is_ok() {
        let board = rx.borrow_and_update().clone();
        for (index, scene) in board.scenes.iter().enumerate() {
            if seen.insert(scene.id, scene.status) != Some(scene.status) {
                println!("[scene {}] {:?}", index + 1, scene.status);
            }
        }
    }
}

async fn watch_videos(pipeline: Arc<VideoPipeline>) {
    let mut rx = pipeline.subscribe();
    let mut seen: HashMap<ItemId, VideoStatus> = HashMap::new();
    while rx.changed().await.is_ok() {
        let board = rx.borrow_and_update().clone();
        for item in board.iter() {
            if seen.insert(item.id, item.status) != Some(item.status) {
                println!("[{}] {} ({}%)", item.id, item.status, item.progress);
            }
        }
    }
}

fn write_scenes(dir: &Path, board: &mascot_studio::SceneBoard) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    for (index, scene) in board.scenes.iter().enumerate() {
        let Some(uri) = &scene.image_uri else {
            continue;
        };
        let (mime_type, bytes) = decode_data_uri(uri)?;
        let path = dir.join(format!("scene-{}.{}", index + 1, extension_for_mime(&mime_type)));
        std::fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}
