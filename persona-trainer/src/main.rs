//! persona-trainer - multimodal persona training service
//!
//! `serve` runs the HTTP API; `train` runs one job in the foreground; `analyze-audio` and
//! `analyze-video` print a single analysis record as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use persona_common::config::{self, TomlConfig, ROOT_FOLDER_ENV};
use persona_common::events::EventBus;
use persona_trainer::models::training_data::TrainingData;
use persona_trainer::models::training_job::TrainingProgress;
use persona_trainer::services::job_store::JobStore;
use persona_trainer::services::media_scanner::MediaScanner;
use persona_trainer::services::suitability_scorer::ScoringTable;
use persona_trainer::services::training_orchestrator::ProgressCallback;
use persona_trainer::services::AudioAnalyzer;
use persona_trainer::AppState;

#[derive(Debug, Parser)]
#[command(name = "persona-trainer", version, about = "Multimodal persona training pipeline")]
struct Cli {
    /// Training output root (one subdirectory per persona)
    #[arg(long, global = true, env = ROOT_FOLDER_ENV)]
    root_folder: Option<PathBuf>,

    /// Config file (defaults to PERSONA_CONFIG or the per-user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Train one persona and wait for the result
    Train {
        persona_id: String,
        #[arg(long, num_args = 1..)]
        audio: Vec<PathBuf>,
        #[arg(long, num_args = 1..)]
        video: Vec<PathBuf>,
        #[arg(long, num_args = 1..)]
        text: Vec<PathBuf>,
        #[arg(long, num_args = 1..)]
        images: Vec<PathBuf>,
        /// Add every media file found under this directory
        #[arg(long)]
        scan: Option<PathBuf>,
    },
    /// Analyze one audio file and print the record
    AnalyzeAudio { file: PathBuf },
    /// Analyze one video file and print the record
    AnalyzeVideo { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => config::load_toml_config(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => config::load_config().context("Failed to load config")?,
    };
    init_tracing(&config);

    match cli.command {
        Command::Serve { host, port } => {
            let root = resolve_root(cli.root_folder.as_deref(), &config)?;
            serve(&config, root, host, port).await
        }
        Command::Train {
            persona_id,
            audio,
            video,
            text,
            images,
            scan,
        } => {
            let root = resolve_root(cli.root_folder.as_deref(), &config)?;
            let mut data = TrainingData {
                audio,
                video,
                text,
                images,
            };
            if let Some(dir) = scan {
                let found = MediaScanner::new()
                    .scan(&dir)
                    .with_context(|| format!("Failed to scan {}", dir.display()))?;
                info!(dir = %dir.display(), files = found.assets().count(), "Scanned media directory");
                data.extend(found);
            }
            train(&config, root, &persona_id, data).await
        }
        Command::AnalyzeAudio { file } => {
            let scoring =
                ScoringTable::or_default(config.scoring.audio.as_ref(), ScoringTable::default_audio)?;
            let analyzer = AudioAnalyzer::new(scoring);
            let analysis = tokio::task::spawn_blocking(move || analyzer.analyze(&file)).await??;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
            Ok(())
        }
        Command::AnalyzeVideo { file } => {
            let analyzer = persona_trainer::video_analyzer_from_config(&config)?;
            let analysis = tokio::task::spawn_blocking(move || analyzer.analyze(&file)).await??;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
            Ok(())
        }
    }
}

/// `RUST_LOG` wins; otherwise the configured level
fn init_tracing(config: &TomlConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn resolve_root(cli_arg: Option<&std::path::Path>, config: &TomlConfig) -> Result<PathBuf> {
    let root = config::resolve_root_folder(cli_arg, ROOT_FOLDER_ENV, config);
    std::fs::create_dir_all(&root)
        .with_context(|| format!("Failed to create root folder: {}", root.display()))?;
    info!(root = %root.display(), "Training root folder");
    Ok(root)
}

async fn serve(config: &TomlConfig, root: PathBuf, host: Option<String>, port: Option<u16>) -> Result<()> {
    info!("Starting persona-trainer v{}", env!("CARGO_PKG_VERSION"));

    let event_bus = EventBus::new(256);
    let orchestrator =
        persona_trainer::build_orchestrator(config, root, JobStore::new(), event_bus.clone())?;
    let app = persona_trainer::build_router(AppState::new(orchestrator, event_bus));

    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn train(config: &TomlConfig, root: PathBuf, persona_id: &str, data: TrainingData) -> Result<()> {
    if data.is_empty() {
        anyhow::bail!("No training files given");
    }
    let orchestrator =
        persona_trainer::build_orchestrator(config, root, JobStore::new(), EventBus::new(64))?;

    let on_progress: ProgressCallback = Arc::new(|p: &TrainingProgress| {
        info!(
            step = %p.current_step,
            progress = p.progress_percentage,
            details = %p.details,
            "Training progress"
        );
    });
    let completed = orchestrator
        .train_persona(persona_id, data, Some(on_progress))
        .await;

    let progress = orchestrator.training_progress(persona_id).await;
    if let Some(p) = &progress {
        println!("{}", serde_json::to_string_pretty(p)?);
    }
    if !completed {
        anyhow::bail!(
            "Training did not complete: {}",
            progress.map(|p| p.details).unwrap_or_default()
        );
    }
    Ok(())
}
