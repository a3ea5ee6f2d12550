use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use ai_reader::{
    Config, Document, FailureKind, HttpConversionService, JobController, JobPhase, Voice,
};

#[derive(Parser)]
#[command(
    name = "ai-reader",
    about = "Convert a document into an audiobook via the conversion service"
)]
struct Cli {
    /// Config file, looked up relative to the working directory
    #[arg(long, default_value = "config/ai-reader")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a document and follow the conversion to completion
    Submit {
        /// Document to convert (e.g. a PDF)
        file: PathBuf,

        /// Voice to read the document with
        #[arg(long, value_enum, default_value_t = Voice::Ash)]
        voice: Voice,

        /// Where to write the finished audio (overrides the config)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// List the voices the service offers
    Voices,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    match cli.command {
        Command::Voices => {
            for voice in Voice::ALL {
                println!("{}", voice);
            }
            Ok(())
        }
        Command::Submit {
            file,
            voice,
            output_dir,
        } => {
            let download_dir =
                output_dir.unwrap_or_else(|| PathBuf::from(&cfg.output.download_dir));
            submit_and_follow(&cfg, file, voice, download_dir).await
        }
    }
}

async fn submit_and_follow(
    cfg: &Config,
    file: PathBuf,
    voice: Voice,
    download_dir: PathBuf,
) -> Result<()> {
    let content = tokio::fs::read(&file)
        .await
        .with_context(|| format!("Failed to read document: {}", file.display()))?;

    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());

    let service = Arc::new(
        HttpConversionService::new(cfg.service.base_url.clone(), cfg.service.request_timeout())
            .context("Failed to build the service client")?,
    );
    let controller = JobController::new(service.clone(), cfg.polling.interval());

    let mut snapshots = controller.subscribe();
    let job = controller
        .submit(Document::new(file_name, content), voice)
        .await
        .context("Submission failed")?;

    info!("Conversion accepted: job {}", job.id);

    // Follow the state feed until the attempt reaches a terminal phase.
    loop {
        snapshots
            .changed()
            .await
            .context("Controller state feed closed")?;

        let snapshot = snapshots.borrow_and_update().clone();
        match snapshot.phase {
            JobPhase::Polling => info!("Generating audio... {}%", snapshot.progress),
            JobPhase::Succeeded => break,
            JobPhase::Failed(FailureKind::Generation) => {
                error!("The service could not generate audio for this document");
                anyhow::bail!("audio generation failed")
            }
            JobPhase::Failed(_) => {
                error!("Lost contact with the conversion service");
                anyhow::bail!("conversion failed")
            }
            JobPhase::Idle | JobPhase::Uploading => {}
        }
    }

    let bytes = service
        .fetch_artifact(&job.audio_url)
        .await
        .context("Failed to download the audio artifact")?;

    tokio::fs::create_dir_all(&download_dir)
        .await
        .with_context(|| format!("Failed to create {}", download_dir.display()))?;

    let output = download_dir.join(format!("{}.mp3", job.id));
    tokio::fs::write(&output, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!("Audiobook ready: {}", output.display());

    Ok(())
}
