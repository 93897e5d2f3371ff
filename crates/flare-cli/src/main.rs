//! Flare CLI: validate and upload media files through the Flare API.
//!
//! Set FLARE_API_URL (or API_URL) and FLARE_API_TOKEN (or API_TOKEN). Size
//! limits come from IMAGE_MAX_SIZE_MB, AUDIO_MAX_SIZE_MB and VIDEO_MAX_SIZE_MB.

use anyhow::Context;
use clap::{Parser, Subcommand};
use flare_api_client::{ApiClient, MediaUploader};
use flare_cli::{init_tracing, FileOutcome};
use flare_core::{validate_media, MediaType, UploadError, UploadPolicy, UploadRequest};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "flare", about = "Flare media upload CLI")]
struct Cli {
    /// Emit logs as JSON on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a file against the upload policy without contacting the API
    Validate {
        /// Path to the file
        file: PathBuf,
        /// Media type: image, audio, video (guessed from the extension if omitted)
        #[arg(long = "type", value_name = "TYPE")]
        media_type: Option<MediaType>,
    },
    /// Upload one or more files
    Upload {
        /// Paths to the files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Media type: image, audio, video (guessed from the extension if omitted)
        #[arg(long = "type", value_name = "TYPE")]
        media_type: Option<MediaType>,
        /// Maximum number of uploads in flight
        #[arg(long, default_value = "4")]
        concurrency: usize,
    },
}

fn build_request(path: &Path, media_type: Option<MediaType>) -> Result<UploadRequest, UploadError> {
    match media_type {
        Some(media_type) => UploadRequest::from_path(path, media_type),
        None => UploadRequest::detect(path),
    }
}

fn print_outcome(outcome: &FileOutcome) -> anyhow::Result<()> {
    let line = outcome.to_json_line().context("Serialize result")?;
    println!("{}", line);
    Ok(())
}

async fn upload_all(
    files: Vec<PathBuf>,
    media_type: Option<MediaType>,
    concurrency: usize,
    policy: UploadPolicy,
) -> anyhow::Result<usize> {
    let api = ApiClient::from_env().context(
        "Failed to create API client. Set FLARE_API_URL (or API_URL) and FLARE_API_TOKEN",
    )?;
    let uploader = MediaUploader::new(api, policy);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, cancelling uploads");
                cancel.cancel();
            }
        }
    });

    let uploader = &uploader;
    let cancel = &cancel;
    let mut outcomes = stream::iter(files)
        .map(move |path| async move {
            let result = match build_request(&path, media_type) {
                Ok(request) => uploader.upload_media_cancellable(&request, cancel).await,
                Err(err) => Err(err),
            };
            FileOutcome::uploaded(&path, result)
        })
        .buffer_unordered(concurrency.max(1));

    let mut failed = 0;
    while let Some(outcome) = outcomes.next().await {
        if !outcome.ok {
            failed += 1;
        }
        print_outcome(&outcome)?;
    }

    Ok(failed)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let policy = UploadPolicy::from_env().context("Invalid upload policy configuration")?;

    match cli.command {
        Commands::Validate { file, media_type } => {
            let result =
                build_request(&file, media_type).and_then(|request| validate_media(&request, &policy));
            let outcome = FileOutcome::validated(&file, result);
            print_outcome(&outcome)?;
            if !outcome.ok {
                anyhow::bail!("{} failed validation", file.display());
            }
        }
        Commands::Upload {
            files,
            media_type,
            concurrency,
        } => {
            let total = files.len();
            let failed = upload_all(files, media_type, concurrency, policy).await?;
            if failed > 0 {
                anyhow::bail!("{} of {} uploads failed", failed, total);
            }
        }
    }

    Ok(())
}
