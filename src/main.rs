use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand, ValueHint};
use iocraft::prelude::*;
use std::{
    fs::{self, File},
    io::{self, BufReader},
    num::NonZeroUsize,
    path::PathBuf,
    time::Duration,
};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;
use tusc::{TusClient, UploadOptions, UploadReport, UploadSummary};
use url::Url;

use crate::{
    config::Config,
    ui::{ErrorMessage, ProgressBar, SuccessMessage, SummaryList},
};

mod config;
mod ui;

#[derive(Parser)]
#[command(name = "tusc")]
#[command(version)]
#[command(about = "Upload files in parallel chunks through the tus concatenation extension")]
struct Cli {
    /// Log more (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TransferArgs {
    /// Maximum chunk size in bytes
    #[arg(short = 's', long)]
    chunk_size: Option<NonZeroUsize>,
    /// Maximum number of chunks uploaded at once (unbounded by default)
    #[arg(short = 'j', long)]
    concurrency: Option<NonZeroUsize>,
    /// Timeout for creation and concatenation requests, e.g. "30s"
    #[arg(long, value_parser = humantime::parse_duration)]
    request_timeout: Option<Duration>,
    /// Timeout for writing a single chunk, e.g. "10m"
    #[arg(long, value_parser = humantime::parse_duration)]
    transfer_timeout: Option<Duration>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file
    Upload {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
        /// Collection URL partial uploads are created at
        #[arg(short, long)]
        endpoint: Option<Url>,
        #[command(flatten)]
        transfer: TransferArgs,
        /// Delete the partial uploads left on the server if the upload fails
        #[arg(long)]
        cleanup: bool,
        /// Print the result as JSON instead of rendering progress
        #[arg(long)]
        json: bool,
    },
    /// Delete uploads from the server
    Terminate {
        #[arg(required = true)]
        locations: Vec<Url>,
    },
    /// Write default settings to the config file
    Config {
        #[arg(short, long)]
        endpoint: Option<Url>,
        #[command(flatten)]
        transfer: TransferArgs,
    },
    /// Store an API token in the OS keyring
    SetToken { token: String },
}

fn main() -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let _rt_guard = rt.enter();
    clap_complete::CompleteEnv::with_factory(Cli::command).complete();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    rt.block_on(async {
        match cli.command {
            Commands::SetToken { token } => config::set_token_keyring(token),
            Commands::Config { endpoint, transfer } => write_config(endpoint, transfer),
            requires_config => {
                let config = config::read_config()?;

                match requires_config {
                    Commands::Upload {
                        file,
                        endpoint,
                        transfer,
                        cleanup,
                        json,
                    } => upload_file(&config, file, endpoint, transfer, cleanup, json).await,
                    Commands::Terminate { locations } => terminate(&config, &locations).await,
                    Commands::Config { .. } => unreachable!("handled above"),
                    Commands::SetToken { .. } => unreachable!("handled above"),
                }
            }
        }
    })
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("tusc=debug"),
        _ => EnvFilter::new("tusc=trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn upload_options(config: &Config, transfer: TransferArgs) -> UploadOptions {
    UploadOptions {
        chunk_size: transfer.chunk_size.unwrap_or(config.chunk_size),
        concurrency: transfer.concurrency.or(config.concurrency),
        request_timeout: transfer.request_timeout.or(config.request_timeout),
        transfer_timeout: transfer.transfer_timeout.or(config.transfer_timeout),
        bearer_token: config.token.clone(),
        progress: None,
    }
}

async fn upload_file(
    config: &Config,
    file: PathBuf,
    endpoint: Option<Url>,
    transfer: TransferArgs,
    cleanup: bool,
    json: bool,
) -> Result<()> {
    let target = endpoint.or(config.endpoint.clone()).ok_or_else(|| {
        anyhow!("An endpoint must be specified via --endpoint, TUSC_ENDPOINT or the config file")
    })?;

    let file_size = fs::metadata(&file)
        .context("Failed to get file metadata")?
        .len();
    let reader = BufReader::new(File::open(&file).context("Failed to open file")?);

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<u64>();
    let options = UploadOptions {
        progress: Some(progress_tx),
        ..upload_options(config, transfer)
    };
    let client = TusClient::new(options)?;

    let (tx, rx) = watch::channel(0.0f32);
    let process_upload = async {
        let upload = client.upload_parts(reader, &target);
        tokio::pin!(upload);

        let mut bytes_uploaded = 0u64;
        loop {
            tokio::select! {
                biased;
                report = &mut upload => break report,
                Some(bytes) = progress_rx.recv() => {
                    bytes_uploaded += bytes;
                    let percent = (bytes_uploaded as f32 / file_size.max(1) as f32) * 100.0;
                    let _ = tx.send(percent);
                }
            }
        }
    };

    let report = if json {
        process_upload.await
    } else {
        let mut progress_bar = element!(ProgressBar(
            title: format!("Uploading {}", file.display()),
            progress: Some(rx)
        ));
        tokio::select! {
            report = process_upload => report,
            _ = progress_bar.render_loop() => {
                unreachable!("render_loop should not terminate")
            }
        }
    };

    let created = report.created_locations();
    let result = finish_upload(&client, &target, report, json).await;

    if let Err(e) = &result
        && !created.is_empty()
    {
        if cleanup {
            element!(ErrorMessage(message: e.to_string())).print();
            println!("Removing {} partial upload(s)...", created.len());
            if let Err(cleanup_error) = remove_uploads(&client, &created).await {
                element!(ErrorMessage(message: cleanup_error.to_string())).print();
            }
        } else {
            eprintln!(
                "{} partial upload(s) were left on the server; remove them with `tusc terminate`:",
                created.len()
            );
            for location in &created {
                eprintln!("  {}", location);
            }
        }
    }

    let (location, summary) = result?;

    if json {
        let output = serde_json::json!({
            "location": location,
            "bytes": summary.total_bytes(),
            "parts": summary,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        element!(SummaryList(summary: summary.clone())).print();
        element!(SuccessMessage(
            message: format!(
                "Uploaded {} bytes in {} chunk(s) to {}",
                summary.total_bytes(),
                summary.len(),
                location
            )
        ))
        .print();
    }

    Ok(())
}

async fn finish_upload(
    client: &TusClient,
    target: &Url,
    report: UploadReport,
    json: bool,
) -> Result<(Url, UploadSummary)> {
    if !json {
        for part in report.failures() {
            if let Err(e) = &part.result {
                element!(ErrorMessage(message: format!("Chunk {}: {}", part.index, e))).print();
            }
        }
    }

    let summary = report.into_summary()?;
    if summary.is_empty() {
        return Err(tusc::Error::EmptyUpload.into());
    }

    let location = client.concatenate(target, summary.locations()).await?;
    Ok((location, summary))
}

async fn remove_uploads(client: &TusClient, locations: &[Url]) -> Result<()> {
    let results = client.cleanup(locations).await;

    let mut failed = 0;
    for (location, result) in results {
        match result {
            Ok(()) => println!("Removed {}", location),
            Err(e) => {
                failed += 1;
                element!(ErrorMessage(message: e.to_string())).print();
            }
        }
    }

    if failed > 0 {
        bail!("Failed to remove {} of {} upload(s)", failed, locations.len());
    }
    Ok(())
}

async fn terminate(config: &Config, locations: &[Url]) -> Result<()> {
    let options = UploadOptions {
        request_timeout: config.request_timeout,
        bearer_token: config.token.clone(),
        ..UploadOptions::default()
    };
    let client = TusClient::new(options)?;
    remove_uploads(&client, locations).await
}

fn write_config(endpoint: Option<Url>, transfer: TransferArgs) -> Result<()> {
    let config_file = config::ConfigFile {
        endpoint,
        chunk_size: transfer.chunk_size,
        concurrency: transfer.concurrency,
        request_timeout: transfer.request_timeout,
        transfer_timeout: transfer.transfer_timeout,
    };

    let path = config::write_config(config_file)?;
    element!(SuccessMessage(message: format!("Configuration written to {}", path.display()))).print();

    Ok(())
}
