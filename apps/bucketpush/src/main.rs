//! bucketpush command-line entry point.
//!
//! Usage: `bucketpush <path> <bucket-name> [protocol]`

mod config;

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use bucketpush_protocol::types::{StorageProtocol, UploadProgress};
use bucketpush_upload::{UploadOptions, Uploader};

/// Upload a file or directory to a storage bucket.
#[derive(Debug, Parser)]
#[command(name = "bucketpush", version, about, long_about = None)]
struct Args {
    /// File or directory to upload.
    source: PathBuf,

    /// Name of the target bucket.
    bucket: String,

    /// Storage protocol (ipfs, filecoin or arweave); defaults to the configured one.
    protocol: Option<StorageProtocol>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = config::Config::load()?;
    config.apply_env();
    if config.api.token.is_empty() {
        anyhow::bail!(
            "no API token configured: set {} or edit {}",
            config::TOKEN_ENV,
            config::config_path()?.display()
        );
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(args, config))
}

async fn run(args: Args, config: config::Config) -> anyhow::Result<()> {
    let uploader = Uploader::from_config(&config.api)?;

    let cancel = uploader.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling upload");
            cancel.cancel();
        }
    });

    let protocol = args.protocol.unwrap_or(config.default_protocol);
    let mut options = UploadOptions::new(protocol, args.bucket.as_str())
        .on_upload_initiated(|id| tracing::info!(upload_id = %id, "upload session opened"))
        .on_progress(print_progress);
    if let Some(org) = &config.organization_id {
        options = options.organization(org.as_str());
    }

    tracing::info!(
        source = %args.source.display(),
        bucket = %args.bucket,
        protocol = %protocol,
        "starting upload"
    );
    let result = uploader.upload(&args.source, options).await;
    eprintln!();

    let result = result?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn print_progress(p: UploadProgress) {
    let mut err = std::io::stderr().lock();
    let _ = write!(err, "\r{}\x1b[K", progress_line(&p));
    let _ = err.flush();
}

fn progress_line(p: &UploadProgress) -> String {
    let mut line = format!(
        "{:5.1}%  {} / {}",
        p.percentage(),
        p.transferred_bytes,
        p.total_bytes
    );
    if p.bytes_per_second > 0.0 {
        line.push_str(&format!("  {:.0} B/s", p.bytes_per_second));
    }
    if let Some(eta) = p.eta_secs {
        line.push_str(&format!("  ETA {}:{:02}", eta / 60, eta % 60));
    }
    if !p.current_file.is_empty() {
        line.push_str("  ");
        line.push_str(&p.current_file);
    }
    line
}
