//! lcstitch Worker Binary
//!
//! Reads newline-delimited JSON aggregation requests and writes one JSON
//! completion line per request to stdout.

use lcstitch::pipeline::AggregationPipeline;
use lcstitch::telemetry::Telemetry;
use lcstitch::worker::{Completion, Worker};
use lcstitch::{AggregatorConfig, CloudProvider};

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info};

/// lcstitch light-curve worker
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Request file (newline-delimited JSON); stdin when omitted
    #[arg(long)]
    input: Option<PathBuf>,

    /// Fragment store provider (memory, local, aws)
    #[arg(long, env = "FRAGMENT_PROVIDER")]
    fragment_provider: Option<CloudProvider>,

    /// Fragment bucket, or root directory for the local provider
    #[arg(long, env = "FRAGMENT_BUCKET")]
    fragment_bucket: Option<String>,

    /// Artifact store provider (memory, local, aws)
    #[arg(long, env = "ARTIFACT_PROVIDER")]
    artifact_provider: Option<CloudProvider>,

    /// Artifact bucket, or root directory for the local provider
    #[arg(long, env = "ARTIFACT_BUCKET")]
    artifact_bucket: Option<String>,

    /// Root directory for per-request scratch space
    #[arg(long, env = "SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Concurrent fragment downloads per request
    #[arg(long, env = "FETCH_CONCURRENCY")]
    fetch_concurrency: Option<usize>,

    /// Override the per-request cache flag for every request
    #[arg(long)]
    use_cache: Option<bool>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn apply(&self, config: &mut AggregatorConfig) {
        if let Some(provider) = self.fragment_provider {
            config.fragments.provider = provider;
        }
        if let Some(bucket) = &self.fragment_bucket {
            config.fragments.bucket = bucket.clone();
        }
        if let Some(provider) = self.artifact_provider {
            config.artifacts.provider = provider;
        }
        if let Some(bucket) = &self.artifact_bucket {
            config.artifacts.bucket = bucket.clone();
        }
        if let Some(dir) = &self.scratch_dir {
            config.scratch_root = dir.clone();
        }
        if let Some(n) = self.fetch_concurrency {
            config.fetch_concurrency = n;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let _telemetry = Telemetry::init_for_component("lcstitch-worker", &args.log_level)?;

    info!("Starting lcstitch worker");

    let mut config = AggregatorConfig::from_env()?;
    args.apply(&mut config);

    info!(
        fragment_provider = config.fragments.provider.as_str(),
        fragment_bucket = %config.fragments.bucket,
        artifact_provider = config.artifacts.provider.as_str(),
        artifact_bucket = %config.artifacts.bucket,
        scratch_root = %config.scratch_root.display(),
        fetch_concurrency = config.fetch_concurrency,
        "Worker configured"
    );

    let pipeline = Arc::new(AggregationPipeline::from_config(config).await?);
    let worker = Worker::new(pipeline).with_cache_override(args.use_cache);
    let shutdown = worker.shutdown_token();

    let (request_tx, request_rx) = mpsc::channel::<String>(64);
    let (done_tx, mut done_rx) = mpsc::channel::<Completion>(64);

    let input = args.input.clone();
    let reader = tokio::spawn(async move {
        match input {
            Some(path) => {
                let file = tokio::fs::File::open(&path).await?;
                forward_lines(BufReader::new(file), request_tx).await
            }
            None => forward_lines(BufReader::new(tokio::io::stdin()), request_tx).await,
        }
    });

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        shutdown.cancel();
    });

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        let mut failed = 0u64;
        while let Some(completion) = done_rx.recv().await {
            if completion.is_failure() {
                failed += 1;
            }
            let mut line = serde_json::to_vec(&completion)?;
            line.push(b'\n');
            stdout.write_all(&line).await?;
            stdout.flush().await?;
        }
        Ok::<u64, std::io::Error>(failed)
    });

    // Runs until input is exhausted or the shutdown token fires; an
    // in-flight request always completes
    let processed = worker.run(request_rx, done_tx).await;
    let failed = writer.await??;

    if reader.is_finished() {
        if let Ok(Err(e)) = reader.await {
            error!(error = %e, "Failed to read requests");
            return Err(e.into());
        }
    } else {
        reader.abort();
    }

    info!(processed, failed, "Worker shutting down");

    if failed > 0 {
        return Err(format!("{failed} request(s) failed").into());
    }
    Ok(())
}

/// Send each non-blank line to the worker
async fn forward_lines<R>(
    reader: BufReader<R>,
    requests: mpsc::Sender<String>,
) -> std::io::Result<()>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if requests.send(line).await.is_err() {
            break;
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
