//! Command-line front end for the retry client.
//!
//! Fetches a URL one or more times through a `RetryClient`, printing the
//! outcome of each request. Flags override values from an optional TOML or
//! JSON config file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::http::Uri;
use clap::Parser;
use futures_util::{stream, StreamExt};
use retry_client::config::{load_config, validate_config, ClientConfig, ConfigError};
use retry_client::observability::logging::{init_logging, DEFAULT_FILTER};
use retry_client::{CancellationToken, RetryClient};

#[derive(Parser)]
#[command(name = "retry-fetch")]
#[command(about = "Fetch a URL with rate limiting and automatic retries", long_about = None)]
struct Cli {
    /// URL to fetch.
    url: Uri,

    /// Config file (TOML, or JSON by extension).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum requests per second (0 = unlimited).
    #[arg(long)]
    max_rps: Option<u32>,

    /// Maximum retry attempts (0 = default of 3).
    #[arg(long)]
    max_retries: Option<u32>,

    /// Delay before the first retry in milliseconds.
    #[arg(long)]
    initial_backoff_ms: Option<u64>,

    /// Cap on exponential backoff in milliseconds.
    #[arg(long)]
    max_backoff_ms: Option<u64>,

    /// Overall timeout per attempt in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Number of requests to send.
    #[arg(short = 'n', long, default_value_t = 1)]
    count: usize,

    /// Requests in flight at once.
    #[arg(short = 'j', long, default_value_t = 1)]
    concurrency: usize,
}

impl Cli {
    fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ClientConfig::default(),
        };

        if let Some(v) = self.max_rps {
            config.max_rps = v;
        }
        if let Some(v) = self.max_retries {
            config.max_retries = v;
        }
        if let Some(v) = self.initial_backoff_ms {
            config.initial_backoff_ms = v;
        }
        if let Some(v) = self.max_backoff_ms {
            config.max_backoff_ms = v;
        }
        if let Some(v) = self.timeout_secs {
            config.timeout_secs = v;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(DEFAULT_FILTER)?;

    let cli = Cli::parse();
    let config = cli.client_config()?;
    let settings = config.resolve();

    tracing::info!(
        url = %cli.url,
        max_rps = settings.max_rps,
        max_retries = settings.max_retries,
        initial_backoff = ?settings.initial_backoff,
        max_backoff = ?settings.max_backoff,
        "Configuration loaded"
    );

    let client = RetryClient::new(&config);
    let limiter = client.rate_limiter();
    if limiter.is_enabled() {
        tracing::debug!(
            max_rps = limiter.max_rps(),
            refill_interval = ?limiter.refill_interval(),
            "Rate limiting enabled"
        );
    }
    let cancel = CancellationToken::new();

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received, cancelling in-flight requests");
            ctrl_c.cancel();
        }
    });

    let url = Arc::new(cli.url.clone());
    let started = Instant::now();
    let mut failures = 0usize;

    let mut results = stream::iter(0..cli.count)
        .map(|i| {
            let client = client.clone();
            let url = url.clone();
            let cancel = cancel.child_token();
            async move {
                let start = Instant::now();
                let result = client.get_with_cancellation((*url).clone(), cancel).await;
                (i, start.elapsed(), result)
            }
        })
        .buffer_unordered(cli.concurrency.max(1));

    while let Some((i, elapsed, result)) = results.next().await {
        match result {
            Ok(response) => {
                let status = response.status();
                let body = axum::body::to_bytes(response.into_body(), usize::MAX).await;
                let len = body.map(|b| b.len()).unwrap_or(0);
                println!("#{:<4} {} {} bytes in {:?}", i, status, len, elapsed);
                if !status.is_success() {
                    failures += 1;
                }
            }
            Err(e) => {
                println!("#{:<4} error: {} after {:?}", i, e, elapsed);
                failures += 1;
            }
        }
    }

    let tokens_left = client.rate_limiter().available();
    client.shutdown();
    tracing::info!(
        requests = cli.count,
        failures,
        tokens_left,
        elapsed = ?started.elapsed(),
        "Done"
    );

    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}
