use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use lib_radar::connections::RedisStreamPublisher;
use lib_radar::ingestors::GithubPollingIngestor;
use lib_radar::retrieve::{ApiClient, GithubFeedClient};
use lib_radar::RelevanceFilter;
use tokio::signal;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::timeout;

mod ingestor_logic;
use ingestor_logic::{config, logger};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = config::load_config().context("Invalid ingestor configuration")?;
    logger::setup_logging(&settings.log_dir, &settings.log_level)?;

    log::info!(
        "GitHub token is configured (length: {} characters)",
        settings.github_token.len()
    );
    if config::looks_like_placeholder(&settings.github_token) {
        log::warn!("GitHub token looks like a placeholder; fine-grained tokens are much longer.");
    }

    let api = ApiClient::new(
        &settings.feed_base_url,
        Some(settings.github_token.clone()),
        settings.poll.fetch_timeout,
    )
    .context("Failed to build the feed HTTP client")?;
    log::info!("Feed client initialized with API base URL: {}", api.base_url());
    let feed = Arc::new(GithubFeedClient::new(api, settings.feed_path.clone()));

    let publisher = timeout(
        CONNECT_TIMEOUT,
        RedisStreamPublisher::connect(&settings.redis_url, settings.stream.clone()),
    )
    .await
    .context("Timed out connecting to Redis")?
    .context("Failed to connect to Redis")?;
    let publisher = Arc::new(publisher);
    log::info!(
        "Connected to {}; publishing to topic '{}' across {} partitions",
        config::mask_credentials(&settings.redis_url),
        publisher.topic(),
        settings.stream.partitions
    );

    let ingestor = Arc::new(GithubPollingIngestor::new(
        feed,
        Arc::clone(&publisher),
        RelevanceFilter::with_kinds(settings.high_value_kinds.iter().copied()),
        settings.poll.clone(),
    ));
    let deliveries = ingestor.deliveries();

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let mut ingest_handle = tokio::spawn({
        let ingestor = Arc::clone(&ingestor);
        let shutdown_rx = shutdown_tx.subscribe();
        async move { ingestor.run(shutdown_rx).await }
    });

    let stopped_early = match wait_for_exit(&mut ingest_handle, wait_for_shutdown_signal()).await {
        Exit::Signal => {
            // Send shutdown signal to the ingestor
            let _ = shutdown_tx.send(());
            if let Err(e) = ingest_handle.await {
                log::error!("Ingestor task ended abnormally: {}", e);
            }
            None
        }
        Exit::LoopEnded(outcome) => {
            let reason = match outcome {
                Ok(()) => "returned without a shutdown signal".to_string(),
                Err(e) => e.to_string(),
            };
            log::error!("Ingestor loop stopped unexpectedly: {}", reason);
            Some(reason)
        }
    };

    if !publisher.flush(FLUSH_TIMEOUT).await {
        log::warn!(
            "{} sends were still in flight when the flush window closed",
            publisher.in_flight()
        );
    }

    if let Some(reason) = stopped_early {
        return Err(anyhow!("Ingestor loop stopped unexpectedly: {}", reason));
    }

    log::info!(
        "Shutdown complete. Deliveries acknowledged: {}, failed: {}",
        deliveries.delivered(),
        deliveries.failed()
    );
    Ok(())
}

/// Why `main` stopped waiting.
#[derive(Debug)]
enum Exit {
    Signal,
    LoopEnded(Result<(), JoinError>),
}

/// Waits for `signal`, or for the ingest task to end on its own first.
async fn wait_for_exit<S>(ingest: &mut JoinHandle<()>, signal: S) -> Exit
where
    S: Future<Output = ()>,
{
    tokio::select! {
        outcome = ingest => Exit::LoopEnded(outcome),
        _ = signal => Exit::Signal,
    }
}

async fn wait_for_shutdown_signal() {
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut term_signal) => {
                        term_signal.recv().await;
                        log::info!("SIGTERM received, initiating shutdown.");
                    }
                    Err(e) => {
                        log::error!("Could not install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                // On non-unix platforms, just wait forever.
                std::future::pending::<()>().await;
            }
        } => {}
    }
}
