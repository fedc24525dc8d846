mod config;
mod telemetry;

use config::ServiceConfig;
use std::sync::Arc;
use std::time::Duration;
use submission_domain::RetryPolicy;
use submission_store::LocalFileStore;
use submission_worker::{LogOutcomeObserver, NatsClient, SubmissionWorker, SubmissionWorkerConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    telemetry::init_telemetry(&config.log_level);

    info!(
        store_root = %config.store_root,
        nats_url = %config.nats_url,
        stream = %config.transaction_stream,
        "starting submission service"
    );

    if let Err(e) = run(config).await {
        error!(error = %e, "submission service failed");
        std::process::exit(1);
    }
}

async fn run(config: ServiceConfig) -> anyhow::Result<()> {
    let store = Arc::new(LocalFileStore::new(&config.store_root));

    let nats_client = NatsClient::connect(
        &config.nats_url,
        Duration::from_secs(config.nats_connect_timeout_secs),
    )
    .await?;
    nats_client.ensure_stream(&config.transaction_stream).await?;

    let retry = RetryPolicy::new(
        config.retry_max_attempts,
        Duration::from_secs(config.retry_base_delay_secs),
    );

    let worker = SubmissionWorker::new(
        store,
        Arc::new(LogOutcomeObserver),
        nats_client.create_delivery_stream(),
        retry,
        SubmissionWorkerConfig {
            stream: config.transaction_stream.clone(),
            subject: config.transaction_subject.clone(),
            consumer_name: config.consumer_name.clone(),
            batch_size: config.nats_batch_size,
            batch_wait_secs: config.nats_batch_wait_secs,
        },
    )
    .await?;

    let shutdown = CancellationToken::new();

    let ctrl_c_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received shutdown signal");
                ctrl_c_token.cancel();
            }
            Err(e) => error!(error = %e, "error setting up signal handler"),
        }
    });

    #[cfg(unix)]
    {
        let sigterm_token = shutdown.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    info!("received SIGTERM");
                    sigterm_token.cancel();
                }
                Err(e) => error!(error = %e, "error setting up SIGTERM handler"),
            }
        });
    }

    worker.run(shutdown).await
}
