use anyhow::{Context, Result};
use clap::Parser;
use node_labeler::cli::Cli;
use node_labeler::k8s::{K8sClient, NodeLabelCache};
use node_labeler::metrics::{MetricFetcher, RelabelPipeline};
use node_labeler::{server, Config};
use std::process;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Starting node-labeler v{}", node_labeler::VERSION);

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_cli(&cli).await?;
    info!(
        "Node {}: relabeling {} on {}",
        config.node,
        config.node_exporter_url(),
        config.listen_addr
    );

    let cancel = CancellationToken::new();
    let tracker = TaskTracker::new();

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        shutdown.cancel();
    });

    let client = K8sClient::try_default().await?;
    let cache = NodeLabelCache::start(client.nodes(), &config, &tracker, &cancel)
        .await
        .context("construct node label cache failed")?;

    let fetcher = MetricFetcher::new(config.node_exporter_url())?;
    let pipeline = Arc::new(RelabelPipeline::new(config.node.clone(), fetcher, cache));

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("Serving metrics on http://{}{}", config.listen_addr, server::METRICS_PATH);

    let serve_result = axum::serve(listener, server::router(pipeline))
        .with_graceful_shutdown(cancel.clone().cancelled_owned())
        .await;

    cancel.cancel();
    tracker.close();
    tracker.wait().await;

    serve_result.context("HTTP server failed")?;

    info!("node-labeler stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
