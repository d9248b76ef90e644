use crate::config::Config;
use crate::fetcher::ImageFetcher;
use crate::ort_service::OrtModelService;
use crate::pipeline::SegmentationPipeline;
use crate::server::HttpServer;

use std::{error::Error, sync::Arc};
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let model = match OrtModelService::new(&config.model) {
        Ok(model) => model,
        Err(e) => {
            tracing::error!("Failed to initialize segmentation model: {:?}", e);
            return Err(Box::new(e));
        }
    };
    let pipeline = Arc::new(SegmentationPipeline::new(
        model,
        config.debug_artifacts.clone(),
    ));

    let fetcher = ImageFetcher::new()?;
    let server = HttpServer::new(pipeline, fetcher, &config).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_handle = server.run(shutdown_tx.subscribe()).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    let _ = server_handle.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
