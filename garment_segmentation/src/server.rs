use crate::{
    config::{BatchConfig, Config},
    fetcher::ImageFetcher,
    model_service::SegmentationModel,
    pipeline::SegmentationPipeline,
    routes::api_routes,
    telemetry::Metrics,
};
use axum::Router;
use axum_otel_metrics::HttpMetricsLayerBuilder;
use std::sync::Arc;
use tokio::{net::TcpListener, sync::broadcast::Receiver, task::JoinHandle};

pub struct SharedState<M: SegmentationModel> {
    pub pipeline: Arc<SegmentationPipeline<M>>,
    pub fetcher: ImageFetcher,
    pub batch_config: BatchConfig,
    pub metrics: Arc<Metrics>,
}

// derive(Clone) would demand M: Clone
impl<M: SegmentationModel> Clone for SharedState<M> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            fetcher: self.fetcher.clone(),
            batch_config: self.batch_config.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

pub fn build_router<M: SegmentationModel>(state: SharedState<M>) -> Router {
    let metrics_layer = HttpMetricsLayerBuilder::new().build();

    Router::new()
        .merge(api_routes())
        .with_state(state)
        .layer(metrics_layer)
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new<M: SegmentationModel>(
        pipeline: Arc<SegmentationPipeline<M>>,
        fetcher: ImageFetcher,
        config: &Config,
    ) -> anyhow::Result<Self> {
        let addr = config.server.get_address();

        let state = SharedState {
            pipeline,
            fetcher,
            batch_config: config.batch.clone(),
            metrics: Arc::new(Metrics::new()?),
        };
        let router = build_router(state);

        let listener = TcpListener::bind(&addr).await?;

        Ok(Self { router, listener })
    }

    pub async fn run(
        self,
        mut shutdown_rx: Receiver<()>,
    ) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
        tracing::info!("Starting app on {}", self.listener.local_addr()?);

        let listener = self.listener;
        let router = self.router;
        let server_handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_rx.recv().await.ok();
                })
                .await?;
            tracing::info!("Server stopped");
            Ok::<(), anyhow::Error>(())
        });

        Ok(server_handle)
    }
}
