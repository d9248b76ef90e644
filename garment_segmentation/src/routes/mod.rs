mod health;
mod metrics;
mod segmentation;

use crate::{model_service::SegmentationModel, server::SharedState};
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use segmentation::{GARMENT_BATCH_ROUTE, GARMENT_ROUTE};

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

pub fn api_routes<M: SegmentationModel>() -> Router<SharedState<M>> {
    let segmentation_routes = Router::new()
        .route(GARMENT_ROUTE, post(segmentation::segment_garment::<M>))
        .route(
            GARMENT_BATCH_ROUTE,
            post(segmentation::segment_garment_batch::<M>),
        )
        .layer(cors_layer());

    Router::new()
        .merge(segmentation_routes)
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler::<M>))
}
