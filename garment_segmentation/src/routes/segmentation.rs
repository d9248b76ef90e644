use crate::{
    batch::{process_directory, BatchEntry},
    error::{Result, SegmentationError},
    fetcher::{decode_image, parse_image_url, IMAGE_URL_REQUIRED},
    model_service::SegmentationModel,
    server::SharedState,
};
use axum::{body::Bytes, extract::State, response::Json};
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use tracing::instrument;

pub const GARMENT_ROUTE: &str = "/segmentation/garment";
pub const GARMENT_BATCH_ROUTE: &str = "/segmentation/garment-batch";

#[derive(Serialize, Debug)]
pub struct SegmentResponse {
    pub image: String,
}

#[derive(Serialize, Debug)]
pub struct BatchResponse {
    pub processed_images: Vec<BatchEntry>,
}

/// Pulls `image_url` out of a JSON body; anything but a string field is rejected.
pub fn extract_image_url(body: &[u8]) -> Result<String> {
    let payload: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    match payload.get("image_url") {
        Some(Value::String(image_url)) => Ok(image_url.clone()),
        _ => Err(SegmentationError::validation(IMAGE_URL_REQUIRED)),
    }
}

fn join_error(err: tokio::task::JoinError) -> SegmentationError {
    SegmentationError::Inference(format!("segmentation task failed: {}", err))
}

#[instrument(skip_all)]
pub async fn segment_garment<M: SegmentationModel>(
    State(state): State<SharedState<M>>,
    body: Bytes,
) -> Result<Json<SegmentResponse>> {
    state.metrics.record_request(GARMENT_ROUTE);

    let image_url = extract_image_url(&body)?;
    let url = parse_image_url(&image_url)?;
    tracing::info!("Segmenting image from {}", url);

    let data = state.fetcher.fetch(&url).await?;

    let start = Instant::now();
    let pipeline = state.pipeline.clone();
    let image = tokio::task::spawn_blocking(move || {
        let image = decode_image(&data)?;
        pipeline.segment(&image).map(|segmented| segmented.to_base64())
    })
    .await
    .map_err(join_error)??;

    state
        .metrics
        .record_segmentation_duration(start.elapsed().as_millis() as u64, GARMENT_ROUTE);

    Ok(Json(SegmentResponse { image }))
}

#[instrument(skip_all)]
pub async fn segment_garment_batch<M: SegmentationModel>(
    State(state): State<SharedState<M>>,
) -> Result<Json<BatchResponse>> {
    state.metrics.record_request(GARMENT_BATCH_ROUTE);

    let start = Instant::now();
    let pipeline = state.pipeline.clone();
    let batch_config = state.batch_config.clone();
    let processed_images =
        tokio::task::spawn_blocking(move || process_directory(&pipeline, &batch_config))
            .await
            .map_err(join_error)??;

    let processed = processed_images.iter().filter(|e| e.is_processed()).count() as u64;
    let failed = processed_images.len() as u64 - processed;
    state.metrics.record_batch_images(processed, failed);
    state
        .metrics
        .record_segmentation_duration(start.elapsed().as_millis() as u64, GARMENT_BATCH_ROUTE);
    tracing::info!("Batch finished: {} processed, {} failed", processed, failed);

    Ok(Json(BatchResponse { processed_images }))
}
