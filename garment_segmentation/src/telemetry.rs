use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use prometheus::Registry;

pub struct Metrics {
    request_counter: Counter<u64>,
    segmentation_duration: Histogram<u64>,
    batch_images: Counter<u64>,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter("garment_segmentation");
        global::set_meter_provider(provider);

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of segmentation requests")
            .build();

        let segmentation_duration = meter
            .u64_histogram("segmentation_duration_ms")
            .with_boundaries(generate_boundaries(50.0, 2.0, 10))
            .with_description("Duration of the segmentation pipeline in milliseconds")
            .build();

        let batch_images = meter
            .u64_counter("batch_images_total")
            .with_description("Images handled by the batch endpoint, by outcome")
            .build();

        Ok(Metrics {
            request_counter,
            segmentation_duration,
            batch_images,
            registry,
        })
    }

    pub fn record_request(&self, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_segmentation_duration(&self, duration_ms: u64, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.segmentation_duration.record(duration_ms, &attributes);
    }

    pub fn record_batch_images(&self, processed: u64, failed: u64) {
        self.batch_images
            .add(processed, &[KeyValue::new("outcome", "processed")]);
        self.batch_images
            .add(failed, &[KeyValue::new("outcome", "failed")]);
    }
}

// CPU inference on a full-size photo takes seconds, so buckets grow geometrically.
fn generate_boundaries(start: f64, factor: f64, count: usize) -> Vec<f64> {
    std::iter::successors(Some(start), |bound| Some(bound * factor))
        .take(count)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, TextEncoder};

    #[test]
    fn test_generate_boundaries() {
        let get = generate_boundaries(50.0, 2.0, 5);
        let expected = vec![50.0, 100.0, 200.0, 400.0, 800.0];

        assert_eq!(get, expected);
    }

    #[test]
    fn test_metrics_are_exported() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request("/segmentation/garment");
        metrics.record_segmentation_duration(120, "/segmentation/garment");
        metrics.record_batch_images(2, 1);

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metrics.registry.gather(), &mut buffer)
            .unwrap();
        let output = String::from_utf8(buffer).unwrap();

        assert!(output.contains("requests_total"));
        assert!(output.contains("segmentation_duration_ms"));
        assert!(output.contains("batch_images_total"));
    }
}
