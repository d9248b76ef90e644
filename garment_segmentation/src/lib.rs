mod routes;
mod server;
mod telemetry;

pub mod app;
pub mod batch;
pub mod colormap;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod model_service;
pub mod ort_service;
pub mod pipeline;
pub mod postprocess;
pub mod preprocess;

pub use app::start_app;
