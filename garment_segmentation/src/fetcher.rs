use crate::error::{Result, SegmentationError};
use bytes::Bytes;
use image::DynamicImage;
use reqwest::{header::CONTENT_TYPE, StatusCode, Url};
use std::io::Cursor;
use tracing::instrument;

pub const IMAGE_URL_REQUIRED: &str = "Image URL is required in the request payload.";
pub const INVALID_URL_FORMAT: &str = "Invalid URL format. Provide a valid image URL.";
pub const URL_NOT_ACCESSIBLE: &str =
    "Unable to access the image URL. Ensure the URL is correct and the image is publicly accessible.";
pub const URL_NOT_AN_IMAGE: &str = "The URL does not point to a valid image. Enter another URL";
pub const URL_ACCESS_FAILED: &str = "Error occurred while accessing image URL.";

/// Checks the URL syntax without touching the network.
pub fn parse_image_url(image_url: &str) -> Result<Url> {
    if !(image_url.starts_with("http://") || image_url.starts_with("https://")) {
        return Err(SegmentationError::validation(INVALID_URL_FORMAT));
    }
    let url =
        Url::parse(image_url).map_err(|_| SegmentationError::validation(INVALID_URL_FORMAT))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(SegmentationError::validation(INVALID_URL_FORMAT)),
    }
}

pub fn decode_image(data: &[u8]) -> Result<DynamicImage> {
    let image = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| SegmentationError::Decode(e.to_string()))?
        .decode()?;
    Ok(image)
}

fn access_failed(err: reqwest::Error) -> SegmentationError {
    SegmentationError::Validation {
        message: URL_ACCESS_FAILED.to_string(),
        details: Some(err.to_string()),
    }
}

#[derive(Clone)]
pub struct ImageFetcher {
    client: reqwest::Client,
}

impl ImageFetcher {
    pub fn new() -> std::result::Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;
        Ok(Self { client })
    }

    /// HEAD the resource and require a 200 with an `image/*` content type.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn check(&self, url: &Url) -> Result<()> {
        let response = self
            .client
            .head(url.clone())
            .send()
            .await
            .map_err(access_failed)?;

        if response.status() != StatusCode::OK {
            tracing::debug!("HEAD returned {}", response.status());
            return Err(SegmentationError::validation(URL_NOT_ACCESSIBLE));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with("image/") {
            tracing::debug!("HEAD returned content type {:?}", content_type);
            return Err(SegmentationError::validation(URL_NOT_AN_IMAGE));
        }

        Ok(())
    }

    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: &Url) -> Result<Bytes> {
        self.check(url).await?;

        let bytes = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(access_failed)?
            .bytes()
            .await
            .map_err(access_failed)?;

        tracing::debug!("Fetched {} bytes", bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
pub mod test_server {
    use axum::{
        http::{header, StatusCode},
        response::IntoResponse,
        routing::get,
        Router,
    };
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use tokio::net::TcpListener;

    pub const IMAGE_WIDTH: u32 = 40;
    pub const IMAGE_HEIGHT: u32 = 30;

    pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 200]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    async fn image() -> impl IntoResponse {
        (
            [(header::CONTENT_TYPE, "image/png")],
            png_bytes(IMAGE_WIDTH, IMAGE_HEIGHT),
        )
    }

    async fn corrupt_image() -> impl IntoResponse {
        ([(header::CONTENT_TYPE, "image/jpeg")], b"not a jpeg".to_vec())
    }

    async fn html() -> impl IntoResponse {
        ([(header::CONTENT_TYPE, "text/html")], "<html></html>")
    }

    async fn forbidden() -> impl IntoResponse {
        (StatusCode::FORBIDDEN, [(header::CONTENT_TYPE, "image/png")])
    }

    /// Serves fixture images on an ephemeral port and returns the base URL.
    pub async fn spawn() -> String {
        let router = Router::new()
            .route("/image.png", get(image))
            .route("/corrupt.jpg", get(corrupt_image))
            .route("/page.html", get(html))
            .route("/forbidden.png", get(forbidden));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        format!("http://{}", addr)
    }
}
