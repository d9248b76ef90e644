use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

const UNEXPECTED_ERROR: &str = "An unexpected error occurred.";

#[derive(Error, Debug)]
pub enum SegmentationError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<String>,
    },
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("{message}: {source}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, SegmentationError>;

impl SegmentationError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::Io { .. } => StatusCode::BAD_REQUEST,
            Self::Decode(_) | Self::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            Self::Validation { message, details } => ErrorBody {
                error: message.clone(),
                details: details.clone(),
            },
            Self::Io { message, source } if source.kind() == std::io::ErrorKind::NotFound => {
                ErrorBody {
                    error: message.clone(),
                    details: None,
                }
            }
            Self::Io { message, source } => ErrorBody {
                error: message.clone(),
                details: Some(source.to_string()),
            },
            Self::Decode(_) | Self::Inference(_) => ErrorBody {
                error: UNEXPECTED_ERROR.to_string(),
                details: Some(self.to_string()),
            },
        }
    }
}

impl From<image::ImageError> for SegmentationError {
    fn from(err: image::ImageError) -> Self {
        SegmentationError::Decode(err.to_string())
    }
}

impl From<ort::Error> for SegmentationError {
    fn from(err: ort::Error) -> Self {
        SegmentationError::Inference(err.to_string())
    }
}

impl From<ndarray::ShapeError> for SegmentationError {
    fn from(err: ndarray::ShapeError) -> Self {
        SegmentationError::Inference(format!("invalid tensor shape: {}", err))
    }
}

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    #[serde(rename = "Error")]
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for SegmentationError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            SegmentationError::validation("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SegmentationError::io(
                "Input directory does not exist.",
                std::io::Error::from(std::io::ErrorKind::NotFound)
            )
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SegmentationError::Decode("truncated".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            SegmentationError::Inference("oom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_body_shape() {
        let body =
            serde_json::to_value(SegmentationError::validation("Image URL is required.").body())
                .unwrap();
        assert_eq!(body, serde_json::json!({"Error": "Image URL is required."}));

        let body = serde_json::to_value(SegmentationError::Inference("oom".into()).body()).unwrap();
        assert_eq!(body["Error"], UNEXPECTED_ERROR);
        assert_eq!(body["details"], "Inference failed: oom");
    }

    #[test]
    fn test_missing_directory_has_no_details() {
        let err = SegmentationError::io(
            "Input directory does not exist.",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"Error": "Input directory does not exist."})
        );
    }
}
