use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::document::DocumentError;
use crate::error::PayslipError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    UnsupportedMedia(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnsupportedMedia(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PayslipError> for ApiError {
    fn from(err: PayslipError) -> Self {
        let message = err.to_string();
        match err {
            PayslipError::Document(DocumentError::Unsupported(_)) => {
                ApiError::UnsupportedMedia(message)
            }
            PayslipError::Document(DocumentError::EmptyPdf | DocumentError::InvalidImage) => {
                ApiError::BadRequest(message)
            }
            PayslipError::Document(DocumentError::Pdf(_)) => ApiError::Internal(message),
            PayslipError::InvalidInput(_) => ApiError::BadRequest(message),
            PayslipError::NotFound(_) => ApiError::NotFound(message),
            PayslipError::Model(_) | PayslipError::Store(_) => ApiError::Upstream(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        } else {
            log::warn!("Request rejected: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::VectorStoreError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                PayslipError::Document(DocumentError::Unsupported("text/plain".into())),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                PayslipError::Document(DocumentError::EmptyPdf),
                StatusCode::BAD_REQUEST,
            ),
            (
                PayslipError::InvalidInput("limit must be at least 1".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                PayslipError::NotFound("gone".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                PayslipError::Model(anyhow::anyhow!("timeout")),
                StatusCode::BAD_GATEWAY,
            ),
            (
                PayslipError::Store(VectorStoreError::Connection("refused".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                PayslipError::Document(DocumentError::Pdf("broken xref".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_message_kept() {
        let err = ApiError::from(PayslipError::InvalidInput("Missing part 'file'".into()));
        assert_eq!(err.to_string(), "Missing part 'file'");
    }
}
