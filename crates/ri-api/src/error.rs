//! HTTP mapping of [`AppError`].
//!
//! Every failure answers with `{"error": {"category", "message", ...}}`.
//! Internal details are logged, never echoed to the client.

use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use ri_core::error::AppError;
use serde_json::json;

#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) | AppError::DuplicateFavorite { .. } => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match &self.0 {
            AppError::Internal(detail) => {
                log::error!("request failed: {}", detail);
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        let mut body = json!({ "category": self.0.category(), "message": message });
        if let AppError::DuplicateFavorite { item_id } = &self.0 {
            body["item_id"] = json!(item_id);
        }
        HttpResponse::build(self.status_code()).json(json!({ "error": body }))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
