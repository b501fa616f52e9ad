use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use stock_checker_core::errors::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Core(#[from] CoreError),
    #[error("{0}")]
    BadRequest(String),
    /// A quote request that cannot be served, e.g. a blank code. There is no
    /// fallback price for a code: the body carries `price: null`. Only `/fx`
    /// answers with a default, the configured fallback rate.
    #[error("{0}")]
    QuoteRequest(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    code: u16,
    error: String,
}

#[derive(Serialize)]
struct QuoteErrorBody {
    success: bool,
    error: String,
    price: Option<f64>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Core(e) => match e {
                CoreError::Validation { .. } | CoreError::Transfer(_) => StatusCode::BAD_REQUEST,
                CoreError::Deserialization(_) => StatusCode::BAD_REQUEST,
                CoreError::HoldingNotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) | ApiError::QuoteRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if let ApiError::QuoteRequest(message) = self {
            let body = Json(QuoteErrorBody {
                success: false,
                error: message,
                price: None,
            });
            return (status, body).into_response();
        }

        let body = Json(ErrorBody {
            success: false,
            code: status.as_u16(),
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
