// apps/payment_service/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use orderpay::{FlowError, PaymentError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error(transparent)]
  Payment(#[from] PaymentError),

  #[error("Workflow Error: {0}")]
  Workflow(#[from] FlowError),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<sqlx::Error>() {
      Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
      Err(err) => AppError::Internal(format!("{:#}", err)),
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Payment(e) => StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, "Responding with error");
    }

    let body = match self {
      AppError::Payment(e) => match e.field() {
        Some(field) => json!({ "error": e.user_message(), "code": e.code(), "field": field }),
        None => json!({ "error": e.user_message(), "code": e.code() }),
      },
      AppError::Config(_) => json!({ "error": "Configuration issue", "code": "unknown_error" }),
      AppError::Sqlx(_) => json!({ "error": "Database operation failed", "code": "unknown_error" }),
      AppError::Workflow(_) | AppError::Internal(_) => json!({
        "error": "Something went wrong while processing the payment. Please try again later.",
        "code": "unknown_error"
      }),
    };
    HttpResponse::build(status).json(body)
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
