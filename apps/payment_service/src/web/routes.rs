// apps/payment_service/src/web/routes.rs

use crate::errors::AppError;
use crate::web::handlers::payment_handlers;
use actix_web::{web, HttpResponse};
use orderpay::PaymentError;

async fn health_check_handler() -> HttpResponse {
  HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Malformed JSON bodies get the same error shape as every other rejection.
fn json_config() -> web::JsonConfig {
  web::JsonConfig::default().error_handler(|err, _req| {
    AppError::from(PaymentError::validation("body", format!("Invalid request body: {}", err))).into()
  })
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.app_data(json_config()).service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .route("/metrics", web::get().to(payment_handlers::metrics_handler))
      .service(
        web::scope("/payments")
          .route("/initiate", web::post().to(payment_handlers::initiate_payment_handler))
          // PesaPal redirects the customer's browser here (GET); other senders may POST.
          .route("/callback", web::get().to(payment_handlers::payment_callback_handler))
          .route("/callback", web::post().to(payment_handlers::payment_callback_handler))
          .route("/status/{order_id}", web::get().to(payment_handlers::payment_status_handler)),
      ),
  );
}
