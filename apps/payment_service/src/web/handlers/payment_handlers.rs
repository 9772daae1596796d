// apps/payment_service/src/web/handlers/payment_handlers.rs

use actix_web::http::header::ContentType;
use actix_web::{web, Either, HttpResponse};
use prometheus::{Encoder, TextEncoder};
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::state::AppState;
use orderpay::{initiate_payment, payment_status, reconcile_callback, CallbackParams, CallbackSignal, PaymentRequest};

/// Page served to the checkout popup: tells the opener how the payment went,
/// then closes itself.
const CALLBACK_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head><meta charset="utf-8"><title>Payment</title></head>
  <body>
    <p>{{MESSAGE}}</p>
    <script>
      (function () {
        if (window.opener) {
          window.opener.postMessage("{{MESSAGE}}", "*");
        }
        window.close();
      })();
    </script>
  </body>
</html>
"#;

fn callback_page(signal: CallbackSignal) -> HttpResponse {
  HttpResponse::Ok()
    .content_type(ContentType::html())
    .body(CALLBACK_PAGE.replace("{{MESSAGE}}", signal.message()))
}

#[instrument(
    name = "handler::initiate_payment",
    skip(app_state, body),
    fields(order_id = %body.order_id)
)]
pub async fn initiate_payment_handler(
  app_state: web::Data<AppState>,
  body: web::Json<PaymentRequest>,
) -> Result<HttpResponse, AppError> {
  let session = initiate_payment(&app_state.flows, &app_state.payments, body.into_inner()).await?;
  info!(tracking_id = %session.order_tracking_id, "payment session created");
  Ok(HttpResponse::Ok().json(session))
}

/// Gateway callback. Identifiers may arrive in the query string, a form body or
/// a JSON body; query values win. Always answers with the HTML page.
#[instrument(name = "handler::payment_callback", skip_all)]
pub async fn payment_callback_handler(
  app_state: web::Data<AppState>,
  query: Option<web::Query<CallbackParams>>,
  body: Option<Either<web::Json<CallbackParams>, web::Form<CallbackParams>>>,
) -> HttpResponse {
  let from_query = query.map(web::Query::into_inner).unwrap_or_default();
  let from_body = match body {
    Some(Either::Left(json)) => json.into_inner(),
    Some(Either::Right(form)) => form.into_inner(),
    None => CallbackParams::default(),
  };
  let params = from_query.or(from_body);

  let signal = reconcile_callback(&app_state.flows, &app_state.payments, params).await;
  info!(signal = signal.message(), "payment callback answered");
  callback_page(signal)
}

#[instrument(name = "handler::payment_status", skip(app_state))]
pub async fn payment_status_handler(
  app_state: web::Data<AppState>,
  order_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let view = payment_status(app_state.payments.store.as_ref(), &order_id).await?;
  Ok(HttpResponse::Ok().json(view))
}

/// Prometheus text exposition of the payment counters.
pub async fn metrics_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  let encoder = TextEncoder::new();
  let mut buffer = Vec::new();
  encoder
    .encode(&app_state.payments.metrics.registry().gather(), &mut buffer)
    .map_err(|e| AppError::Internal(format!("encoding metrics: {}", e)))?;
  Ok(HttpResponse::Ok().content_type(encoder.format_type()).body(buffer))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::AppConfig;
  use crate::services::MockGateway;
  use crate::web::configure_app_routes;
  use actix_web::{test, App};
  use chrono::Utc;
  use orderpay::{InMemoryOrderStore, NoopNotifier, Order, OrderStore, PaymentMethod, PaymentStatus};
  use rust_decimal_macros::dec;
  use serde_json::{json, Value};
  use std::sync::Arc;
  use std::time::Duration;

  fn test_state(mock_status: &str, orders: Vec<Order>) -> (AppState, Arc<InMemoryOrderStore>) {
    let config = AppConfig::from_lookup(|name| match name {
      "STORE_BACKEND" => Some("memory".to_string()),
      "APP_BASE_URL" => Some("http://shop.test".to_string()),
      _ => None,
    })
    .unwrap();
    let store = Arc::new(InMemoryOrderStore::with_orders(orders));
    let gateway = MockGateway::new(&config.app_base_url, mock_status).with_latency(Duration::ZERO);
    let state = AppState::new(Arc::new(config), store.clone(), Arc::new(gateway), Arc::new(NoopNotifier)).unwrap();
    (state, store)
  }

  fn order(id: &str) -> Order {
    Order::place(id, dec!(1999.99), PaymentMethod::Pesapal, Utc::now())
  }

  fn initiate_body(order_id: &str) -> Value {
    json!({
      "orderId": order_id,
      "amount": "1999.99",
      "phone": "0712 345 678",
      "email": "jane@example.com"
    })
  }

  macro_rules! service {
    ($state:expr) => {
      test::init_service(
        App::new()
          .app_data(web::Data::new($state))
          .configure(configure_app_routes),
      )
      .await
    };
  }

  #[actix_web::test]
  async fn initiate_returns_session() {
    let (state, store) = test_state("COMPLETED", vec![order("ORD-1")]);
    let app = service!(state);

    let req = test::TestRequest::post()
      .uri("/api/v1/payments/initiate")
      .set_json(initiate_body("ORD-1"))
      .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;

    let tracking_id = resp["orderTrackingId"].as_str().unwrap();
    assert!(tracking_id.starts_with("mock_trk_"));
    assert!(resp["paymentUrl"].as_str().unwrap().starts_with("http://shop.test/api/v1/payments/callback"));

    let stored = store.find_by_public_id("ORD-1").await.unwrap().unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Processing);
    assert_eq!(stored.payment_tracking_id.as_deref(), Some(tracking_id));
  }

  #[actix_web::test]
  async fn initiate_rejects_bad_phone_with_field() {
    let (state, _) = test_state("COMPLETED", vec![order("ORD-2")]);
    let app = service!(state);

    let mut body = initiate_body("ORD-2");
    body["phone"] = json!("12ab");
    let req = test::TestRequest::post()
      .uri("/api/v1/payments/initiate")
      .set_json(body)
      .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["field"], "phone");
    assert_eq!(body["code"], "validation_error");
  }

  #[actix_web::test]
  async fn initiate_on_paid_order_conflicts() {
    let mut paid = order("ORD-3");
    paid.payment_status = PaymentStatus::Paid;
    let (state, _) = test_state("COMPLETED", vec![paid]);
    let app = service!(state);

    let req = test::TestRequest::post()
      .uri("/api/v1/payments/initiate")
      .set_json(initiate_body("ORD-3"))
      .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 409);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "already_paid");
  }

  #[actix_web::test]
  async fn malformed_json_gets_error_body() {
    let (state, _) = test_state("COMPLETED", vec![]);
    let app = service!(state);

    let req = test::TestRequest::post()
      .uri("/api/v1/payments/initiate")
      .insert_header(ContentType::json())
      .set_payload("{not json")
      .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["field"], "body");
  }

  #[actix_web::test]
  async fn callback_get_marks_order_paid_and_signals_success() {
    let (state, store) = test_state("COMPLETED", vec![order("ORD-4")]);
    let app = service!(state);

    let req = test::TestRequest::post()
      .uri("/api/v1/payments/initiate")
      .set_json(initiate_body("ORD-4"))
      .to_request();
    let session: Value = test::call_and_read_body_json(&app, req).await;
    let tracking_id = session["orderTrackingId"].as_str().unwrap();

    let req = test::TestRequest::get()
      .uri(&format!(
        "/api/v1/payments/callback?OrderTrackingId={}&OrderMerchantReference=ORD-4",
        tracking_id
      ))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert_eq!(resp.headers().get("content-type").unwrap(), "text/html; charset=utf-8");
    let html = test::read_body(resp).await;
    assert!(std::str::from_utf8(&html).unwrap().contains(r#"postMessage("payment-success""#));

    let stored = store.find_by_public_id("ORD-4").await.unwrap().unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Paid);
  }

  #[actix_web::test]
  async fn callback_form_post_with_camel_case_names() {
    let (state, store) = test_state("PENDING", vec![order("ORD-5")]);
    let app = service!(state);

    let req = test::TestRequest::post()
      .uri("/api/v1/payments/initiate")
      .set_json(initiate_body("ORD-5"))
      .to_request();
    let session: Value = test::call_and_read_body_json(&app, req).await;
    let tracking_id = session["orderTrackingId"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
      .uri("/api/v1/payments/callback")
      .set_form([("orderTrackingId", tracking_id.as_str()), ("merchantReference", "ORD-5")])
      .to_request();
    let html = test::call_and_read_body(&app, req).await;

    assert!(std::str::from_utf8(&html).unwrap().contains("payment-pending"));
    let stored = store.find_by_public_id("ORD-5").await.unwrap().unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Pending);
  }

  #[actix_web::test]
  async fn callback_without_identifiers_signals_failure() {
    let (state, store) = test_state("COMPLETED", vec![order("ORD-6")]);
    let app = service!(state);

    let req = test::TestRequest::get().uri("/api/v1/payments/callback").to_request();
    let html = test::call_and_read_body(&app, req).await;

    assert!(std::str::from_utf8(&html).unwrap().contains("payment-failed"));
    let stored = store.find_by_public_id("ORD-6").await.unwrap().unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Pending);
  }

  #[actix_web::test]
  async fn status_endpoint_reports_and_404s() {
    let (state, _) = test_state("COMPLETED", vec![order("ORD-7")]);
    let app = service!(state);

    let req = test::TestRequest::get().uri("/api/v1/payments/status/ORD-7").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["orderId"], "ORD-7");
    assert_eq!(body["paymentStatus"], "pending");
    assert_eq!(body["totalAmount"], 1999.99);

    let req = test::TestRequest::get().uri("/api/v1/payments/status/ORD-missing").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);
  }

  #[actix_web::test]
  async fn health_and_metrics() {
    let (state, _) = test_state("COMPLETED", vec![order("ORD-8")]);
    let app = service!(state);

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ok");

    let req = test::TestRequest::post()
      .uri("/api/v1/payments/initiate")
      .set_json(initiate_body("ORD-8"))
      .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get().uri("/api/v1/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"), "{content_type}");
    let body = test::read_body(resp).await;
    let text = std::str::from_utf8(&body).unwrap();
    assert!(text.contains(r#"orderpay_initiations{stage="requested"} 1"#), "{text}");
    assert!(text.contains(r#"orderpay_initiations{stage="session_opened"} 1"#), "{text}");
  }
}
