// tests/initiation_tests.rs
mod common;

use common::*;
use orderpay::metrics::{REJECTED, REQUESTED, SESSION_OPENED};
use orderpay::{initiate_payment, ConflictReason, GatewayError, PaymentError, PaymentStatus};
use rust_decimal_macros::dec;
use std::time::Duration;

#[tokio::test]
async fn successful_initiation_leaves_order_processing_with_tracking_id() {
  let h = Harness::new(vec![pending_order("ORD-100")]);
  h.gateway.initiate_returns(Ok(session("trk-100")));

  let session = initiate_payment(&h.registry, &h.services, payment_request("ORD-100"))
    .await
    .expect("initiation succeeds");

  assert_eq!(session.order_tracking_id, "trk-100");
  assert!(session.payment_url.contains("trk-100"));

  let order = h.order("ORD-100").await;
  assert_eq!(order.payment_status, PaymentStatus::Processing);
  assert_eq!(order.payment_tracking_id.as_deref(), Some("trk-100"));
  assert!(order.payment_initiated_at.is_some());
  assert_eq!(order.customer_phone.as_deref(), Some("+254712345678"));
  assert_eq!(order.customer_email.as_deref(), Some("jane@example.com"));
  assert!(order.activity_log.iter().any(|a| a.action == "payment_initiated"));
  assert!(order.activity_log.iter().any(|a| a.action == "payment_session_opened"));

  let sent = h.gateway.last_request().expect("gateway was called");
  assert_eq!(sent.phone, "+254712345678");
  assert_eq!(sent.description, "Payment for order ORD-100");

  assert_eq!(h.metrics.initiations(REQUESTED), 1);
  assert_eq!(h.metrics.initiations(SESSION_OPENED), 1);
}

#[tokio::test]
async fn paid_order_is_refused_without_calling_gateway() {
  let mut order = pending_order("ORD-101");
  order.payment_status = PaymentStatus::Paid;
  let h = Harness::new(vec![order]);

  let err = initiate_payment(&h.registry, &h.services, payment_request("ORD-101"))
    .await
    .unwrap_err();

  assert!(matches!(err, PaymentError::Conflict(ConflictReason::AlreadyPaid)), "got {err:?}");
  assert_eq!(err.status_code(), 409);
  assert_eq!(h.gateway.initiations(), 0);
  assert_eq!(h.order("ORD-101").await.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn order_in_processing_is_refused() {
  let h = Harness::new(vec![pending_order("ORD-102")]);
  h.start_payment("ORD-102", "trk-102").await;

  let err = initiate_payment(&h.registry, &h.services, payment_request("ORD-102"))
    .await
    .unwrap_err();

  assert!(matches!(err, PaymentError::Conflict(ConflictReason::AlreadyProcessing)), "got {err:?}");
  assert_eq!(h.gateway.initiations(), 1);
  let order = h.order("ORD-102").await;
  assert_eq!(order.payment_status, PaymentStatus::Processing);
  assert_eq!(order.payment_tracking_id.as_deref(), Some("trk-102"));
}

#[tokio::test]
async fn cancelled_order_is_not_payable() {
  let mut order = pending_order("ORD-103");
  order.payment_status = PaymentStatus::Cancelled;
  let h = Harness::new(vec![order]);

  let err = initiate_payment(&h.registry, &h.services, payment_request("ORD-103"))
    .await
    .unwrap_err();

  assert!(
    matches!(err, PaymentError::Conflict(ConflictReason::NotPayable(PaymentStatus::Cancelled))),
    "got {err:?}"
  );
  assert_eq!(h.gateway.initiations(), 0);
}

#[tokio::test]
async fn gateway_failure_marks_order_failed_and_keeps_the_error() {
  let h = Harness::new(vec![pending_order("ORD-104")]);
  h.gateway
    .initiate_returns(Err(GatewayError::InvalidCredentials("invalid_consumer_key_or_secret_provided".to_string())));

  let err = initiate_payment(&h.registry, &h.services, payment_request("ORD-104"))
    .await
    .unwrap_err();

  assert!(matches!(err, PaymentError::Gateway(GatewayError::InvalidCredentials(_))), "got {err:?}");
  assert_eq!(err.status_code(), 500);

  let order = h.order("ORD-104").await;
  assert_eq!(order.payment_status, PaymentStatus::Failed);
  assert!(order.payment_failed_at.is_some());
  assert!(order
    .payment_error
    .as_deref()
    .is_some_and(|e| e.contains("invalid_consumer_key_or_secret_provided")));
  assert!(order.activity_log.iter().any(|a| a.action == "payment_failed"));
  assert_eq!(h.metrics.gateway_failures("invalid_credentials"), 1);
}

#[tokio::test]
async fn gateway_timeout_maps_to_gateway_timeout_status() {
  let h = Harness::new(vec![pending_order("ORD-105")]);
  h.gateway.initiate_returns(Err(GatewayError::Timeout("30s elapsed".to_string())));

  let err = initiate_payment(&h.registry, &h.services, payment_request("ORD-105"))
    .await
    .unwrap_err();

  assert_eq!(err.status_code(), 504);
  assert_eq!(h.order("ORD-105").await.payment_status, PaymentStatus::Failed);
  assert_eq!(h.metrics.gateway_failures("timeout"), 1);
}

#[tokio::test]
async fn empty_tracking_id_is_treated_as_gateway_failure() {
  let h = Harness::new(vec![pending_order("ORD-106")]);
  h.gateway.initiate_returns(Ok(session("   ")));

  let err = initiate_payment(&h.registry, &h.services, payment_request("ORD-106"))
    .await
    .unwrap_err();

  assert!(matches!(err, PaymentError::Gateway(GatewayError::Unknown(_))), "got {err:?}");
  let order = h.order("ORD-106").await;
  assert_eq!(order.payment_status, PaymentStatus::Failed);
  assert_eq!(order.payment_tracking_id, None);
}

#[tokio::test]
async fn failed_order_can_be_retried() {
  let h = Harness::new(vec![pending_order("ORD-107")]);
  h.gateway.initiate_returns(Err(GatewayError::Unreachable("connection refused".to_string())));
  initiate_payment(&h.registry, &h.services, payment_request("ORD-107"))
    .await
    .unwrap_err();
  assert_eq!(h.order("ORD-107").await.payment_status, PaymentStatus::Failed);

  h.gateway.initiate_returns(Ok(session("trk-107b")));
  initiate_payment(&h.registry, &h.services, payment_request("ORD-107"))
    .await
    .expect("retry succeeds");

  let order = h.order("ORD-107").await;
  assert_eq!(order.payment_status, PaymentStatus::Processing);
  assert_eq!(order.payment_tracking_id.as_deref(), Some("trk-107b"));
  assert_eq!(order.payment_error, None);
  assert_eq!(h.gateway.initiations(), 2);
}

#[tokio::test]
async fn invalid_request_is_rejected_before_any_write() {
  let h = Harness::new(vec![pending_order("ORD-108")]);
  let before = h.order("ORD-108").await;

  let mut request = payment_request("ORD-108");
  request.email = "not-an-email".to_string();
  let err = initiate_payment(&h.registry, &h.services, request).await.unwrap_err();

  assert_eq!(err.field(), Some("email"));
  assert_eq!(err.status_code(), 400);
  assert_eq!(h.order("ORD-108").await, before);
  assert_eq!(h.gateway.initiations(), 0);
  assert_eq!(h.metrics.initiations(REJECTED), 1);
}

#[tokio::test]
async fn unknown_order_is_not_found() {
  let h = Harness::new(vec![]);

  let err = initiate_payment(&h.registry, &h.services, payment_request("ORD-404"))
    .await
    .unwrap_err();

  assert!(matches!(err, PaymentError::NotFound(ref id) if id == "ORD-404"), "got {err:?}");
  assert_eq!(err.status_code(), 404);
  assert_eq!(h.gateway.initiations(), 0);
}

#[tokio::test]
async fn amount_must_match_order_total() {
  let h = Harness::new(vec![pending_order("ORD-109")]);
  let mut request = payment_request("ORD-109");
  request.amount = dec!(10.00);

  let err = initiate_payment(&h.registry, &h.services, request).await.unwrap_err();

  assert_eq!(err.field(), Some("amount"));
  assert_eq!(h.order("ORD-109").await.payment_status, PaymentStatus::Pending);
  assert_eq!(h.gateway.initiations(), 0);
}

#[tokio::test]
async fn amount_with_different_scale_matches_total() {
  let h = Harness::new(vec![pending_order("ORD-110")]);
  let mut request = payment_request("ORD-110");
  request.amount = dec!(2500);

  initiate_payment(&h.registry, &h.services, request)
    .await
    .expect("2500 equals 2500.00");
}

#[tokio::test]
async fn concurrent_initiations_open_exactly_one_session() {
  let h = Harness::new(vec![pending_order("ORD-111")]);
  h.gateway.delay_initiation(Duration::from_millis(50));

  let (first, second) = tokio::join!(
    initiate_payment(&h.registry, &h.services, payment_request("ORD-111")),
    initiate_payment(&h.registry, &h.services, payment_request("ORD-111")),
  );

  let successes = [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count();
  assert_eq!(successes, 1);
  let loser = first.err().or(second.err()).expect("one attempt lost");
  assert!(matches!(loser, PaymentError::Conflict(ConflictReason::AlreadyProcessing)), "got {loser:?}");
  assert_eq!(h.gateway.initiations(), 1);
  assert_eq!(h.order("ORD-111").await.payment_status, PaymentStatus::Processing);
}
