// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use orderpay::model::{AccessToken, GatewayPaymentRequest, Order, PaymentMethod, PaymentSession, TransactionStatus};
use orderpay::{
  FlowRegistry, GatewayError, InMemoryOrderStore, OrderStore, PaymentError, PaymentGateway, PaymentMetrics,
  PaymentNotifier, PaymentRequest, PaymentServices, PaymentSettings,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::Level;

// --- Tracing ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Scripted gateway ---

/// A gateway whose answers are set by the test. Every call is counted.
pub struct ScriptedGateway {
  initiate_calls: AtomicUsize,
  token_calls: AtomicUsize,
  status_calls: AtomicUsize,
  initiate_result: Mutex<Result<PaymentSession, GatewayError>>,
  token_result: Mutex<Result<AccessToken, GatewayError>>,
  status_result: Mutex<Result<TransactionStatus, GatewayError>>,
  status_by_tracking_id: Mutex<HashMap<String, TransactionStatus>>,
  initiate_delay: Mutex<Option<std::time::Duration>>,
  last_request: Mutex<Option<GatewayPaymentRequest>>,
}

impl ScriptedGateway {
  pub fn new() -> Self {
    Self {
      initiate_calls: AtomicUsize::new(0),
      token_calls: AtomicUsize::new(0),
      status_calls: AtomicUsize::new(0),
      initiate_result: Mutex::new(Ok(session("trk-1"))),
      token_result: Mutex::new(Ok(AccessToken {
        token: "token-1".to_string(),
        expires_at: Some(Utc::now() + Duration::minutes(5)),
      })),
      status_result: Mutex::new(Ok(transaction("COMPLETED"))),
      status_by_tracking_id: Mutex::new(HashMap::new()),
      initiate_delay: Mutex::new(None),
      last_request: Mutex::new(None),
    }
  }

  pub fn initiate_returns(&self, result: Result<PaymentSession, GatewayError>) {
    *self.initiate_result.lock() = result;
  }

  pub fn token_returns(&self, result: Result<AccessToken, GatewayError>) {
    *self.token_result.lock() = result;
  }

  pub fn status_returns(&self, result: Result<TransactionStatus, GatewayError>) {
    *self.status_result.lock() = result;
  }

  /// Status reported for one tracking id, overriding `status_returns`.
  pub fn status_for(&self, tracking_id: &str, status: TransactionStatus) {
    self.status_by_tracking_id.lock().insert(tracking_id.to_string(), status);
  }

  pub fn delay_initiation(&self, delay: std::time::Duration) {
    *self.initiate_delay.lock() = Some(delay);
  }

  pub fn initiations(&self) -> usize {
    self.initiate_calls.load(Ordering::SeqCst)
  }

  pub fn token_requests(&self) -> usize {
    self.token_calls.load(Ordering::SeqCst)
  }

  pub fn status_queries(&self) -> usize {
    self.status_calls.load(Ordering::SeqCst)
  }

  pub fn last_request(&self) -> Option<GatewayPaymentRequest> {
    self.last_request.lock().clone()
  }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
  fn name(&self) -> &'static str {
    "scripted"
  }

  async fn initiate(&self, request: &GatewayPaymentRequest) -> Result<PaymentSession, GatewayError> {
    self.initiate_calls.fetch_add(1, Ordering::SeqCst);
    *self.last_request.lock() = Some(request.clone());
    let delay = *self.initiate_delay.lock();
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }
    self.initiate_result.lock().clone()
  }

  async fn access_token(&self) -> Result<AccessToken, GatewayError> {
    self.token_calls.fetch_add(1, Ordering::SeqCst);
    self.token_result.lock().clone()
  }

  async fn transaction_status(
    &self,
    order_tracking_id: &str,
    _token: &AccessToken,
  ) -> Result<TransactionStatus, GatewayError> {
    self.status_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(status) = self.status_by_tracking_id.lock().get(order_tracking_id) {
      return Ok(status.clone());
    }
    self.status_result.lock().clone()
  }
}

pub fn session(tracking_id: &str) -> PaymentSession {
  PaymentSession {
    payment_url: format!("https://pay.example.test/checkout?OrderTrackingId={}", tracking_id),
    order_tracking_id: tracking_id.to_string(),
  }
}

pub fn transaction(description: &str) -> TransactionStatus {
  TransactionStatus {
    payment_status_description: description.to_string(),
    confirmation_code: Some("QK12ABC".to_string()),
    payment_method: Some("M-Pesa".to_string()),
  }
}

// --- Recording notifier ---

#[derive(Default)]
pub struct RecordingNotifier {
  pub confirmed: Mutex<Vec<String>>,
  pub failed: Mutex<Vec<String>>,
}

#[async_trait]
impl PaymentNotifier for RecordingNotifier {
  async fn payment_confirmed(&self, order: &Order) -> anyhow::Result<()> {
    self.confirmed.lock().push(order.order_number.clone());
    Ok(())
  }

  async fn payment_failed(&self, order: &Order) -> anyhow::Result<()> {
    self.failed.lock().push(order.order_number.clone());
    Ok(())
  }
}

// --- Harness ---

pub struct Harness {
  pub registry: FlowRegistry<PaymentError>,
  pub services: PaymentServices,
  pub store: Arc<InMemoryOrderStore>,
  pub gateway: Arc<ScriptedGateway>,
  pub notifier: Arc<RecordingNotifier>,
  pub metrics: Arc<PaymentMetrics>,
}

impl Harness {
  pub fn new(orders: Vec<Order>) -> Self {
    setup_tracing();
    let store = Arc::new(InMemoryOrderStore::with_orders(orders));
    let gateway = Arc::new(ScriptedGateway::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let metrics = Arc::new(PaymentMetrics::new().expect("metrics register"));
    let services = PaymentServices {
      store: store.clone(),
      gateway: gateway.clone(),
      notifier: notifier.clone(),
      metrics: metrics.clone(),
      settings: PaymentSettings::default(),
    };
    let registry = FlowRegistry::<PaymentError>::new();
    orderpay::register_payment_flows(&registry).expect("payment flows register");
    Self {
      registry,
      services,
      store,
      gateway,
      notifier,
      metrics,
    }
  }

  pub async fn order(&self, order_id: &str) -> Order {
    self
      .store
      .find_by_public_id(order_id)
      .await
      .expect("store read")
      .expect("order exists")
  }

  /// Puts an order into `processing` with the given tracking id, as a
  /// successful initiation would.
  pub async fn start_payment(&self, order_id: &str, tracking_id: &str) -> Order {
    self.gateway.initiate_returns(Ok(session(tracking_id)));
    orderpay::initiate_payment(&self.registry, &self.services, payment_request(order_id))
      .await
      .expect("initiation succeeds");
    self.order(order_id).await
  }
}

pub const ORDER_TOTAL: Decimal = dec!(2500.00);

pub fn pending_order(order_id: &str) -> Order {
  Order::place(order_id, ORDER_TOTAL, PaymentMethod::Pesapal, Utc::now())
}

pub fn payment_request(order_id: &str) -> PaymentRequest {
  PaymentRequest {
    order_id: order_id.to_string(),
    amount: ORDER_TOTAL,
    phone: "0712345678".to_string(),
    email: "jane@example.com".to_string(),
    description: None,
  }
}
