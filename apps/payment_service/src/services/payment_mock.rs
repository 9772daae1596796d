// apps/payment_service/src/services/payment_mock.rs

//! A stand-in gateway for local runs. The checkout URL points straight back at
//! this service's callback, so a browser completes the round trip without an
//! external provider.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use orderpay::model::{AccessToken, GatewayPaymentRequest, PaymentSession, TransactionStatus};
use orderpay::{GatewayError, PaymentGateway};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Per-transaction ceiling of the mock, modelled on the mobile-money limit.
const MOCK_AMOUNT_LIMIT: Decimal = Decimal::from_parts(150_000, 0, 0, false, 0);

#[derive(Debug, Clone)]
pub struct MockGateway {
  callback_url: String,
  reported_status: String,
  latency: Duration,
}

impl MockGateway {
  pub fn new(app_base_url: &str, reported_status: impl Into<String>) -> Self {
    Self {
      callback_url: format!("{}/api/v1/payments/callback", app_base_url.trim_end_matches('/')),
      reported_status: reported_status.into(),
      latency: Duration::from_millis(50),
    }
  }

  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = latency;
    self
  }
}

#[async_trait]
impl PaymentGateway for MockGateway {
  fn name(&self) -> &'static str {
    "mock"
  }

  #[instrument(skip(self, request), fields(order_id = %request.order_id, amount = %request.amount))]
  async fn initiate(&self, request: &GatewayPaymentRequest) -> Result<PaymentSession, GatewayError> {
    info!("Simulating creation of gateway checkout session");
    tokio::time::sleep(self.latency).await; // Simulate network latency

    if request.amount > MOCK_AMOUNT_LIMIT {
      return Err(GatewayError::AmountLimitExceeded(format!(
        "mock limit is {}, requested {}",
        MOCK_AMOUNT_LIMIT, request.amount
      )));
    }

    let order_tracking_id = format!("mock_trk_{}", Uuid::new_v4().simple());
    Ok(PaymentSession {
      payment_url: format!(
        "{}?OrderTrackingId={}&OrderMerchantReference={}",
        self.callback_url, order_tracking_id, request.order_id
      ),
      order_tracking_id,
    })
  }

  async fn access_token(&self) -> Result<AccessToken, GatewayError> {
    Ok(AccessToken {
      token: format!("mock_token_{}", Uuid::new_v4().simple()),
      expires_at: Some(Utc::now() + ChronoDuration::minutes(5)),
    })
  }

  #[instrument(skip(self, _token))]
  async fn transaction_status(
    &self,
    order_tracking_id: &str,
    _token: &AccessToken,
  ) -> Result<TransactionStatus, GatewayError> {
    tokio::time::sleep(self.latency).await;
    info!(status = %self.reported_status, "Simulated gateway status");
    Ok(TransactionStatus {
      payment_status_description: self.reported_status.clone(),
      confirmation_code: Some(
        order_tracking_id
          .trim_start_matches("mock_trk_")
          .chars()
          .take(10)
          .collect::<String>()
          .to_uppercase(),
      ),
      payment_method: Some("mock".to_string()),
    })
  }
}
