// apps/payment_service/src/services/pesapal.rs

//! PesaPal API v3 client.
//!
//! <https://developer.pesapal.com/how-to-integrate/e-commerce/api-30-json/api-reference>
//!
//! Every failure is classified here into a [`GatewayError`] variant from the
//! transport error, the HTTP status and PesaPal's `error.code`.

use crate::config::PesapalConfig;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use orderpay::model::{AccessToken, GatewayPaymentRequest, PaymentSession, TransactionStatus};
use orderpay::{GatewayError, PaymentGateway};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// Tokens this close to expiry are refreshed instead of reused.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

pub struct PesapalGateway {
  client: reqwest::Client,
  config: PesapalConfig,
  currency: String,
  cached_token: Mutex<Option<AccessToken>>,
}

impl PesapalGateway {
  pub fn new(config: PesapalConfig, currency: String, timeout: Duration) -> anyhow::Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .context("building PesaPal HTTP client")?;
    Ok(Self {
      client,
      config,
      currency,
      cached_token: Mutex::new(None),
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/{}", self.config.base_url, path)
  }

  /// Reads the body and turns non-2xx or an `error` object into a classified error.
  async fn read<T>(response: reqwest::Response) -> Result<T, GatewayError>
  where
    T: for<'de> Deserialize<'de> + HasApiError,
  {
    let status = response.status();
    let text = response.text().await.map_err(classify_transport)?;
    let parsed = serde_json::from_str::<T>(&text);

    match parsed {
      Ok(body) => match (status.is_success(), body.api_error()) {
        (true, None) => Ok(body),
        (_, error) => Err(classify_api_error(status, error)),
      },
      Err(_) if !status.is_success() => Err(classify_api_error(status, None)),
      Err(e) => Err(GatewayError::Unknown(format!("unreadable PesaPal response: {}", e))),
    }
  }

  async fn request_token(&self) -> Result<AccessToken, GatewayError> {
    let response = self
      .client
      .post(self.url("api/Auth/RequestToken"))
      .json(&TokenRequest {
        consumer_key: &self.config.consumer_key,
        consumer_secret: &self.config.consumer_secret,
      })
      .send()
      .await
      .map_err(classify_transport)?;
    let body: TokenResponse = Self::read(response).await?;

    let token = body
      .token
      .filter(|t| !t.is_empty())
      .ok_or_else(|| GatewayError::Unknown("PesaPal returned no access token".to_string()))?;
    let expires_at = body
      .expiry_date
      .as_deref()
      .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
      .map(|d| d.with_timezone(&Utc));
    Ok(AccessToken { token, expires_at })
  }

  /// Drops `used` from the cache when PesaPal rejected it, so the next call
  /// requests a fresh token instead of reusing a revoked one.
  async fn forget_rejected_token<T>(&self, used: &AccessToken, result: Result<T, GatewayError>) -> Result<T, GatewayError> {
    if matches!(result, Err(GatewayError::InvalidCredentials(_))) {
      let mut cached = self.cached_token.lock().await;
      if cached.as_ref().is_some_and(|t| t.token == used.token) {
        warn!("PesaPal rejected the cached access token, evicting it");
        *cached = None;
      }
    }
    result
  }

  async fn submit_order(&self, token: &AccessToken, body: &SubmitOrderRequest<'_>) -> Result<PaymentSession, GatewayError> {
    let response = self
      .client
      .post(self.url("api/Transactions/SubmitOrderRequest"))
      .bearer_auth(&token.token)
      .json(body)
      .send()
      .await
      .map_err(classify_transport)?;
    let submitted: SubmitOrderResponse = Self::read(response).await?;

    match (submitted.redirect_url, submitted.order_tracking_id) {
      (Some(payment_url), Some(order_tracking_id)) => Ok(PaymentSession {
        payment_url,
        order_tracking_id,
      }),
      _ => Err(GatewayError::Unknown(
        "PesaPal response lacked a redirect url or tracking id".to_string(),
      )),
    }
  }

  async fn query_status(&self, order_tracking_id: &str, token: &AccessToken) -> Result<TransactionStatus, GatewayError> {
    let response = self
      .client
      .get(self.url("api/Transactions/GetTransactionStatus"))
      .query(&[("orderTrackingId", order_tracking_id)])
      .bearer_auth(&token.token)
      .send()
      .await
      .map_err(classify_transport)?;
    let body: TransactionStatusResponse = Self::read(response).await?;

    Ok(TransactionStatus {
      payment_status_description: body.payment_status_description.unwrap_or_default(),
      confirmation_code: body.confirmation_code.filter(|c| !c.is_empty()),
      payment_method: body.payment_method.filter(|m| !m.is_empty()),
    })
  }
}

#[async_trait]
impl PaymentGateway for PesapalGateway {
  fn name(&self) -> &'static str {
    "pesapal"
  }

  #[instrument(skip(self, request), fields(order_id = %request.order_id, amount = %request.amount))]
  async fn initiate(&self, request: &GatewayPaymentRequest) -> Result<PaymentSession, GatewayError> {
    let token = self.access_token().await?;
    let body = SubmitOrderRequest {
      id: &request.order_id,
      currency: &self.currency,
      amount: request.amount,
      description: &request.description,
      callback_url: &self.config.callback_url,
      notification_id: &self.config.ipn_id,
      billing_address: BillingAddress {
        email_address: &request.email,
        phone_number: &request.phone,
      },
    };

    let result = self.submit_order(&token, &body).await;
    self.forget_rejected_token(&token, result).await
  }

  #[instrument(skip(self))]
  async fn access_token(&self) -> Result<AccessToken, GatewayError> {
    let mut cached = self.cached_token.lock().await;
    let refresh_before = Utc::now() + ChronoDuration::seconds(TOKEN_REFRESH_MARGIN_SECS);
    if let Some(token) = cached.as_ref() {
      if token.expires_at.is_some_and(|at| at > refresh_before) {
        return Ok(token.clone());
      }
    }

    debug!("requesting PesaPal access token");
    let token = self.request_token().await?;
    *cached = Some(token.clone());
    Ok(token)
  }

  #[instrument(skip(self, token))]
  async fn transaction_status(
    &self,
    order_tracking_id: &str,
    token: &AccessToken,
  ) -> Result<TransactionStatus, GatewayError> {
    let result = self.query_status(order_tracking_id, token).await;
    self.forget_rejected_token(token, result).await
  }
}

fn classify_transport(err: reqwest::Error) -> GatewayError {
  if err.is_timeout() {
    GatewayError::Timeout(err.to_string())
  } else if err.is_connect() {
    GatewayError::Unreachable(err.to_string())
  } else {
    GatewayError::Unknown(err.to_string())
  }
}

fn classify_api_error(status: StatusCode, error: Option<&ApiError>) -> GatewayError {
  let code = error.and_then(|e| e.code.as_deref()).unwrap_or_default();
  let message = error
    .and_then(|e| e.message.as_deref())
    .filter(|m| !m.is_empty())
    .unwrap_or_else(|| status.canonical_reason().unwrap_or("no message"));
  let detail = format!("HTTP {} {}: {}", status.as_u16(), code, message);

  let classified = match code {
    "invalid_consumer_key_or_secret_provided" | "invalid_access_token" | "unauthorized" => {
      GatewayError::InvalidCredentials(detail)
    }
    "amount_exceeds_default_limit" => GatewayError::AmountLimitExceeded(detail),
    "" => match status {
      StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::InvalidCredentials(detail),
      StatusCode::GATEWAY_TIMEOUT | StatusCode::REQUEST_TIMEOUT => GatewayError::Timeout(detail),
      StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => GatewayError::Unreachable(detail),
      s if s.is_client_error() => GatewayError::Rejected(detail),
      _ => GatewayError::Unknown(detail),
    },
    _ => GatewayError::Rejected(detail),
  };
  warn!(kind = classified.kind(), error = %classified, "PesaPal request failed");
  classified
}

// --- Wire types ---

#[derive(Debug, Clone, Default, Deserialize)]
struct ApiError {
  code: Option<String>,
  message: Option<String>,
}

trait HasApiError {
  /// The `error` object when it actually carries a code or message; PesaPal
  /// sends one with all-null fields on success.
  fn api_error(&self) -> Option<&ApiError>;
}

fn meaningful(error: &Option<ApiError>) -> Option<&ApiError> {
  error.as_ref().filter(|e| {
    e.code.as_deref().is_some_and(|c| !c.is_empty()) || e.message.as_deref().is_some_and(|m| !m.is_empty())
  })
}

#[derive(Serialize)]
struct TokenRequest<'a> {
  consumer_key: &'a str,
  consumer_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
  token: Option<String>,
  #[serde(rename = "expiryDate")]
  expiry_date: Option<String>,
  error: Option<ApiError>,
}

impl HasApiError for TokenResponse {
  fn api_error(&self) -> Option<&ApiError> {
    meaningful(&self.error)
  }
}

#[derive(Serialize)]
struct SubmitOrderRequest<'a> {
  id: &'a str,
  currency: &'a str,
  #[serde(with = "rust_decimal::serde::float")]
  amount: Decimal,
  description: &'a str,
  callback_url: &'a str,
  notification_id: &'a str,
  billing_address: BillingAddress<'a>,
}

#[derive(Serialize)]
struct BillingAddress<'a> {
  email_address: &'a str,
  phone_number: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitOrderResponse {
  order_tracking_id: Option<String>,
  redirect_url: Option<String>,
  error: Option<ApiError>,
}

impl HasApiError for SubmitOrderResponse {
  fn api_error(&self) -> Option<&ApiError> {
    meaningful(&self.error)
  }
}

#[derive(Debug, Deserialize)]
struct TransactionStatusResponse {
  payment_status_description: Option<String>,
  confirmation_code: Option<String>,
  payment_method: Option<String>,
  error: Option<ApiError>,
}

impl HasApiError for TransactionStatusResponse {
  fn api_error(&self) -> Option<&ApiError> {
    meaningful(&self.error)
  }
}
