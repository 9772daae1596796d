// apps/payment_service/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
  Postgres,
  Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayBackend {
  Pesapal,
  Mock,
}

/// PesaPal merchant settings. Only required when `PAYMENT_GATEWAY=pesapal`.
#[derive(Clone)]
pub struct PesapalConfig {
  pub base_url: String,
  pub consumer_key: String,
  pub consumer_secret: String,
  /// Registered IPN (instant payment notification) id.
  pub ipn_id: String,
  pub callback_url: String,
}

impl fmt::Debug for PesapalConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PesapalConfig")
      .field("base_url", &self.base_url)
      .field("consumer_key", &"[REDACTED]")
      .field("consumer_secret", &"[REDACTED]")
      .field("ipn_id", &self.ipn_id)
      .field("callback_url", &self.callback_url)
      .finish()
  }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub app_base_url: String,

  pub store_backend: StoreBackend,
  pub database_url: Option<String>,

  pub gateway: GatewayBackend,
  pub pesapal: Option<PesapalConfig>,
  pub gateway_timeout: Duration,
  pub payment_currency: String,
  pub phone_country_code: String,

  /// Status the mock gateway reports on callback (`COMPLETED`, `PENDING`, ...).
  pub mock_gateway_status: String,
  pub mock_email_sender: String,

  pub seed_db: bool,
  pub log_json: bool,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present
    Self::from_lookup(|name| env::var(name).ok())
  }

  /// Builds the config from any variable source; `from_env` passes the process
  /// environment.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let get_env = |var_name: &str| {
      lookup(var_name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("Missing environment variable '{}'", var_name)))
    };
    let parse_bool = |var_name: &str| -> Result<bool> {
      get_env(var_name)
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .map_err(|e| AppError::Config(format!("Invalid {} value: {}", var_name, e)))
    };

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let server_port = get_env("SERVER_PORT")
      .unwrap_or_else(|_| "8080".to_string())
      .parse::<u16>()
      .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?;
    let app_base_url = get_env("APP_BASE_URL")
      .unwrap_or_else(|_| format!("http://{}:{}", server_host, server_port))
      .trim_end_matches('/')
      .to_string();

    let store_backend = match get_env("STORE_BACKEND")
      .unwrap_or_else(|_| "postgres".to_string())
      .to_ascii_lowercase()
      .as_str()
    {
      "postgres" => StoreBackend::Postgres,
      "memory" => StoreBackend::Memory,
      other => return Err(AppError::Config(format!("Invalid STORE_BACKEND '{}': expected postgres or memory", other))),
    };
    let database_url = match store_backend {
      StoreBackend::Postgres => Some(get_env("DATABASE_URL")?),
      StoreBackend::Memory => get_env("DATABASE_URL").ok(),
    };

    let gateway = match get_env("PAYMENT_GATEWAY")
      .unwrap_or_else(|_| "mock".to_string())
      .to_ascii_lowercase()
      .as_str()
    {
      "pesapal" => GatewayBackend::Pesapal,
      "mock" => GatewayBackend::Mock,
      other => return Err(AppError::Config(format!("Invalid PAYMENT_GATEWAY '{}': expected pesapal or mock", other))),
    };
    let pesapal = match gateway {
      GatewayBackend::Pesapal => Some(PesapalConfig {
        base_url: get_env("PESAPAL_BASE_URL")
          .unwrap_or_else(|_| "https://cybqa.pesapal.com/pesapalv3".to_string())
          .trim_end_matches('/')
          .to_string(),
        consumer_key: get_env("PESAPAL_CONSUMER_KEY")?,
        consumer_secret: get_env("PESAPAL_CONSUMER_SECRET")?,
        ipn_id: get_env("PESAPAL_IPN_ID")?,
        callback_url: get_env("PESAPAL_CALLBACK_URL")
          .unwrap_or_else(|_| format!("{}/api/v1/payments/callback", app_base_url)),
      }),
      GatewayBackend::Mock => None,
    };

    let gateway_timeout = get_env("GATEWAY_TIMEOUT_SECS")
      .unwrap_or_else(|_| "30".to_string())
      .parse::<u64>()
      .map(Duration::from_secs)
      .map_err(|e| AppError::Config(format!("Invalid GATEWAY_TIMEOUT_SECS: {}", e)))?;
    let payment_currency = get_env("PAYMENT_CURRENCY").unwrap_or_else(|_| "KES".to_string());
    let phone_country_code = get_env("PHONE_COUNTRY_CODE").unwrap_or_else(|_| "254".to_string());
    if !phone_country_code.chars().all(|c| c.is_ascii_digit()) {
      return Err(AppError::Config(format!("Invalid PHONE_COUNTRY_CODE '{}'", phone_country_code)));
    }

    let mock_gateway_status = get_env("MOCK_GATEWAY_STATUS").unwrap_or_else(|_| "COMPLETED".to_string());
    let mock_email_sender = get_env("MOCK_EMAIL_SENDER").unwrap_or_else(|_| "noreply@example.com".to_string());

    let seed_db = parse_bool("SEED_DB")?;
    let log_json = get_env("LOG_FORMAT")
      .map(|v| v.eq_ignore_ascii_case("json"))
      .unwrap_or(false);

    Ok(Self {
      server_host,
      server_port,
      app_base_url,
      store_backend,
      database_url,
      gateway,
      pesapal,
      gateway_timeout,
      payment_currency,
      phone_country_code,
      mock_gateway_status,
      mock_email_sender,
      seed_db,
      log_json,
    })
  }
}
