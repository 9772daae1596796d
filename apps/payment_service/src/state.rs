// apps/payment_service/src/state.rs
use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use orderpay::{
  register_payment_flows, FlowRegistry, OrderStore, PaymentGateway, PaymentMetrics, PaymentNotifier, PaymentServices,
  PaymentSettings,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub flows: Arc<FlowRegistry<AppError>>,
  pub payments: PaymentServices,
  pub config: Arc<AppConfig>,
}

impl AppState {
  /// Wires the chosen collaborators together and registers the payment flows.
  pub fn new(
    config: Arc<AppConfig>,
    store: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn PaymentNotifier>,
  ) -> Result<Self> {
    let flows = Arc::new(FlowRegistry::<AppError>::new());
    register_payment_flows(&flows)?;

    let metrics = PaymentMetrics::new().map_err(|e| AppError::Internal(format!("registering payment metrics: {}", e)))?;
    let payments = PaymentServices {
      store,
      gateway,
      notifier,
      metrics: Arc::new(metrics),
      settings: PaymentSettings {
        phone_country_code: config.phone_country_code.clone(),
        ..PaymentSettings::default()
      },
    };
    Ok(Self {
      flows,
      payments,
      config,
    })
  }
}
