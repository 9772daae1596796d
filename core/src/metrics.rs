// orderpay/src/metrics.rs

//! Payment counters. One instance is created at startup and shared through
//! [`crate::payments::PaymentServices`]. Each instance registers its counters
//! in its own [`Registry`], which the service exposes for scraping.

use crate::error::GatewayError;
use crate::model::CallbackSignal;
use prometheus::{IntCounterVec, Opts, Registry};

/// Label values of `orderpay_initiations`.
pub const REQUESTED: &str = "requested";
pub const REJECTED: &str = "rejected";
pub const SESSION_OPENED: &str = "session_opened";

pub struct PaymentMetrics {
  registry: Registry,
  initiations: IntCounterVec,
  gateway_failures: IntCounterVec,
  callbacks: IntCounterVec,
}

fn signal_label(signal: CallbackSignal) -> &'static str {
  match signal {
    CallbackSignal::Success => "success",
    CallbackSignal::Pending => "pending",
    CallbackSignal::Failed => "failed",
  }
}

impl PaymentMetrics {
  pub fn new() -> prometheus::Result<Self> {
    let registry = Registry::new_custom(Some("orderpay".to_string()), None)?;

    let initiations = IntCounterVec::new(
      Opts::new("initiations", "Payment initiation requests by stage reached."),
      &["stage"],
    )?;
    registry.register(Box::new(initiations.clone()))?;

    let gateway_failures = IntCounterVec::new(
      Opts::new("gateway_failures", "Failed gateway initiations by classified error kind."),
      &["kind"],
    )?;
    registry.register(Box::new(gateway_failures.clone()))?;

    let callbacks = IntCounterVec::new(
      Opts::new("callbacks", "Reconciled gateway callbacks by signal returned to the customer."),
      &["signal"],
    )?;
    registry.register(Box::new(callbacks.clone()))?;

    Ok(Self {
      registry,
      initiations,
      gateway_failures,
      callbacks,
    })
  }

  pub fn registry(&self) -> &Registry {
    &self.registry
  }

  pub fn initiation_requested(&self) {
    self.initiations.with_label_values(&[REQUESTED]).inc();
  }

  /// Validation failures, unknown orders and duplicate-payment conflicts.
  pub fn initiation_rejected(&self) {
    self.initiations.with_label_values(&[REJECTED]).inc();
  }

  pub fn session_opened(&self) {
    self.initiations.with_label_values(&[SESSION_OPENED]).inc();
  }

  pub fn gateway_failure(&self, error: &GatewayError) {
    self.gateway_failures.with_label_values(&[error.kind()]).inc();
  }

  pub fn callback(&self, signal: CallbackSignal) {
    self.callbacks.with_label_values(&[signal_label(signal)]).inc();
  }

  pub fn initiations(&self, stage: &str) -> u64 {
    self.initiations.with_label_values(&[stage]).get()
  }

  pub fn gateway_failures(&self, kind: &str) -> u64 {
    self.gateway_failures.with_label_values(&[kind]).get()
  }

  pub fn callbacks(&self, signal: CallbackSignal) -> u64 {
    self.callbacks.with_label_values(&[signal_label(signal)]).get()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn counters_are_labelled_by_kind() {
    let metrics = PaymentMetrics::new().unwrap();
    metrics.gateway_failure(&GatewayError::Timeout("slow".into()));
    metrics.gateway_failure(&GatewayError::Rejected("bad".into()));
    metrics.gateway_failure(&GatewayError::Rejected("worse".into()));
    metrics.callback(CallbackSignal::Pending);

    assert_eq!(metrics.gateway_failures("timeout"), 1);
    assert_eq!(metrics.gateway_failures("rejected"), 2);
    assert_eq!(metrics.gateway_failures("unknown"), 0);
    assert_eq!(metrics.callbacks(CallbackSignal::Pending), 1);
    assert_eq!(metrics.callbacks(CallbackSignal::Success), 0);
  }

  #[test]
  fn registry_gathers_prefixed_families() {
    let metrics = PaymentMetrics::new().unwrap();
    metrics.initiation_requested();
    metrics.callback(CallbackSignal::Success);

    let names: Vec<String> = metrics
      .registry()
      .gather()
      .iter()
      .map(|family| family.get_name().to_string())
      .collect();
    assert!(names.contains(&"orderpay_initiations".to_string()), "{names:?}");
    assert!(names.contains(&"orderpay_callbacks".to_string()), "{names:?}");
  }

  #[test]
  fn instances_do_not_share_counts() {
    let first = PaymentMetrics::new().unwrap();
    let second = PaymentMetrics::new().unwrap();
    first.session_opened();
    assert_eq!(first.initiations(SESSION_OPENED), 1);
    assert_eq!(second.initiations(SESSION_OPENED), 0);
  }
}
