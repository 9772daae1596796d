// orderpay/src/flow/error.rs
use thiserror::Error;

/// Errors raised by the flow engine itself, as opposed to errors returned by
/// step handlers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlowError {
  #[error("step '{step_name}' is not defined in flow '{flow}'")]
  StepNotFound { flow: &'static str, step_name: String },

  #[error("required step '{step_name}' in flow '{flow}' has no handlers")]
  HandlerMissing { flow: &'static str, step_name: String },

  #[error("no flow registered for context type {type_name}")]
  NotRegistered { type_name: &'static str },

  #[error("context type mismatch while dispatching flow (expected {expected_type})")]
  TypeMismatch { expected_type: &'static str },
}
