// orderpay/src/flow/definition.rs

//! `Flow<TData, Err>`: step definitions and handler registration.

use crate::flow::context::FlowContext;
use crate::flow::control::StepControl;
use crate::flow::error::FlowError;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// A boxed step handler. It receives a clone of the flow context and resolves
/// to a [`StepControl`] or the flow's error type.
pub type Handler<TData, Err> =
  Box<dyn Fn(FlowContext<TData>) -> Pin<Box<dyn Future<Output = Result<StepControl, Err>> + Send>> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDef {
  pub name: String,
  /// An optional step without handlers is skipped instead of failing the run.
  pub optional: bool,
}

/// An ordered list of named steps over the context data `TData`.
///
/// `Err` is what handlers return; it must absorb [`FlowError`] so the engine can
/// report configuration problems through the same channel.
pub struct Flow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) name: &'static str,
  pub(crate) steps: Vec<StepDef>,
  pub(crate) on: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) after: HashMap<String, Vec<Handler<TData, Err>>>,
}

impl<TData, Err> Flow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// `steps` is a list of `(step_name, optional)` pairs in execution order.
  pub fn new(name: &'static str, steps: &[(&str, bool)]) -> Self {
    Self {
      name,
      steps: steps
        .iter()
        .map(|(step, optional)| StepDef {
          name: (*step).to_string(),
          optional: *optional,
        })
        .collect(),
      on: HashMap::new(),
      after: HashMap::new(),
    }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn steps(&self) -> &[StepDef] {
    &self.steps
  }

  fn ensure_step(&self, step_name: &str) -> Result<(), FlowError> {
    if self.steps.iter().any(|s| s.name == step_name) {
      Ok(())
    } else {
      Err(FlowError::StepNotFound {
        flow: self.name,
        step_name: step_name.to_string(),
      })
    }
  }

  fn wrap<F, E>(handler_fn: impl Fn(FlowContext<TData>) -> F + Send + Sync + 'static) -> Handler<TData, Err>
  where
    F: Future<Output = Result<StepControl, E>> + Send + 'static,
    E: Into<Err> + Send + 'static,
  {
    Box::new(move |ctx| {
      let fut = handler_fn(ctx);
      Box::pin(async move { fut.await.map_err(Into::into) })
    })
  }

  /// Registers the main handler(s) for a step.
  pub fn on_step<F, E>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(FlowContext<TData>) -> F + Send + Sync + 'static,
  ) -> Result<&mut Self, FlowError>
  where
    F: Future<Output = Result<StepControl, E>> + Send + 'static,
    E: Into<Err> + Send + 'static,
  {
    self.ensure_step(step_name)?;
    self
      .on
      .entry(step_name.to_string())
      .or_default()
      .push(Self::wrap(handler_fn));
    Ok(self)
  }

  /// Registers a handler that runs after every `on` handler of the step succeeded.
  pub fn after_step<F, E>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(FlowContext<TData>) -> F + Send + Sync + 'static,
  ) -> Result<&mut Self, FlowError>
  where
    F: Future<Output = Result<StepControl, E>> + Send + 'static,
    E: Into<Err> + Send + 'static,
  {
    self.ensure_step(step_name)?;
    self
      .after
      .entry(step_name.to_string())
      .or_default()
      .push(Self::wrap(handler_fn));
    Ok(self)
  }
}
