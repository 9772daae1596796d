// orderpay/src/flow/registry.rs

//! `FlowRegistry<AppErr>`: flows keyed by the type of their context data, so a
//! caller only needs to build the right context to run the right flow.

use crate::flow::context::FlowContext;
use crate::flow::control::FlowOutcome;
use crate::flow::definition::Flow;
use crate::flow::error::FlowError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{event, Level};

#[async_trait]
trait ErasedFlow<AppErr>: Send + Sync {
  fn name(&self) -> &'static str;

  async fn run_erased(&self, ctx: Box<dyn Any + Send>) -> Result<FlowOutcome, AppErr>;
}

struct TypedFlow<TData, Err, AppErr>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  flow: Flow<TData, Err>,
  _app_err: PhantomData<fn() -> AppErr>,
}

#[async_trait]
impl<TData, Err, AppErr> ErasedFlow<AppErr> for TypedFlow<TData, Err, AppErr>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
  AppErr: From<Err> + From<FlowError> + Send + 'static,
{
  fn name(&self) -> &'static str {
    self.flow.name()
  }

  async fn run_erased(&self, ctx: Box<dyn Any + Send>) -> Result<FlowOutcome, AppErr> {
    let ctx = ctx
      .downcast::<FlowContext<TData>>()
      .map_err(|_| FlowError::TypeMismatch {
        expected_type: std::any::type_name::<FlowContext<TData>>(),
      })?;
    self.flow.run(*ctx).await.map_err(AppErr::from)
  }
}

/// Registry of flows, returning `AppErr` from every run.
pub struct FlowRegistry<AppErr> {
  flows: RwLock<HashMap<TypeId, Arc<dyn ErasedFlow<AppErr>>>>,
}

impl<AppErr> Default for FlowRegistry<AppErr> {
  fn default() -> Self {
    Self {
      flows: RwLock::new(HashMap::new()),
    }
  }
}

impl<AppErr> FlowRegistry<AppErr>
where
  AppErr: From<FlowError> + Send + 'static,
{
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers `flow` for the context type `TData`, replacing any flow
  /// previously registered for it.
  pub fn register<TData, Err>(&self, flow: Flow<TData, Err>)
  where
    TData: 'static + Send + Sync,
    Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
    AppErr: From<Err>,
  {
    event!(Level::DEBUG, flow = flow.name(), context = std::any::type_name::<TData>(), "registering flow");
    let erased: Arc<dyn ErasedFlow<AppErr>> = Arc::new(TypedFlow {
      flow,
      _app_err: PhantomData,
    });
    if let Some(previous) = self.flows.write().insert(TypeId::of::<TData>(), erased) {
      event!(Level::WARN, flow = previous.name(), "replaced previously registered flow");
    }
  }

  pub fn is_registered<TData: 'static>(&self) -> bool {
    self.flows.read().contains_key(&TypeId::of::<TData>())
  }

  /// Runs the flow registered for `TData`. The context is shared, so the caller
  /// can read results from its own clone afterwards.
  pub async fn run<TData>(&self, ctx: FlowContext<TData>) -> Result<FlowOutcome, AppErr>
  where
    TData: 'static + Send + Sync,
  {
    let flow = self.flows.read().get(&TypeId::of::<TData>()).cloned();
    let flow = flow.ok_or_else(|| {
      let type_name = std::any::type_name::<TData>();
      event!(Level::ERROR, context = type_name, "no flow registered");
      AppErr::from(FlowError::NotRegistered { type_name })
    })?;
    flow.run_erased(Box::new(ctx)).await
  }
}
