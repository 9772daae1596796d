// orderpay/src/flow/execution.rs

use crate::flow::context::FlowContext;
use crate::flow::control::{FlowOutcome, StepControl};
use crate::flow::definition::{Flow, Handler};
use crate::flow::error::FlowError;
use tracing::{event, instrument, Instrument, Level};

enum Phase {
  Proceed,
  Halted,
}

impl<TData, Err> Flow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Runs every step in order against `ctx`.
  ///
  /// The first handler error aborts the run and is returned as-is. A required
  /// step with no handlers fails with [`FlowError::HandlerMissing`].
  #[instrument(name = "Flow::run", skip_all, fields(flow = self.name, steps = self.steps.len()), err(Display))]
  pub async fn run(&self, ctx: FlowContext<TData>) -> Result<FlowOutcome, Err> {
    for (index, step) in self.steps.iter().enumerate() {
      let on = self.on.get(&step.name).filter(|h| !h.is_empty());
      let after = self.after.get(&step.name).filter(|h| !h.is_empty());

      if on.is_none() && after.is_none() {
        if step.optional {
          event!(Level::DEBUG, step = %step.name, "optional step has no handlers, skipping");
          continue;
        }
        event!(Level::ERROR, step = %step.name, "required step has no handlers");
        return Err(Err::from(FlowError::HandlerMissing {
          flow: self.name,
          step_name: step.name.clone(),
        }));
      }

      let span = tracing::info_span!("flow_step", flow = self.name, step = %step.name, index);
      let phase = async {
        for handlers in [on, after].into_iter().flatten() {
          if let Phase::Halted = run_handlers(handlers, &ctx).await? {
            return Ok::<_, Err>(Phase::Halted);
          }
        }
        Ok(Phase::Proceed)
      }
      .instrument(span)
      .await?;

      if let Phase::Halted = phase {
        event!(Level::INFO, flow = self.name, step = %step.name, "flow halted by handler");
        return Ok(FlowOutcome::Halted);
      }
    }

    event!(Level::DEBUG, flow = self.name, "flow completed");
    Ok(FlowOutcome::Completed)
  }
}

async fn run_handlers<TData, Err>(handlers: &[Handler<TData, Err>], ctx: &FlowContext<TData>) -> Result<Phase, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + Send + Sync + 'static,
{
  for handler in handlers {
    match handler(ctx.clone()).await {
      Ok(StepControl::Continue) => {}
      Ok(StepControl::Halt) => return Ok(Phase::Halted),
      Err(e) => {
        event!(Level::WARN, error = %e, "step handler failed");
        return Err(e);
      }
    }
  }
  Ok(Phase::Proceed)
}
