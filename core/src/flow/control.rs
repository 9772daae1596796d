// orderpay/src/flow/control.rs

/// Returned by a step handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
  /// Run the remaining handlers and steps.
  Continue,
  /// Stop the flow here. Nothing after this handler runs.
  Halt,
}

/// Outcome of a flow run that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
  Completed,
  /// A handler returned [`StepControl::Halt`].
  Halted,
}
