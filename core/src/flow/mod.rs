// orderpay/src/flow/mod.rs

//! A small async workflow engine: ordered named steps, `on`/`after` handlers per
//! step, early halting, and a type-keyed registry for dispatching flows by the
//! type of their context data.
//!
//! Payment operations in [`crate::payments`] are built on top of it.

pub mod context;
pub mod control;
pub mod definition;
pub mod error;
pub mod execution;
pub mod registry;

pub use context::FlowContext;
pub use control::{FlowOutcome, StepControl};
pub use definition::{Flow, Handler, StepDef};
pub use error::FlowError;
pub use registry::FlowRegistry;
