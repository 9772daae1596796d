// orderpay/src/payments/callback.rs

//! Gateway callback reconciliation. The callback only says "something
//! happened"; the status applied to the order is always the one fetched back
//! from the gateway.

use crate::error::{ConflictReason, PaymentError, PaymentResult};
use crate::flow::{Flow, FlowContext, FlowError, StepControl};
use crate::model::{ActivityEntry, CallbackSignal, GatewayOutcome, Order, OrderPatch, PaymentStatus};
use crate::payments::contexts::CallbackData;
use crate::payments::PaymentServices;
use crate::ports::AttemptUpdate;
use chrono::Utc;
use tracing::{info, instrument, warn};

pub const CALLBACK_FLOW: &str = "payment_callback";

pub fn build_callback_flow() -> Result<Flow<CallbackData, PaymentError>, FlowError> {
  let mut flow = Flow::<CallbackData, PaymentError>::new(
    CALLBACK_FLOW,
    &[
      ("check_identifiers", false),
      ("fetch_access_token", false),
      ("query_transaction_status", false),
      ("apply_gateway_status", false),
      ("notify_customer", true),
    ],
  );
  flow
    .on_step("check_identifiers", check_identifiers)?
    .on_step("fetch_access_token", fetch_access_token)?
    .on_step("query_transaction_status", query_transaction_status)?
    .on_step("apply_gateway_status", apply_gateway_status)?
    .on_step("notify_customer", notify_customer)?;
  Ok(flow)
}

fn identifiers(ctx: &FlowContext<CallbackData>) -> PaymentResult<(String, String)> {
  ctx
    .with(|d| d.identifiers.clone())
    .ok_or_else(|| PaymentError::Unknown("callback identifiers were not checked".to_string()))
}

#[instrument(name = "callback::check_identifiers", skip_all)]
async fn check_identifiers(ctx: FlowContext<CallbackData>) -> PaymentResult<StepControl> {
  let params = ctx.with(|d| d.params.clone());
  match params.identifiers() {
    Some(ids) => {
      ctx.write().identifiers = Some(ids);
      Ok(StepControl::Continue)
    }
    None => {
      warn!(?params, "callback without tracking id or merchant reference, nothing to reconcile");
      ctx.write().signal = CallbackSignal::Failed;
      Ok(StepControl::Halt)
    }
  }
}

#[instrument(name = "callback::fetch_access_token", skip_all)]
async fn fetch_access_token(ctx: FlowContext<CallbackData>) -> PaymentResult<StepControl> {
  let services = ctx.with(|d| d.services.clone());
  let token = services.gateway.access_token().await?;
  ctx.write().token = Some(token);
  Ok(StepControl::Continue)
}

#[instrument(name = "callback::query_transaction_status", skip_all)]
async fn query_transaction_status(ctx: FlowContext<CallbackData>) -> PaymentResult<StepControl> {
  let (tracking_id, _) = identifiers(&ctx)?;
  let (services, token) = ctx.with(|d| (d.services.clone(), d.token.clone()));
  let token = token.ok_or_else(|| PaymentError::Unknown("no gateway access token".to_string()))?;

  let transaction = services.gateway.transaction_status(&tracking_id, &token).await?;
  info!(
    tracking_id = %tracking_id,
    status = %transaction.payment_status_description,
    confirmation = ?transaction.confirmation_code,
    "gateway transaction status fetched"
  );
  ctx.write().transaction = Some(transaction);
  Ok(StepControl::Continue)
}

/// Maps the fetched status onto the order. The write is guarded on the
/// callback's tracking id, so a callback for an earlier attempt never touches
/// an order that has since been retried. Paid and cancelled orders keep their
/// status; only the raw gateway status and an audit entry are recorded.
#[instrument(name = "callback::apply_gateway_status", skip_all)]
async fn apply_gateway_status(ctx: FlowContext<CallbackData>) -> PaymentResult<StepControl> {
  let (tracking_id, reference) = identifiers(&ctx)?;
  let (services, transaction) = ctx.with(|d| (d.services.clone(), d.transaction.clone()));
  let transaction =
    transaction.ok_or_else(|| PaymentError::Unknown("no transaction status to apply".to_string()))?;
  let raw = transaction.payment_status_description;

  let outcome = GatewayOutcome::from_description(&raw);
  let target = outcome.payment_status();
  let now = Utc::now();

  let mut patch = OrderPatch {
    payment_status: Some(target),
    transaction_status: Some(raw.clone()),
    ..Default::default()
  };
  match outcome {
    GatewayOutcome::Completed => {
      patch.paid_at = Some(now);
      patch.payment_error = Some(None);
    }
    GatewayOutcome::Failed => {
      patch.payment_failed_at = Some(now);
      patch.payment_error = Some(Some(format!("Gateway reported status '{}'", raw)));
    }
    GatewayOutcome::Pending => {}
  }
  let patch = patch.with_activity(ActivityEntry::new(
    "gateway_status",
    format!("Gateway reported '{}' for {}; payment is {}", raw, tracking_id, target),
    now,
  ));

  // Only states other than the target, so an applied write is always a transition.
  let movable: Vec<PaymentStatus> = PaymentStatus::RECONCILABLE
    .into_iter()
    .filter(|status| *status != target)
    .collect();

  let (order, transitioned_to) = match services
    .store
    .update_if_current_attempt(&reference, &tracking_id, &movable, patch)
    .await
    .map_err(PaymentError::store)?
  {
    AttemptUpdate::Applied(order) => {
      info!(order_id = %reference, to = %target, "payment status reconciled");
      (order, Some(target))
    }
    AttemptUpdate::StatusMismatch(status) => {
      info!(order_id = %reference, status = %status, gateway_status = %raw, "payment status kept");
      let order = record_kept_status(&services, &reference, &tracking_id, status, &raw).await?;
      (order, None)
    }
    AttemptUpdate::Superseded(current) => return Err(stale_attempt(&reference, &tracking_id, current)),
    AttemptUpdate::NotFound => return Err(PaymentError::NotFound(reference)),
  };

  let signal = CallbackSignal::for_status(order.payment_status);
  ctx.update(|d| {
    d.order = Some(order);
    d.transitioned_to = transitioned_to;
    d.signal = signal;
  });
  Ok(StepControl::Continue)
}

fn stale_attempt(reference: &str, tracking_id: &str, current: Option<String>) -> PaymentError {
  warn!(
    order_id = %reference,
    callback_tracking_id = %tracking_id,
    order_tracking_id = ?current,
    "callback for a superseded payment attempt ignored"
  );
  PaymentError::Conflict(ConflictReason::StaleAttempt)
}

/// Records the gateway's raw status against an order whose payment status
/// stays as it is, still guarded on the same attempt and status.
async fn record_kept_status(
  services: &PaymentServices,
  reference: &str,
  tracking_id: &str,
  status: PaymentStatus,
  raw: &str,
) -> PaymentResult<Order> {
  let audit = OrderPatch {
    transaction_status: Some(raw.to_string()),
    ..Default::default()
  }
  .with_activity(ActivityEntry::new(
    "gateway_status_ignored",
    format!("Gateway reported '{}' but payment is already {}", raw, status),
    Utc::now(),
  ));

  match services
    .store
    .update_if_current_attempt(reference, tracking_id, &[status], audit)
    .await
    .map_err(PaymentError::store)?
  {
    AttemptUpdate::Applied(order) => Ok(order),
    AttemptUpdate::Superseded(current) => Err(stale_attempt(reference, tracking_id, current)),
    AttemptUpdate::StatusMismatch(moved_to) => {
      warn!(order_id = %reference, status = %moved_to, "order moved on while the gateway status was recorded");
      services
        .store
        .find_by_public_id(reference)
        .await
        .map_err(PaymentError::store)?
        .ok_or_else(|| PaymentError::NotFound(reference.to_string()))
    }
    AttemptUpdate::NotFound => Err(PaymentError::NotFound(reference.to_string())),
  }
}

/// Best effort: a notifier failure never changes the callback result.
#[instrument(name = "callback::notify_customer", skip_all)]
async fn notify_customer(ctx: FlowContext<CallbackData>) -> PaymentResult<StepControl> {
  let (services, order, transitioned_to) = ctx.with(|d| (d.services.clone(), d.order.clone(), d.transitioned_to));
  let Some(order) = order else {
    return Ok(StepControl::Continue);
  };

  let result = match transitioned_to {
    Some(PaymentStatus::Paid) => services.notifier.payment_confirmed(&order).await,
    Some(PaymentStatus::Failed) => services.notifier.payment_failed(&order).await,
    _ => Ok(()),
  };
  if let Err(e) = result {
    warn!(order_id = %order.order_number, error = %e, "payment notification failed");
  }
  Ok(StepControl::Continue)
}
