// orderpay/src/payments/initiate.rs

//! Payment initiation: validate, claim the order atomically, open a gateway
//! session, record the tracking id.

use crate::error::{ConflictReason, GatewayError, PaymentError, PaymentResult};
use crate::flow::{Flow, FlowContext, FlowError, StepControl};
use crate::model::{ActivityEntry, GatewayPaymentRequest, OrderPatch, PaymentStatus, ValidatedPayment};
use crate::payments::contexts::InitiationData;
use crate::payments::PaymentServices;
use crate::ports::ConditionalUpdate;
use crate::validation::validate_payment_request;
use chrono::Utc;
use tracing::{error, info, instrument, warn};

pub const INITIATION_FLOW: &str = "payment_initiation";

pub fn build_initiation_flow() -> Result<Flow<InitiationData, PaymentError>, FlowError> {
  let mut flow = Flow::<InitiationData, PaymentError>::new(
    INITIATION_FLOW,
    &[
      ("validate_request", false),
      ("load_order", false),
      ("claim_order", false),
      ("open_gateway_session", false),
      ("record_session", false),
    ],
  );
  flow
    .on_step("validate_request", validate_request)?
    .on_step("load_order", load_order)?
    .on_step("claim_order", claim_order)?
    .on_step("open_gateway_session", open_gateway_session)?
    .on_step("record_session", record_session)?;
  Ok(flow)
}

fn validated(ctx: &FlowContext<InitiationData>) -> PaymentResult<(PaymentServices, ValidatedPayment)> {
  ctx.with(|d| d.validated.clone().map(|v| (d.services.clone(), v))).ok_or_else(|| {
    PaymentError::Unknown("initiation step ran before the request was validated".to_string())
  })
}

#[instrument(name = "initiation::validate_request", skip_all)]
async fn validate_request(ctx: FlowContext<InitiationData>) -> PaymentResult<StepControl> {
  let (services, request) = ctx.with(|d| (d.services.clone(), d.request.clone()));
  services.metrics.initiation_requested();

  match validate_payment_request(&request, &services.settings.phone_country_code) {
    Ok(validated) => {
      ctx.write().validated = Some(validated);
      Ok(StepControl::Continue)
    }
    Err(e) => {
      services.metrics.initiation_rejected();
      warn!(order_id = %request.order_id, field = ?e.field(), "payment request rejected: {}", e);
      Err(e)
    }
  }
}

/// Read-only precheck. Turns away paid or in-flight orders before any write;
/// `claim_order` repeats the status check atomically.
#[instrument(name = "initiation::load_order", skip_all)]
async fn load_order(ctx: FlowContext<InitiationData>) -> PaymentResult<StepControl> {
  let (services, payment) = validated(&ctx)?;

  let order = match services
    .store
    .find_by_public_id(&payment.order_id)
    .await
    .map_err(PaymentError::store)?
  {
    Some(order) => order,
    None => {
      services.metrics.initiation_rejected();
      warn!(order_id = %payment.order_id, "payment requested for unknown order");
      return Err(PaymentError::NotFound(payment.order_id));
    }
  };

  if order.total_amount != payment.amount {
    services.metrics.initiation_rejected();
    warn!(order_id = %payment.order_id, requested = %payment.amount, total = %order.total_amount, "amount does not match order total");
    return Err(PaymentError::validation(
      "amount",
      format!("Amount does not match the order total of {}.", order.total_amount),
    ));
  }

  if !order.payment_status.can_initiate() {
    services.metrics.initiation_rejected();
    warn!(order_id = %payment.order_id, status = %order.payment_status, "payment refused for order in current state");
    return Err(PaymentError::Conflict(ConflictReason::for_status(order.payment_status)));
  }

  ctx.write().order = Some(order);
  Ok(StepControl::Continue)
}

/// The duplicate-payment guard: pending|failed -> processing as one conditional
/// write. Of two concurrent requests exactly one gets past this step.
///
/// The previous attempt's tracking id is cleared in the same write, so its
/// callbacks no longer match the order while the new session opens.
#[instrument(name = "initiation::claim_order", skip_all)]
async fn claim_order(ctx: FlowContext<InitiationData>) -> PaymentResult<StepControl> {
  let (services, payment) = validated(&ctx)?;
  let now = Utc::now();

  let patch = OrderPatch {
    payment_status: Some(PaymentStatus::Processing),
    payment_tracking_id: Some(None),
    payment_initiated_at: Some(now),
    payment_error: Some(None),
    customer_email: Some(payment.email.clone()),
    customer_phone: Some(payment.phone.clone()),
    ..Default::default()
  }
  .with_activity(ActivityEntry::new(
    "payment_initiated",
    format!("Payment of {} requested through {}", payment.amount, services.gateway.name()),
    now,
  ));

  match services
    .store
    .update_if_payment_status(&payment.order_id, &PaymentStatus::INITIABLE, patch)
    .await
    .map_err(PaymentError::store)?
  {
    ConditionalUpdate::Applied(order) => {
      info!(order_id = %payment.order_id, "order claimed for payment");
      ctx.write().order = Some(order);
      Ok(StepControl::Continue)
    }
    ConditionalUpdate::StatusMismatch(current) => {
      services.metrics.initiation_rejected();
      warn!(order_id = %payment.order_id, status = %current, "concurrent payment attempt lost the claim");
      Err(PaymentError::Conflict(ConflictReason::for_status(current)))
    }
    ConditionalUpdate::NotFound => {
      services.metrics.initiation_rejected();
      Err(PaymentError::NotFound(payment.order_id))
    }
  }
}

#[instrument(name = "initiation::open_gateway_session", skip_all)]
async fn open_gateway_session(ctx: FlowContext<InitiationData>) -> PaymentResult<StepControl> {
  let (services, payment) = validated(&ctx)?;
  let description = payment
    .description
    .clone()
    .unwrap_or_else(|| format!("{} {}", services.settings.default_description, payment.order_id));

  let request = GatewayPaymentRequest {
    order_id: payment.order_id.clone(),
    amount: payment.amount,
    phone: payment.phone.clone(),
    email: payment.email.clone(),
    description,
  };

  let result = services.gateway.initiate(&request).await.and_then(|session| {
    if session.order_tracking_id.trim().is_empty() {
      Err(GatewayError::Unknown("gateway returned an empty tracking id".to_string()))
    } else {
      Ok(session)
    }
  });

  match result {
    Ok(session) => {
      info!(order_id = %payment.order_id, tracking_id = %session.order_tracking_id, "gateway session opened");
      ctx.write().session = Some(session);
      Ok(StepControl::Continue)
    }
    Err(e) => {
      services.metrics.gateway_failure(&e);
      error!(order_id = %payment.order_id, kind = e.kind(), error = %e, "gateway initiation failed");
      record_initiation_failure(&services, &payment.order_id, &e).await;
      Err(PaymentError::Gateway(e))
    }
  }
}

/// Leaves the order `failed` with the raw error for support. A failure to
/// record is logged; the caller still gets the gateway error.
async fn record_initiation_failure(services: &PaymentServices, order_id: &str, error: &GatewayError) {
  let now = Utc::now();
  let patch = OrderPatch {
    payment_status: Some(PaymentStatus::Failed),
    payment_error: Some(Some(error.to_string())),
    payment_failed_at: Some(now),
    ..Default::default()
  }
  .with_activity(ActivityEntry::new(
    "payment_failed",
    format!("Gateway initiation failed ({}): {}", error.kind(), error),
    now,
  ));

  match services
    .store
    .update_if_payment_status(order_id, &[PaymentStatus::Processing], patch)
    .await
  {
    Ok(ConditionalUpdate::Applied(_)) => {}
    Ok(ConditionalUpdate::StatusMismatch(current)) => {
      warn!(order_id, status = %current, "order moved on before initiation failure was recorded");
    }
    Ok(ConditionalUpdate::NotFound) => warn!(order_id, "order vanished before initiation failure was recorded"),
    Err(e) => error!(order_id, error = %e, "could not record initiation failure"),
  }
}

#[instrument(name = "initiation::record_session", skip_all)]
async fn record_session(ctx: FlowContext<InitiationData>) -> PaymentResult<StepControl> {
  let (services, payment) = validated(&ctx)?;
  let session = ctx
    .with(|d| d.session.clone())
    .ok_or_else(|| PaymentError::Unknown("no gateway session to record".to_string()))?;
  let now = Utc::now();

  let patch = OrderPatch {
    payment_status: Some(PaymentStatus::Processing),
    payment_tracking_id: Some(Some(session.order_tracking_id.clone())),
    payment_initiated_at: Some(now),
    ..Default::default()
  }
  .with_activity(ActivityEntry::new(
    "payment_session_opened",
    format!("{} session {} opened", services.gateway.name(), session.order_tracking_id),
    now,
  ));

  match services
    .store
    .update_if_payment_status(&payment.order_id, &[PaymentStatus::Processing], patch)
    .await
    .map_err(PaymentError::store)?
  {
    ConditionalUpdate::Applied(order) => {
      services.metrics.session_opened();
      ctx.write().order = Some(order);
      Ok(StepControl::Continue)
    }
    ConditionalUpdate::StatusMismatch(current) => {
      error!(order_id = %payment.order_id, status = %current, "order left processing while its session was opening");
      Err(PaymentError::Conflict(ConflictReason::for_status(current)))
    }
    ConditionalUpdate::NotFound => Err(PaymentError::NotFound(payment.order_id)),
  }
}
