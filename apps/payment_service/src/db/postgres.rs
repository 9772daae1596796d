// apps/payment_service/src/db/postgres.rs

//! `orders` table access. Every write is one statement, so the conditional
//! updates are atomic without an explicit transaction. `insert` writes every
//! column, so an order round-trips unchanged.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orderpay::model::{ActivityEntry, Order, OrderPatch, PaymentStatus, TimelineEntry};
use orderpay::{AttemptUpdate, ConditionalUpdate, OrderStore};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

const ORDER_COLUMNS: &str = "order_number, total_amount, payment_method, payment_status, payment_tracking_id, \
   transaction_status, payment_error, payment_initiated_at, paid_at, payment_failed_at, customer_email, \
   customer_phone, order_status, timeline, activity_log, created_at, updated_at";

/// Shared by every update statement; conditions bind from `$14`.
const PATCH_SET_CLAUSE: &str = "payment_status = COALESCE($2, payment_status), \
   payment_tracking_id = CASE WHEN $3 THEN $4 ELSE payment_tracking_id END, \
   transaction_status = COALESCE($5, transaction_status), \
   payment_error = CASE WHEN $6 THEN $7 ELSE payment_error END, \
   payment_initiated_at = COALESCE($8, payment_initiated_at), \
   paid_at = COALESCE($9, paid_at), \
   payment_failed_at = COALESCE($10, payment_failed_at), \
   customer_email = COALESCE($11, customer_email), \
   customer_phone = COALESCE($12, customer_phone), \
   activity_log = activity_log || $13, \
   updated_at = now()";

/// `INSERT` of a full order: the surrogate `id` plus every column in [`ORDER_COLUMNS`].
fn insert_statement() -> String {
  let placeholders = (1..=ORDER_COLUMNS.split(',').count() + 1)
    .map(|i| format!("${}", i))
    .collect::<Vec<_>>()
    .join(", ");
  format!("INSERT INTO orders (id, {}) VALUES ({})", ORDER_COLUMNS, placeholders)
}

#[derive(Debug, FromRow)]
struct OrderRow {
  order_number: String,
  total_amount: Decimal,
  payment_method: String,
  payment_status: String,
  payment_tracking_id: Option<String>,
  transaction_status: Option<String>,
  payment_error: Option<String>,
  payment_initiated_at: Option<DateTime<Utc>>,
  paid_at: Option<DateTime<Utc>>,
  payment_failed_at: Option<DateTime<Utc>>,
  customer_email: Option<String>,
  customer_phone: Option<String>,
  order_status: String,
  timeline: Json<Vec<TimelineEntry>>,
  activity_log: Json<Vec<ActivityEntry>>,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
  type Error = anyhow::Error;

  fn try_from(row: OrderRow) -> anyhow::Result<Self> {
    Ok(Order {
      payment_method: row.payment_method.parse().map_err(|e: String| anyhow!(e))?,
      payment_status: row.payment_status.parse().map_err(|e: String| anyhow!(e))?,
      order_status: row.order_status.parse().map_err(|e: String| anyhow!(e))?,
      order_number: row.order_number,
      total_amount: row.total_amount,
      payment_tracking_id: row.payment_tracking_id,
      transaction_status: row.transaction_status,
      payment_error: row.payment_error,
      payment_initiated_at: row.payment_initiated_at,
      paid_at: row.paid_at,
      payment_failed_at: row.payment_failed_at,
      customer_email: row.customer_email,
      customer_phone: row.customer_phone,
      timeline: row.timeline.0,
      activity_log: row.activity_log.0,
      created_at: row.created_at,
      updated_at: row.updated_at,
    })
  }
}

#[derive(Debug, Clone)]
pub struct PgOrderStore {
  pool: PgPool,
}

impl PgOrderStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  /// Binds `$1..=$13` of an update built on [`PATCH_SET_CLAUSE`].
  fn bind_patch<'q>(
    query: sqlx::query::QueryAs<'q, sqlx::Postgres, OrderRow, sqlx::postgres::PgArguments>,
    order_id: &'q str,
    patch: OrderPatch,
  ) -> sqlx::query::QueryAs<'q, sqlx::Postgres, OrderRow, sqlx::postgres::PgArguments> {
    let clear_or_set_tracking_id = patch.payment_tracking_id.is_some();
    let clear_or_set_error = patch.payment_error.is_some();
    query
      .bind(order_id)
      .bind(patch.payment_status.map(|s| s.as_str()))
      .bind(clear_or_set_tracking_id)
      .bind(patch.payment_tracking_id.flatten())
      .bind(patch.transaction_status)
      .bind(clear_or_set_error)
      .bind(patch.payment_error.flatten())
      .bind(patch.payment_initiated_at)
      .bind(patch.paid_at)
      .bind(patch.payment_failed_at)
      .bind(patch.customer_email)
      .bind(patch.customer_phone)
      .bind(Json(patch.activity))
  }

  /// Payment status and tracking id as stored, to explain a conditional
  /// update that matched no row.
  async fn current_attempt(&self, order_id: &str) -> anyhow::Result<Option<(PaymentStatus, Option<String>)>> {
    let row: Option<(String, Option<String>)> =
      sqlx::query_as("SELECT payment_status, payment_tracking_id FROM orders WHERE order_number = $1")
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .context("reading payment status")?;
    row
      .map(|(status, tracking_id)| {
        let status = status.parse::<PaymentStatus>().map_err(|e| anyhow!(e))?;
        Ok((status, tracking_id))
      })
      .transpose()
  }
}

#[async_trait]
impl OrderStore for PgOrderStore {
  #[instrument(skip(self, order), fields(order_id = %order.order_number))]
  async fn insert(&self, order: Order) -> anyhow::Result<()> {
    sqlx::query(&insert_statement())
      .bind(Uuid::new_v4())
      .bind(&order.order_number)
      .bind(order.total_amount)
      .bind(order.payment_method.as_str())
      .bind(order.payment_status.as_str())
      .bind(&order.payment_tracking_id)
      .bind(&order.transaction_status)
      .bind(&order.payment_error)
      .bind(order.payment_initiated_at)
      .bind(order.paid_at)
      .bind(order.payment_failed_at)
      .bind(&order.customer_email)
      .bind(&order.customer_phone)
      .bind(order.order_status.as_str())
      .bind(Json(&order.timeline))
      .bind(Json(&order.activity_log))
      .bind(order.created_at)
      .bind(order.updated_at)
      .execute(&self.pool)
      .await
      .with_context(|| format!("inserting order {}", order.order_number))?;
    Ok(())
  }

  #[instrument(skip(self))]
  async fn find_by_public_id(&self, order_id: &str) -> anyhow::Result<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE order_number = $1", ORDER_COLUMNS);
    let row = sqlx::query_as::<_, OrderRow>(&sql)
      .bind(order_id)
      .fetch_optional(&self.pool)
      .await
      .with_context(|| format!("loading order {}", order_id))?;
    row.map(Order::try_from).transpose()
  }

  #[instrument(skip(self, patch))]
  async fn update_by_public_id(&self, order_id: &str, patch: OrderPatch) -> anyhow::Result<Option<Order>> {
    let sql = format!(
      "UPDATE orders SET {} WHERE order_number = $1 RETURNING {}",
      PATCH_SET_CLAUSE, ORDER_COLUMNS
    );
    let row = Self::bind_patch(sqlx::query_as::<_, OrderRow>(&sql), order_id, patch)
      .fetch_optional(&self.pool)
      .await
      .with_context(|| format!("updating order {}", order_id))?;
    row.map(Order::try_from).transpose()
  }

  #[instrument(skip(self, patch))]
  async fn update_if_payment_status(
    &self,
    order_id: &str,
    expected: &[PaymentStatus],
    patch: OrderPatch,
  ) -> anyhow::Result<ConditionalUpdate> {
    let sql = format!(
      "UPDATE orders SET {} WHERE order_number = $1 AND payment_status = ANY($14) RETURNING {}",
      PATCH_SET_CLAUSE, ORDER_COLUMNS
    );
    let expected: Vec<&str> = expected.iter().map(|s| s.as_str()).collect();
    let row = Self::bind_patch(sqlx::query_as::<_, OrderRow>(&sql), order_id, patch)
      .bind(expected)
      .fetch_optional(&self.pool)
      .await
      .with_context(|| format!("conditionally updating order {}", order_id))?;

    match row {
      Some(row) => Ok(ConditionalUpdate::Applied(Order::try_from(row)?)),
      None => {
        let current = self.current_attempt(order_id).await?;
        debug!(?current, "conditional update matched no row");
        Ok(match current {
          Some((status, _)) => ConditionalUpdate::StatusMismatch(status),
          None => ConditionalUpdate::NotFound,
        })
      }
    }
  }

  #[instrument(skip(self, patch))]
  async fn update_if_current_attempt(
    &self,
    order_id: &str,
    tracking_id: &str,
    expected: &[PaymentStatus],
    patch: OrderPatch,
  ) -> anyhow::Result<AttemptUpdate> {
    let sql = format!(
      "UPDATE orders SET {} WHERE order_number = $1 AND payment_status = ANY($14) \
       AND payment_tracking_id = $15 RETURNING {}",
      PATCH_SET_CLAUSE, ORDER_COLUMNS
    );
    let expected: Vec<&str> = expected.iter().map(|s| s.as_str()).collect();
    let row = Self::bind_patch(sqlx::query_as::<_, OrderRow>(&sql), order_id, patch)
      .bind(expected)
      .bind(tracking_id)
      .fetch_optional(&self.pool)
      .await
      .with_context(|| format!("updating order {} for attempt {}", order_id, tracking_id))?;

    match row {
      Some(row) => Ok(AttemptUpdate::Applied(Order::try_from(row)?)),
      None => {
        let current = self.current_attempt(order_id).await?;
        debug!(?current, "attempt update matched no row");
        Ok(match current {
          Some((_, current_id)) if current_id.as_deref() != Some(tracking_id) => AttemptUpdate::Superseded(current_id),
          Some((status, _)) => AttemptUpdate::StatusMismatch(status),
          None => AttemptUpdate::NotFound,
        })
      }
    }
  }
}
