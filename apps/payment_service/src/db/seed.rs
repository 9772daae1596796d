// apps/payment_service/src/db/seed.rs

use chrono::Utc;
use orderpay::{Order, OrderStore, PaymentMethod};
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Demo orders for exercising the payment endpoints locally.
const DEMO_ORDERS: &[(&str, i64, PaymentMethod)] = &[
  ("ORD-DEMO-1001", 2_500_00, PaymentMethod::Pesapal),
  ("ORD-DEMO-1002", 149_99, PaymentMethod::Mpesa),
  ("ORD-DEMO-1003", 12_000_00, PaymentMethod::Card),
];

/// Inserts the demo orders, skipping any that already exist. Returns how many
/// were inserted.
pub async fn seed_demo_orders(store: &dyn OrderStore) -> anyhow::Result<usize> {
  let now = Utc::now();
  let mut inserted = 0;
  for (order_number, cents, method) in DEMO_ORDERS {
    if store.find_by_public_id(order_number).await?.is_some() {
      continue;
    }
    let order = Order::place(*order_number, Decimal::new(*cents, 2), *method, now);
    match store.insert(order).await {
      Ok(()) => inserted += 1,
      Err(e) => warn!(order_id = %order_number, error = %e, "skipping demo order"),
    }
  }
  info!(inserted, "demo orders seeded");
  Ok(inserted)
}
