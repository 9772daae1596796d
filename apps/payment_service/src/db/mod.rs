// apps/payment_service/src/db/mod.rs

pub mod postgres;
pub mod seed;

pub use postgres::PgOrderStore;
pub use seed::seed_demo_orders;
