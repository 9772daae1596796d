// apps/payment_service/src/web/handlers/mod.rs

pub mod payment_handlers;
