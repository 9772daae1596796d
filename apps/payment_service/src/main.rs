// apps/payment_service/src/main.rs

mod config;
mod db;
mod errors;
mod services;
mod state;
mod web;

use crate::config::{AppConfig, GatewayBackend, StoreBackend};
use crate::errors::AppError;
use crate::state::AppState;

use actix_web::{web as actix_data, App, HttpServer};
use anyhow::Context;
use orderpay::{InMemoryOrderStore, OrderStore, PaymentGateway};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

fn init_tracing(json: bool) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE); // Log when spans close, showing duration
  if json {
    builder.json().init();
  } else {
    builder.init();
  }
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn OrderStore>> {
  match config.store_backend {
    StoreBackend::Memory => {
      tracing::warn!("Using the in-memory order store; orders are lost on restart.");
      Ok(Arc::new(InMemoryOrderStore::new()))
    }
    StoreBackend::Postgres => {
      let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| AppError::Config("DATABASE_URL is required for the postgres store".to_string()))?;
      let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("connecting to the database")?;
      tracing::info!("Successfully connected to the database.");
      sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("running database migrations")?;
      Ok(Arc::new(db::PgOrderStore::new(pool)))
    }
  }
}

fn build_gateway(config: &AppConfig) -> anyhow::Result<Arc<dyn PaymentGateway>> {
  match (config.gateway, &config.pesapal) {
    (GatewayBackend::Pesapal, Some(pesapal)) => {
      tracing::info!(base_url = %pesapal.base_url, "Using the PesaPal gateway.");
      let gateway = services::PesapalGateway::new(
        pesapal.clone(),
        config.payment_currency.clone(),
        config.gateway_timeout,
      )?;
      Ok(Arc::new(gateway))
    }
    (GatewayBackend::Pesapal, None) => Err(AppError::Config("PesaPal settings missing".to_string()).into()),
    (GatewayBackend::Mock, _) => {
      tracing::warn!(status = %config.mock_gateway_status, "Using the mock payment gateway.");
      Ok(Arc::new(services::MockGateway::new(
        &config.app_base_url,
        config.mock_gateway_status.clone(),
      )))
    }
  }
}

async fn build_state(config: Arc<AppConfig>) -> anyhow::Result<AppState> {
  let store = build_store(&config).await?;
  if config.seed_db {
    db::seed_demo_orders(store.as_ref()).await.context("seeding demo orders")?;
  }
  let gateway = build_gateway(&config)?;
  let notifier = Arc::new(services::MockEmailNotifier::new(config.mock_email_sender.clone()));

  let state = AppState::new(config, store, gateway, notifier)?;
  tracing::info!("Payment flows registered.");
  Ok(state)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  let app_config = Arc::new(AppConfig::from_env()?);
  init_tracing(app_config.log_json);
  tracing::info!(
    store = ?app_config.store_backend,
    gateway = ?app_config.gateway,
    "Starting payment service..."
  );

  let app_state = build_state(app_config.clone()).await.map_err(|e| {
    tracing::error!(error = %format!("{:#}", e), "Failed to start the payment service.");
    e
  })?;

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(web::configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await?;

  Ok(())
}
