//! identity-sync - keeps a user store in step with an identity provider
//!
//! The provider sends signed webhooks whenever a user is created, updated or
//! deleted. This crate verifies each delivery, decodes it into a typed event
//! and applies exactly one idempotent mutation to the user store through a
//! pluggable [`UserSyncGateway`].
//!
//! # Features
//!
//! - **Verification**: `whsec_` secrets, HMAC-SHA256 over `id.timestamp.body`,
//!   constant-time comparison and a replay window
//! - **Dispatch**: created/updated/deleted events mapped to upsert, partial
//!   patch and delete commands
//! - **Gateways**: an in-memory store and an HTTP mutation client
//! - **HTTP**: Axum router with request ids, tracing and a health check
//! - **Testing**: Alba-style request scenarios and a recording gateway
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use identity_sync::{App, AppContext, ConfigBuilder, InMemoryUserStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     identity_sync::init_tracing();
//!
//!     let config = ConfigBuilder::new().from_env().build()?;
//!     let context = AppContext::builder()
//!         .with_webhook_config(&config.webhook)?
//!         .with_gateway(Arc::new(InMemoryUserStore::new()))
//!         .build()?;
//!
//!     App::new(config, context).serve().await?;
//!     Ok(())
//! }
//! ```

mod app;
mod config;
mod core;
mod error;
pub mod health;
mod http;
mod middleware;
pub mod testing;
pub mod utils;
pub mod webhooks;

// Re-exports for public API
pub use app::{AppContext, AppContextBuilder};
pub use config::{Config, ConfigBuilder, GatewayConfig, LoggingConfig, ServerConfig, WebhookConfig};
pub use crate::core::App;
pub use error::{ERROR_ID_HEADER, PROCESSED_BODY, Result, SyncError};
pub use health::{ComponentHealth, HealthCheck, HealthChecker, HealthStatus};
pub use http::RouteModule;
pub use middleware::REQUEST_ID_HEADER;
pub use webhooks::{
    DispatchOutcome, GatewayError, HttpMutationGateway, InMemoryUserStore, UserSyncGateway,
    WebhookModule, WebhookVerifier,
};

use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging with sensible defaults
///
/// This should be called early in your application, typically in main()
/// before creating the App.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "identity_sync=debug")
/// - `IDENTITY_SYNC_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("IDENTITY_SYNC_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Initialize tracing with a custom configuration
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::new(&config.logging.level);

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Pick the user store for `config`: the HTTP mutation gateway when a URL is
/// configured, otherwise a process-local in-memory store.
///
/// # Errors
///
/// Returns [`SyncError::Config`] if the gateway URL is invalid.
pub fn gateway_from_config(config: &GatewayConfig) -> Result<Arc<dyn UserSyncGateway>> {
    match HttpMutationGateway::from_config(config)? {
        Some(gateway) => {
            tracing::info!(endpoint = gateway.endpoint(), "Using HTTP mutation gateway");
            Ok(Arc::new(gateway))
        }
        None => {
            tracing::warn!("No gateway URL configured, users are kept in memory only");
            Ok(Arc::new(InMemoryUserStore::new()))
        }
    }
}
