use std::sync::Arc;

use secrecy::SecretString;

use crate::config::WebhookConfig;
use crate::error::{Result, SyncError};
use crate::webhooks::{
    EventDispatcher, IdempotencyStore, MemoryIdempotencyStore, UserSyncGateway, WebhookProcessor,
    WebhookVerifier,
};

/// Application context for dependency injection and shared state
///
/// Holds the webhook pipeline (verifier, dispatcher and optional delivery
/// cache) behind an `Arc`, so cloning the context per request is cheap.
#[derive(Clone)]
pub struct AppContext {
    pub webhooks: Arc<WebhookProcessor>,
}

impl AppContext {
    /// Builder pattern for constructing AppContext
    pub fn builder() -> AppContextBuilder {
        AppContextBuilder::new()
    }

    /// The gateway events are dispatched to
    pub fn gateway(&self) -> &Arc<dyn UserSyncGateway> {
        self.webhooks.dispatcher().gateway()
    }
}

/// Builder for AppContext with fluent API
#[must_use = "builder does nothing until you call build()"]
pub struct AppContextBuilder {
    verifier: Option<WebhookVerifier>,
    gateway: Option<Arc<dyn UserSyncGateway>>,
    deliveries: Option<Arc<dyn IdempotencyStore>>,
}

impl AppContextBuilder {
    pub fn new() -> Self {
        Self {
            verifier: None,
            gateway: None,
            deliveries: None,
        }
    }

    /// Apply the `webhook` config section: signing secret, tolerance and
    /// optional deduplication.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the secret is set but cannot be decoded.
    pub fn with_webhook_config(mut self, config: &WebhookConfig) -> Result<Self> {
        self.verifier = match &config.secret {
            Some(secret) => Some(WebhookVerifier::new(secret)?.with_tolerance(config.tolerance())),
            None => {
                tracing::warn!("Webhook secret not configured, all deliveries will be refused");
                None
            }
        };
        if config.deduplicate {
            self.deliveries = Some(Arc::new(MemoryIdempotencyStore::new()));
        }
        Ok(self)
    }

    /// Set the signing secret directly with the default tolerance.
    pub fn with_secret(mut self, secret: &SecretString) -> Result<Self> {
        self.verifier = Some(WebhookVerifier::new(secret)?);
        Ok(self)
    }

    pub fn with_verifier(mut self, verifier: WebhookVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Set the user store gateway
    pub fn with_gateway(mut self, gateway: Arc<dyn UserSyncGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Enable delivery-id deduplication with the given store
    pub fn with_idempotency_store(mut self, store: Arc<dyn IdempotencyStore>) -> Self {
        self.deliveries = Some(store);
        self
    }

    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if no gateway was set.
    pub fn build(self) -> Result<AppContext> {
        let gateway = self
            .gateway
            .ok_or_else(|| SyncError::config("A user sync gateway must be configured"))?;

        let mut processor = WebhookProcessor::new(self.verifier, EventDispatcher::new(gateway));
        if let Some(deliveries) = self.deliveries {
            processor = processor.with_idempotency_store(deliveries);
        }

        Ok(AppContext {
            webhooks: Arc::new(processor),
        })
    }
}

impl Default for AppContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
