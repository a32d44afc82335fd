use std::sync::Arc;

use axum::{Router, body::Bytes, extract::State, http::HeaderMap, routing::post};

use crate::app::AppContext;
use crate::error::{PROCESSED_BODY, Result, SyncError};
use crate::http::RouteModule;

use super::dispatch::{DispatchOutcome, EventDispatcher};
use super::event::classify;
use super::idempotency::IdempotencyStore;
use super::verification::{WebhookEnvelope, WebhookVerifier};

/// Runs one delivery through the pipeline:
/// secret check, header extraction, verification, classification, dispatch.
///
/// Nothing in the payload is trusted until verification succeeds, and every
/// failure short-circuits before the gateway is called.
pub struct WebhookProcessor {
    verifier: Option<Arc<WebhookVerifier>>,
    dispatcher: EventDispatcher,
    deliveries: Option<Arc<dyn IdempotencyStore>>,
}

impl WebhookProcessor {
    /// Create a processor. Without a verifier every delivery is refused with
    /// [`SyncError::Misconfigured`]; there is no unverified mode.
    pub fn new(verifier: Option<WebhookVerifier>, dispatcher: EventDispatcher) -> Self {
        Self {
            verifier: verifier.map(Arc::new),
            dispatcher,
            deliveries: None,
        }
    }

    /// Skip deliveries whose id is already recorded in `store`.
    pub fn with_idempotency_store(mut self, store: Arc<dyn IdempotencyStore>) -> Self {
        self.deliveries = Some(store);
        self
    }

    /// Whether a signing secret is configured.
    pub fn is_configured(&self) -> bool {
        self.verifier.is_some()
    }

    pub fn deduplicates(&self) -> bool {
        self.deliveries.is_some()
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub async fn process(&self, headers: &HeaderMap, body: Bytes) -> Result<DispatchOutcome> {
        let verifier = self
            .verifier
            .as_ref()
            .ok_or_else(|| SyncError::misconfigured("no signing secret is set"))?;

        let envelope = WebhookEnvelope::from_parts(headers, body)?;
        let payload = verifier.verify(&envelope)?;
        let event = classify(payload)?;

        if let Some(deliveries) = &self.deliveries {
            if deliveries.is_processed(&envelope.id).await? {
                tracing::info!(
                    delivery_id = %envelope.id,
                    event_type = event.event_type(),
                    "Skipping already processed delivery"
                );
                return Ok(DispatchOutcome::Duplicate);
            }
        }

        let outcome = match self.dispatcher.dispatch(&event).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    delivery_id = %envelope.id,
                    event_type = event.event_type(),
                    error = %e,
                    "Webhook dispatch failed"
                );
                return Err(e);
            }
        };

        if let Some(deliveries) = &self.deliveries {
            deliveries.mark_processed(envelope.id.clone()).await?;
        }

        tracing::info!(
            delivery_id = %envelope.id,
            event_type = event.event_type(),
            outcome = ?outcome,
            "Webhook processed successfully"
        );
        Ok(outcome)
    }
}

/// Axum handler for the provider's webhook endpoint.
pub async fn receive_webhook(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str> {
    ctx.webhooks.process(&headers, body).await?;
    Ok(PROCESSED_BODY)
}

/// Route module mounting [`receive_webhook`] at the configured path.
pub struct WebhookModule {
    path: String,
}

impl WebhookModule {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl RouteModule for WebhookModule {
    fn routes(&self) -> Router<AppContext> {
        Router::new().route(&self.path, post(receive_webhook))
    }
}
