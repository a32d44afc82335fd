//! Webhook handling for identity-provider user events.
//!
//! A delivery flows through signature verification, event classification and
//! dispatch to exactly one mutation on a [`UserSyncGateway`].

pub mod commands;
pub mod dispatch;
pub mod event;
pub mod gateway;
pub mod handler;
pub mod http_gateway;
pub mod idempotency;
pub mod verification;

pub use commands::{UserDeleteCommand, UserPatchCommand, UserUpsertCommand};
pub use dispatch::{DispatchOutcome, EventDispatcher};
pub use event::{EventKind, VerifiedEvent, classify};
pub use gateway::{GatewayError, InMemoryUserStore, UserRecord, UserSyncGateway};
pub use handler::{WebhookModule, WebhookProcessor, receive_webhook};
pub use http_gateway::{HttpMutationGateway, MutationFunctions};
pub use idempotency::{IdempotencyStore, MemoryIdempotencyStore};
pub use verification::{VerificationFailure, WebhookEnvelope, WebhookVerifier};
