//! Testing utilities for identity-sync
//!
//! - Alba-style HTTP endpoint testing without running a server, including
//!   requests signed like real provider deliveries
//! - A recording [`UserSyncGateway`](crate::UserSyncGateway) double
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use identity_sync::{App, AppContext, ConfigBuilder, WebhookVerifier, testing};
//!
//! #[tokio::test]
//! async fn test_created_user_is_synced() {
//!     let gateway = testing::RecordingGateway::new();
//!     let verifier = WebhookVerifier::new(&SECRET.into()).unwrap();
//!     let context = AppContext::builder()
//!         .with_secret(&SECRET.into())
//!         .unwrap()
//!         .with_gateway(Arc::new(gateway.clone()))
//!         .build()
//!         .unwrap();
//!     let app = App::new(ConfigBuilder::new().build().unwrap(), context).into_router();
//!
//!     testing::post(app, "/clerk-webhook")
//!         .signed(&verifier, "msg_1", body)
//!         .execute()
//!         .await
//!         .assert_ok();
//!
//!     assert_eq!(gateway.call_count(), 1);
//! }
//! ```

mod gateway;
mod scenario;

pub use gateway::{RecordedCall, RecordingGateway};
pub use scenario::{Scenario, ScenarioAssert, get, post};
