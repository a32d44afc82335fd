//! A [`UserSyncGateway`] that records every command it receives.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::webhooks::commands::{UserDeleteCommand, UserPatchCommand, UserUpsertCommand};
use crate::webhooks::gateway::{GatewayError, UserSyncGateway};

/// One call made against a [`RecordingGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    CreateOrSync(UserUpsertCommand),
    Patch(UserPatchCommand),
    Delete(UserDeleteCommand),
}

/// Test double for the user store.
///
/// Clones share the same call log, so a test can keep one handle and give
/// another to the application.
///
/// # Example
///
/// ```rust,ignore
/// let gateway = RecordingGateway::new();
/// let context = AppContext::builder().with_gateway(Arc::new(gateway.clone())).build()?;
/// // ... drive a request ...
/// assert_eq!(gateway.call_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingGateway {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    failure: Option<String>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway that records each call and then fails it as unavailable.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            calls: Arc::default(),
            failure: Some(message.into()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().len()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.lock().last().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RecordedCall>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: RecordedCall) -> Result<(), GatewayError> {
        self.lock().push(call);
        match &self.failure {
            Some(message) => Err(GatewayError::Unavailable(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl UserSyncGateway for RecordingGateway {
    async fn create_or_sync_user(&self, command: UserUpsertCommand) -> Result<(), GatewayError> {
        self.record(RecordedCall::CreateOrSync(command))
    }

    async fn patch_user(&self, command: UserPatchCommand) -> Result<(), GatewayError> {
        self.record(RecordedCall::Patch(command))
    }

    async fn delete_user(&self, command: UserDeleteCommand) -> Result<(), GatewayError> {
        self.record(RecordedCall::Delete(command))
    }
}
