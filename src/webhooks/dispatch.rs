use std::sync::Arc;

use crate::error::{Result, SyncError};

use super::commands::{UserDeleteCommand, UserPatchCommand, UserUpsertCommand};
use super::event::VerifiedEvent;
use super::gateway::UserSyncGateway;

/// What happened to a verified event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A full upsert was applied.
    Created,
    /// A partial update was applied.
    Updated,
    /// The user was removed.
    Deleted,
    /// A deletion event that did not confirm a deleted user; nothing was called.
    Skipped,
    /// An event type this service does not handle.
    Ignored,
    /// The delivery id was already processed; nothing was called.
    Duplicate,
}

impl DispatchOutcome {
    /// True when a gateway mutation was issued.
    pub fn mutated(&self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Deleted)
    }
}

/// Routes each verified event to exactly one gateway mutation.
///
/// The dispatcher holds no state besides the gateway handle and never
/// retries: a failed mutation is returned as [`SyncError::Dispatch`] and the
/// provider's redelivery takes care of the retry.
#[derive(Clone)]
pub struct EventDispatcher {
    gateway: Arc<dyn UserSyncGateway>,
}

impl EventDispatcher {
    pub fn new(gateway: Arc<dyn UserSyncGateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<dyn UserSyncGateway> {
        &self.gateway
    }

    pub async fn dispatch(&self, event: &VerifiedEvent) -> Result<DispatchOutcome> {
        let event_type = event.event_type();

        match event {
            VerifiedEvent::UserCreated(user) => {
                let command = UserUpsertCommand::from_created(user);
                tracing::info!(
                    event_type,
                    external_id = %command.external_id,
                    "Syncing created user"
                );
                self.gateway
                    .create_or_sync_user(command)
                    .await
                    .map_err(|e| SyncError::dispatch(event_type, e))?;
                Ok(DispatchOutcome::Created)
            }
            VerifiedEvent::UserUpdated(user) => {
                let command = UserPatchCommand::from_updated(user);
                tracing::info!(
                    event_type,
                    external_id = %command.external_id,
                    display_name = command.display_name.is_some(),
                    email = command.email.is_some(),
                    avatar = command.avatar_url.is_some(),
                    "Patching updated user"
                );
                self.gateway
                    .patch_user(command)
                    .await
                    .map_err(|e| SyncError::dispatch(event_type, e))?;
                Ok(DispatchOutcome::Updated)
            }
            VerifiedEvent::UserDeleted(deleted) => {
                let Some(command) = UserDeleteCommand::from_deleted(deleted) else {
                    tracing::info!(
                        event_type,
                        object = ?deleted.object,
                        id = ?deleted.id,
                        deleted = ?deleted.deleted,
                        "Deletion not confirmed for a user, skipping"
                    );
                    return Ok(DispatchOutcome::Skipped);
                };

                tracing::info!(
                    event_type,
                    external_id = %command.external_id,
                    "Deleting user"
                );
                self.gateway
                    .delete_user(command)
                    .await
                    .map_err(|e| SyncError::dispatch(event_type, e))?;
                Ok(DispatchOutcome::Deleted)
            }
            VerifiedEvent::Other { .. } => {
                tracing::info!(event_type, "Unhandled event type");
                Ok(DispatchOutcome::Ignored)
            }
        }
    }
}
