//! The seam between event dispatch and the user store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::commands::{UserDeleteCommand, UserPatchCommand, UserUpsertCommand};

/// A failure reported by the user store.
///
/// Every variant is transient from the webhook's point of view: the request is
/// answered with a 500 so the provider redelivers it.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The store could not be reached (connection refused, timeout, DNS).
    #[error("User store unavailable: {0}")]
    Unavailable(String),

    /// The store answered but refused the mutation.
    #[error("User store rejected mutation{}: {message}", http_status_suffix(.status))]
    Rejected { status: Option<u16>, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn http_status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl GatewayError {
    pub fn rejected(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }
}

/// Mutations the dispatcher can apply to the user store.
///
/// Implementations must be idempotent: providers deliver at least once, so
/// the same command may arrive more than once.
#[async_trait]
pub trait UserSyncGateway: Send + Sync {
    /// Create the user, or overwrite it if the external id is already known.
    async fn create_or_sync_user(&self, command: UserUpsertCommand) -> Result<(), GatewayError>;

    /// Apply the fields present in the patch. A missing user is not an error.
    async fn patch_user(&self, command: UserPatchCommand) -> Result<(), GatewayError>;

    /// Remove the user. Deleting an unknown user is not an error.
    async fn delete_user(&self, command: UserDeleteCommand) -> Result<(), GatewayError>;
}

/// A synced user as held by [`InMemoryUserStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub external_id: String,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Process-local user store.
///
/// Used when no remote store is configured, and as a reference implementation
/// of the gateway contract in tests. Contents are lost on restart.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<String, UserRecord>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, external_id: &str) -> Option<UserRecord> {
        self.users.read().await.get(external_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserSyncGateway for InMemoryUserStore {
    async fn create_or_sync_user(&self, command: UserUpsertCommand) -> Result<(), GatewayError> {
        let record = UserRecord {
            external_id: command.external_id.clone(),
            email: command.email,
            display_name: command.display_name,
            avatar_url: command.avatar_url,
        };
        self.users.write().await.insert(command.external_id, record);
        Ok(())
    }

    async fn patch_user(&self, command: UserPatchCommand) -> Result<(), GatewayError> {
        let mut users = self.users.write().await;
        let Some(record) = users.get_mut(&command.external_id) else {
            tracing::warn!(
                external_id = %command.external_id,
                "Update for unknown user ignored"
            );
            return Ok(());
        };

        if let Some(display_name) = command.display_name {
            record.display_name = display_name;
        }
        if let Some(email) = command.email {
            record.email = email;
        }
        if let Some(avatar_url) = command.avatar_url {
            record.avatar_url = Some(avatar_url);
        }
        Ok(())
    }

    async fn delete_user(&self, command: UserDeleteCommand) -> Result<(), GatewayError> {
        self.users.write().await.remove(&command.external_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upsert(id: &str, email: &str, name: &str) -> UserUpsertCommand {
        UserUpsertCommand {
            external_id: id.to_string(),
            email: email.to_string(),
            display_name: name.to_string(),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let store = InMemoryUserStore::new();
        store
            .create_or_sync_user(upsert("u1", "a@b.com", "A B"))
            .await
            .unwrap();

        let record = store.get("u1").await.unwrap();
        assert_eq!(record.email, "a@b.com");
        assert_eq!(record.display_name, "A B");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let store = InMemoryUserStore::new();
        store.create_or_sync_user(upsert("u1", "a@b.com", "A")).await.unwrap();
        store.create_or_sync_user(upsert("u1", "a@b.com", "A")).await.unwrap();

        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_create_overwrites_existing() {
        let store = InMemoryUserStore::new();
        store.create_or_sync_user(upsert("u1", "old@b.com", "Old")).await.unwrap();
        store.create_or_sync_user(upsert("u1", "new@b.com", "New")).await.unwrap();

        let record = store.get("u1").await.unwrap();
        assert_eq!(record.email, "new@b.com");
        assert_eq!(record.display_name, "New");
    }

    #[tokio::test]
    async fn test_patch_only_touches_present_fields() {
        let store = InMemoryUserStore::new();
        store.create_or_sync_user(upsert("u1", "a@b.com", "A B")).await.unwrap();

        store
            .patch_user(UserPatchCommand {
                external_id: "u1".to_string(),
                avatar_url: Some("https://img.example/new.png".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let record = store.get("u1").await.unwrap();
        assert_eq!(record.display_name, "A B");
        assert_eq!(record.email, "a@b.com");
        assert_eq!(record.avatar_url.as_deref(), Some("https://img.example/new.png"));
    }

    #[tokio::test]
    async fn test_patch_unknown_user_is_noop() {
        let store = InMemoryUserStore::new();
        store
            .patch_user(UserPatchCommand {
                external_id: "ghost".to_string(),
                display_name: Some("Ghost".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_removes_user_and_tolerates_missing() {
        let store = InMemoryUserStore::new();
        store.create_or_sync_user(upsert("u1", "a@b.com", "A")).await.unwrap();

        let delete = UserDeleteCommand {
            external_id: "u1".to_string(),
        };
        store.delete_user(delete.clone()).await.unwrap();
        store.delete_user(delete).await.unwrap();

        assert!(store.get("u1").await.is_none());
    }

    #[test]
    fn test_gateway_error_display() {
        let err = GatewayError::rejected(Some(422), "bad args");
        assert_eq!(err.to_string(), "User store rejected mutation (HTTP 422): bad args");

        let err = GatewayError::rejected(None, "function threw");
        assert_eq!(err.to_string(), "User store rejected mutation: function threw");

        let err: GatewayError = anyhow::anyhow!("boom").into();
        assert_eq!(err.to_string(), "boom");
    }
}
