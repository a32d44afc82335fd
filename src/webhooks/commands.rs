//! Mutation commands sent to the user store.
//!
//! Building a command is pure: the same event always yields the same command.

use serde::Serialize;

use super::event::{DeletedObject, UserPayload};

/// Display name used when a newly created user has no name at all.
pub const UNNAMED_USER: &str = "Unnamed User";

/// Full create-or-sync of a user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpsertCommand {
    pub external_id: String,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Partial update of a user record.
///
/// `None` means "do not change", and the key is left out when serialised.
/// A field is never set to an empty value to signal absence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatchCommand {
    pub external_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDeleteCommand {
    pub external_id: String,
}

impl UserUpsertCommand {
    /// Build the creation command, falling back to placeholders rather than
    /// failing the sync: email defaults to `""`, the name to the username and
    /// then to [`UNNAMED_USER`].
    pub fn from_created(user: &UserPayload) -> Self {
        Self {
            external_id: user.id.clone(),
            email: primary_email(user).unwrap_or_default().to_string(),
            display_name: display_name(user).unwrap_or_else(|| UNNAMED_USER.to_string()),
            avatar_url: user.image_url.clone(),
        }
    }
}

impl UserPatchCommand {
    /// Build the update command. Fields the event does not provide are omitted.
    pub fn from_updated(user: &UserPayload) -> Self {
        Self {
            external_id: user.id.clone(),
            display_name: display_name(user),
            email: primary_email(user).map(String::from),
            avatar_url: user.image_url.clone(),
        }
    }

    /// True when the patch changes nothing besides identifying the record.
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.email.is_none() && self.avatar_url.is_none()
    }
}

impl UserDeleteCommand {
    /// Build a deletion only when the tombstone confirms a deleted user with an id.
    pub fn from_deleted(deleted: &DeletedObject) -> Option<Self> {
        if deleted.object.as_deref() != Some("user") || deleted.deleted != Some(true) {
            return None;
        }

        deleted
            .id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .map(|id| Self {
                external_id: id.to_string(),
            })
    }
}

/// First address in the list, if it is non-empty.
fn primary_email(user: &UserPayload) -> Option<&str> {
    user.email_addresses
        .first()
        .map(|entry| entry.email_address.as_str())
        .filter(|email| !email.is_empty())
}

/// `"first last"` trimmed, else a non-empty username.
fn display_name(user: &UserPayload) -> Option<String> {
    let full = format!(
        "{} {}",
        user.first_name.as_deref().unwrap_or_default(),
        user.last_name.as_deref().unwrap_or_default()
    );
    let full = full.trim();
    if !full.is_empty() {
        return Some(full.to_string());
    }

    user.username
        .as_deref()
        .filter(|username| !username.is_empty())
        .map(String::from)
}
