//! Typed projections of provider events.
//!
//! The verified body is decoded into a closed set of variants. Unknown event
//! types are kept as [`VerifiedEvent::Other`] so new provider events never fail
//! a delivery.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{Result, SyncError};

pub const USER_CREATED: &str = "user.created";
pub const USER_UPDATED: &str = "user.updated";
pub const USER_DELETED: &str = "user.deleted";

/// Event discriminator, closed over the types the dispatcher handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    UserCreated,
    UserUpdated,
    UserDeleted,
    Other,
}

impl EventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            USER_CREATED => Self::UserCreated,
            USER_UPDATED => Self::UserUpdated,
            USER_DELETED => Self::UserDeleted,
            _ => Self::Other,
        }
    }
}

/// One entry of a user's email address list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EmailAddress {
    pub email_address: String,
}

/// The user-record projection carried by created/updated events.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserPayload {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// The tombstone carried by deletion events. Every field is optional and a
/// field of the wrong type reads as absent; the dispatcher decides whether
/// what is left confirms a deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeletedObject {
    #[serde(default, deserialize_with = "wrong_type_as_none")]
    pub object: Option<String>,
    #[serde(default, deserialize_with = "wrong_type_as_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "wrong_type_as_none")]
    pub deleted: Option<bool>,
}

fn wrong_type_as_none<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| serde_json::from_value(value).ok()))
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// An event whose signature has been verified and whose shape has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifiedEvent {
    UserCreated(UserPayload),
    UserUpdated(UserPayload),
    UserDeleted(DeletedObject),
    Other { event_type: String },
}

impl VerifiedEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::UserCreated(_) => EventKind::UserCreated,
            Self::UserUpdated(_) => EventKind::UserUpdated,
            Self::UserDeleted(_) => EventKind::UserDeleted,
            Self::Other { .. } => EventKind::Other,
        }
    }

    /// The provider's type string, as received.
    pub fn event_type(&self) -> &str {
        match self {
            Self::UserCreated(_) => USER_CREATED,
            Self::UserUpdated(_) => USER_UPDATED,
            Self::UserDeleted(_) => USER_DELETED,
            Self::Other { event_type } => event_type,
        }
    }
}

/// Decode a verified body into a typed event.
///
/// # Errors
///
/// Returns [`SyncError::Parse`] when the body has no string `type`, when a
/// handled event has no `data` object, or when created/updated user data does
/// not match the expected projection. These indicate upstream schema drift,
/// not a client fault. Deletion tombstones never fail on field types.
pub fn classify(body: Value) -> Result<VerifiedEvent> {
    let Value::Object(mut body) = body else {
        return Err(SyncError::parse("event body is not a JSON object"));
    };

    let event_type = match body.get("type") {
        Some(Value::String(event_type)) => event_type.clone(),
        _ => return Err(SyncError::parse("event has no string `type`")),
    };

    let kind = EventKind::from_type(&event_type);
    if kind == EventKind::Other {
        return Ok(VerifiedEvent::Other { event_type });
    }

    let data = match body.remove("data") {
        Some(data @ Value::Object(_)) => data,
        _ => {
            return Err(SyncError::parse(format!(
                "{} event has no `data` object",
                event_type
            )));
        }
    };

    match kind {
        EventKind::UserCreated => Ok(VerifiedEvent::UserCreated(user_payload(&event_type, data)?)),
        EventKind::UserUpdated => Ok(VerifiedEvent::UserUpdated(user_payload(&event_type, data)?)),
        EventKind::UserDeleted => {
            let deleted = serde_json::from_value(data)
                .map_err(|e| SyncError::parse(format!("{}: {}", event_type, e)))?;
            Ok(VerifiedEvent::UserDeleted(deleted))
        }
        EventKind::Other => Ok(VerifiedEvent::Other { event_type }),
    }
}

fn user_payload(event_type: &str, data: Value) -> Result<UserPayload> {
    let user: UserPayload = serde_json::from_value(data)
        .map_err(|e| SyncError::parse(format!("{}: {}", event_type, e)))?;

    if user.id.trim().is_empty() {
        return Err(SyncError::parse(format!("{}: user id is empty", event_type)));
    }

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_kind_from_type() {
        assert_eq!(EventKind::from_type("user.created"), EventKind::UserCreated);
        assert_eq!(EventKind::from_type("user.updated"), EventKind::UserUpdated);
        assert_eq!(EventKind::from_type("user.deleted"), EventKind::UserDeleted);
        assert_eq!(EventKind::from_type("session.created"), EventKind::Other);
        assert_eq!(EventKind::from_type("USER.CREATED"), EventKind::Other);
    }

    #[test]
    fn test_classify_user_created() {
        let event = classify(json!({
            "type": "user.created",
            "object": "event",
            "data": {
                "id": "user_1",
                "email_addresses": [{"id": "idn_1", "email_address": "a@b.com"}],
                "first_name": "Ada",
                "last_name": null,
                "image_url": "https://img.example/1.png",
                "public_metadata": {}
            }
        }))
        .unwrap();

        assert_eq!(event.kind(), EventKind::UserCreated);
        assert_eq!(event.event_type(), "user.created");
        let VerifiedEvent::UserCreated(user) = event else {
            panic!("expected UserCreated");
        };
        assert_eq!(user.id, "user_1");
        assert_eq!(user.email_addresses[0].email_address, "a@b.com");
        assert_eq!(user.first_name.as_deref(), Some("Ada"));
        assert_eq!(user.last_name, None);
        assert_eq!(user.username, None);
        assert_eq!(user.image_url.as_deref(), Some("https://img.example/1.png"));
    }

    #[test]
    fn test_classify_user_updated_minimal() {
        let event = classify(json!({"type": "user.updated", "data": {"id": "user_2"}})).unwrap();

        let VerifiedEvent::UserUpdated(user) = event else {
            panic!("expected UserUpdated");
        };
        assert!(user.email_addresses.is_empty());
        assert_eq!(user.first_name, None);
    }

    #[test]
    fn test_classify_null_email_list() {
        let event = classify(json!({
            "type": "user.updated",
            "data": {"id": "user_2", "email_addresses": null}
        }))
        .unwrap();

        let VerifiedEvent::UserUpdated(user) = event else {
            panic!("expected UserUpdated");
        };
        assert!(user.email_addresses.is_empty());
    }

    #[test]
    fn test_classify_user_deleted() {
        let event = classify(json!({
            "type": "user.deleted",
            "data": {"object": "user", "id": "user_3", "deleted": true}
        }))
        .unwrap();

        assert_eq!(
            event,
            VerifiedEvent::UserDeleted(DeletedObject {
                object: Some("user".to_string()),
                id: Some("user_3".to_string()),
                deleted: Some(true),
            })
        );
    }

    #[test]
    fn test_classify_user_deleted_partial_is_not_an_error() {
        let event = classify(json!({"type": "user.deleted", "data": {}})).unwrap();
        assert_eq!(event, VerifiedEvent::UserDeleted(DeletedObject::default()));
    }

    #[test]
    fn test_classify_user_deleted_wrong_field_types_read_as_absent() {
        let cases = [
            (
                json!({"object": "user", "id": "u1", "deleted": "true"}),
                DeletedObject {
                    object: Some("user".to_string()),
                    id: Some("u1".to_string()),
                    deleted: None,
                },
            ),
            (
                json!({"object": "user", "id": 123, "deleted": true}),
                DeletedObject {
                    object: Some("user".to_string()),
                    id: None,
                    deleted: Some(true),
                },
            ),
            (
                json!({"object": 5, "id": "u1", "deleted": true}),
                DeletedObject {
                    object: None,
                    id: Some("u1".to_string()),
                    deleted: Some(true),
                },
            ),
        ];

        for (data, expected) in cases {
            let event = classify(json!({"type": "user.deleted", "data": data})).unwrap();
            assert_eq!(event, VerifiedEvent::UserDeleted(expected));
        }
    }

    #[test]
    fn test_classify_unknown_type_is_other() {
        let event = classify(json!({"type": "organization.created", "data": {"id": 42}})).unwrap();

        assert_eq!(event.kind(), EventKind::Other);
        assert_eq!(event.event_type(), "organization.created");
    }

    #[test]
    fn test_classify_unknown_type_without_data() {
        let event = classify(json!({"type": "email.created"})).unwrap();
        assert_eq!(event.kind(), EventKind::Other);
    }

    #[test]
    fn test_classify_missing_type() {
        let err = classify(json!({"data": {"id": "user_1"}})).unwrap_err();
        assert!(matches!(err, SyncError::Parse(_)));
    }

    #[test]
    fn test_classify_non_string_type() {
        let err = classify(json!({"type": 7, "data": {}})).unwrap_err();
        assert!(matches!(err, SyncError::Parse(_)));
    }

    #[test]
    fn test_classify_body_not_an_object() {
        let err = classify(json!(["user.created"])).unwrap_err();
        assert!(matches!(err, SyncError::Parse(_)));
    }

    #[test]
    fn test_classify_missing_data() {
        let err = classify(json!({"type": "user.created"})).unwrap_err();
        assert!(matches!(err, SyncError::Parse(_)));
    }

    #[test]
    fn test_classify_user_without_id() {
        let err = classify(json!({
            "type": "user.created",
            "data": {"email_addresses": [], "first_name": "A"}
        }))
        .unwrap_err();
        assert!(matches!(err, SyncError::Parse(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_classify_user_with_empty_id() {
        let err = classify(json!({"type": "user.updated", "data": {"id": "  "}})).unwrap_err();
        assert!(matches!(err, SyncError::Parse(_)));
    }

    #[test]
    fn test_classify_user_with_wrong_field_types() {
        let err = classify(json!({
            "type": "user.updated",
            "data": {"id": "user_1", "email_addresses": "a@b.com"}
        }))
        .unwrap_err();
        assert!(matches!(err, SyncError::Parse(_)));
    }

    #[test]
    fn test_classify_deleted_data_not_object() {
        let err = classify(json!({"type": "user.deleted", "data": "user_1"})).unwrap_err();
        assert!(matches!(err, SyncError::Parse(_)));
    }
}
