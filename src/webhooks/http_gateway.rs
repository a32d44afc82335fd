//! [`UserSyncGateway`] backed by a remote function-style HTTP API.
//!
//! Each command becomes one `POST {base_url}/api/mutation` request:
//!
//! ```json
//! {"path": "users:syncUser", "args": {"clerkId": "u1", ...}, "format": "json"}
//! ```
//!
//! The backend answers `{"status": "success", ...}` or
//! `{"status": "error", "errorMessage": "..."}`. Requests are not retried;
//! the provider redelivers the webhook when we answer with a 500.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::GatewayConfig;
use crate::error::{Result, SyncError};

use super::commands::{UserDeleteCommand, UserPatchCommand, UserUpsertCommand};
use super::gateway::{GatewayError, UserSyncGateway};

/// Default timeout for mutation requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Function paths invoked for each command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationFunctions {
    pub sync_user: String,
    pub update_user: String,
    pub delete_user: String,
}

impl Default for MutationFunctions {
    fn default() -> Self {
        Self {
            sync_user: "users:syncUser".to_string(),
            update_user: "users:updateUserWebhook".to_string(),
            delete_user: "users:deleteUserWebhook".to_string(),
        }
    }
}

#[derive(Serialize)]
struct MutationRequest<'a, A> {
    path: &'a str,
    args: A,
    format: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MutationResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncUserArgs<'a> {
    clerk_id: &'a str,
    email: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserArgs<'a> {
    clerk_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteUserArgs<'a> {
    clerk_id: &'a str,
}

/// HTTP client for the remote user store.
///
/// # Example
///
/// ```rust,ignore
/// use identity_sync::webhooks::HttpMutationGateway;
///
/// let gateway = HttpMutationGateway::new("https://happy-otter-123.convex.cloud")?
///     .with_deploy_key("prod:happy-otter-123|...".into());
/// ```
#[derive(Debug, Clone)]
pub struct HttpMutationGateway {
    client: reqwest::Client,
    endpoint: String,
    deploy_key: Option<SecretString>,
    functions: MutationFunctions,
}

impl HttpMutationGateway {
    /// Create a gateway for the deployment at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the URL is not http(s) or the HTTP
    /// client cannot be built.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.as_ref().trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(SyncError::config(format!(
                "Gateway URL must start with http:// or https://, got: {}",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("identity-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::config(format!("Failed to build gateway HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/mutation", base_url),
            deploy_key: None,
            functions: MutationFunctions::default(),
        })
    }

    /// Build a gateway from the `gateway` config section.
    ///
    /// Returns `Ok(None)` when no URL is configured.
    pub fn from_config(config: &GatewayConfig) -> Result<Option<Self>> {
        let Some(url) = &config.url else {
            return Ok(None);
        };

        let mut gateway = Self::with_timeout(url, config.timeout())?;
        if let Some(key) = &config.deploy_key {
            gateway = gateway.with_deploy_key(SecretString::from(key.expose_secret().to_owned()));
        }
        Ok(Some(gateway))
    }

    /// Authenticate requests with a deploy key (`Authorization: Convex <key>`).
    #[must_use]
    pub fn with_deploy_key(mut self, deploy_key: SecretString) -> Self {
        self.deploy_key = Some(deploy_key);
        self
    }

    #[must_use]
    pub fn with_functions(mut self, functions: MutationFunctions) -> Self {
        self.functions = functions;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn functions(&self) -> &MutationFunctions {
        &self.functions
    }

    async fn run_mutation<A: Serialize + Send + Sync>(
        &self,
        function: &str,
        args: A,
    ) -> std::result::Result<(), GatewayError> {
        let mut request = self.client.post(&self.endpoint).json(&MutationRequest {
            path: function,
            args,
            format: "json",
        });
        if let Some(key) = &self.deploy_key {
            request = request.header(
                reqwest::header::AUTHORIZATION,
                format!("Convex {}", key.expose_secret()),
            );
        }

        let response = request.send().await.map_err(|e| {
            GatewayError::Unavailable(format!("{} request failed: {}", function, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::rejected(
                Some(status.as_u16()),
                format!("{} returned {}: {}", function, status, truncate(&body, 512)),
            ));
        }

        let outcome: MutationResponse = response.json().await.map_err(|e| {
            GatewayError::rejected(
                Some(status.as_u16()),
                format!("{} returned an unreadable response: {}", function, e),
            )
        })?;

        match outcome.status.as_str() {
            "success" => {
                tracing::debug!(function, "Mutation applied");
                Ok(())
            }
            _ => Err(GatewayError::rejected(
                None,
                outcome
                    .error_message
                    .unwrap_or_else(|| format!("{} failed with status '{}'", function, outcome.status)),
            )),
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl UserSyncGateway for HttpMutationGateway {
    async fn create_or_sync_user(
        &self,
        command: UserUpsertCommand,
    ) -> std::result::Result<(), GatewayError> {
        let args = SyncUserArgs {
            clerk_id: &command.external_id,
            email: &command.email,
            name: &command.display_name,
            image: command.avatar_url.as_deref(),
        };
        self.run_mutation(&self.functions.sync_user, args).await
    }

    async fn patch_user(&self, command: UserPatchCommand) -> std::result::Result<(), GatewayError> {
        let args = UpdateUserArgs {
            clerk_id: &command.external_id,
            name: command.display_name.as_deref(),
            email: command.email.as_deref(),
            image: command.avatar_url.as_deref(),
        };
        self.run_mutation(&self.functions.update_user, args).await
    }

    async fn delete_user(&self, command: UserDeleteCommand) -> std::result::Result<(), GatewayError> {
        let args = DeleteUserArgs {
            clerk_id: &command.external_id,
        };
        self.run_mutation(&self.functions.delete_user, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let gateway = HttpMutationGateway::new("https://happy-otter-123.convex.cloud/").unwrap();
        assert_eq!(
            gateway.endpoint(),
            "https://happy-otter-123.convex.cloud/api/mutation"
        );
    }

    #[test]
    fn test_rejects_non_http_url() {
        let err = HttpMutationGateway::new("happy-otter-123.convex.cloud").unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn test_from_config_without_url() {
        assert!(HttpMutationGateway::from_config(&GatewayConfig::default()).unwrap().is_none());
    }

    #[test]
    fn test_default_function_paths() {
        let functions = MutationFunctions::default();
        assert_eq!(functions.sync_user, "users:syncUser");
        assert_eq!(functions.update_user, "users:updateUserWebhook");
        assert_eq!(functions.delete_user, "users:deleteUserWebhook");
    }

    #[test]
    fn test_update_args_omit_absent_fields() {
        let args = UpdateUserArgs {
            clerk_id: "u1",
            name: None,
            email: None,
            image: Some("https://img.example/u1.png"),
        };

        assert_eq!(
            serde_json::to_value(args).unwrap(),
            json!({"clerkId": "u1", "image": "https://img.example/u1.png"})
        );
    }

    #[test]
    fn test_request_envelope_shape() {
        let request = MutationRequest {
            path: "users:deleteUserWebhook",
            args: DeleteUserArgs { clerk_id: "u1" },
            format: "json",
        };

        assert_eq!(
            serde_json::to_value(request).unwrap(),
            json!({"path": "users:deleteUserWebhook", "args": {"clerkId": "u1"}, "format": "json"})
        );
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("short", 512), "short");
    }
}
