use secrecy::SecretString;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Result, SyncError};
use crate::utils::get_env_with_prefix;
use crate::webhooks::verification::DEFAULT_TOLERANCE_SECS;

/// Main configuration for the identity-sync service
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum request body size in bytes (default: 1MB)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

/// Inbound webhook settings.
///
/// The signing secret is never deserialised from files; it only comes from
/// the environment or [`ConfigBuilder::with_webhook_secret`].
#[derive(Debug, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_webhook_path")]
    pub path: String,
    #[serde(skip)]
    pub secret: Option<SecretString>,
    #[serde(default = "default_tolerance_seconds")]
    pub tolerance_seconds: u64,
    /// Skip deliveries whose id was already processed successfully.
    #[serde(default)]
    pub deduplicate: bool,
}

/// Remote user store settings. Without a `url` the in-memory store is used.
#[derive(Debug, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(skip)]
    pub deploy_key: Option<SecretString>,
    #[serde(default = "default_gateway_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            path: default_webhook_path(),
            secret: None,
            tolerance_seconds: default_tolerance_seconds(),
            deduplicate: false,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: None,
            deploy_key: None,
            timeout_seconds: default_gateway_timeout_seconds(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

fn default_max_body_size() -> usize {
    1024 * 1024 // 1MB, provider payloads are a few KB
}

fn default_webhook_path() -> String {
    "/clerk-webhook".to_string()
}

fn default_tolerance_seconds() -> u64 {
    DEFAULT_TOLERANCE_SECS
}

fn default_gateway_timeout_seconds() -> u64 {
    10
}

impl ServerConfig {
    pub fn addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl WebhookConfig {
    pub fn tolerance(&self) -> Duration {
        Duration::from_secs(self.tolerance_seconds)
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    /// Set the maximum request body size in bytes
    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.config.server.max_body_size = max_body_size;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn with_webhook_path(mut self, path: impl Into<String>) -> Self {
        self.config.webhook.path = path.into();
        self
    }

    /// Set the provider's signing secret (`whsec_...`).
    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.webhook.secret = non_empty_secret(secret.into());
        self
    }

    pub fn with_webhook_tolerance(mut self, tolerance_seconds: u64) -> Self {
        self.config.webhook.tolerance_seconds = tolerance_seconds;
        self
    }

    pub fn with_deduplication(mut self, enabled: bool) -> Self {
        self.config.webhook.deduplicate = enabled;
        self
    }

    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.config.gateway.url = Some(url.into());
        self
    }

    pub fn with_gateway_deploy_key(mut self, deploy_key: impl Into<String>) -> Self {
        self.config.gateway.deploy_key = non_empty_secret(deploy_key.into());
        self
    }

    pub fn with_gateway_timeout(mut self, timeout_seconds: u64) -> Self {
        self.config.gateway.timeout_seconds = timeout_seconds;
        self
    }

    /// Load configuration from environment variables with IDENTITY_SYNC_ prefix
    pub fn from_env(mut self) -> Self {
        if let Some(host) = get_env_with_prefix("HOST") {
            self.config.server.host = host;
        }
        // Check IDENTITY_SYNC_PORT first, fall back to PORT (for Railway/Heroku compatibility)
        if let Some(port) = get_env_with_prefix("PORT") {
            if let Ok(p) = port.parse() {
                self.config.server.port = p;
            }
        }
        if let Some(max_body_size) = get_env_with_prefix("MAX_BODY_SIZE") {
            if let Ok(size) = max_body_size.parse() {
                self.config.server.max_body_size = size;
            }
        }
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            self.config.logging.json = json.parse().unwrap_or(false);
        }

        if let Some(path) = get_env_with_prefix("WEBHOOK_PATH") {
            self.config.webhook.path = path;
        }
        // The provider dashboard names this CLERK_WEBHOOK_SECRET
        if let Some(secret) =
            get_env_with_prefix("WEBHOOK_SECRET").or_else(|| get_env_with_prefix("CLERK_WEBHOOK_SECRET"))
        {
            self.config.webhook.secret = non_empty_secret(secret);
        }
        if let Some(tolerance) = get_env_with_prefix("WEBHOOK_TOLERANCE_SECONDS") {
            if let Ok(seconds) = tolerance.parse() {
                self.config.webhook.tolerance_seconds = seconds;
            }
        }
        if let Some(deduplicate) = get_env_with_prefix("WEBHOOK_DEDUPLICATE") {
            self.config.webhook.deduplicate = deduplicate.parse().unwrap_or(false);
        }

        if let Some(url) = get_env_with_prefix("GATEWAY_URL") {
            let url = url.trim().to_string();
            self.config.gateway.url = (!url.is_empty()).then_some(url);
        }
        if let Some(deploy_key) = get_env_with_prefix("GATEWAY_DEPLOY_KEY") {
            self.config.gateway.deploy_key = non_empty_secret(deploy_key);
        }
        if let Some(timeout) = get_env_with_prefix("GATEWAY_TIMEOUT_SECONDS") {
            if let Ok(seconds) = timeout.parse() {
                self.config.gateway.timeout_seconds = seconds;
            }
        }

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// A missing webhook secret is not an error here: the service still starts
    /// and answers every delivery with a 500 until the secret is provided.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if any configuration is invalid:
    /// - Invalid server address (host:port) or port 0
    /// - Invalid log level
    /// - Zero body size limit
    /// - Webhook path not starting with `/`
    /// - Zero timestamp tolerance
    /// - Gateway URL that is not http(s), or a zero gateway timeout
    pub fn build(self) -> Result<Config> {
        // Validate server address
        self.config.server.addr().map_err(|e| {
            SyncError::config(format!(
                "Invalid server address {}:{} - {}",
                self.config.server.host, self.config.server.port, e
            ))
        })?;

        // Validate port is in valid range
        if self.config.server.port == 0 {
            return Err(SyncError::config("Server port must be greater than 0"));
        }

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.config.logging.level.to_lowercase().as_str()) {
            return Err(SyncError::config(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        // Validate max body size
        if self.config.server.max_body_size == 0 {
            return Err(SyncError::config("Maximum body size must be greater than 0"));
        }

        if !self.config.webhook.path.starts_with('/') {
            return Err(SyncError::config(format!(
                "Webhook path must start with '/', got: {}",
                self.config.webhook.path
            )));
        }

        if self.config.webhook.tolerance_seconds == 0 {
            return Err(SyncError::config(
                "Webhook timestamp tolerance must be greater than 0",
            ));
        }

        if let Some(url) = &self.config.gateway.url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(SyncError::config(format!(
                    "Gateway URL must start with http:// or https://, got: {}",
                    url
                )));
            }
        }

        if self.config.gateway.timeout_seconds == 0 {
            return Err(SyncError::config("Gateway timeout must be greater than 0"));
        }

        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty_secret(value: String) -> Option<SecretString> {
    let value = value.trim();
    (!value.is_empty()).then(|| SecretString::from(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults() {
        let config = ConfigBuilder::new().build().unwrap();

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.webhook.path, "/clerk-webhook");
        assert_eq!(config.webhook.tolerance(), Duration::from_secs(300));
        assert!(config.webhook.secret.is_none());
        assert!(!config.webhook.deduplicate);
        assert!(config.gateway.url.is_none());
        assert_eq!(config.gateway.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_builder_setters() {
        let config = ConfigBuilder::new()
            .with_host("127.0.0.1")
            .with_port(9000)
            .with_webhook_path("/hooks/identity")
            .with_webhook_secret("  whsec_c2VjcmV0  ")
            .with_webhook_tolerance(60)
            .with_deduplication(true)
            .with_gateway_url("https://example.convex.cloud")
            .with_gateway_deploy_key("prod:abc")
            .build()
            .unwrap();

        assert_eq!(config.server.addr().unwrap().to_string(), "127.0.0.1:9000");
        assert_eq!(config.webhook.path, "/hooks/identity");
        assert_eq!(
            config.webhook.secret.as_ref().map(|s| s.expose_secret()),
            Some("whsec_c2VjcmV0")
        );
        assert_eq!(config.webhook.tolerance_seconds, 60);
        assert!(config.webhook.deduplicate);
        assert_eq!(
            config.gateway.deploy_key.as_ref().map(|s| s.expose_secret()),
            Some("prod:abc")
        );
    }

    #[test]
    fn test_empty_secret_counts_as_absent() {
        let config = ConfigBuilder::new().with_webhook_secret("   ").build().unwrap();
        assert!(config.webhook.secret.is_none());
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let config = ConfigBuilder::new()
            .with_webhook_secret("whsec_dG9wLXNlY3JldA==")
            .with_gateway_deploy_key("prod:very-secret")
            .build()
            .unwrap();

        let debug = format!("{:?}", config);
        assert!(!debug.contains("dG9wLXNlY3JldA"));
        assert!(!debug.contains("very-secret"));
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let invalid = [
            ConfigBuilder::new().with_host("not a host"),
            ConfigBuilder::new().with_port(0),
            ConfigBuilder::new().with_log_level("verbose"),
            ConfigBuilder::new().with_max_body_size(0),
            ConfigBuilder::new().with_webhook_path("clerk-webhook"),
            ConfigBuilder::new().with_webhook_tolerance(0),
            ConfigBuilder::new().with_gateway_url("ftp://example.com"),
            ConfigBuilder::new().with_gateway_timeout(0),
        ];

        for builder in invalid {
            let err = builder.build().unwrap_err();
            assert!(matches!(err, SyncError::Config(_)), "{}", err);
        }
    }

    #[test]
    fn test_log_level_is_case_insensitive() {
        assert!(ConfigBuilder::new().with_log_level("DEBUG").build().is_ok());
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "server": {"port": 3000},
            "webhook": {"deduplicate": true}
        }))
        .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.webhook.path, "/clerk-webhook");
        assert!(config.webhook.deduplicate);
        assert!(config.webhook.secret.is_none());
    }
}
