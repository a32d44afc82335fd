/// Prefix checked before the bare variable name.
pub const ENV_PREFIX: &str = "IDENTITY_SYNC_";

/// Get environment variable with IDENTITY_SYNC_ prefix, falling back to unprefixed version
///
/// This helper function checks for `IDENTITY_SYNC_{key}` first, then falls back to `{key}`
/// for compatibility with standard environment variable naming.
///
/// # Examples
///
/// ```rust
/// use identity_sync::utils::get_env_with_prefix;
///
/// // Checks IDENTITY_SYNC_PORT first, then PORT
/// let port = get_env_with_prefix("PORT");
///
/// // Checks IDENTITY_SYNC_WEBHOOK_SECRET first, then WEBHOOK_SECRET
/// let secret = get_env_with_prefix("WEBHOOK_SECRET");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, key))
        .or_else(|_| std::env::var(key))
        .ok()
}
