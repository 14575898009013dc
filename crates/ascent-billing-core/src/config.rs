//! Billing edge configuration

/// Webhook verification settings
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Shared secret for the HMAC signature
    pub secret: String,
    /// Maximum accepted clock skew for the signed timestamp, in seconds
    pub tolerance_secs: i64,
}

impl WebhookConfig {
    /// Create a config with the default 5 minute timestamp tolerance
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: 300,
        }
    }

    /// Override the timestamp tolerance
    pub fn with_tolerance_secs(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }
}
