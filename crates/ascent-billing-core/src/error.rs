//! Billing edge errors

use thiserror::Error;

use ascent_entitlement_core::CoreError;

/// Errors at the payment-provider edge
#[derive(Error, Debug)]
pub enum BillingError {
    /// Webhook verification or parsing error
    #[error("webhook error: {0}")]
    Webhook(String),

    /// Payment provider error
    #[error("provider error: {0}")]
    Provider(String),

    /// Core entitlement or lifecycle error
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] ascent_db::DbError),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl BillingError {
    /// Whether the failure is a verification problem the caller should
    /// answer with a rejection rather than a retry
    pub fn is_verification_failure(&self) -> bool {
        matches!(self, Self::Webhook(_))
    }
}
