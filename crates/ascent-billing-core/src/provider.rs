//! Payment provider abstraction

use async_trait::async_trait;

use ascent_types::{BillingCycle, Plan};

use crate::error::BillingError;

/// A hosted checkout session created at the provider
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    /// Provider-side session ID
    pub id: String,
    /// URL the customer is redirected to
    pub url: String,
}

/// Payment provider seam
///
/// Abstracts the hosted-payment operations so the edge can be exercised
/// without a live provider account.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a hosted checkout session for a plan purchase
    ///
    /// `reference` is our subscription ID, carried through the provider so
    /// the completion webhook can be correlated back.
    async fn create_checkout_session(
        &self,
        customer_email: &str,
        plan: Plan,
        cycle: BillingCycle,
        reference: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, BillingError>;

    /// Create a customer portal session, returning its URL
    async fn create_portal_session(
        &self,
        customer_email: &str,
        return_url: &str,
    ) -> Result<String, BillingError>;

    /// Cancel the provider-side subscription
    async fn cancel_subscription(&self, payment_ref: &str) -> Result<(), BillingError>;
}
