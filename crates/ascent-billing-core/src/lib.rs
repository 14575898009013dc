//! Payment-provider edge: webhook verification and lifecycle dispatch
//!
//! Sits between the payment provider and the subscription core. Incoming
//! webhook events are authenticated by [`WebhookVerifier`] and translated
//! into lifecycle transitions by [`WebhookRouter`]; outgoing provider calls
//! go through the [`PaymentProvider`] seam.
//!
//! # Example
//!
//! ```rust,ignore
//! use ascent_billing_core::{WebhookConfig, WebhookRouter, WebhookVerifier};
//!
//! let verifier = WebhookVerifier::new(WebhookConfig::new("whsec_..."));
//! let router = WebhookRouter::new(lifecycle, subscriptions);
//!
//! let event = verifier.verify_and_parse(payload, signature_header)?;
//! let outcome = router.dispatch(&event).await?;
//! ```

pub mod config;
pub mod error;
pub mod provider;
pub mod webhook;

pub use config::WebhookConfig;
pub use error::BillingError;
pub use provider::{CheckoutSession, PaymentProvider};
pub use webhook::{
    DispatchOutcome, WebhookEvent, WebhookEventType, WebhookRouter, WebhookVerifier,
};
