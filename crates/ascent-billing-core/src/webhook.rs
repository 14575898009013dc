//! Provider webhook verification and dispatch
//!
//! Payment state changes arrive as signed webhook events. The verifier
//! authenticates the raw payload; the router maps each event type onto the
//! corresponding lifecycle transition. Events we do not handle are logged
//! and acknowledged so the provider stops retrying them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, error, info, instrument, warn};

use ascent_db::{SubscriptionStore, UserDirectory};
use ascent_entitlement_core::SubscriptionLifecycle;
use ascent_types::{RenewalOutcome, Subscription, SubscriptionId};

use crate::config::WebhookConfig;
use crate::error::BillingError;

/// Webhook event types we handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventType {
    /// Hosted checkout finished; payment confirmed
    CheckoutSessionCompleted,
    /// A renewal invoice was paid
    InvoicePaymentSucceeded,
    /// A renewal invoice failed to collect
    InvoicePaymentFailed,
    /// Provider-side subscription was deleted
    SubscriptionDeleted,
    /// Anything else
    Unknown(String),
}

impl From<&str> for WebhookEventType {
    fn from(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "invoice.payment_succeeded" => Self::InvoicePaymentSucceeded,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            "customer.subscription.deleted" => Self::SubscriptionDeleted,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// A verified, parsed webhook event
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    /// Provider event ID
    pub id: String,
    /// Mapped event type
    pub event_type: WebhookEventType,
    /// The event's inner object, left raw until dispatch
    pub object: serde_json::Value,
    /// Provider-side creation time (Unix timestamp)
    pub created: i64,
}

/// Signature verification for incoming webhook payloads
#[derive(Clone)]
pub struct WebhookVerifier {
    config: WebhookConfig,
}

impl WebhookVerifier {
    /// Create a verifier from the webhook configuration
    pub fn new(config: WebhookConfig) -> Self {
        Self { config }
    }

    /// Verify the signature and parse the payload into an event
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, BillingError> {
        self.verify_and_parse_at(payload, signature, Utc::now())
    }

    /// [`Self::verify_and_parse`] with an explicit clock
    #[instrument(skip(self, payload, signature))]
    pub fn verify_and_parse_at(
        &self,
        payload: &[u8],
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<WebhookEvent, BillingError> {
        self.verify_signature(payload, signature, now)?;

        let raw: RawEvent = serde_json::from_slice(payload)
            .map_err(|e| BillingError::Webhook(e.to_string()))?;

        debug!(event_id = %raw.id, event_type = %raw.event_type, "Verified webhook event");

        Ok(WebhookEvent {
            id: raw.id,
            event_type: WebhookEventType::from(raw.event_type.as_str()),
            object: raw.data.object,
            created: raw.created,
        })
    }

    /// Check the `t=timestamp,v1=hex` signature header against the payload
    fn verify_signature(
        &self,
        payload: &[u8],
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<(), BillingError> {
        let mut timestamp: Option<&str> = None;
        let mut sig_v1: Option<&str> = None;

        for part in signature.split(',') {
            if let Some((key, value)) = part.split_once('=') {
                match key {
                    "t" => timestamp = Some(value),
                    "v1" => sig_v1 = Some(value),
                    _ => {}
                }
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            warn!("Missing timestamp in webhook signature");
            BillingError::Webhook("missing timestamp".to_string())
        })?;
        let sig_v1 = sig_v1.ok_or_else(|| {
            warn!("Missing v1 signature in webhook signature");
            BillingError::Webhook("missing signature".to_string())
        })?;

        let signed_payload = format!(
            "{}.{}",
            timestamp,
            std::str::from_utf8(payload)
                .map_err(|_| BillingError::Webhook("invalid payload encoding".to_string()))?
        );

        let mut mac = Hmac::<Sha256>::new_from_slice(self.config.secret.as_bytes())
            .map_err(|_| BillingError::Internal("HMAC error".to_string()))?;
        mac.update(signed_payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        if !constant_time_eq(sig_v1.as_bytes(), expected.as_bytes()) {
            error!("Webhook signature verification failed");
            return Err(BillingError::Webhook(
                "signature verification failed".to_string(),
            ));
        }

        let ts: i64 = timestamp
            .parse()
            .map_err(|_| BillingError::Webhook("invalid timestamp format".to_string()))?;
        if (now.timestamp() - ts).abs() > self.config.tolerance_secs {
            warn!(timestamp = ts, "Webhook timestamp outside tolerance");
            return Err(BillingError::Webhook("timestamp too old".to_string()));
        }

        Ok(())
    }
}

/// What a dispatched event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Subscription activated after checkout
    Activated(SubscriptionId),
    /// Renewal attempt recorded
    RenewalRecorded(SubscriptionId),
    /// Subscription cancelled
    Cancelled(SubscriptionId),
    /// Event type not handled; acknowledged and dropped
    Ignored,
}

/// Maps verified webhook events onto lifecycle transitions
pub struct WebhookRouter<U, S> {
    lifecycle: SubscriptionLifecycle<U, S>,
    subscriptions: Arc<S>,
}

impl<U, S> WebhookRouter<U, S>
where
    U: UserDirectory,
    S: SubscriptionStore,
{
    /// Create a router over the lifecycle and its subscription store
    pub fn new(lifecycle: SubscriptionLifecycle<U, S>, subscriptions: Arc<S>) -> Self {
        Self {
            lifecycle,
            subscriptions,
        }
    }

    /// Apply the event's lifecycle transition
    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = ?event.event_type))]
    pub async fn dispatch(&self, event: &WebhookEvent) -> Result<DispatchOutcome, BillingError> {
        match &event.event_type {
            WebhookEventType::CheckoutSessionCompleted => self.on_checkout_completed(event).await,
            WebhookEventType::InvoicePaymentSucceeded => {
                self.on_invoice(event, RenewalOutcome::Success).await
            }
            WebhookEventType::InvoicePaymentFailed => {
                self.on_invoice(event, RenewalOutcome::Failed).await
            }
            WebhookEventType::SubscriptionDeleted => self.on_subscription_deleted(event).await,
            WebhookEventType::Unknown(name) => {
                info!(event_type = %name, "Ignoring unhandled webhook event");
                Ok(DispatchOutcome::Ignored)
            }
        }
    }

    /// Checkout completed: the session carries our subscription ID as its
    /// client reference and the provider-side subscription as the payment ref
    async fn on_checkout_completed(
        &self,
        event: &WebhookEvent,
    ) -> Result<DispatchOutcome, BillingError> {
        let session: CheckoutObject = serde_json::from_value(event.object.clone())
            .map_err(|e| BillingError::Webhook(e.to_string()))?;

        let reference = session.client_reference_id.ok_or_else(|| {
            BillingError::Webhook("checkout session has no client reference".to_string())
        })?;
        let subscription_id = SubscriptionId::parse(&reference).map_err(|_| {
            BillingError::Webhook(format!("invalid client reference '{reference}'"))
        })?;
        let payment_ref = session
            .subscription
            .ok_or_else(|| BillingError::Webhook("checkout session has no subscription".to_string()))?;

        self.lifecycle.activate(subscription_id, &payment_ref).await?;
        Ok(DispatchOutcome::Activated(subscription_id))
    }

    async fn on_invoice(
        &self,
        event: &WebhookEvent,
        outcome: RenewalOutcome,
    ) -> Result<DispatchOutcome, BillingError> {
        let invoice: InvoiceObject = serde_json::from_value(event.object.clone())
            .map_err(|e| BillingError::Webhook(e.to_string()))?;

        let Some(payment_ref) = invoice.subscription else {
            // one-off invoice, nothing to correlate
            info!(invoice_id = %invoice.id, "Invoice event without a subscription reference");
            return Ok(DispatchOutcome::Ignored);
        };
        let sub = self.find_by_payment_ref(&payment_ref).await?;

        let amount_cents = match outcome {
            RenewalOutcome::Success => invoice.amount_paid,
            RenewalOutcome::Failed => invoice.amount_due,
        };
        self.lifecycle
            .record_renewal(sub.id, amount_cents, outcome, &invoice.id)
            .await?;
        Ok(DispatchOutcome::RenewalRecorded(sub.id))
    }

    async fn on_subscription_deleted(
        &self,
        event: &WebhookEvent,
    ) -> Result<DispatchOutcome, BillingError> {
        let deleted: SubscriptionObject = serde_json::from_value(event.object.clone())
            .map_err(|e| BillingError::Webhook(e.to_string()))?;

        let sub = self.find_by_payment_ref(&deleted.id).await?;
        self.lifecycle
            .cancel(sub.id, Some("cancelled at the payment provider".to_string()), None)
            .await?;
        Ok(DispatchOutcome::Cancelled(sub.id))
    }

    async fn find_by_payment_ref(&self, payment_ref: &str) -> Result<Subscription, BillingError> {
        self.subscriptions
            .find_by_payment_ref(payment_ref)
            .await?
            .ok_or_else(|| {
                BillingError::Webhook(format!(
                    "no subscription with payment reference '{payment_ref}'"
                ))
            })
    }
}

/// Constant-time comparison
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
    created: i64,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutObject {
    client_reference_id: Option<String>,
    subscription: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InvoiceObject {
    id: String,
    subscription: Option<String>,
    #[serde(default)]
    amount_paid: i64,
    #[serde(default)]
    amount_due: i64,
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
}
