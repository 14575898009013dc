//! Subscription lifecycle - the status state machine and its user side effects
//!
//! Transitions: pending -> active (payment confirmed), active -> cancelled,
//! active -> active (plan swap), pending -> expired (abandoned checkout,
//! external trigger). Cancelled and expired are terminal.
//!
//! Every transition that grants or revokes a tier also updates the linked
//! user's denormalized `role` and subscription window. The subscription
//! write always lands first; if the user write then fails the subscription
//! is already correct and the caller retries the sync (activation is
//! idempotent for exactly this reason).

use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use tracing::{info, instrument, warn};

use ascent_db::{SubscriptionStore, UserDirectory};
use ascent_types::{
    BillingCycle, Cancellation, FeatureGrant, FeatureSet, Plan, Renewal, RenewalOutcome, Role,
    Subscription, SubscriptionId, SubscriptionStatus, UserId,
};

use crate::catalog::PlanCatalog;
use crate::error::CoreError;

/// Subscription state machine over injected stores
pub struct SubscriptionLifecycle<U, S> {
    users: Arc<U>,
    subscriptions: Arc<S>,
    catalog: Arc<PlanCatalog>,
}

impl<U, S> SubscriptionLifecycle<U, S>
where
    U: UserDirectory,
    S: SubscriptionStore,
{
    /// Create a new lifecycle over the injected collaborators
    pub fn new(users: Arc<U>, subscriptions: Arc<S>, catalog: Arc<PlanCatalog>) -> Self {
        Self {
            users,
            subscriptions,
            catalog,
        }
    }

    /// Create a pending subscription awaiting payment confirmation
    pub async fn create_pending(
        &self,
        user_id: UserId,
        plan: Plan,
        cycle: BillingCycle,
    ) -> Result<Subscription, CoreError> {
        self.create_pending_at(user_id, plan, cycle, Utc::now()).await
    }

    /// [`Self::create_pending`] with an explicit clock
    #[instrument(skip(self), fields(user_id = %user_id, plan = %plan))]
    pub async fn create_pending_at(
        &self,
        user_id: UserId,
        plan: Plan,
        cycle: BillingCycle,
        now: DateTime<Utc>,
    ) -> Result<Subscription, CoreError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("user {user_id}")))?;

        if let Some(existing) = self.subscriptions.find_by_user_id(user_id).await? {
            if existing.status.is_entitled() {
                return Err(CoreError::Conflict(format!(
                    "user {user_id} already has an {} subscription",
                    existing.status
                )));
            }
            // pending/terminal rows are superseded by the new document
        }

        // calendar-correct period end, not a fixed day count
        let end_date = now
            .checked_add_months(Months::new(cycle.months()))
            .ok_or_else(|| CoreError::Config("subscription end date overflow".into()))?;

        let sub = Subscription {
            id: SubscriptionId::new(),
            user_id,
            plan,
            status: SubscriptionStatus::Pending,
            billing_cycle: cycle,
            price_cents: self.catalog.price_cents(plan, cycle)?,
            currency: "usd".to_string(),
            start_date: now,
            end_date,
            trial_ends_at: None,
            payment_provider: None,
            payment_ref: None,
            features: self.catalog.features_for(plan, now)?,
            cancellation: None,
            renewals: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        self.subscriptions.create(&sub).await?;
        info!(subscription_id = %sub.id, "Created pending subscription");
        Ok(sub)
    }

    /// Activate a subscription after payment confirmation
    ///
    /// Idempotent: activating an already-active subscription does not touch
    /// its counters or features again, but re-runs the user sync so a retry
    /// can repair a previously failed dual write.
    pub async fn activate(
        &self,
        id: SubscriptionId,
        payment_ref: &str,
    ) -> Result<Subscription, CoreError> {
        self.activate_at(id, payment_ref, Utc::now()).await
    }

    /// [`Self::activate`] with an explicit clock
    #[instrument(skip(self), fields(subscription_id = %id))]
    pub async fn activate_at(
        &self,
        id: SubscriptionId,
        payment_ref: &str,
        now: DateTime<Utc>,
    ) -> Result<Subscription, CoreError> {
        let sub = self.load(id).await?;

        match sub.status {
            SubscriptionStatus::Active => {
                self.promote_user(&sub).await?;
                return Ok(sub);
            }
            SubscriptionStatus::Pending | SubscriptionStatus::Trial => {}
            status => {
                return Err(CoreError::InvalidState {
                    action: "activate",
                    status,
                })
            }
        }

        let features = self.catalog.features_for(sub.plan, now)?;
        self.subscriptions
            .mark_active(id, payment_ref, &features)
            .await?;

        let mut updated = sub;
        updated.status = SubscriptionStatus::Active;
        updated.payment_ref = Some(payment_ref.to_string());
        updated.features = features;
        updated.updated_at = now;

        self.promote_user(&updated).await?;
        info!(subscription_id = %id, plan = %updated.plan, "Subscription activated");
        Ok(updated)
    }

    /// Swap the plan on an active subscription, mid-period
    ///
    /// Features are recomputed from the catalog for the new plan; `used`
    /// counters and period anchors carry over for counted features that
    /// already existed (the period has not elapsed), newly introduced ones
    /// start at zero.
    pub async fn change_plan(
        &self,
        id: SubscriptionId,
        new_plan: Plan,
    ) -> Result<Subscription, CoreError> {
        self.change_plan_at(id, new_plan, Utc::now()).await
    }

    /// [`Self::change_plan`] with an explicit clock
    #[instrument(skip(self), fields(subscription_id = %id, new_plan = %new_plan))]
    pub async fn change_plan_at(
        &self,
        id: SubscriptionId,
        new_plan: Plan,
        now: DateTime<Utc>,
    ) -> Result<Subscription, CoreError> {
        let sub = self.load(id).await?;

        if sub.status != SubscriptionStatus::Active {
            return Err(CoreError::InvalidState {
                action: "change the plan of",
                status: sub.status,
            });
        }

        let template = self.catalog.features_for(new_plan, now)?;
        let features: FeatureSet = template
            .iter()
            .map(|(feature, grant)| {
                let carried = match (grant, sub.features.get(feature)) {
                    (
                        FeatureGrant::Counted {
                            enabled,
                            limit,
                            period,
                            ..
                        },
                        Some(FeatureGrant::Counted {
                            used,
                            period_started_at,
                            ..
                        }),
                    ) => FeatureGrant::Counted {
                        enabled: *enabled,
                        limit: *limit,
                        period: *period,
                        used: *used,
                        period_started_at: *period_started_at,
                    },
                    _ => grant.clone(),
                };
                (feature, carried)
            })
            .collect();

        let price_cents = self.catalog.price_cents(new_plan, sub.billing_cycle)?;
        self.subscriptions
            .replace_plan(id, new_plan, price_cents, &features)
            .await?;

        let mut updated = sub;
        updated.plan = new_plan;
        updated.price_cents = price_cents;
        updated.features = features;
        updated.updated_at = now;

        self.promote_user(&updated).await?;
        info!(subscription_id = %id, plan = %new_plan, "Plan changed");
        Ok(updated)
    }

    /// Cancel an active subscription
    ///
    /// Stamps the cancellation record and demotes the user to the free role.
    /// Usage counters are left untouched - cancellation is not a rollover.
    pub async fn cancel(
        &self,
        id: SubscriptionId,
        reason: Option<String>,
        feedback: Option<String>,
    ) -> Result<Subscription, CoreError> {
        self.cancel_at(id, reason, feedback, Utc::now()).await
    }

    /// [`Self::cancel`] with an explicit clock
    #[instrument(skip(self, reason, feedback), fields(subscription_id = %id))]
    pub async fn cancel_at(
        &self,
        id: SubscriptionId,
        reason: Option<String>,
        feedback: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Subscription, CoreError> {
        let sub = self.load(id).await?;

        if sub.status != SubscriptionStatus::Active {
            return Err(CoreError::InvalidState {
                action: "cancel",
                status: sub.status,
            });
        }

        let cancellation = Cancellation {
            cancelled_at: now,
            reason,
            feedback,
        };
        self.subscriptions.mark_cancelled(id, &cancellation).await?;

        self.users.update_role(sub.user_id, Role::Free).await?;
        self.users
            .set_subscription_window(sub.user_id, None, None)
            .await?;

        let mut updated = sub;
        updated.status = SubscriptionStatus::Cancelled;
        updated.cancellation = Some(cancellation);
        updated.updated_at = now;

        info!(subscription_id = %id, "Subscription cancelled");
        Ok(updated)
    }

    /// Expire a pending subscription whose checkout was abandoned
    ///
    /// The trigger is external (a provider event or an operator sweep); the
    /// core runs no timers of its own.
    #[instrument(skip(self), fields(subscription_id = %id))]
    pub async fn expire(&self, id: SubscriptionId) -> Result<Subscription, CoreError> {
        let sub = self.load(id).await?;

        if sub.status != SubscriptionStatus::Pending {
            return Err(CoreError::InvalidState {
                action: "expire",
                status: sub.status,
            });
        }

        self.subscriptions.mark_expired(id).await?;

        let mut updated = sub;
        updated.status = SubscriptionStatus::Expired;
        Ok(updated)
    }

    /// Append one renewal attempt to the history
    ///
    /// Never changes the subscription status: a failed renewal is surfaced
    /// to the caller, who decides separately whether to cancel or expire.
    pub async fn record_renewal(
        &self,
        id: SubscriptionId,
        amount_cents: i64,
        outcome: RenewalOutcome,
        transaction_id: &str,
    ) -> Result<(), CoreError> {
        self.record_renewal_at(id, amount_cents, outcome, transaction_id, Utc::now())
            .await
    }

    /// [`Self::record_renewal`] with an explicit clock
    #[instrument(skip(self), fields(subscription_id = %id, outcome = ?outcome))]
    pub async fn record_renewal_at(
        &self,
        id: SubscriptionId,
        amount_cents: i64,
        outcome: RenewalOutcome,
        transaction_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.load(id).await?;

        let renewal = Renewal {
            date: now,
            amount_cents,
            outcome,
            transaction_id: transaction_id.to_string(),
        };
        self.subscriptions.append_renewal(id, &renewal).await?;

        if outcome == RenewalOutcome::Failed {
            warn!(subscription_id = %id, transaction_id, "Renewal payment failed");
        }
        Ok(())
    }

    async fn load(&self, id: SubscriptionId) -> Result<Subscription, CoreError> {
        self.subscriptions
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("subscription {id}")))
    }

    /// Sync the linked user's denormalized role and subscription window.
    /// Runs after the subscription write; safe to repeat.
    async fn promote_user(&self, sub: &Subscription) -> Result<(), CoreError> {
        self.users.update_role(sub.user_id, sub.plan.role()).await?;
        self.users
            .set_subscription_window(sub.user_id, Some(sub.plan), Some(sub.end_date))
            .await
            .map_err(|e| {
                warn!(user_id = %sub.user_id, "User subscription window sync failed; retry activation");
                e
            })?;
        Ok(())
    }
}
