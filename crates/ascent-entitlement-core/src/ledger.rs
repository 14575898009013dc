//! Usage ledger - "may feature F be used right now, and record that it was"
//!
//! Two ledgers exist behind this one interface: the free-tier counters
//! embedded on the user record (monthly resets, two backed features) and the
//! per-feature counted grants on the subscription document. Callers never
//! see the split, so unifying the two paths later stays a local change.
//!
//! Resets are lazy: a counter is only rolled over at the moment it is next
//! checked. Charges go through storage-level conditional increments, so two
//! racing requests cannot both cross a limit. There is no refund operation -
//! usage is charged at the point of check-and-act and stays charged.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Utc};
use tracing::instrument;

use ascent_db::{FreeCounter, SubscriptionStore, SubscriptionUsageStore, UserDirectory};
use ascent_types::{
    ChargeOutcome, Feature, FeatureGrant, ResetPeriod, Subscription, UsageDecision, User, UserId,
    UNLIMITED,
};

use crate::config::FreeTierLimits;
use crate::error::CoreError;

/// Whether one more use fits under the limit; -1 means unlimited
pub fn is_within_limit(limit: i64, used: i64) -> bool {
    limit == UNLIMITED || used < limit
}

/// Decide whether a counter's period has rolled over
///
/// Monthly periods elapse when the calendar (year, month) of `now` is
/// strictly after that of `last`; weekly periods 7 days after the anchor.
/// Pure computation - callers apply the returned new anchor themselves.
pub fn reset_if_period_elapsed(
    last: DateTime<Utc>,
    now: DateTime<Utc>,
    period: ResetPeriod,
) -> Option<DateTime<Utc>> {
    let elapsed = match period {
        ResetPeriod::Monthly => {
            (now.year() - last.year()) * 12 + (now.month() as i32 - last.month() as i32) > 0
        }
        ResetPeriod::Weekly => now - last >= Duration::days(7),
    };
    elapsed.then_some(now)
}

/// Per-user, per-feature usage counters with period-based resets
pub struct UsageLedger<U, S, M> {
    users: Arc<U>,
    subscriptions: Arc<S>,
    usage: Arc<M>,
    free_limits: FreeTierLimits,
}

impl<U, S, M> Clone for UsageLedger<U, S, M> {
    fn clone(&self) -> Self {
        Self {
            users: Arc::clone(&self.users),
            subscriptions: Arc::clone(&self.subscriptions),
            usage: Arc::clone(&self.usage),
            free_limits: self.free_limits.clone(),
        }
    }
}

impl<U, S, M> UsageLedger<U, S, M>
where
    U: UserDirectory,
    S: SubscriptionStore,
    M: SubscriptionUsageStore,
{
    /// Create a new ledger over the injected stores
    pub fn new(
        users: Arc<U>,
        subscriptions: Arc<S>,
        usage: Arc<M>,
        free_limits: FreeTierLimits,
    ) -> Self {
        Self {
            users,
            subscriptions,
            usage,
            free_limits,
        }
    }

    /// The configured free-tier limits
    pub fn free_limits(&self) -> &FreeTierLimits {
        &self.free_limits
    }

    /// Apply any pending period rollover for the feature, then report
    /// whether one more use fits. Does not charge.
    #[instrument(skip(self), fields(user_id = %user_id, feature = %feature))]
    pub async fn check_and_maybe_reset(
        &self,
        user_id: UserId,
        feature: Feature,
        now: DateTime<Utc>,
    ) -> Result<UsageDecision, CoreError> {
        match self.entitled_subscription(user_id).await? {
            Some(sub) => self.check_subscription(&sub, feature, now).await,
            None => {
                let user = self.load_user(user_id).await?;
                self.check_free(&user, feature, now).await
            }
        }
    }

    /// Record one use of the feature, if headroom remains
    ///
    /// The guard and the increment are one conditional update at the storage
    /// layer; when it does not match, nothing was recorded and
    /// [`ChargeOutcome::LimitReached`] comes back. Call only after the
    /// corresponding work succeeded.
    #[instrument(skip(self), fields(user_id = %user_id, feature = %feature))]
    pub async fn increment(
        &self,
        user_id: UserId,
        feature: Feature,
    ) -> Result<ChargeOutcome, CoreError> {
        match self.entitled_subscription(user_id).await? {
            Some(sub) => {
                match sub.features.get(feature) {
                    Some(FeatureGrant::Counted { .. }) => {}
                    _ => {
                        return Err(CoreError::NotFound(format!(
                            "'{feature}' is not a counted feature on the {} plan",
                            sub.plan
                        )))
                    }
                }
                let charged = self.usage.try_charge(user_id, feature).await?;
                Ok(if charged {
                    ChargeOutcome::Charged
                } else {
                    ChargeOutcome::LimitReached
                })
            }
            None => {
                // user must exist before a failed guard can mean "limit"
                self.load_user(user_id).await?;
                self.increment_free(user_id, feature).await
            }
        }
    }

    async fn entitled_subscription(
        &self,
        user_id: UserId,
    ) -> Result<Option<Subscription>, CoreError> {
        let sub = self.subscriptions.find_by_user_id(user_id).await?;
        Ok(sub.filter(|s| s.status.is_entitled()))
    }

    async fn load_user(&self, user_id: UserId) -> Result<User, CoreError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("user {user_id}")))
    }

    async fn check_subscription(
        &self,
        sub: &Subscription,
        feature: Feature,
        now: DateTime<Utc>,
    ) -> Result<UsageDecision, CoreError> {
        let Some(FeatureGrant::Counted {
            limit,
            period,
            used,
            period_started_at,
            ..
        }) = sub.features.get(feature)
        else {
            return Err(CoreError::NotFound(format!(
                "'{feature}' is not a counted feature on the {} plan",
                sub.plan
            )));
        };
        let (limit, period, mut used, anchor) = (*limit, *period, *used, *period_started_at);

        if let Some(new_anchor) = reset_if_period_elapsed(anchor, now, period) {
            if self
                .usage
                .reset_counter(sub.user_id, feature, anchor, new_anchor)
                .await?
            {
                used = 0;
            } else {
                // lost the reset race; another writer moved the anchor
                used = self.reread_used(sub.user_id, feature).await?;
            }
        }

        Ok(UsageDecision {
            allowed: is_within_limit(limit, used),
            limit,
            used,
        })
    }

    async fn reread_used(&self, user_id: UserId, feature: Feature) -> Result<i64, CoreError> {
        let sub = self
            .subscriptions
            .find_by_user_id(user_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("subscription for user {user_id}")))?;
        match sub.features.get(feature) {
            Some(FeatureGrant::Counted { used, .. }) => Ok(*used),
            _ => Err(CoreError::NotFound(format!(
                "'{feature}' is not a counted feature on the {} plan",
                sub.plan
            ))),
        }
    }

    async fn check_free(
        &self,
        user: &User,
        feature: Feature,
        now: DateTime<Utc>,
    ) -> Result<UsageDecision, CoreError> {
        let limit = self.free_limits.limit_for(feature).ok_or_else(|| {
            CoreError::NotFound(format!("'{feature}' has no free-tier fallback"))
        })?;

        let used = match feature {
            Feature::ResumeAnalysis | Feature::Interviews => {
                let mut counters = (
                    user.usage.resume_analysis_count,
                    user.usage.interview_sessions_count,
                );
                let anchor = user.usage.last_reset_date;
                if let Some(new_anchor) = reset_if_period_elapsed(anchor, now, ResetPeriod::Monthly)
                {
                    if self
                        .users
                        .reset_free_usage(user.id, anchor, new_anchor)
                        .await?
                    {
                        counters = (0, 0);
                    } else if let Some(fresh) = self.users.find_by_id(user.id).await? {
                        counters = (
                            fresh.usage.resume_analysis_count,
                            fresh.usage.interview_sessions_count,
                        );
                    }
                }
                match feature {
                    Feature::ResumeAnalysis => counters.0,
                    _ => counters.1,
                }
            }
            // No backing counter exists for these on the free path; they are
            // gated by the limit alone. Preserved legacy behavior.
            Feature::JobMatches | Feature::LinkedinReview => 0,
            _ => {
                return Err(CoreError::NotFound(format!(
                    "'{feature}' has no free-tier counter"
                )))
            }
        };

        Ok(UsageDecision {
            allowed: is_within_limit(limit, used),
            limit,
            used,
        })
    }

    async fn increment_free(
        &self,
        user_id: UserId,
        feature: Feature,
    ) -> Result<ChargeOutcome, CoreError> {
        let (counter, limit) = match feature {
            Feature::ResumeAnalysis => (
                Some(FreeCounter::ResumeAnalysis),
                self.free_limits.resume_analysis,
            ),
            Feature::Interviews => (Some(FreeCounter::Interviews), self.free_limits.interviews),
            Feature::JobMatches => (None, self.free_limits.job_matches),
            Feature::LinkedinReview => (None, self.free_limits.linkedin_review),
            _ => {
                return Err(CoreError::NotFound(format!(
                    "'{feature}' is not a counted feature on the free tier"
                )))
            }
        };

        match counter {
            Some(counter) => {
                let charged = self.users.charge_free_usage(user_id, counter, limit).await?;
                Ok(if charged {
                    ChargeOutcome::Charged
                } else {
                    ChargeOutcome::LimitReached
                })
            }
            // uncounted free features: the charge is a no-op against the
            // limit-only gate
            None => Ok(if is_within_limit(limit, 0) {
                ChargeOutcome::Charged
            } else {
                ChargeOutcome::LimitReached
            }),
        }
    }
}
