//! Entitlement resolver - the single choke point for "can user U use F"
//!
//! Merges three paths: the admin override, the subscription-tier path
//! (per-feature grants on the subscription document), and the free-tier
//! fallback used when no subscription document exists.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use tracing::instrument;

use ascent_db::{SubscriptionStore, SubscriptionUsageStore, UserDirectory};
use ascent_types::{
    ChargeOutcome, EntitlementDecision, Feature, FeatureGrant, Plan, Role, Subscription, User,
    UserId, UNLIMITED,
};

use crate::config::FreeTierLimits;
use crate::error::CoreError;
use crate::ledger::UsageLedger;

const TIER_CACHE_CAPACITY: u64 = 10_000;

/// Entitlement resolver with a short-lived tier cache
///
/// The cache only backs the boolean tier gates ([`Self::require_plan`]);
/// counted checks always read fresh state.
pub struct EntitlementResolver<U, S, M> {
    users: Arc<U>,
    subscriptions: Arc<S>,
    ledger: UsageLedger<U, S, M>,
    /// Cache of user_id -> (role, active plan)
    tier_cache: Cache<UserId, (Role, Option<Plan>)>,
}

impl<U, S, M> EntitlementResolver<U, S, M>
where
    U: UserDirectory,
    S: SubscriptionStore,
    M: SubscriptionUsageStore,
{
    /// Create a new resolver with a 60 second tier cache
    pub fn new(users: Arc<U>, subscriptions: Arc<S>, usage: Arc<M>, limits: FreeTierLimits) -> Self {
        Self::with_cache_ttl(users, subscriptions, usage, limits, Duration::from_secs(60))
    }

    /// Create with a custom tier cache TTL
    pub fn with_cache_ttl(
        users: Arc<U>,
        subscriptions: Arc<S>,
        usage: Arc<M>,
        limits: FreeTierLimits,
        cache_ttl: Duration,
    ) -> Self {
        let ledger = UsageLedger::new(
            Arc::clone(&users),
            Arc::clone(&subscriptions),
            usage,
            limits,
        );
        Self {
            users,
            subscriptions,
            ledger,
            tier_cache: Cache::builder()
                .time_to_live(cache_ttl)
                .max_capacity(TIER_CACHE_CAPACITY)
                .build(),
        }
    }

    /// The ledger backing this resolver (for post-work charging)
    pub fn ledger(&self) -> &UsageLedger<U, S, M> {
        &self.ledger
    }

    /// Check a feature by its wire name
    ///
    /// Fails with [`CoreError::UnknownFeature`] for names not in the catalog.
    pub async fn check_by_name(
        &self,
        user_id: UserId,
        feature: &str,
    ) -> Result<EntitlementDecision, CoreError> {
        let feature: Feature = feature
            .parse()
            .map_err(|_| CoreError::UnknownFeature(feature.to_string()))?;
        self.check(user_id, feature).await
    }

    /// Check whether the user may use the feature right now
    pub async fn check(
        &self,
        user_id: UserId,
        feature: Feature,
    ) -> Result<EntitlementDecision, CoreError> {
        self.check_at(user_id, feature, Utc::now()).await
    }

    /// [`Self::check`] with an explicit clock
    #[instrument(skip(self), fields(user_id = %user_id, feature = %feature))]
    pub async fn check_at(
        &self,
        user_id: UserId,
        feature: Feature,
        now: DateTime<Utc>,
    ) -> Result<EntitlementDecision, CoreError> {
        let user = self.load_user(user_id).await?;

        // unconditional override, bypasses the ledger entirely
        if user.role == Role::Admin {
            return Ok(EntitlementDecision::allowed(UNLIMITED, 0));
        }

        let sub = self
            .subscriptions
            .find_by_user_id(user_id)
            .await?
            .filter(|s| s.status.is_entitled());

        match sub {
            Some(sub) => self.check_subscription(&sub, feature, now).await,
            None => self.check_free(&user, feature, now).await,
        }
    }

    /// Record one use of the feature; call after the work succeeded
    pub async fn increment(
        &self,
        user_id: UserId,
        feature: Feature,
    ) -> Result<ChargeOutcome, CoreError> {
        let user = self.load_user(user_id).await?;

        // admins are never metered; same bypass as check_at
        if user.role == Role::Admin {
            return Ok(ChargeOutcome::Charged);
        }

        self.ledger.increment(user_id, feature).await
    }

    /// Boolean tier gate: does the user sit at `min_plan` or above?
    ///
    /// Satisfied by the admin override, a pro role, or an active
    /// subscription at a sufficient plan. No usage counters are consulted.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn require_plan(
        &self,
        user_id: UserId,
        min_plan: Plan,
    ) -> Result<EntitlementDecision, CoreError> {
        let (role, plan) = self.access_tier(user_id).await?;

        let allowed = role == Role::Admin
            || plan.is_some_and(|p| p.level() >= min_plan.level())
            || (role == Role::Pro && min_plan.level() <= Plan::Pro.level());

        if allowed {
            Ok(EntitlementDecision::allowed(UNLIMITED, 0))
        } else {
            Ok(EntitlementDecision::denied(
                0,
                0,
                format!("This feature requires the {min_plan} plan or higher"),
            ))
        }
    }

    /// Drop the cached tier for a user (call after lifecycle transitions)
    pub async fn invalidate(&self, user_id: UserId) {
        self.tier_cache.invalidate(&user_id).await;
    }

    async fn access_tier(&self, user_id: UserId) -> Result<(Role, Option<Plan>), CoreError> {
        if let Some(cached) = self.tier_cache.get(&user_id).await {
            return Ok(cached);
        }

        let user = self.load_user(user_id).await?;
        let plan = self
            .subscriptions
            .find_by_user_id(user_id)
            .await?
            .filter(|s| s.status.is_entitled())
            .map(|s| s.plan);

        let tier = (user.role, plan);
        self.tier_cache.insert(user_id, tier).await;
        Ok(tier)
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
    ) -> Result<EntitlementDecision, CoreError> {
        let Some(grant) = sub.features.get(feature) else {
            return Ok(EntitlementDecision::denied(
                0,
                0,
                format!("'{feature}' is not enabled for the {} plan", sub.plan),
            ));
        };

        if !grant.is_enabled() {
            return Ok(EntitlementDecision::denied(
                0,
                0,
                format!("'{feature}' is not enabled for the {} plan", sub.plan),
            ));
        }

        match grant {
            FeatureGrant::Flag { .. } => Ok(EntitlementDecision::allowed(UNLIMITED, 0)),
            // the live count is checked where the resource lives; this gate
            // only reports the cap
            FeatureGrant::Capacity { max_active, .. } => {
                Ok(EntitlementDecision::allowed(*max_active, 0))
            }
            FeatureGrant::Counted { .. } => {
                let usage = self
                    .ledger
                    .check_and_maybe_reset(sub.user_id, feature, now)
                    .await?;
                if usage.allowed {
                    Ok(EntitlementDecision::allowed(usage.limit, usage.used))
                } else {
                    Ok(EntitlementDecision::denied(
                        usage.limit,
                        usage.used,
                        format!(
                            "You've reached your {feature} limit for this period ({}/{})",
                            usage.used, usage.limit
                        ),
                    ))
                }
            }
        }
    }

    async fn check_free(
        &self,
        user: &User,
        feature: Feature,
        now: DateTime<Utc>,
    ) -> Result<EntitlementDecision, CoreError> {
        let Some(limit) = self.ledger.free_limits().limit_for(feature) else {
            return Ok(EntitlementDecision::denied(
                0,
                0,
                format!("'{feature}' requires a subscription - upgrade to Pro"),
            ));
        };

        if limit == 0 {
            return Ok(EntitlementDecision::denied(
                0,
                0,
                format!("'{feature}' is not available on the free plan - upgrade to Pro"),
            ));
        }

        let usage = self
            .ledger
            .check_and_maybe_reset(user.id, feature, now)
            .await?;
        if usage.allowed {
            Ok(EntitlementDecision::allowed(usage.limit, usage.used))
        } else {
            Ok(EntitlementDecision::denied(
                usage.limit,
                usage.used,
                format!(
                    "You've used all {} free {feature} credits this month - upgrade to Pro for more",
                    usage.limit
                ),
            ))
        }
    }
}
