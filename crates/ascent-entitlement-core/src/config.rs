//! Configuration for plan limits
//!
//! Limits are configuration, not hardcoded constants: the process bootstrap
//! can deserialize a [`CatalogConfig`] and override the built-in tiers.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

use ascent_types::{BillingCycle, Feature, FeatureGrant, Plan, ResetPeriod};

/// Declarative grant template for one feature on one plan
///
/// The shape is inferred from which fields are present: `max_active` makes a
/// capacity grant, `limit` a counted grant, neither a plain flag.
#[derive(Debug, Clone, Deserialize)]
pub struct GrantSpec {
    pub feature: Feature,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    pub limit: Option<i64>,
    pub period: Option<ResetPeriod>,
    pub max_active: Option<i64>,
}

fn enabled_default() -> bool {
    true
}

impl GrantSpec {
    /// A counted grant with a monthly reset
    pub fn monthly(feature: Feature, limit: i64) -> Self {
        Self {
            feature,
            enabled: true,
            limit: Some(limit),
            period: Some(ResetPeriod::Monthly),
            max_active: None,
        }
    }

    /// A counted grant with a weekly reset
    pub fn weekly(feature: Feature, limit: i64) -> Self {
        Self {
            feature,
            enabled: true,
            limit: Some(limit),
            period: Some(ResetPeriod::Weekly),
            max_active: None,
        }
    }

    /// A capacity grant
    pub fn capacity(feature: Feature, max_active: i64) -> Self {
        Self {
            feature,
            enabled: true,
            limit: None,
            period: None,
            max_active: Some(max_active),
        }
    }

    /// A boolean flag grant
    pub fn flag(feature: Feature, enabled: bool) -> Self {
        Self {
            feature,
            enabled,
            limit: None,
            period: None,
            max_active: None,
        }
    }

    /// Materialize the template into a grant, anchoring any counted period
    /// at `now`. Counted grants always start with `used = 0`.
    pub fn materialize(&self, now: DateTime<Utc>) -> FeatureGrant {
        if let Some(max_active) = self.max_active {
            FeatureGrant::Capacity {
                enabled: self.enabled,
                max_active,
            }
        } else if let Some(limit) = self.limit {
            FeatureGrant::Counted {
                enabled: self.enabled,
                limit,
                period: self.period.unwrap_or(ResetPeriod::Monthly),
                used: 0,
                period_started_at: now,
            }
        } else {
            FeatureGrant::Flag {
                enabled: self.enabled,
            }
        }
    }
}

/// Price entry for a plan/cycle combination
#[derive(Debug, Clone, Deserialize)]
pub struct PriceSpec {
    pub plan: Plan,
    pub cycle: BillingCycle,
    pub cents: i64,
}

/// Catalog overrides, deserialized from the process configuration
///
/// A plan present here replaces that plan's built-in grants wholesale;
/// absent plans keep their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub plans: BTreeMap<Plan, Vec<GrantSpec>>,
    #[serde(default)]
    pub prices: Vec<PriceSpec>,
}

/// Free-tier limits applied when no subscription document exists
///
/// Only resume analyses and interviews have backing counters on the user
/// record; job matches and LinkedIn reviews are gated by the limit alone.
#[derive(Debug, Clone, Deserialize)]
pub struct FreeTierLimits {
    pub resume_analysis: i64,
    pub interviews: i64,
    pub job_matches: i64,
    pub linkedin_review: i64,
}

impl Default for FreeTierLimits {
    fn default() -> Self {
        Self {
            resume_analysis: 3,
            interviews: 1,
            job_matches: 0,
            linkedin_review: 1,
        }
    }
}

impl FreeTierLimits {
    /// Limit for a feature on the free path; `None` for features that have
    /// no free-tier fallback at all
    pub fn limit_for(&self, feature: Feature) -> Option<i64> {
        match feature {
            Feature::ResumeAnalysis => Some(self.resume_analysis),
            Feature::Interviews => Some(self.interviews),
            Feature::JobMatches => Some(self.job_matches),
            Feature::LinkedinReview => Some(self.linkedin_review),
            _ => None,
        }
    }
}
