//! Feature grants and entitlement decisions

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Feature;

/// Sentinel limit value meaning "no cap"
pub const UNLIMITED: i64 = -1;

/// Accounting period for a counted feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetPeriod {
    /// Resets when the calendar month changes
    Monthly,
    /// Resets 7 days after the period anchor
    Weekly,
}

/// Entitlement granted for a single feature
///
/// Three shapes exist: counted features carry a running usage counter with a
/// period-based reset; capacity features cap concurrently-active resources
/// (the live count lives with the resource, not here); flags are plain
/// on/off switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureGrant {
    Counted {
        enabled: bool,
        /// Usage cap for the period; [`UNLIMITED`] (-1) means no cap
        limit: i64,
        period: ResetPeriod,
        used: i64,
        /// Anchor for the current accounting period
        period_started_at: DateTime<Utc>,
    },
    Capacity {
        enabled: bool,
        /// Max concurrently-active resources; -1 means no cap
        max_active: i64,
    },
    Flag { enabled: bool },
}

impl FeatureGrant {
    /// Whether the grant is switched on at all
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Counted { enabled, .. }
            | Self::Capacity { enabled, .. }
            | Self::Flag { enabled } => *enabled,
        }
    }
}

/// The full set of grants a plan confers, keyed by feature
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet(BTreeMap<Feature, FeatureGrant>);

impl FeatureSet {
    /// Create an empty feature set
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the grant for a feature
    pub fn get(&self, feature: Feature) -> Option<&FeatureGrant> {
        self.0.get(&feature)
    }

    /// Mutable grant lookup
    pub fn get_mut(&mut self, feature: Feature) -> Option<&mut FeatureGrant> {
        self.0.get_mut(&feature)
    }

    /// Insert or replace a grant
    pub fn insert(&mut self, feature: Feature, grant: FeatureGrant) {
        self.0.insert(feature, grant);
    }

    /// Iterate over all grants in feature order
    pub fn iter(&self) -> impl Iterator<Item = (Feature, &FeatureGrant)> {
        self.0.iter().map(|(f, g)| (*f, g))
    }

    /// Number of grants in the set
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Feature, FeatureGrant)> for FeatureSet {
    fn from_iter<T: IntoIterator<Item = (Feature, FeatureGrant)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Result of an entitlement check, surfaced to the request layer
///
/// Exhaustion is an expected outcome, not an error: a denied check carries a
/// human-readable message alongside the usage figures the UI reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitlementDecision {
    /// Whether access is allowed
    pub has_access: bool,
    /// Applicable limit; [`UNLIMITED`] (-1) is surfaced as-is
    pub limit: i64,
    /// Current usage count
    pub used: i64,
    /// Reason when denied (upgrade prompt, not-enabled, etc.)
    pub message: Option<String>,
}

impl EntitlementDecision {
    /// An allowed decision
    pub fn allowed(limit: i64, used: i64) -> Self {
        Self {
            has_access: true,
            limit,
            used,
            message: None,
        }
    }

    /// A denied decision with a user-facing reason
    pub fn denied(limit: i64, used: i64, message: impl Into<String>) -> Self {
        Self {
            has_access: false,
            limit,
            used,
            message: Some(message.into()),
        }
    }
}

/// Result of a usage-ledger check for a single counted feature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageDecision {
    /// Whether one more use fits within the limit
    pub allowed: bool,
    /// Applicable limit; -1 means unlimited
    pub limit: i64,
    /// Usage after any lazy reset was applied
    pub used: i64,
}

impl UsageDecision {
    /// Remaining uses in the period; `None` when unlimited
    pub fn remaining(&self) -> Option<i64> {
        if self.limit == UNLIMITED {
            None
        } else {
            Some((self.limit - self.used).max(0))
        }
    }
}

/// Outcome of charging one use against a counted feature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeOutcome {
    /// The use was recorded
    Charged,
    /// The conditional increment found no headroom; nothing was recorded
    LimitReached,
}

impl ChargeOutcome {
    /// Whether the charge went through
    pub fn is_charged(&self) -> bool {
        matches!(self, Self::Charged)
    }
}
