//! Plan tiers and billing cycles

use serde::{Deserialize, Serialize};

use crate::Role;

/// Subscription plan tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    /// Free tier - default for every registered user
    Free,
    /// Pro tier - paid individual plan
    Pro,
    /// Enterprise tier - paid plan with the highest limits
    Enterprise,
}

impl Plan {
    /// Get the plan identifier string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }

    /// Get the user role this plan grants when active
    pub const fn role(&self) -> Role {
        match self {
            Self::Free => Role::Free,
            Self::Pro | Self::Enterprise => Role::Pro,
        }
    }

    /// Numeric level for tier comparison
    pub const fn level(&self) -> u8 {
        match self {
            Self::Free => 0,
            Self::Pro => 1,
            Self::Enterprise => 2,
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Plan {
    type Err = PlanParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(PlanParseError(s.to_string())),
        }
    }
}

/// Error parsing a plan string
#[derive(Debug, Clone)]
pub struct PlanParseError(pub String);

impl std::fmt::Display for PlanParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid plan: {}", self.0)
    }
}

impl std::error::Error for PlanParseError {}

/// Billing cycle for a paid subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

impl BillingCycle {
    /// Get the cycle identifier string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Calendar months covered by one billing period
    pub const fn months(&self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Yearly => 12,
        }
    }
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_level_ordering() {
        assert!(Plan::Free.level() < Plan::Pro.level());
        assert!(Plan::Pro.level() < Plan::Enterprise.level());
    }

    #[test]
    fn paid_plans_grant_pro_role() {
        assert_eq!(Plan::Free.role(), Role::Free);
        assert_eq!(Plan::Pro.role(), Role::Pro);
        assert_eq!(Plan::Enterprise.role(), Role::Pro);
    }

    #[test]
    fn plan_round_trips_through_strings() {
        for plan in [Plan::Free, Plan::Pro, Plan::Enterprise] {
            assert_eq!(plan.as_str().parse::<Plan>().unwrap(), plan);
        }
        assert!("platinum".parse::<Plan>().is_err());
    }
}
