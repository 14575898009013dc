//! Plan catalog - the static definition of what each plan grants
//!
//! Feature recomputation is an explicit call invoked by the lifecycle on
//! activation and plan changes, never an implicit persistence hook.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use ascent_types::{BillingCycle, Feature, FeatureSet, Plan, UNLIMITED};

use crate::config::{CatalogConfig, GrantSpec};
use crate::error::CoreError;

/// Plan tier definitions: per-plan grant templates plus pricing
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: BTreeMap<Plan, Vec<GrantSpec>>,
    prices: BTreeMap<(Plan, BillingCycle), i64>,
}

impl Default for PlanCatalog {
    fn default() -> Self {
        let mut plans = BTreeMap::new();
        plans.insert(
            Plan::Free,
            vec![
                GrantSpec::monthly(Feature::ResumeAnalysis, 3),
                GrantSpec::monthly(Feature::Interviews, 1),
                // present but unusable: the limit check denies it immediately
                GrantSpec::weekly(Feature::JobMatches, 0),
                GrantSpec::monthly(Feature::LinkedinReview, 1),
                GrantSpec::capacity(Feature::Roadmaps, 1),
                GrantSpec::flag(Feature::ApiAccess, false),
                GrantSpec::flag(Feature::PrioritySupport, false),
            ],
        );
        plans.insert(
            Plan::Pro,
            vec![
                GrantSpec::monthly(Feature::ResumeAnalysis, UNLIMITED),
                GrantSpec::monthly(Feature::Interviews, 20),
                GrantSpec::weekly(Feature::JobMatches, 10),
                GrantSpec::monthly(Feature::LinkedinReview, 10),
                GrantSpec::capacity(Feature::Roadmaps, 5),
                GrantSpec::monthly(Feature::ApiAccess, 1_000),
                GrantSpec::flag(Feature::PrioritySupport, false),
            ],
        );
        plans.insert(
            Plan::Enterprise,
            vec![
                GrantSpec::monthly(Feature::ResumeAnalysis, UNLIMITED),
                GrantSpec::monthly(Feature::Interviews, UNLIMITED),
                GrantSpec::weekly(Feature::JobMatches, 100),
                GrantSpec::monthly(Feature::LinkedinReview, UNLIMITED),
                GrantSpec::capacity(Feature::Roadmaps, UNLIMITED),
                GrantSpec::monthly(Feature::ApiAccess, 10_000),
                GrantSpec::flag(Feature::PrioritySupport, true),
            ],
        );

        let mut prices = BTreeMap::new();
        prices.insert((Plan::Free, BillingCycle::Monthly), 0);
        prices.insert((Plan::Free, BillingCycle::Yearly), 0);
        prices.insert((Plan::Pro, BillingCycle::Monthly), 1_999);
        prices.insert((Plan::Pro, BillingCycle::Yearly), 19_990);
        prices.insert((Plan::Enterprise, BillingCycle::Monthly), 4_999);
        prices.insert((Plan::Enterprise, BillingCycle::Yearly), 49_990);

        Self { plans, prices }
    }
}

impl PlanCatalog {
    /// Built-in catalog with configuration overrides applied
    pub fn from_config(config: CatalogConfig) -> Self {
        let mut catalog = Self::default();
        for (plan, specs) in config.plans {
            catalog.plans.insert(plan, specs);
        }
        for price in config.prices {
            catalog.prices.insert((price.plan, price.cycle), price.cents);
        }
        catalog
    }

    /// Materialize the feature set template for a plan
    ///
    /// Counted grants come back with `used = 0` and their period anchored at
    /// `now`; the catalog defines entitlement shape, never current usage.
    pub fn features_for(&self, plan: Plan, now: DateTime<Utc>) -> Result<FeatureSet, CoreError> {
        let specs = self
            .plans
            .get(&plan)
            .ok_or_else(|| CoreError::Config(format!("no catalog entry for plan '{plan}'")))?;

        Ok(specs
            .iter()
            .map(|spec| (spec.feature, spec.materialize(now)))
            .collect())
    }

    /// Price in cents for a plan/cycle combination
    pub fn price_cents(&self, plan: Plan, cycle: BillingCycle) -> Result<i64, CoreError> {
        self.prices
            .get(&(plan, cycle))
            .copied()
            .ok_or_else(|| CoreError::Config(format!("no price for plan '{plan}' billed {cycle}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascent_types::FeatureGrant;

    #[test]
    fn fresh_templates_never_carry_usage() {
        let catalog = PlanCatalog::default();
        let now = Utc::now();

        for plan in [Plan::Free, Plan::Pro, Plan::Enterprise] {
            let features = catalog.features_for(plan, now).unwrap();
            for (feature, grant) in features.iter() {
                if let FeatureGrant::Counted { used, .. } = grant {
                    assert_eq!(*used, 0, "{plan}/{feature} template carries usage");
                }
            }
        }
    }

    #[test]
    fn free_job_matches_is_present_but_unusable() {
        let catalog = PlanCatalog::default();
        let features = catalog.features_for(Plan::Free, Utc::now()).unwrap();

        match features.get(Feature::JobMatches) {
            Some(FeatureGrant::Counted { enabled, limit, .. }) => {
                assert!(*enabled);
                assert_eq!(*limit, 0);
            }
            other => panic!("unexpected grant: {other:?}"),
        }
    }

    #[test]
    fn config_overrides_replace_plan_wholesale() {
        let config: CatalogConfig = serde_json::from_str(
            r#"{ "plans": { "pro": [ { "feature": "interviews", "limit": 50, "period": "monthly" } ] } }"#,
        )
        .unwrap();
        let catalog = PlanCatalog::from_config(config);
        let features = catalog.features_for(Plan::Pro, Utc::now()).unwrap();

        assert_eq!(features.len(), 1);
        assert!(matches!(
            features.get(Feature::Interviews),
            Some(FeatureGrant::Counted { limit: 50, .. })
        ));
        // untouched plans keep defaults
        assert!(!catalog
            .features_for(Plan::Enterprise, Utc::now())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn pricing_lookup() {
        let catalog = PlanCatalog::default();
        assert_eq!(
            catalog.price_cents(Plan::Free, BillingCycle::Monthly).unwrap(),
            0
        );
        assert_eq!(
            catalog.price_cents(Plan::Pro, BillingCycle::Yearly).unwrap(),
            19_990
        );
    }
}
