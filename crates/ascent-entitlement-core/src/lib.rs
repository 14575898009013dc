//! Ascent Entitlement Core - Plans, usage metering, and subscription lifecycle
//!
//! The single choke point deciding "may user U use feature F right now",
//! backed by:
//! - [`PlanCatalog`] - static plan tier definitions and pricing
//! - [`UsageLedger`] - per-feature counters with lazy period resets
//! - [`EntitlementResolver`] - merges the free-tier and subscription paths
//! - [`SubscriptionLifecycle`] - the pending/active/cancelled state machine
//!
//! All collaborators (user directory, subscription store) are injected as
//! repository traits from `ascent-db`; the core holds no global state.

pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod resolver;

pub use catalog::PlanCatalog;
pub use config::{CatalogConfig, FreeTierLimits, GrantSpec, PriceSpec};
pub use error::CoreError;
pub use ledger::{is_within_limit, reset_if_period_elapsed, UsageLedger};
pub use lifecycle::SubscriptionLifecycle;
pub use resolver::EntitlementResolver;
