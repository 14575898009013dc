//! Ascent Types - Shared domain types
//!
//! This crate contains domain types used across Ascent services:
//! - User identity, roles, and free-tier usage counters
//! - Plan tiers and billing cycles
//! - Features and per-feature entitlement grants
//! - Subscription documents and lifecycle status

pub mod entitlement;
pub mod feature;
pub mod plan;
pub mod subscription;
pub mod user;

pub use entitlement::*;
pub use feature::*;
pub use plan::*;
pub use subscription::*;
pub use user::*;
