//! Feature identifiers
//!
//! Features are an explicit enum rather than free-form strings so that a
//! typo'd feature name fails loudly instead of silently resolving to nothing.

use serde::{Deserialize, Serialize};

/// Known features gated by entitlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// AI resume analysis (counted, monthly)
    ResumeAnalysis,
    /// Mock interview sessions (counted, monthly)
    Interviews,
    /// Job match analysis (counted, weekly)
    JobMatches,
    /// LinkedIn profile review (counted, monthly)
    LinkedinReview,
    /// Career roadmaps (capacity: max concurrently-active roadmaps)
    Roadmaps,
    /// Programmatic API access (counted, monthly)
    ApiAccess,
    /// Priority support channel (boolean)
    PrioritySupport,
}

impl Feature {
    /// Every known feature, in a stable order
    pub const ALL: [Feature; 7] = [
        Self::ResumeAnalysis,
        Self::Interviews,
        Self::JobMatches,
        Self::LinkedinReview,
        Self::Roadmaps,
        Self::ApiAccess,
        Self::PrioritySupport,
    ];

    /// Get the feature identifier string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResumeAnalysis => "resume_analysis",
            Self::Interviews => "interviews",
            Self::JobMatches => "job_matches",
            Self::LinkedinReview => "linkedin_review",
            Self::Roadmaps => "roadmaps",
            Self::ApiAccess => "api_access",
            Self::PrioritySupport => "priority_support",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Feature {
    type Err = FeatureParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| FeatureParseError(s.to_string()))
    }
}

/// Error parsing a feature name
#[derive(Debug, Clone)]
pub struct FeatureParseError(pub String);

impl std::fmt::Display for FeatureParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown feature: {}", self.0)
    }
}

impl std::error::Error for FeatureParseError {}
