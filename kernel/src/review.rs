//! Review issue/approval types and the approval decision rule. Parsing
//! the model's JSON into these types, and the bounded correction-cycle
//! loop around them, lives in `core`; this module only carries the data
//! and the pure decision.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Nit,
    Quality,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewIssue {
    pub severity: IssueSeverity,
    pub category: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub suggested_fix: Option<String>,
}

/// As reported by the model. `Unspecified` covers both an absent field
/// and a value the decoder did not recognize — both are treated the
/// same way (unknown/empty status falls through to the derived rule).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Approved,
    ApprovedWithNits,
    ChangesRequested,
    #[serde(other)]
    #[default]
    Unspecified,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewResult {
    pub approved: bool,
    pub summary: String,
    #[serde(default)]
    pub issues: Vec<ReviewIssue>,
    #[serde(default)]
    pub approval_status: ApprovalStatus,
}

/// Implements the approval decision table. `allow_nits` is the plan's
/// `allowNitsInApproval` configuration flag.
pub fn decide_approval(status: ApprovalStatus, issues: &[ReviewIssue], allow_nits: bool) -> bool {
    match status {
        ApprovalStatus::Approved => true,
        ApprovalStatus::ApprovedWithNits => allow_nits,
        ApprovalStatus::ChangesRequested => false,
        ApprovalStatus::Unspecified => {
            let has_blocking = issues
                .iter()
                .any(|i| matches!(i.severity, IssueSeverity::Critical | IssueSeverity::Quality));
            if has_blocking {
                false
            } else if issues.is_empty() {
                true
            } else {
                // nits-only
                allow_nits
            }
        }
    }
}
