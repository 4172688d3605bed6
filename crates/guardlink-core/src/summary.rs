use crate::types::{AccountId, DetectorId, Region};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Per-account issues
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// No session could be obtained for the account's delegated role.
    Delegation,
    /// The administrator expected a pending invitation; the member has none.
    MissingInvitation,
    /// The provider rejected this account inside an otherwise-good batch.
    Unprocessed,
    /// A provider call for this account failed after retries.
    Provider,
}

impl IssueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueKind::Delegation => "delegation",
            IssueKind::MissingInvitation => "missing_invitation",
            IssueKind::Unprocessed => "unprocessed",
            IssueKind::Provider => "provider",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIssue {
    pub account: AccountId,
    pub kind: IssueKind,
    pub message: String,
}

impl AccountIssue {
    pub fn new(account: AccountId, kind: IssueKind, message: impl Into<String>) -> Self {
        AccountIssue {
            account,
            kind,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Run summaries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSummary {
    pub region: Region,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detector: Option<DetectorId>,
    pub created: usize,
    pub invited: usize,
    pub deleted: usize,
    pub enabled: usize,
    pub accepted: usize,
    pub issues: Vec<AccountIssue>,
    /// Set when the whole region's pass failed; per-account problems go in
    /// `issues` instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RegionSummary {
    pub fn new(region: Region) -> Self {
        RegionSummary {
            region,
            detector: None,
            created: 0,
            invited: 0,
            deleted: 0,
            enabled: 0,
            accepted: 0,
            issues: Vec::new(),
            error: None,
        }
    }

    pub fn failed(region: Region, error: impl Into<String>) -> Self {
        let mut summary = RegionSummary::new(region);
        summary.error = Some(error.into());
        summary
    }

    pub fn mutations(&self) -> usize {
        self.created + self.invited + self.deleted + self.enabled + self.accepted
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub created: usize,
    pub invited: usize,
    pub deleted: usize,
    pub enabled: usize,
    pub accepted: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Roster size this run.
    pub eligible: usize,
    pub regions: Vec<RegionSummary>,
    /// Run-level problems outside any region, e.g. an org root whose
    /// directory query failed.
    pub issues: Vec<String>,
}

impl RunSummary {
    pub fn totals(&self) -> Totals {
        let mut totals = Totals::default();
        for region in &self.regions {
            totals.created += region.created;
            totals.invited += region.invited;
            totals.deleted += region.deleted;
            totals.enabled += region.enabled;
            totals.accepted += region.accepted;
        }
        totals
    }

    /// True when the run changed nothing and hit nothing: every region clean,
    /// zero mutations, zero issues. A converged fleet yields quiescent runs.
    pub fn quiescent(&self) -> bool {
        self.issues.is_empty()
            && self.regions.iter().all(|region| {
                region.mutations() == 0 && region.issues.is_empty() && region.error.is_none()
            })
    }
}

// ---------------------------------------------------------------------------
// Teardown summaries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeardownRegionSummary {
    pub region: Region,
    pub members_deleted: usize,
    pub disassociated: usize,
    pub detectors_deleted: usize,
    pub invitations_deleted: usize,
    pub issues: Vec<AccountIssue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TeardownRegionSummary {
    pub fn new(region: Region) -> Self {
        TeardownRegionSummary {
            region,
            members_deleted: 0,
            disassociated: 0,
            detectors_deleted: 0,
            invitations_deleted: 0,
            issues: Vec::new(),
            error: None,
        }
    }

    pub fn failed(region: Region, error: impl Into<String>) -> Self {
        let mut summary = TeardownRegionSummary::new(region);
        summary.error = Some(error.into());
        summary
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeardownSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Accounts targeted after intersecting the request with the registry.
    pub targeted: usize,
    pub regions: Vec<TeardownRegionSummary>,
    /// Problems outside any region, e.g. a requested account the registry
    /// does not know.
    pub issues: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region_summary(region: &str) -> RegionSummary {
        RegionSummary::new(Region::from(region))
    }

    #[test]
    fn totals_sum_across_regions() {
        let mut east = region_summary("us-east-1");
        east.created = 2;
        east.invited = 1;
        let mut west = region_summary("eu-west-1");
        west.created = 1;
        west.accepted = 3;

        let summary = RunSummary {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            eligible: 4,
            regions: vec![east, west],
            issues: Vec::new(),
        };
        let totals = summary.totals();
        assert_eq!(totals.created, 3);
        assert_eq!(totals.invited, 1);
        assert_eq!(totals.accepted, 3);
        assert_eq!(totals.deleted, 0);
    }

    #[test]
    fn quiescent_requires_clean_regions() {
        let clean = RunSummary {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            eligible: 1,
            regions: vec![region_summary("us-east-1")],
            issues: Vec::new(),
        };
        assert!(clean.quiescent());

        let mut with_mutation = clean.clone();
        with_mutation.regions[0].enabled = 1;
        assert!(!with_mutation.quiescent());

        let mut with_issue = clean.clone();
        with_issue.regions[0].issues.push(AccountIssue::new(
            AccountId::from("111"),
            IssueKind::MissingInvitation,
            "no pending invitation",
        ));
        assert!(!with_issue.quiescent());

        let mut with_region_error = clean.clone();
        with_region_error.regions[0].error = Some("detector lookup failed".to_string());
        assert!(!with_region_error.quiescent());

        let mut with_run_issue = clean;
        with_run_issue.issues.push("root query failed".to_string());
        assert!(!with_run_issue.quiescent());
    }
}
