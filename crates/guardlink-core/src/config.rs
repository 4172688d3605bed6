use crate::error::{GuardlinkError, Result};
use crate::types::{AccountId, Region, RoleRef};
use std::collections::BTreeSet;
use std::time::Duration;

pub const DEFAULT_CATEGORY: &str = "security-monitoring-member";
pub const DEFAULT_REGISTRY_TABLE: &str = "cross-account-outputs";
pub const DEFAULT_HOME_REGION: &str = "us-west-2";

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Budget for one remote call: bounded attempts with exponential backoff for
/// transient failures, and a hard per-attempt timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    pub op_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(200),
            op_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the next attempt: base delay doubled per prior attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Everything a run needs, resolved once by the caller (flags/environment)
/// and passed in explicitly. No global configuration state.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Delegated roles under which the account directory is queried, one
    /// query per root, results unioned. Empty means: query as the caller.
    pub org_roots: Vec<RoleRef>,
    /// Delegated role for the administrator-side work itself. Absent means
    /// the caller's own identity is the administrator.
    pub manager_role: Option<RoleRef>,
    /// Registry entries must carry this category tag to be eligible.
    pub category: String,
    /// Location of the shared role registry.
    pub registry_table: String,
    /// Exact-match restriction of the eligible roster, if configured.
    pub allow_list: Option<BTreeSet<AccountId>>,
    /// Region scoping directory and registry queries.
    pub home_region: Region,
    /// Overrides the provider-reported monitoring region set when present.
    pub regions: Option<Vec<Region>>,
    pub region_parallelism: usize,
    pub account_parallelism: usize,
    pub retry: RetryPolicy,
    /// Abandons in-flight region work past this point. Safe because the next
    /// run re-derives everything from fresh state.
    pub deadline: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            org_roots: Vec::new(),
            manager_role: None,
            category: DEFAULT_CATEGORY.to_string(),
            registry_table: DEFAULT_REGISTRY_TABLE.to_string(),
            allow_list: None,
            home_region: Region::from(DEFAULT_HOME_REGION),
            regions: None,
            region_parallelism: 4,
            account_parallelism: 8,
            retry: RetryPolicy::default(),
            deadline: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Environment-style parsing
// ---------------------------------------------------------------------------

/// Comma-delimited role references, whitespace trimmed, empties dropped.
pub fn parse_role_list(raw: &str) -> Vec<RoleRef> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(RoleRef::from)
        .collect()
}

/// Comma-delimited region names.
pub fn parse_region_list(raw: &str) -> Vec<Region> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Region::from)
        .collect()
}

/// Whitespace-delimited account identifiers. An empty result means no
/// restriction was given, which callers should treat as "no allow list".
pub fn parse_allow_list(raw: &str) -> BTreeSet<AccountId> {
    raw.split_whitespace().map(AccountId::from).collect()
}

/// Parse a duration given as plain seconds (`"30"`) or with an `s`/`m`/`h`
/// suffix (`"30s"`, `"5m"`, `"1h"`).
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let (value, multiplier) = match raw.strip_suffix(['s', 'm', 'h']) {
        Some(digits) => {
            let unit = raw.as_bytes()[raw.len() - 1];
            let multiplier = match unit {
                b's' => 1,
                b'm' => 60,
                _ => 3600,
            };
            (digits, multiplier)
        }
        None => (raw, 1),
    };
    let seconds: u64 = value
        .parse()
        .map_err(|_| GuardlinkError::InvalidDuration(raw.to_string()))?;
    let seconds = seconds
        .checked_mul(multiplier)
        .ok_or_else(|| GuardlinkError::InvalidDuration(raw.to_string()))?;
    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_list_splits_on_commas_and_trims() {
        let roles = parse_role_list(" role/alpha , role/beta ,, ");
        let names: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
        assert_eq!(names, vec!["role/alpha", "role/beta"]);
    }

    #[test]
    fn empty_role_list_means_caller_identity() {
        assert!(parse_role_list("").is_empty());
        assert!(parse_role_list("  ").is_empty());
    }

    #[test]
    fn allow_list_splits_on_whitespace() {
        let allowed = parse_allow_list("111 222\t333\n444");
        assert_eq!(allowed.len(), 4);
        assert!(allowed.contains(&AccountId::from("333")));
    }

    #[test]
    fn duration_accepts_plain_seconds_and_suffixes() {
        assert_eq!(parse_duration("30").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn duration_rejects_garbage() {
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("m").is_err());
    }

    #[test]
    fn duration_rejects_values_that_overflow_seconds() {
        assert!(parse_duration("9999999999999999h").is_err());
        assert!(parse_duration("18446744073709551615m").is_err());
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
    }

    #[test]
    fn defaults_leave_scope_unrestricted() {
        let settings = Settings::default();
        assert!(settings.org_roots.is_empty());
        assert!(settings.manager_role.is_none());
        assert!(settings.allow_list.is_none());
        assert!(settings.regions.is_none());
    }
}
