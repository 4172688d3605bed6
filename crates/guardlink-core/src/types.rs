use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Identifier newtypes
// ---------------------------------------------------------------------------

/// Account identifier, opaque and unique within the organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Geographic region name as reported by the monitoring provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Region(String);

impl Region {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Region {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Detector identifier. Opaque; discovered via find-or-create, never assumed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetectorId(String);

impl DetectorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DetectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DetectorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Reference to a delegated role the reconciler can assume to act inside a
/// member account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleRef(String);

impl RoleRef {
    pub fn new(role: impl Into<String>) -> Self {
        Self(role.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoleRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Invitation identifier issued by the monitoring provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvitationId(String);

impl InvitationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvitationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InvitationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// RelationshipState
// ---------------------------------------------------------------------------

/// The administrator's view of a member's membership lifecycle stage.
///
/// An account absent from the live snapshot has no state at all; absence is
/// distinct from every named state and is handled by the planner, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelationshipState {
    Created,
    Invited,
    Disabled,
    Enabled,
    Removed,
    Resigned,
    EmailVerificationInProgress,
    EmailVerificationFailed,
}

impl RelationshipState {
    pub fn all() -> &'static [RelationshipState] {
        &[
            RelationshipState::Created,
            RelationshipState::Invited,
            RelationshipState::Disabled,
            RelationshipState::Enabled,
            RelationshipState::Removed,
            RelationshipState::Resigned,
            RelationshipState::EmailVerificationInProgress,
            RelationshipState::EmailVerificationFailed,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipState::Created => "CREATED",
            RelationshipState::Invited => "INVITED",
            RelationshipState::Disabled => "DISABLED",
            RelationshipState::Enabled => "ENABLED",
            RelationshipState::Removed => "REMOVED",
            RelationshipState::Resigned => "RESIGNED",
            RelationshipState::EmailVerificationInProgress => "EMAILVERIFICATIONINPROGRESS",
            RelationshipState::EmailVerificationFailed => "EMAILVERIFICATIONFAILED",
        }
    }

    /// Parse a provider-reported state string. Provider casing is not
    /// contractually guaranteed, so matching is case-insensitive. Unknown
    /// strings yield `None` rather than an error: the snapshot is external
    /// data and an unrecognized state must classify as nothing.
    pub fn parse(s: &str) -> Option<RelationshipState> {
        RelationshipState::all()
            .iter()
            .copied()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for RelationshipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RelationshipState {
    type Err = crate::error::GuardlinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationshipState::parse(s)
            .ok_or_else(|| crate::error::GuardlinkError::InvalidRelationshipState(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// An account eligible for reconciliation: present in the account directory
/// and holding a delegated role in the role registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub role: RoleRef,
}

/// The identifier/email pair supplied when creating a membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDetail {
    pub id: AccountId,
    pub email: String,
}

impl From<&Account> for AccountDetail {
    fn from(account: &Account) -> Self {
        AccountDetail {
            id: account.id.clone(),
            email: account.email.clone(),
        }
    }
}

/// Live membership snapshot for one region: account id to the raw state
/// string as reported by the provider.
pub type Snapshot = BTreeMap<AccountId, String>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn state_round_trips_through_as_str() {
        for state in RelationshipState::all() {
            assert_eq!(RelationshipState::parse(state.as_str()), Some(*state));
        }
    }

    #[test]
    fn state_parse_is_case_insensitive() {
        assert_eq!(
            RelationshipState::parse("Enabled"),
            Some(RelationshipState::Enabled)
        );
        assert_eq!(
            RelationshipState::parse("ENABLED"),
            Some(RelationshipState::Enabled)
        );
        assert_eq!(
            RelationshipState::parse("enabled"),
            Some(RelationshipState::Enabled)
        );
        assert_eq!(
            RelationshipState::parse("EmailVerificationFailed"),
            Some(RelationshipState::EmailVerificationFailed)
        );
    }

    #[test]
    fn state_parse_rejects_unknown() {
        assert_eq!(RelationshipState::parse("PENDING"), None);
        assert_eq!(RelationshipState::parse(""), None);
        assert!(RelationshipState::from_str("PENDING").is_err());
    }

    #[test]
    fn account_detail_borrows_from_account() {
        let account = Account {
            id: AccountId::from("123456789012"),
            email: "security@example.com".to_string(),
            role: RoleRef::from("delegated/member-role"),
        };
        let detail = AccountDetail::from(&account);
        assert_eq!(detail.id, account.id);
        assert_eq!(detail.email, "security@example.com");
    }
}
