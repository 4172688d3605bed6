use crate::error::ProviderError;
use async_trait::async_trait;
use guardlink_core::types::{AccountDetail, AccountId, DetectorId, InvitationId, Region, RoleRef};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The identity a session is obtained under: the process's own ambient
/// identity, or a delegated role to assume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Caller,
    Delegated(RoleRef),
}

impl Identity {
    pub fn delegated_or_caller(role: Option<RoleRef>) -> Identity {
        match role {
            Some(role) => Identity::Delegated(role),
            None => Identity::Caller,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Caller => f.write_str("caller"),
            Identity::Delegated(role) => f.write_str(role.as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// Listing types
// ---------------------------------------------------------------------------

/// Opaque pagination cursor. Minted by a provider, handed back verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageToken(String);

impl PageToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct AccountPage {
    pub accounts: BTreeMap<AccountId, String>,
    pub next: Option<PageToken>,
}

#[derive(Debug, Clone)]
pub struct RolePage {
    pub roles: BTreeMap<AccountId, RoleRef>,
    pub next: Option<PageToken>,
}

#[derive(Debug, Clone)]
pub struct MemberPage {
    pub members: BTreeMap<AccountId, String>,
    pub next: Option<PageToken>,
}

/// An account the provider declined to act on inside an otherwise-accepted
/// batch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unprocessed {
    pub account: AccountId,
    pub reason: String,
}

/// A pending invitation as seen from the member side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    pub id: InvitationId,
    pub inviter: AccountId,
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Produces authenticated, time-boxed sessions. The engine never caches a
/// session beyond one action sequence; it asks again instead.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn session(&self, identity: &Identity) -> ProviderResult<Arc<dyn Session>>;
}

/// One authenticated access context.
#[async_trait]
pub trait Session: Send + Sync {
    /// The account this session acts as.
    fn account_id(&self) -> AccountId;

    /// Regions where the monitoring service is available to this session.
    async fn monitoring_regions(&self) -> ProviderResult<Vec<Region>>;

    /// The relationship store for one region, scoped to this identity.
    fn monitoring(&self, region: &Region) -> Arc<dyn MonitoringApi>;
}

/// Organization account inventory: `{account_id → contact_email}` per root.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn list_accounts(
        &self,
        root: &Identity,
        page: Option<PageToken>,
    ) -> ProviderResult<AccountPage>;
}

/// Shared tagged registry mapping accounts to their delegated roles. Only
/// entries carrying the requested category label are returned.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn list_roles(
        &self,
        category: &str,
        page: Option<PageToken>,
    ) -> ProviderResult<RolePage>;
}

/// The relationship store for one (identity, region) pair.
///
/// Administrator sessions see and mutate the member list; member sessions
/// see their own detector and pending invitations. Mutations are idempotent
/// on the provider side: re-creating an existing detector or re-inviting an
/// enabled member never destroys state.
#[async_trait]
pub trait MonitoringApi: Send + Sync {
    async fn list_detectors(&self) -> ProviderResult<Vec<DetectorId>>;

    /// Create a detector for the acting account, enabled. Returns the
    /// existing detector when one is already there.
    async fn create_detector(&self) -> ProviderResult<DetectorId>;

    async fn list_members(
        &self,
        detector: &DetectorId,
        page: Option<PageToken>,
    ) -> ProviderResult<MemberPage>;

    async fn create_members(
        &self,
        detector: &DetectorId,
        accounts: &[AccountDetail],
    ) -> ProviderResult<Vec<Unprocessed>>;

    async fn invite_members(
        &self,
        detector: &DetectorId,
        accounts: &[AccountId],
        notify: bool,
    ) -> ProviderResult<Vec<Unprocessed>>;

    async fn delete_members(
        &self,
        detector: &DetectorId,
        accounts: &[AccountId],
    ) -> ProviderResult<Vec<Unprocessed>>;

    async fn update_detector(&self, detector: &DetectorId, enabled: bool) -> ProviderResult<()>;

    async fn list_pending_invitations(&self) -> ProviderResult<Vec<Invitation>>;

    async fn accept_invitation(
        &self,
        detector: &DetectorId,
        invitation: &InvitationId,
        inviter: &AccountId,
    ) -> ProviderResult<()>;

    /// Member side: leave the administrator's fleet.
    async fn disassociate(&self, detector: &DetectorId) -> ProviderResult<()>;

    async fn delete_detector(&self, detector: &DetectorId) -> ProviderResult<()>;

    /// Member side: drop pending invitations from the given administrator.
    /// Returns how many were deleted.
    async fn delete_invitations(&self, inviter: &AccountId) -> ProviderResult<usize>;
}

/// Detector discovery. Detector identifiers are never assumed; the first
/// existing detector wins, and one is created only when none exists.
pub async fn find_or_create_detector(api: &dyn MonitoringApi) -> ProviderResult<DetectorId> {
    if let Some(existing) = api.list_detectors().await?.into_iter().next() {
        return Ok(existing);
    }
    api.create_detector().await
}

/// The three collaborator roots the engine is built over.
#[derive(Clone)]
pub struct Providers {
    pub sessions: Arc<dyn SessionProvider>,
    pub accounts: Arc<dyn AccountDirectory>,
    pub roles: Arc<dyn RoleDirectory>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_from_optional_role() {
        assert_eq!(Identity::delegated_or_caller(None), Identity::Caller);
        assert_eq!(
            Identity::delegated_or_caller(Some(RoleRef::from("role/x"))),
            Identity::Delegated(RoleRef::from("role/x"))
        );
    }

    #[test]
    fn identity_displays_role_or_caller() {
        assert_eq!(Identity::Caller.to_string(), "caller");
        assert_eq!(
            Identity::Delegated(RoleRef::from("role/x")).to_string(),
            "role/x"
        );
    }
}
