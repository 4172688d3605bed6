use crate::error::ProviderError;
use crate::providers::{
    AccountDirectory, AccountPage, Identity, Invitation, MemberPage, MonitoringApi, PageToken,
    ProviderResult, Providers, RoleDirectory, RolePage, Session, SessionProvider, Unprocessed,
};
use async_trait::async_trait;
use guardlink_core::config::DEFAULT_CATEGORY;
use guardlink_core::io::{atomic_write, write_if_missing};
use guardlink_core::types::{
    AccountDetail, AccountId, DetectorId, InvitationId, Region, RelationshipState, RoleRef,
    Snapshot,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Fleet state
// ---------------------------------------------------------------------------

/// One organization root: the accounts visible under it and the delegated
/// role needed to query it (none for the caller's own root).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgRoot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<RoleRef>,
    pub accounts: BTreeMap<AccountId, String>,
}

/// A role registry row. Only rows carrying the engine's category are visible
/// to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub account: AccountId,
    pub role: RoleRef,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDetector {
    pub id: DetectorId,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimInvitation {
    pub id: InvitationId,
    pub account: AccountId,
    pub inviter: AccountId,
}

/// The whole simulated provider world, serializable so a fleet can live in a
/// YAML file between CLI invocations. Relationship states are stored as raw
/// strings, exactly as a live provider would hand them back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetState {
    pub admin_account: AccountId,
    pub regions: Vec<Region>,
    #[serde(default)]
    pub org_roots: Vec<OrgRoot>,
    #[serde(default)]
    pub registry: Vec<RegistryEntry>,
    #[serde(default)]
    pub admin_detectors: BTreeMap<Region, DetectorId>,
    #[serde(default)]
    pub memberships: BTreeMap<Region, Snapshot>,
    #[serde(default)]
    pub member_detectors: BTreeMap<Region, BTreeMap<AccountId, MemberDetector>>,
    #[serde(default)]
    pub invitations: BTreeMap<Region, Vec<SimInvitation>>,
}

impl FleetState {
    pub fn empty() -> Self {
        FleetState {
            admin_account: AccountId::from(""),
            regions: Vec::new(),
            org_roots: Vec::new(),
            registry: Vec::new(),
            admin_detectors: BTreeMap::new(),
            memberships: BTreeMap::new(),
            member_detectors: BTreeMap::new(),
            invitations: BTreeMap::new(),
        }
    }

    /// A small three-account fleet with nothing enrolled yet. Reconciling it
    /// from scratch exercises the whole create/invite/accept ladder.
    pub fn starter() -> Self {
        let accounts = [
            ("222222222222", "security-a@example.org"),
            ("333333333333", "security-b@example.org"),
            ("444444444444", "security-c@example.org"),
        ];
        FleetState {
            admin_account: AccountId::from("111111111111"),
            regions: vec![Region::from("us-east-1"), Region::from("eu-west-1")],
            org_roots: vec![OrgRoot {
                role: None,
                accounts: accounts
                    .iter()
                    .map(|(id, email)| (AccountId::from(*id), email.to_string()))
                    .collect(),
            }],
            registry: accounts
                .iter()
                .map(|(id, _)| RegistryEntry {
                    account: AccountId::from(*id),
                    role: RoleRef::new(format!("role/guardlink-member-{id}")),
                    category: DEFAULT_CATEGORY.to_string(),
                })
                .collect(),
            ..FleetState::empty()
        }
    }

    pub fn load(path: &Path) -> crate::Result<FleetState> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let raw = serde_yaml::to_string(self)?;
        atomic_write(path, raw.as_bytes())?;
        Ok(())
    }

    /// Save only if `path` does not already exist. Returns true if written.
    pub fn save_if_missing(&self, path: &Path) -> crate::Result<bool> {
        let raw = serde_yaml::to_string(self)?;
        Ok(write_if_missing(path, raw.as_bytes())?)
    }
}

// ---------------------------------------------------------------------------
// Fault injection
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Faults {
    broken_roles: BTreeSet<RoleRef>,
    failed_regions: BTreeSet<Region>,
    failed_roots: BTreeSet<String>,
    registry_down: bool,
    flaky: BTreeMap<String, u32>,
    unprocessed: BTreeSet<AccountId>,
}

// ---------------------------------------------------------------------------
// The simulated cloud
// ---------------------------------------------------------------------------

/// An in-memory provider backing all four capability traits at once.
///
/// Every operation runs against one shared [`FleetState`] behind a lock, so
/// an engine run mutates the fleet exactly the way it would mutate a live
/// provider, and the state that comes out is the state the next run sees.
/// Per-operation call counters and injectable faults make convergence and
/// failure-isolation assertions cheap.
#[derive(Clone)]
pub struct SimCloud {
    state: Arc<Mutex<FleetState>>,
    faults: Arc<Mutex<Faults>>,
    counters: Arc<Mutex<BTreeMap<String, u32>>>,
    invite_notify: Arc<Mutex<Vec<bool>>>,
    page_size: usize,
}

const MUTATING_OPS: [&str; 9] = [
    "create_detector",
    "create_members",
    "invite_members",
    "delete_members",
    "update_detector",
    "accept_invitation",
    "disassociate",
    "delete_detector",
    "delete_invitations",
];

impl SimCloud {
    pub fn new(state: FleetState) -> Self {
        SimCloud {
            state: Arc::new(Mutex::new(state)),
            faults: Arc::new(Mutex::new(Faults::default())),
            counters: Arc::new(Mutex::new(BTreeMap::new())),
            invite_notify: Arc::new(Mutex::new(Vec::new())),
            page_size: 50,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// The collaborator bundle the engine wants, all three roots backed by
    /// this one cloud.
    pub fn providers(&self) -> Providers {
        Providers {
            sessions: Arc::new(self.clone()),
            accounts: Arc::new(self.clone()),
            roles: Arc::new(self.clone()),
        }
    }

    pub async fn snapshot(&self) -> FleetState {
        self.state.lock().await.clone()
    }

    pub async fn calls(&self, op: &str) -> u32 {
        self.counters.lock().await.get(op).copied().unwrap_or(0)
    }

    /// Total calls to operations that change provider state. Zero across a
    /// run means the run was a pure read.
    pub async fn mutating_calls(&self) -> u32 {
        let counters = self.counters.lock().await;
        MUTATING_OPS
            .iter()
            .map(|op| counters.get(*op).copied().unwrap_or(0))
            .sum()
    }

    /// The notify flag of every invite batch issued so far, in order.
    pub async fn invite_notify_flags(&self) -> Vec<bool> {
        self.invite_notify.lock().await.clone()
    }

    /// Sessions under this role fail from now on.
    pub async fn break_role(&self, role: &RoleRef) {
        self.faults.lock().await.broken_roles.insert(role.clone());
    }

    /// Every monitoring call in this region fails from now on.
    pub async fn fail_region(&self, region: &Region) {
        self.faults.lock().await.failed_regions.insert(region.clone());
    }

    /// Account listing under this root identity fails from now on.
    pub async fn fail_root(&self, root: &Identity) {
        self.faults.lock().await.failed_roots.insert(root.to_string());
    }

    pub async fn fail_registry(&self) {
        self.faults.lock().await.registry_down = true;
    }

    /// The next `failures` calls to `op` return a transient error, then the
    /// operation recovers.
    pub async fn flake(&self, op: &str, failures: u32) {
        self.faults.lock().await.flaky.insert(op.to_string(), failures);
    }

    /// Batch calls accept but decline to act on this account.
    pub async fn reject_in_batches(&self, account: &AccountId) {
        self.faults.lock().await.unprocessed.insert(account.clone());
    }

    async fn op(&self, name: &str) -> ProviderResult<()> {
        *self.counters.lock().await.entry(name.to_string()).or_insert(0) += 1;
        let mut faults = self.faults.lock().await;
        if let Some(remaining) = faults.flaky.get_mut(name) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ProviderError::Unavailable(format!(
                    "{name} temporarily unavailable"
                )));
            }
        }
        Ok(())
    }
}

fn role_account(state: &FleetState, role: &RoleRef) -> Option<AccountId> {
    state
        .registry
        .iter()
        .find(|entry| entry.role == *role)
        .map(|entry| entry.account.clone())
}

fn page_slice<V: Clone>(
    entries: &[(AccountId, V)],
    token: Option<PageToken>,
    page_size: usize,
) -> (BTreeMap<AccountId, V>, Option<PageToken>) {
    let start = token
        .and_then(|t| t.as_str().parse::<usize>().ok())
        .unwrap_or(0)
        .min(entries.len());
    let end = (start + page_size).min(entries.len());
    let next = (end < entries.len()).then(|| PageToken::new(end.to_string()));
    (entries[start..end].iter().cloned().collect(), next)
}

#[async_trait]
impl SessionProvider for SimCloud {
    async fn session(&self, identity: &Identity) -> ProviderResult<Arc<dyn Session>> {
        self.op("session").await?;
        let account = match identity {
            Identity::Caller => self.state.lock().await.admin_account.clone(),
            Identity::Delegated(role) => {
                if self.faults.lock().await.broken_roles.contains(role) {
                    return Err(ProviderError::AccessDenied(format!("cannot assume {role}")));
                }
                let state = self.state.lock().await;
                // Registry roles resolve to their member account; anything
                // else (the manager role) acts as the administrator.
                role_account(&state, role).unwrap_or_else(|| state.admin_account.clone())
            }
        };
        Ok(Arc::new(SimSession {
            cloud: self.clone(),
            account,
        }))
    }
}

#[async_trait]
impl AccountDirectory for SimCloud {
    async fn list_accounts(
        &self,
        root: &Identity,
        page: Option<PageToken>,
    ) -> ProviderResult<AccountPage> {
        self.op("list_accounts").await?;
        if self.faults.lock().await.failed_roots.contains(&root.to_string()) {
            return Err(ProviderError::AccessDenied(format!(
                "cannot query accounts under {root}"
            )));
        }
        let state = self.state.lock().await;
        let entries: Vec<(AccountId, String)> = state
            .org_roots
            .iter()
            .filter(|candidate| match root {
                Identity::Caller => candidate.role.is_none(),
                Identity::Delegated(role) => candidate.role.as_ref() == Some(role),
            })
            .flat_map(|candidate| {
                candidate
                    .accounts
                    .iter()
                    .map(|(id, email)| (id.clone(), email.clone()))
            })
            .collect();
        let (accounts, next) = page_slice(&entries, page, self.page_size);
        Ok(AccountPage { accounts, next })
    }
}

#[async_trait]
impl RoleDirectory for SimCloud {
    async fn list_roles(
        &self,
        category: &str,
        page: Option<PageToken>,
    ) -> ProviderResult<RolePage> {
        self.op("list_roles").await?;
        if self.faults.lock().await.registry_down {
            return Err(ProviderError::Unavailable(
                "role registry is unreachable".to_string(),
            ));
        }
        let state = self.state.lock().await;
        let entries: Vec<(AccountId, RoleRef)> = state
            .registry
            .iter()
            .filter(|entry| entry.category == category)
            .map(|entry| (entry.account.clone(), entry.role.clone()))
            .collect();
        let (roles, next) = page_slice(&entries, page, self.page_size);
        Ok(RolePage { roles, next })
    }
}

struct SimSession {
    cloud: SimCloud,
    account: AccountId,
}

#[async_trait]
impl Session for SimSession {
    fn account_id(&self) -> AccountId {
        self.account.clone()
    }

    async fn monitoring_regions(&self) -> ProviderResult<Vec<Region>> {
        self.cloud.op("monitoring_regions").await?;
        Ok(self.cloud.state.lock().await.regions.clone())
    }

    fn monitoring(&self, region: &Region) -> Arc<dyn MonitoringApi> {
        Arc::new(SimMonitoring {
            cloud: self.cloud.clone(),
            region: region.clone(),
            account: self.account.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Monitoring API
// ---------------------------------------------------------------------------

struct SimMonitoring {
    cloud: SimCloud,
    region: Region,
    account: AccountId,
}

impl SimMonitoring {
    async fn guard(&self, op: &str) -> ProviderResult<()> {
        self.cloud.op(op).await?;
        if self.cloud.faults.lock().await.failed_regions.contains(&self.region) {
            return Err(ProviderError::Unavailable(format!(
                "{} is unreachable",
                self.region
            )));
        }
        Ok(())
    }
}

fn require_admin_detector(
    state: &FleetState,
    region: &Region,
    detector: &DetectorId,
) -> ProviderResult<()> {
    match state.admin_detectors.get(region) {
        Some(existing) if existing == detector => Ok(()),
        _ => Err(ProviderError::NotFound(format!(
            "detector {detector} not found in {region}"
        ))),
    }
}

#[async_trait]
impl MonitoringApi for SimMonitoring {
    async fn list_detectors(&self) -> ProviderResult<Vec<DetectorId>> {
        self.guard("list_detectors").await?;
        let state = self.cloud.state.lock().await;
        if state.admin_account == self.account {
            Ok(state
                .admin_detectors
                .get(&self.region)
                .cloned()
                .into_iter()
                .collect())
        } else {
            Ok(state
                .member_detectors
                .get(&self.region)
                .and_then(|members| members.get(&self.account))
                .map(|detector| detector.id.clone())
                .into_iter()
                .collect())
        }
    }

    async fn create_detector(&self) -> ProviderResult<DetectorId> {
        self.guard("create_detector").await?;
        let mut state = self.cloud.state.lock().await;
        if state.admin_account == self.account {
            if let Some(existing) = state.admin_detectors.get(&self.region) {
                return Ok(existing.clone());
            }
            let id = DetectorId::new(Uuid::new_v4().to_string());
            state.admin_detectors.insert(self.region.clone(), id.clone());
            Ok(id)
        } else {
            let members = state.member_detectors.entry(self.region.clone()).or_default();
            if let Some(existing) = members.get(&self.account) {
                return Ok(existing.id.clone());
            }
            let id = DetectorId::new(Uuid::new_v4().to_string());
            members.insert(
                self.account.clone(),
                MemberDetector {
                    id: id.clone(),
                    enabled: true,
                },
            );
            Ok(id)
        }
    }

    async fn list_members(
        &self,
        detector: &DetectorId,
        page: Option<PageToken>,
    ) -> ProviderResult<MemberPage> {
        self.guard("list_members").await?;
        let state = self.cloud.state.lock().await;
        if state.admin_account != self.account {
            return Err(ProviderError::AccessDenied(
                "member listing is administrator-only".to_string(),
            ));
        }
        require_admin_detector(&state, &self.region, detector)?;
        let entries: Vec<(AccountId, String)> = state
            .memberships
            .get(&self.region)
            .map(|members| members.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        let (members, next) = page_slice(&entries, page, self.cloud.page_size);
        Ok(MemberPage { members, next })
    }

    async fn create_members(
        &self,
        detector: &DetectorId,
        accounts: &[AccountDetail],
    ) -> ProviderResult<Vec<Unprocessed>> {
        self.guard("create_members").await?;
        let rejected = self.cloud.faults.lock().await.unprocessed.clone();
        let mut state = self.cloud.state.lock().await;
        require_admin_detector(&state, &self.region, detector)?;
        let members = state.memberships.entry(self.region.clone()).or_default();
        let mut unprocessed = Vec::new();
        for detail in accounts {
            if rejected.contains(&detail.id) {
                unprocessed.push(Unprocessed {
                    account: detail.id.clone(),
                    reason: "account failed validation".to_string(),
                });
                continue;
            }
            let fresh = match members.get(&detail.id).map(|s| RelationshipState::parse(s)) {
                None => true,
                Some(Some(RelationshipState::Removed)) => true,
                Some(_) => false,
            };
            if fresh {
                members.insert(detail.id.clone(), RelationshipState::Created.as_str().to_string());
            }
        }
        Ok(unprocessed)
    }

    async fn invite_members(
        &self,
        detector: &DetectorId,
        accounts: &[AccountId],
        notify: bool,
    ) -> ProviderResult<Vec<Unprocessed>> {
        self.guard("invite_members").await?;
        self.cloud.invite_notify.lock().await.push(notify);
        let rejected = self.cloud.faults.lock().await.unprocessed.clone();
        let mut state = self.cloud.state.lock().await;
        require_admin_detector(&state, &self.region, detector)?;
        let admin = state.admin_account.clone();
        let mut unprocessed = Vec::new();
        for account in accounts {
            if rejected.contains(account) {
                unprocessed.push(Unprocessed {
                    account: account.clone(),
                    reason: "account failed validation".to_string(),
                });
                continue;
            }
            let current = state
                .memberships
                .get(&self.region)
                .and_then(|members| members.get(account))
                .cloned();
            let Some(current) = current else {
                unprocessed.push(Unprocessed {
                    account: account.clone(),
                    reason: "no membership to invite".to_string(),
                });
                continue;
            };
            match RelationshipState::parse(&current) {
                Some(RelationshipState::Created) | Some(RelationshipState::Resigned) => {
                    if let Some(members) = state.memberships.get_mut(&self.region) {
                        members.insert(
                            account.clone(),
                            RelationshipState::Invited.as_str().to_string(),
                        );
                    }
                    let invitations = state.invitations.entry(self.region.clone()).or_default();
                    invitations
                        .retain(|inv| !(inv.account == *account && inv.inviter == admin));
                    invitations.push(SimInvitation {
                        id: InvitationId::new(Uuid::new_v4().to_string()),
                        account: account.clone(),
                        inviter: admin.clone(),
                    });
                }
                // Already invited or enrolled: idempotent no-op.
                _ => {}
            }
        }
        Ok(unprocessed)
    }

    async fn delete_members(
        &self,
        detector: &DetectorId,
        accounts: &[AccountId],
    ) -> ProviderResult<Vec<Unprocessed>> {
        self.guard("delete_members").await?;
        let rejected = self.cloud.faults.lock().await.unprocessed.clone();
        let mut state = self.cloud.state.lock().await;
        require_admin_detector(&state, &self.region, detector)?;
        let admin = state.admin_account.clone();
        let mut unprocessed = Vec::new();
        for account in accounts {
            if rejected.contains(account) {
                unprocessed.push(Unprocessed {
                    account: account.clone(),
                    reason: "account failed validation".to_string(),
                });
                continue;
            }
            let removed = state
                .memberships
                .get_mut(&self.region)
                .and_then(|members| members.remove(account));
            if removed.is_none() {
                unprocessed.push(Unprocessed {
                    account: account.clone(),
                    reason: "not a member".to_string(),
                });
                continue;
            }
            if let Some(invitations) = state.invitations.get_mut(&self.region) {
                invitations.retain(|inv| !(inv.account == *account && inv.inviter == admin));
            }
        }
        Ok(unprocessed)
    }

    async fn update_detector(&self, detector: &DetectorId, enabled: bool) -> ProviderResult<()> {
        self.guard("update_detector").await?;
        let mut state = self.cloud.state.lock().await;
        {
            let Some(member) = state
                .member_detectors
                .get_mut(&self.region)
                .and_then(|members| members.get_mut(&self.account))
            else {
                return Err(ProviderError::NotFound(format!(
                    "detector {detector} not found"
                )));
            };
            if member.id != *detector {
                return Err(ProviderError::NotFound(format!(
                    "detector {detector} not found"
                )));
            }
            member.enabled = enabled;
        }
        // The administrator's view tracks the member's detector state.
        if let Some(current) = state
            .memberships
            .get_mut(&self.region)
            .and_then(|members| members.get_mut(&self.account))
        {
            match (RelationshipState::parse(current), enabled) {
                (Some(RelationshipState::Disabled), true) => {
                    *current = RelationshipState::Enabled.as_str().to_string();
                }
                (Some(RelationshipState::Enabled), false) => {
                    *current = RelationshipState::Disabled.as_str().to_string();
                }
                _ => {}
            }
        }
        Ok(())
    }

    async fn list_pending_invitations(&self) -> ProviderResult<Vec<Invitation>> {
        self.guard("list_pending_invitations").await?;
        let state = self.cloud.state.lock().await;
        Ok(state
            .invitations
            .get(&self.region)
            .map(|invitations| {
                invitations
                    .iter()
                    .filter(|inv| inv.account == self.account)
                    .map(|inv| Invitation {
                        id: inv.id.clone(),
                        inviter: inv.inviter.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn accept_invitation(
        &self,
        detector: &DetectorId,
        invitation: &InvitationId,
        inviter: &AccountId,
    ) -> ProviderResult<()> {
        self.guard("accept_invitation").await?;
        let mut state = self.cloud.state.lock().await;
        let member_ok = state
            .member_detectors
            .get(&self.region)
            .and_then(|members| members.get(&self.account))
            .is_some_and(|member| member.id == *detector);
        if !member_ok {
            return Err(ProviderError::NotFound(format!(
                "detector {detector} not found"
            )));
        }
        let position = state.invitations.get(&self.region).and_then(|invitations| {
            invitations.iter().position(|inv| {
                inv.id == *invitation && inv.account == self.account && inv.inviter == *inviter
            })
        });
        let Some(position) = position else {
            return Err(ProviderError::NotFound(format!(
                "invitation {invitation} not found"
            )));
        };
        let Some(current) = state
            .memberships
            .get_mut(&self.region)
            .and_then(|members| members.get_mut(&self.account))
        else {
            return Err(ProviderError::InvalidRequest(format!(
                "{} has no membership under {inviter}",
                self.account
            )));
        };
        *current = RelationshipState::Enabled.as_str().to_string();
        if let Some(invitations) = state.invitations.get_mut(&self.region) {
            invitations.remove(position);
        }
        Ok(())
    }

    async fn disassociate(&self, detector: &DetectorId) -> ProviderResult<()> {
        self.guard("disassociate").await?;
        let mut state = self.cloud.state.lock().await;
        let member_ok = state
            .member_detectors
            .get(&self.region)
            .and_then(|members| members.get(&self.account))
            .is_some_and(|member| member.id == *detector);
        if !member_ok {
            return Err(ProviderError::NotFound(format!(
                "detector {detector} not found"
            )));
        }
        let Some(current) = state
            .memberships
            .get_mut(&self.region)
            .and_then(|members| members.get_mut(&self.account))
        else {
            return Err(ProviderError::NotFound(format!(
                "{} is not associated in {}",
                self.account, self.region
            )));
        };
        if matches!(
            RelationshipState::parse(current),
            Some(RelationshipState::Enabled) | Some(RelationshipState::Disabled)
        ) {
            *current = RelationshipState::Resigned.as_str().to_string();
        }
        Ok(())
    }

    async fn delete_detector(&self, detector: &DetectorId) -> ProviderResult<()> {
        self.guard("delete_detector").await?;
        let mut state = self.cloud.state.lock().await;
        let mut removed = false;
        if let Some(members) = state.member_detectors.get_mut(&self.region) {
            if members
                .get(&self.account)
                .is_some_and(|member| member.id == *detector)
            {
                members.remove(&self.account);
                removed = true;
            }
        }
        if !removed {
            return Err(ProviderError::NotFound(format!(
                "detector {detector} not found"
            )));
        }
        if let Some(current) = state
            .memberships
            .get_mut(&self.region)
            .and_then(|members| members.get_mut(&self.account))
        {
            if matches!(
                RelationshipState::parse(current),
                Some(RelationshipState::Enabled) | Some(RelationshipState::Disabled)
            ) {
                *current = RelationshipState::Removed.as_str().to_string();
            }
        }
        Ok(())
    }

    async fn delete_invitations(&self, inviter: &AccountId) -> ProviderResult<usize> {
        self.guard("delete_invitations").await?;
        let mut state = self.cloud.state.lock().await;
        let Some(invitations) = state.invitations.get_mut(&self.region) else {
            return Ok(0);
        };
        let before = invitations.len();
        invitations.retain(|inv| !(inv.account == self.account && inv.inviter == *inviter));
        Ok(before - invitations.len())
    }
}
