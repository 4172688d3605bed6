use crate::types::{Account, AccountId, RoleRef};
use std::collections::{BTreeMap, BTreeSet};

/// Join the account directory and role registry into the roster of accounts
/// eligible for reconciliation this run.
///
/// An account qualifies only when both sources know it: the directory
/// establishes that it exists and has a contact address, the registry that
/// delegated access has been provisioned. Accounts known to one side only
/// are skipped silently; that is the normal state of an account
/// mid-onboarding. The optional allow list narrows the result by exact
/// identifier match, and allow-list entries unknown to the directory are
/// ignored. Output is ordered by account identifier.
pub fn build(
    directory: &BTreeMap<AccountId, String>,
    registry: &BTreeMap<AccountId, RoleRef>,
    allow_list: Option<&BTreeSet<AccountId>>,
) -> Vec<Account> {
    directory
        .iter()
        .filter(|(id, _)| allow_list.is_none_or(|allowed| allowed.contains(*id)))
        .filter_map(|(id, email)| {
            registry.get(id).map(|role| Account {
                id: id.clone(),
                email: email.clone(),
                role: role.clone(),
            })
        })
        .collect()
}
