use crate::providers::{AccountDirectory, Identity, PageToken, RoleDirectory};
use crate::retry::with_retry;
use guardlink_core::config::Settings;
use guardlink_core::roster;
use guardlink_core::types::{Account, AccountId, RoleRef};
use std::collections::BTreeMap;

/// The eligible roster plus any run-level trouble hit while building it.
#[derive(Debug)]
pub struct Inventory {
    pub roster: Vec<Account>,
    pub issues: Vec<String>,
}

/// Build this run's roster: drain every organization root's account listing,
/// drain the role registry for the configured category, join the two, apply
/// the allow list.
///
/// A root whose query fails is skipped and recorded; the union proceeds with
/// the rest. A registry failure leaves the roster empty with the issue
/// recorded. Neither is fatal: the run degrades to a smaller (possibly
/// empty) roster and the next run sees fresh state.
pub(crate) async fn collect(
    accounts: &dyn AccountDirectory,
    roles: &dyn RoleDirectory,
    settings: &Settings,
) -> Inventory {
    let mut issues = Vec::new();

    let roots: Vec<Identity> = if settings.org_roots.is_empty() {
        vec![Identity::Caller]
    } else {
        settings
            .org_roots
            .iter()
            .cloned()
            .map(Identity::Delegated)
            .collect()
    };

    let mut directory: BTreeMap<AccountId, String> = BTreeMap::new();
    for root in &roots {
        match drain_accounts(accounts, root, settings).await {
            Ok(map) => {
                tracing::debug!(root = %root, accounts = map.len(), "directory root drained");
                directory.extend(map);
            }
            Err(err) => {
                tracing::warn!(root = %root, error = %err, "account directory query failed, skipping root");
                issues.push(format!("account directory query failed for {root}: {err}"));
            }
        }
    }

    let registry = match drain_roles(roles, settings).await {
        Ok(map) => map,
        Err(err) => {
            tracing::warn!(error = %err, "role registry query failed, roster will be empty");
            issues.push(format!("role registry query failed: {err}"));
            BTreeMap::new()
        }
    };

    let roster = roster::build(&directory, &registry, settings.allow_list.as_ref());
    tracing::info!(
        directory = directory.len(),
        registry = registry.len(),
        eligible = roster.len(),
        "inventory collected"
    );
    Inventory { roster, issues }
}

async fn drain_accounts(
    accounts: &dyn AccountDirectory,
    root: &Identity,
    settings: &Settings,
) -> crate::Result<BTreeMap<AccountId, String>> {
    let mut map = BTreeMap::new();
    let mut token: Option<PageToken> = None;
    loop {
        let page = with_retry(&settings.retry, "list_accounts", || {
            accounts.list_accounts(root, token.clone())
        })
        .await?;
        map.extend(page.accounts);
        match page.next {
            Some(next) => token = Some(next),
            None => break,
        }
    }
    Ok(map)
}

pub(crate) async fn drain_roles(
    roles: &dyn RoleDirectory,
    settings: &Settings,
) -> crate::Result<BTreeMap<AccountId, RoleRef>> {
    tracing::debug!(
        table = %settings.registry_table,
        region = %settings.home_region,
        "draining role registry"
    );
    let mut map = BTreeMap::new();
    let mut token: Option<PageToken> = None;
    loop {
        let page = with_retry(&settings.retry, "list_roles", || {
            roles.list_roles(&settings.category, token.clone())
        })
        .await?;
        map.extend(page.roles);
        match page.next {
            Some(next) => token = Some(next),
            None => break,
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{FleetState, OrgRoot, RegistryEntry, SimCloud};
    use guardlink_core::config::DEFAULT_CATEGORY;
    use guardlink_core::types::Region;

    fn root(role: Option<&str>, accounts: &[(&str, &str)]) -> OrgRoot {
        OrgRoot {
            role: role.map(RoleRef::from),
            accounts: accounts
                .iter()
                .map(|(id, email)| (AccountId::from(*id), email.to_string()))
                .collect(),
        }
    }

    fn entry(account: &str, role: &str) -> RegistryEntry {
        RegistryEntry {
            account: AccountId::from(account),
            role: RoleRef::from(role),
            category: DEFAULT_CATEGORY.to_string(),
        }
    }

    fn fleet(roots: Vec<OrgRoot>, registry: Vec<RegistryEntry>) -> FleetState {
        FleetState {
            admin_account: AccountId::from("999999999999"),
            regions: vec![Region::from("us-east-1")],
            org_roots: roots,
            registry,
            ..FleetState::empty()
        }
    }

    #[tokio::test]
    async fn unions_accounts_across_roots() {
        let cloud = SimCloud::new(fleet(
            vec![
                root(Some("role/root-a"), &[("111", "a@x.org")]),
                root(Some("role/root-b"), &[("222", "b@x.org")]),
            ],
            vec![entry("111", "role/m-111"), entry("222", "role/m-222")],
        ));
        let mut settings = Settings::default();
        settings.org_roots = vec![RoleRef::from("role/root-a"), RoleRef::from("role/root-b")];

        let inventory = collect(&cloud, &cloud, &settings).await;
        assert!(inventory.issues.is_empty());
        let ids: Vec<&str> = inventory.roster.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["111", "222"]);
    }

    #[tokio::test]
    async fn caller_root_is_used_when_no_roots_configured() {
        let cloud = SimCloud::new(fleet(
            vec![root(None, &[("111", "a@x.org")])],
            vec![entry("111", "role/m-111")],
        ));
        let inventory = collect(&cloud, &cloud, &Settings::default()).await;
        assert!(inventory.issues.is_empty());
        assert_eq!(inventory.roster.len(), 1);
    }

    #[tokio::test]
    async fn failing_root_is_skipped_and_recorded() {
        let cloud = SimCloud::new(fleet(
            vec![
                root(Some("role/root-a"), &[("111", "a@x.org")]),
                root(Some("role/root-b"), &[("222", "b@x.org")]),
            ],
            vec![entry("111", "role/m-111"), entry("222", "role/m-222")],
        ));
        cloud
            .fail_root(&Identity::Delegated(RoleRef::from("role/root-b")))
            .await;
        let mut settings = Settings::default();
        settings.org_roots = vec![RoleRef::from("role/root-a"), RoleRef::from("role/root-b")];
        settings.retry.base_delay = std::time::Duration::from_millis(1);

        let inventory = collect(&cloud, &cloud, &settings).await;
        let ids: Vec<&str> = inventory.roster.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["111"]);
        assert_eq!(inventory.issues.len(), 1);
        assert!(inventory.issues[0].contains("role/root-b"));
    }

    #[tokio::test]
    async fn registry_failure_means_empty_roster_not_panic() {
        let cloud = SimCloud::new(fleet(
            vec![root(None, &[("111", "a@x.org")])],
            vec![entry("111", "role/m-111")],
        ));
        cloud.fail_registry().await;
        let mut settings = Settings::default();
        settings.retry.base_delay = std::time::Duration::from_millis(1);

        let inventory = collect(&cloud, &cloud, &settings).await;
        assert!(inventory.roster.is_empty());
        assert_eq!(inventory.issues.len(), 1);
        assert!(inventory.issues[0].contains("registry"));
    }

    #[tokio::test]
    async fn allow_list_restricts_the_roster() {
        let cloud = SimCloud::new(fleet(
            vec![root(None, &[("111", "a@x.org"), ("222", "b@x.org")])],
            vec![entry("111", "role/m-111"), entry("222", "role/m-222")],
        ));
        let mut settings = Settings::default();
        settings.allow_list = Some([AccountId::from("222")].into_iter().collect());

        let inventory = collect(&cloud, &cloud, &settings).await;
        let ids: Vec<&str> = inventory.roster.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["222"]);
    }

    #[tokio::test]
    async fn pagination_is_fully_drained() {
        let cloud = SimCloud::new(fleet(
            vec![root(
                None,
                &[("111", "a@x.org"), ("222", "b@x.org"), ("333", "c@x.org")],
            )],
            vec![
                entry("111", "role/m-111"),
                entry("222", "role/m-222"),
                entry("333", "role/m-333"),
            ],
        ))
        .with_page_size(1);

        let inventory = collect(&cloud, &cloud, &Settings::default()).await;
        assert_eq!(inventory.roster.len(), 3);
        assert_eq!(cloud.calls("list_accounts").await, 3);
        assert_eq!(cloud.calls("list_roles").await, 3);
    }

    #[tokio::test]
    async fn wrong_category_entries_are_invisible() {
        let mut wrong = entry("111", "role/m-111");
        wrong.category = "something-else".to_string();
        let cloud = SimCloud::new(fleet(vec![root(None, &[("111", "a@x.org")])], vec![wrong]));

        let inventory = collect(&cloud, &cloud, &Settings::default()).await;
        assert!(inventory.roster.is_empty());
        assert!(inventory.issues.is_empty());
    }
}
