use crate::error::EngineError;
use crate::inventory;
use crate::providers::{Identity, Providers, Session, SessionProvider};
use crate::retry::with_retry;
use chrono::Utc;
use futures::future::join_all;
use guardlink_core::config::{RetryPolicy, Settings};
use guardlink_core::summary::{AccountIssue, IssueKind, TeardownRegionSummary, TeardownSummary};
use guardlink_core::types::{AccountId, Region, RoleRef};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Remove accounts from the fleet in every region.
///
/// Order matters: members resign and dismantle their own detectors while
/// the administrator's records still exist, then the administrator sweeps
/// the member records. Accounts the registry does not know cannot be acted
/// on member-side and are skipped with an issue.
pub(crate) async fn run(
    providers: &Providers,
    settings: &Settings,
    accounts: &[AccountId],
) -> crate::Result<TeardownSummary> {
    let started_at = Utc::now();
    let identity = Identity::delegated_or_caller(settings.manager_role.clone());
    let admin = with_retry(&settings.retry, "base_session", || {
        providers.sessions.session(&identity)
    })
    .await
    .map_err(|err| EngineError::BaseSession(err.to_string()))?;

    let registry = inventory::drain_roles(providers.roles.as_ref(), settings).await?;
    let mut issues = Vec::new();
    let mut targeted = Vec::new();
    for account in accounts {
        match registry.get(account) {
            Some(role) => targeted.push((account.clone(), role.clone())),
            None => issues.push(format!("{account} has no registered role, skipping")),
        }
    }
    tracing::info!(
        requested = accounts.len(),
        targeted = targeted.len(),
        "starting teardown"
    );

    let regions = if let Some(regions) = &settings.regions {
        regions.clone()
    } else {
        match with_retry(&settings.retry, "monitoring_regions", || {
            admin.monitoring_regions()
        })
        .await
        {
            Ok(regions) => regions,
            Err(err) => {
                issues.push(format!("cannot list monitoring regions: {err}"));
                Vec::new()
            }
        }
    };

    let targeted = Arc::new(targeted);
    let settings = Arc::new(settings.clone());
    let semaphore = Arc::new(Semaphore::new(settings.region_parallelism.max(1)));
    let mut handles = Vec::new();
    for region in regions {
        let sem = semaphore.clone();
        let sessions = providers.sessions.clone();
        let admin = admin.clone();
        let targeted = targeted.clone();
        let settings = settings.clone();
        let handle = tokio::spawn(async move {
            let _permit = match sem.acquire().await {
                Ok(permit) => permit,
                Err(_) => return TeardownRegionSummary::failed(region, "worker pool closed"),
            };
            teardown_region(sessions, admin, region, targeted, settings).await
        });
        handles.push(handle);
    }

    let mut region_summaries = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(summary) => region_summaries.push(summary),
            Err(err) => issues.push(format!("region task failed: {err}")),
        }
    }

    Ok(TeardownSummary {
        started_at,
        finished_at: Utc::now(),
        targeted: targeted.len(),
        regions: region_summaries,
        issues,
    })
}

async fn teardown_region(
    sessions: Arc<dyn SessionProvider>,
    admin: Arc<dyn Session>,
    region: Region,
    targeted: Arc<Vec<(AccountId, RoleRef)>>,
    settings: Arc<Settings>,
) -> TeardownRegionSummary {
    let mut summary = TeardownRegionSummary::new(region.clone());
    let admin_account = admin.account_id();

    let semaphore = Arc::new(Semaphore::new(settings.account_parallelism.max(1)));
    let member_passes: Vec<_> = targeted
        .iter()
        .map(|(account, role)| {
            let sessions = sessions.clone();
            let region = region.clone();
            let admin_account = admin_account.clone();
            let retry = settings.retry.clone();
            let account = account.clone();
            let role = role.clone();
            let sem = semaphore.clone();
            async move {
                let _permit = match sem.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return MemberTeardown::issue(
                            account,
                            IssueKind::Provider,
                            "worker pool closed",
                        )
                    }
                };
                teardown_member(sessions.as_ref(), &region, &admin_account, account, &role, &retry)
                    .await
            }
        })
        .collect();
    for outcome in join_all(member_passes).await {
        summary.disassociated += outcome.disassociated;
        summary.detectors_deleted += outcome.detectors_deleted;
        summary.invitations_deleted += outcome.invitations_deleted;
        summary.issues.extend(outcome.issues);
    }

    let monitoring = admin.monitoring(&region);
    match with_retry(&settings.retry, "list_detectors", || {
        monitoring.list_detectors()
    })
    .await
    {
        Ok(detectors) => {
            if let Some(detector) = detectors.into_iter().next() {
                let ids: Vec<AccountId> = targeted.iter().map(|(id, _)| id.clone()).collect();
                if !ids.is_empty() {
                    match with_retry(&settings.retry, "delete_members", || {
                        monitoring.delete_members(&detector, &ids)
                    })
                    .await
                    {
                        Ok(unprocessed) => {
                            summary.members_deleted = ids.len().saturating_sub(unprocessed.len());
                            for entry in unprocessed {
                                summary.issues.push(AccountIssue::new(
                                    entry.account,
                                    IssueKind::Unprocessed,
                                    entry.reason,
                                ));
                            }
                        }
                        Err(err) => {
                            for id in &ids {
                                summary.issues.push(AccountIssue::new(
                                    id.clone(),
                                    IssueKind::Provider,
                                    err.to_string(),
                                ));
                            }
                        }
                    }
                }
            }
        }
        Err(err) => summary.error = Some(err.to_string()),
    }

    tracing::info!(
        region = %summary.region,
        members_deleted = summary.members_deleted,
        disassociated = summary.disassociated,
        detectors_deleted = summary.detectors_deleted,
        invitations_deleted = summary.invitations_deleted,
        issues = summary.issues.len(),
        "region teardown finished"
    );
    summary
}

#[derive(Default)]
struct MemberTeardown {
    disassociated: usize,
    detectors_deleted: usize,
    invitations_deleted: usize,
    issues: Vec<AccountIssue>,
}

impl MemberTeardown {
    fn issue(account: AccountId, kind: IssueKind, message: impl Into<String>) -> Self {
        MemberTeardown {
            issues: vec![AccountIssue::new(account, kind, message)],
            ..MemberTeardown::default()
        }
    }
}

async fn teardown_member(
    sessions: &dyn SessionProvider,
    region: &Region,
    admin_account: &AccountId,
    account: AccountId,
    role: &RoleRef,
    retry: &RetryPolicy,
) -> MemberTeardown {
    let mut out = MemberTeardown::default();
    let identity = Identity::Delegated(role.clone());
    let session = match with_retry(retry, "member_session", || {
        sessions.session(&identity)
    })
    .await
    {
        Ok(session) => session,
        Err(err) => {
            return MemberTeardown::issue(
                account,
                IssueKind::Delegation,
                format!("cannot assume {role}: {err}"),
            )
        }
    };
    let monitoring = session.monitoring(region);
    let detectors = match with_retry(retry, "list_detectors", || monitoring.list_detectors()).await
    {
        Ok(detectors) => detectors,
        Err(err) => return MemberTeardown::issue(account, IssueKind::Provider, err.to_string()),
    };
    for detector in detectors {
        match with_retry(retry, "disassociate", || monitoring.disassociate(&detector)).await {
            Ok(()) => out.disassociated += 1,
            Err(err) => out.issues.push(AccountIssue::new(
                account.clone(),
                IssueKind::Provider,
                format!("disassociate failed: {err}"),
            )),
        }
        match with_retry(retry, "delete_detector", || {
            monitoring.delete_detector(&detector)
        })
        .await
        {
            Ok(()) => out.detectors_deleted += 1,
            Err(err) => out.issues.push(AccountIssue::new(
                account.clone(),
                IssueKind::Provider,
                format!("detector delete failed: {err}"),
            )),
        }
    }
    match with_retry(retry, "delete_invitations", || {
        monitoring.delete_invitations(admin_account)
    })
    .await
    {
        Ok(count) => out.invitations_deleted += count,
        Err(err) => out.issues.push(AccountIssue::new(
            account,
            IssueKind::Provider,
            format!("invitation cleanup failed: {err}"),
        )),
    }
    out
}
