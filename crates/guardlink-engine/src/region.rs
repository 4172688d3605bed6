use crate::error::EngineError;
use crate::providers::{
    find_or_create_detector, Identity, MonitoringApi, PageToken, Session, SessionProvider,
    Unprocessed,
};
use crate::retry::with_retry;
use guardlink_core::config::{RetryPolicy, Settings};
use guardlink_core::plan::{self, MemberStep};
use guardlink_core::summary::{AccountIssue, IssueKind, RegionSummary};
use guardlink_core::types::{Account, AccountId, DetectorId, Region, RoleRef, Snapshot};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// One region's full pass: discover the administrator detector, snapshot the
/// member list, derive the plan, issue the administrator-side batches, then
/// fan the member-side steps out under a bounded pool.
///
/// Detector discovery and the snapshot are the only region-fatal calls;
/// every later failure degrades into per-account issue records. The
/// administrator-side batches complete before the first member step runs,
/// so member sessions never race the region's own mutations.
pub(crate) async fn reconcile_region(
    sessions: Arc<dyn SessionProvider>,
    admin: Arc<dyn Session>,
    region: Region,
    eligible: Arc<Vec<Account>>,
    settings: Arc<Settings>,
) -> crate::Result<RegionSummary> {
    let monitoring = admin.monitoring(&region);
    let detector = with_retry(&settings.retry, "find_or_create_detector", || {
        find_or_create_detector(monitoring.as_ref())
    })
    .await?;
    let snapshot = drain_members(monitoring.as_ref(), &detector, &settings.retry).await?;
    let plan = plan::derive(&eligible, &snapshot);

    let mut summary = RegionSummary::new(region.clone());
    summary.detector = Some(detector.clone());
    if plan.is_empty() {
        tracing::debug!(region = %region, "region already converged");
        return Ok(summary);
    }
    tracing::info!(
        region = %region,
        delete = plan.delete.len(),
        create = plan.create.len(),
        invite = plan.invite.len(),
        member_steps = plan.member_actions.len(),
        "derived region plan"
    );

    if !plan.delete.is_empty() {
        match with_retry(&settings.retry, "delete_members", || {
            monitoring.delete_members(&detector, &plan.delete)
        })
        .await
        {
            Ok(unprocessed) => {
                summary.deleted = plan.delete.len().saturating_sub(unprocessed.len());
                record_unprocessed(&mut summary, unprocessed);
            }
            Err(err) => record_batch_failure(&mut summary, &plan.delete, &err),
        }
    }

    if !plan.create.is_empty() {
        let ids: Vec<AccountId> = plan.create.iter().map(|detail| detail.id.clone()).collect();
        match with_retry(&settings.retry, "create_members", || {
            monitoring.create_members(&detector, &plan.create)
        })
        .await
        {
            Ok(unprocessed) => {
                summary.created = plan.create.len().saturating_sub(unprocessed.len());
                record_unprocessed(&mut summary, unprocessed);
            }
            Err(err) => record_batch_failure(&mut summary, &ids, &err),
        }
    }

    if !plan.invite.is_empty() {
        // Notification is always suppressed: invitation delivery is
        // out-of-band, not email.
        match with_retry(&settings.retry, "invite_members", || {
            monitoring.invite_members(&detector, &plan.invite, false)
        })
        .await
        {
            Ok(unprocessed) => {
                summary.invited = plan.invite.len().saturating_sub(unprocessed.len());
                record_unprocessed(&mut summary, unprocessed);
            }
            Err(err) => record_batch_failure(&mut summary, &plan.invite, &err),
        }
    }

    let roles: BTreeMap<AccountId, RoleRef> = eligible
        .iter()
        .map(|account| (account.id.clone(), account.role.clone()))
        .collect();
    let admin_account = admin.account_id();
    let semaphore = Arc::new(Semaphore::new(settings.account_parallelism.max(1)));
    let mut handles = Vec::new();
    for action in plan.member_actions {
        let Some(role) = roles.get(&action.account).cloned() else {
            continue;
        };
        let sem = semaphore.clone();
        let sessions = sessions.clone();
        let region = region.clone();
        let admin_account = admin_account.clone();
        let retry = settings.retry.clone();
        let account = action.account.clone();
        let handle = tokio::spawn(async move {
            let _permit = match sem.acquire().await {
                Ok(permit) => permit,
                Err(_) => {
                    return MemberOutcome::Issue(AccountIssue::new(
                        account,
                        IssueKind::Provider,
                        "worker pool closed",
                    ))
                }
            };
            member_step(
                sessions.as_ref(),
                &region,
                &admin_account,
                account,
                &role,
                action.step,
                &retry,
            )
            .await
        });
        handles.push((action.account, handle));
    }

    for (account, handle) in handles {
        match handle.await {
            Ok(MemberOutcome::Enabled) => summary.enabled += 1,
            Ok(MemberOutcome::Accepted) => summary.accepted += 1,
            Ok(MemberOutcome::DetectorEnsured) => {}
            Ok(MemberOutcome::Issue(issue)) => {
                tracing::warn!(account = %issue.account, kind = %issue.kind, "{}", issue.message);
                summary.issues.push(issue);
            }
            Err(err) => summary.issues.push(AccountIssue::new(
                account,
                IssueKind::Provider,
                format!("member task failed: {err}"),
            )),
        }
    }

    Ok(summary)
}

enum MemberOutcome {
    Enabled,
    Accepted,
    DetectorEnsured,
    Issue(AccountIssue),
}

/// One account's member-side step, under a fresh delegated session. Every
/// outcome is a value; nothing here can take down the region.
async fn member_step(
    sessions: &dyn SessionProvider,
    region: &Region,
    admin_account: &AccountId,
    account: AccountId,
    role: &RoleRef,
    step: MemberStep,
    retry: &RetryPolicy,
) -> MemberOutcome {
    let identity = Identity::Delegated(role.clone());
    let session = match with_retry(retry, "member_session", || sessions.session(&identity)).await {
        Ok(session) => session,
        Err(err) => {
            return MemberOutcome::Issue(AccountIssue::new(
                account,
                IssueKind::Delegation,
                format!("cannot assume {role}: {err}"),
            ))
        }
    };
    let monitoring = session.monitoring(region);
    let detector = match with_retry(retry, "member_detector", || {
        find_or_create_detector(monitoring.as_ref())
    })
    .await
    {
        Ok(detector) => detector,
        Err(err) => {
            return MemberOutcome::Issue(AccountIssue::new(
                account,
                IssueKind::Provider,
                err.to_string(),
            ))
        }
    };

    match step {
        MemberStep::EnsureDetector => {
            tracing::debug!(account = %account, region = %region, "member detector present");
            MemberOutcome::DetectorEnsured
        }
        MemberStep::Enable => {
            match with_retry(retry, "update_detector", || {
                monitoring.update_detector(&detector, true)
            })
            .await
            {
                Ok(()) => {
                    tracing::info!(account = %account, region = %region, "member detector enabled");
                    MemberOutcome::Enabled
                }
                Err(err) => MemberOutcome::Issue(AccountIssue::new(
                    account,
                    IssueKind::Provider,
                    err.to_string(),
                )),
            }
        }
        MemberStep::AcceptInvitation => {
            let invitations = match with_retry(retry, "list_pending_invitations", || {
                monitoring.list_pending_invitations()
            })
            .await
            {
                Ok(invitations) => invitations,
                Err(err) => {
                    return MemberOutcome::Issue(AccountIssue::new(
                        account,
                        IssueKind::Provider,
                        err.to_string(),
                    ))
                }
            };
            let Some(invitation) = invitations
                .into_iter()
                .find(|invitation| invitation.inviter == *admin_account)
            else {
                // Administrator-side state says an invitation is pending;
                // the member sees none. Not retried: only the remote side
                // changing resolves this.
                return MemberOutcome::Issue(AccountIssue::new(
                    account,
                    IssueKind::MissingInvitation,
                    format!(
                        "administrator {admin_account} expects a pending invitation; member reports none"
                    ),
                ));
            };
            match with_retry(retry, "accept_invitation", || {
                monitoring.accept_invitation(&detector, &invitation.id, admin_account)
            })
            .await
            {
                Ok(()) => {
                    tracing::info!(account = %account, region = %region, "invitation accepted");
                    MemberOutcome::Accepted
                }
                Err(err) => MemberOutcome::Issue(AccountIssue::new(
                    account,
                    IssueKind::Provider,
                    err.to_string(),
                )),
            }
        }
    }
}

pub(crate) async fn drain_members(
    api: &dyn MonitoringApi,
    detector: &DetectorId,
    retry: &RetryPolicy,
) -> crate::Result<Snapshot> {
    let mut snapshot = Snapshot::new();
    let mut token: Option<PageToken> = None;
    loop {
        let page = with_retry(retry, "list_members", || {
            api.list_members(detector, token.clone())
        })
        .await?;
        snapshot.extend(page.members);
        match page.next {
            Some(next) => token = Some(next),
            None => break,
        }
    }
    Ok(snapshot)
}

fn record_unprocessed(summary: &mut RegionSummary, unprocessed: Vec<Unprocessed>) {
    for entry in unprocessed {
        tracing::warn!(account = %entry.account, "batch entry rejected: {}", entry.reason);
        summary
            .issues
            .push(AccountIssue::new(entry.account, IssueKind::Unprocessed, entry.reason));
    }
}

fn record_batch_failure(summary: &mut RegionSummary, accounts: &[AccountId], err: &EngineError) {
    tracing::warn!(error = %err, affected = accounts.len(), "batch call failed");
    for account in accounts {
        summary.issues.push(AccountIssue::new(
            account.clone(),
            IssueKind::Provider,
            err.to_string(),
        ));
    }
}
