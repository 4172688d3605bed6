use crate::error::EngineError;
use crate::providers::{Identity, Providers, Session, SessionProvider};
use crate::retry::with_retry;
use crate::{inventory, region, teardown};
use chrono::Utc;
use guardlink_core::config::Settings;
use guardlink_core::plan::{self, RegionPlan};
use guardlink_core::summary::{RegionSummary, RunSummary, TeardownSummary};
use guardlink_core::types::{Account, AccountId, DetectorId, Region, Snapshot};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// The reconciliation engine: inventory, per-region derivation, bounded
/// fan-out, one summary out.
pub struct Engine {
    providers: Providers,
    settings: Settings,
}

impl Engine {
    pub fn new(providers: Providers, settings: Settings) -> Self {
        Engine {
            providers,
            settings,
        }
    }

    /// One full reconciliation pass over every monitoring-capable region.
    ///
    /// The administrator's own base session is the only fatal failure.
    /// Everything downstream degrades into the summary: a failed region
    /// carries its error, a failed account carries an issue, and the pass
    /// keeps going.
    pub async fn run(&self) -> crate::Result<RunSummary> {
        let started_at = Utc::now();
        let admin = self.admin_session().await?;
        tracing::info!(administrator = %admin.account_id(), "starting reconciliation pass");

        let inventory = inventory::collect(
            self.providers.accounts.as_ref(),
            self.providers.roles.as_ref(),
            &self.settings,
        )
        .await;
        let mut issues = inventory.issues;
        if inventory.roster.is_empty() {
            tracing::info!("no eligible accounts this pass");
        }

        let regions = match self.regions(&admin).await {
            Ok(regions) => regions,
            Err(err) => {
                issues.push(format!("cannot list monitoring regions: {err}"));
                Vec::new()
            }
        };

        let eligible = Arc::new(inventory.roster);
        let settings = Arc::new(self.settings.clone());
        let semaphore = Arc::new(Semaphore::new(settings.region_parallelism.max(1)));
        let mut handles = Vec::new();
        for region_name in regions {
            let sem = semaphore.clone();
            let sessions = self.providers.sessions.clone();
            let admin = admin.clone();
            let eligible = eligible.clone();
            let settings = settings.clone();
            let handle = tokio::spawn(async move {
                let _permit = match sem.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return RegionSummary::failed(region_name, "worker pool closed"),
                };
                run_region(sessions, admin, region_name, eligible, settings).await
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

        let summary = RunSummary {
            started_at,
            finished_at: Utc::now(),
            eligible: eligible.len(),
            regions: region_summaries,
            issues,
        };
        let totals = summary.totals();
        tracing::info!(
            created = totals.created,
            invited = totals.invited,
            deleted = totals.deleted,
            enabled = totals.enabled,
            accepted = totals.accepted,
            quiescent = summary.quiescent(),
            "reconciliation pass finished"
        );
        Ok(summary)
    }

    /// Derive every region's plan without mutating anything. Regions that
    /// cannot be inspected are recorded as issues and skipped; a region with
    /// no detector yet plans against an empty snapshot.
    pub async fn plan(&self) -> crate::Result<PlanReport> {
        let admin = self.admin_session().await?;
        let inventory = inventory::collect(
            self.providers.accounts.as_ref(),
            self.providers.roles.as_ref(),
            &self.settings,
        )
        .await;
        let mut issues = inventory.issues;
        let regions = match self.regions(&admin).await {
            Ok(regions) => regions,
            Err(err) => {
                issues.push(format!("cannot list monitoring regions: {err}"));
                Vec::new()
            }
        };

        let mut planned = Vec::new();
        for region_name in regions {
            let monitoring = admin.monitoring(&region_name);
            let detector = match with_retry(&self.settings.retry, "list_detectors", || {
                monitoring.list_detectors()
            })
            .await
            {
                Ok(detectors) => detectors.into_iter().next(),
                Err(err) => {
                    issues.push(format!("cannot inspect {region_name}: {err}"));
                    continue;
                }
            };
            let snapshot = match &detector {
                Some(detector) => {
                    match region::drain_members(monitoring.as_ref(), detector, &self.settings.retry)
                        .await
                    {
                        Ok(snapshot) => snapshot,
                        Err(err) => {
                            issues.push(format!("cannot inspect {region_name}: {err}"));
                            continue;
                        }
                    }
                }
                None => Snapshot::new(),
            };
            planned.push(PlannedRegion {
                region: region_name,
                detector,
                plan: plan::derive(&inventory.roster, &snapshot),
            });
        }

        Ok(PlanReport {
            eligible: inventory.roster.len(),
            regions: planned,
            issues,
        })
    }

    /// Remove the targeted accounts from the fleet in every region: member
    /// side first (resign, delete detector, drop invitations), then the
    /// administrator's member records.
    pub async fn teardown(&self, accounts: &[AccountId]) -> crate::Result<TeardownSummary> {
        teardown::run(&self.providers, &self.settings, accounts).await
    }

    async fn admin_session(&self) -> crate::Result<Arc<dyn Session>> {
        let identity = Identity::delegated_or_caller(self.settings.manager_role.clone());
        with_retry(&self.settings.retry, "base_session", || {
            self.providers.sessions.session(&identity)
        })
        .await
        .map_err(|err| EngineError::BaseSession(err.to_string()))
    }

    async fn regions(&self, admin: &Arc<dyn Session>) -> crate::Result<Vec<Region>> {
        if let Some(regions) = &self.settings.regions {
            return Ok(regions.clone());
        }
        with_retry(&self.settings.retry, "monitoring_regions", || {
            admin.monitoring_regions()
        })
        .await
    }
}

async fn run_region(
    sessions: Arc<dyn SessionProvider>,
    admin: Arc<dyn Session>,
    region_name: Region,
    eligible: Arc<Vec<Account>>,
    settings: Arc<Settings>,
) -> RegionSummary {
    let pass = region::reconcile_region(
        sessions,
        admin,
        region_name.clone(),
        eligible,
        settings.clone(),
    );
    let outcome = match settings.deadline {
        Some(deadline) => match tokio::time::timeout(deadline, pass).await {
            Ok(outcome) => outcome,
            Err(_) => Err(EngineError::DeadlineExceeded {
                region: region_name.clone(),
            }),
        },
        None => pass.await,
    };
    match outcome {
        Ok(summary) => summary,
        Err(err) => {
            tracing::error!(region = %region_name, error = %err, "region pass failed");
            RegionSummary::failed(region_name, err.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Plan reporting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PlannedRegion {
    pub region: Region,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detector: Option<DetectorId>,
    pub plan: RegionPlan,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub eligible: usize,
    pub regions: Vec<PlannedRegion>,
    pub issues: Vec<String>,
}

impl PlanReport {
    /// Total number of actions across every region's plan.
    pub fn pending(&self) -> usize {
        self.regions
            .iter()
            .map(|planned| {
                planned.plan.delete.len()
                    + planned.plan.create.len()
                    + planned.plan.invite.len()
                    + planned.plan.member_actions.len()
            })
            .sum()
    }
}
