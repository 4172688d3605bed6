use crate::output;
use crate::settings::SettingsArgs;
use anyhow::{Context, Result};
use guardlink_core::summary::TeardownSummary;
use guardlink_core::types::AccountId;
use guardlink_engine::{Engine, EngineError, FleetState, SimCloud};
use std::path::Path;

pub fn run(fleet: &Path, accounts: &[String], args: &SettingsArgs, json: bool) -> Result<()> {
    let settings = args.resolve()?;
    let state = FleetState::load(fleet)
        .with_context(|| format!("cannot load fleet file {}", fleet.display()))?;
    let cloud = SimCloud::new(state);
    let engine = Engine::new(cloud.providers(), settings);
    let targets: Vec<AccountId> = accounts
        .iter()
        .map(|account| AccountId::from(account.as_str()))
        .collect();

    let rt = tokio::runtime::Runtime::new()?;
    let (summary, state) = rt.block_on(async {
        let summary = engine.teardown(&targets).await?;
        Ok::<_, EngineError>((summary, cloud.snapshot().await))
    })?;
    state
        .save(fleet)
        .with_context(|| format!("cannot persist fleet state to {}", fleet.display()))?;

    if json {
        output::print_json(&summary)?;
    } else {
        print_human(&summary);
    }
    Ok(())
}

fn print_human(summary: &TeardownSummary) {
    let rows: Vec<Vec<String>> = summary
        .regions
        .iter()
        .map(|region| {
            vec![
                region.region.to_string(),
                region.members_deleted.to_string(),
                region.disassociated.to_string(),
                region.detectors_deleted.to_string(),
                region.invitations_deleted.to_string(),
                region.issues.len().to_string(),
                region.error.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    output::print_table(
        &[
            "REGION",
            "MEMBERS",
            "RESIGNED",
            "DETECTORS",
            "INVITATIONS",
            "ISSUES",
            "ERROR",
        ],
        rows,
    );

    for region in &summary.regions {
        for issue in &region.issues {
            println!(
                "issue [{}] {} in {}: {}",
                issue.kind, issue.account, region.region, issue.message
            );
        }
    }
    for issue in &summary.issues {
        println!("issue: {issue}");
    }
    println!("\n{} account(s) targeted", summary.targeted);
}
