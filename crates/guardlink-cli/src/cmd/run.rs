use crate::output;
use crate::settings::SettingsArgs;
use anyhow::{Context, Result};
use guardlink_core::summary::RunSummary;
use guardlink_engine::{Engine, EngineError, FleetState, SimCloud};
use std::path::Path;

pub fn run(fleet: &Path, args: &SettingsArgs, json: bool) -> Result<()> {
    let settings = args.resolve()?;
    let state = FleetState::load(fleet)
        .with_context(|| format!("cannot load fleet file {}", fleet.display()))?;
    let cloud = SimCloud::new(state);
    let engine = Engine::new(cloud.providers(), settings);

    let rt = tokio::runtime::Runtime::new()?;
    let (summary, state) = rt.block_on(async {
        let summary = engine.run().await?;
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

fn print_human(summary: &RunSummary) {
    let rows: Vec<Vec<String>> = summary
        .regions
        .iter()
        .map(|region| {
            vec![
                region.region.to_string(),
                region.created.to_string(),
                region.invited.to_string(),
                region.deleted.to_string(),
                region.enabled.to_string(),
                region.accepted.to_string(),
                region.issues.len().to_string(),
                region.error.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    output::print_table(
        &[
            "REGION", "CREATED", "INVITED", "DELETED", "ENABLED", "ACCEPTED", "ISSUES", "ERROR",
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

    let totals = summary.totals();
    let elapsed = summary.finished_at - summary.started_at;
    println!(
        "\n{} eligible: {} created, {} invited, {} accepted, {} enabled, {} deleted in {}ms",
        summary.eligible,
        totals.created,
        totals.invited,
        totals.accepted,
        totals.enabled,
        totals.deleted,
        elapsed.num_milliseconds()
    );
    if summary.quiescent() {
        println!("fleet is converged; nothing to do");
    }
}
