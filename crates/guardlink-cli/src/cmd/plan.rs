use crate::output;
use crate::settings::SettingsArgs;
use anyhow::{Context, Result};
use guardlink_engine::{Engine, FleetState, SimCloud};
use std::path::Path;

/// Pure derivation: loads the fleet, derives every region's plan, prints it.
/// The fleet file is never written back.
pub fn run(fleet: &Path, args: &SettingsArgs, json: bool) -> Result<()> {
    let settings = args.resolve()?;
    let state = FleetState::load(fleet)
        .with_context(|| format!("cannot load fleet file {}", fleet.display()))?;
    let cloud = SimCloud::new(state);
    let engine = Engine::new(cloud.providers(), settings);

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(engine.plan()).context("plan derivation failed")?;

    if json {
        return output::print_json(&report);
    }

    println!("{} eligible account(s)", report.eligible);
    for planned in &report.regions {
        let plan = &planned.plan;
        if plan.is_empty() {
            println!("\n{}: converged, nothing to do", planned.region);
            continue;
        }
        println!("\n{}:", planned.region);
        for account in &plan.delete {
            println!("  delete member {account}");
        }
        for detail in &plan.create {
            println!("  create member {} ({})", detail.id, detail.email);
        }
        for account in &plan.invite {
            println!("  invite member {account}");
        }
        for action in &plan.member_actions {
            println!("  {} for {}", action.step, action.account);
        }
    }
    for issue in &report.issues {
        println!("issue: {issue}");
    }
    if report.pending() == 0 {
        println!("nothing pending; fleet is converged");
    }
    Ok(())
}
