use crate::output;
use anyhow::{bail, Context, Result};
use guardlink_engine::FleetState;
use std::path::Path;

#[derive(Debug, clap::Subcommand)]
pub enum FleetSubcommand {
    /// Write a starter fleet file with one administrator and three members
    Init {
        /// Overwrite an existing fleet file
        #[arg(long)]
        force: bool,
    },
    /// Show the fleet file: accounts, memberships and member detectors
    Show,
}

pub fn run(fleet: &Path, subcommand: FleetSubcommand, json: bool) -> Result<()> {
    match subcommand {
        FleetSubcommand::Init { force } => init(fleet, force),
        FleetSubcommand::Show => show(fleet, json),
    }
}

fn init(fleet: &Path, force: bool) -> Result<()> {
    let starter = FleetState::starter();
    let written = if force {
        starter.save(fleet).map(|()| true)
    } else {
        starter.save_if_missing(fleet)
    }
    .with_context(|| format!("cannot write fleet file {}", fleet.display()))?;
    if !written {
        bail!("{} already exists (use --force to overwrite)", fleet.display());
    }
    println!("wrote starter fleet to {}", fleet.display());
    Ok(())
}

fn show(fleet: &Path, json: bool) -> Result<()> {
    let state = FleetState::load(fleet)
        .with_context(|| format!("cannot load fleet file {}", fleet.display()))?;
    if json {
        return output::print_json(&state);
    }

    println!("administrator: {}", state.admin_account);
    println!(
        "regions: {}",
        state
            .regions
            .iter()
            .map(|region| region.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("registered accounts: {}", state.registry.len());

    for region in &state.regions {
        let members = state.memberships.get(region);
        let count = members.map(|snapshot| snapshot.len()).unwrap_or(0);
        println!("\n{region}: {count} member(s)");
        let Some(members) = members else { continue };
        if members.is_empty() {
            continue;
        }
        let detectors = state.member_detectors.get(region);
        let rows: Vec<Vec<String>> = members
            .iter()
            .map(|(account, relationship)| {
                let detector = detectors
                    .and_then(|region| region.get(account))
                    .map(|detector| {
                        if detector.enabled {
                            "enabled".to_string()
                        } else {
                            "disabled".to_string()
                        }
                    })
                    .unwrap_or_else(|| "-".to_string());
                vec![account.to_string(), relationship.clone(), detector]
            })
            .collect();
        output::print_table(&["ACCOUNT", "RELATIONSHIP", "DETECTOR"], rows);
    }
    Ok(())
}
