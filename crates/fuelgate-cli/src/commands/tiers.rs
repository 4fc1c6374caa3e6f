//! Tiers command - Show how fuel budgets map to execution time.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use fuelgate::VmConfig;
use fuelgate_core::{Fuel, FuelTiers};

use crate::OutputFormat;

/// Arguments for the tiers command.
#[derive(Args)]
pub struct TiersArgs {
    /// Resolve the execution time for this fuel budget
    #[arg(long)]
    pub max_fuel: Option<u64>,
}

#[derive(Debug, Serialize)]
struct TierRow {
    ceiling: u64,
    max_duration_ms: u128,
}

#[derive(Debug, Serialize)]
struct TierTable {
    tiers: Vec<TierRow>,
    absolute_max_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved: Option<Resolved>,
}

#[derive(Debug, Serialize)]
struct Resolved {
    max_fuel: u64,
    pays_for_ms: u128,
    max_execution_ms: u128,
}

fn resolve(tiers: &FuelTiers, max_fuel: Fuel) -> Resolved {
    Resolved {
        max_fuel: max_fuel.units(),
        pays_for_ms: max_fuel.as_duration().as_millis(),
        max_execution_ms: tiers.max_execution_time(max_fuel).as_millis(),
    }
}

/// Execute the tiers command.
pub fn execute(args: TiersArgs, config: VmConfig, format: OutputFormat) -> Result<()> {
    let tiers = &config.tiers;

    let table = TierTable {
        tiers: tiers
            .tiers()
            .iter()
            .map(|tier| TierRow {
                ceiling: tier.ceiling.units(),
                max_duration_ms: tier.max_duration.as_millis(),
            })
            .collect(),
        absolute_max_ms: tiers.absolute_max().as_millis(),
        resolved: args.max_fuel.map(|max_fuel| resolve(tiers, Fuel::new(max_fuel))),
    };

    match format {
        OutputFormat::Human => {
            println!("{:>12}  {:>12}", "max fuel", "max time");
            for row in &table.tiers {
                println!("{:>12}  {:>10}ms", row.ceiling, row.max_duration_ms);
            }
            println!("{:>12}  {:>10}ms", "above", table.absolute_max_ms);

            if let Some(resolved) = &table.resolved {
                println!(
                    "\nA budget of {} fuel pays for {}ms and may run for {}ms",
                    resolved.max_fuel, resolved.pays_for_ms, resolved.max_execution_ms
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&table)?);
        }
        OutputFormat::JsonCompact => {
            println!("{}", serde_json::to_string(&table)?);
        }
    }

    Ok(())
}
