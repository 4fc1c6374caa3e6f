//! Validate command - Check a contract definition.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};

use fuelgate::VmConfig;
use fuelgate_core::{Contract, Fuel, Visibility};

use crate::OutputFormat;

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// Path to the contract definition (JSON)
    #[arg(required = true)]
    pub contract: PathBuf,
}

/// The fields of a contract definition that are checked.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContractFile {
    id: i64,
    name: String,
    description: String,
    user_id: i64,
    visibility: Option<String>,
    max_fuel: u64,
}

/// Validation result.
#[derive(Debug, Serialize)]
struct ValidationResult {
    valid: bool,
    path: String,
    name: String,
    max_fuel: u64,
    max_execution_ms: u128,
    warnings: Vec<String>,
    errors: Vec<String>,
}

/// Execute the validate command.
pub fn execute(args: ValidateArgs, config: VmConfig, format: OutputFormat) -> Result<()> {
    let text = std::fs::read_to_string(&args.contract)
        .with_context(|| format!("Failed to read {}", args.contract.display()))?;
    let file: ContractFile = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", args.contract.display()))?;

    let result = check(&file, &config, args.contract.display().to_string());

    // Output results
    match format {
        OutputFormat::Human => {
            if result.valid {
                println!("Contract is valid: {}", result.path);
                println!("  Name: {}", result.name);
                println!("  Max fuel: {}", result.max_fuel);
                println!("  Max execution time: {}ms", result.max_execution_ms);

                if !result.warnings.is_empty() {
                    println!("\nWarnings:");
                    for warning in &result.warnings {
                        println!("  - {}", warning);
                    }
                }
            } else {
                println!("Contract is INVALID: {}", result.path);
                for error in &result.errors {
                    println!("  Error: {}", error);
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::JsonCompact => {
            println!("{}", serde_json::to_string(&result)?);
        }
    }

    if result.valid {
        Ok(())
    } else {
        Err(anyhow::anyhow!("Validation failed"))
    }
}

fn check(file: &ContractFile, config: &VmConfig, path: String) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // A definition must name its visibility; an absent field parses as "".
    let raw_visibility = file.visibility.as_deref().unwrap_or_default();
    let visibility = Visibility::from_str(raw_visibility).unwrap_or_else(|err| {
        errors.push(err.to_string());
        Visibility::default()
    });

    let max_fuel = Fuel::new(file.max_fuel);
    let contract = Contract::new(file.name.clone(), file.user_id, max_fuel)
        .with_id(file.id)
        .with_description(file.description.clone())
        .with_visibility(visibility);

    if let Err(err) = contract.validate() {
        errors.push(err.to_string());
    }

    if max_fuel > config.tank.capacity {
        errors.push(format!(
            "max fuel {} exceeds tank capacity {}",
            max_fuel, config.tank.capacity
        ));
    }
    if config
        .tiers
        .tiers()
        .last()
        .is_some_and(|top| max_fuel > top.ceiling)
    {
        warnings.push("max fuel is above every tier; the absolute maximum applies".to_string());
    }
    if file.description.is_empty() {
        warnings.push("contract has no description".to_string());
    }

    ValidationResult {
        valid: errors.is_empty(),
        path,
        name: file.name.clone(),
        max_fuel: file.max_fuel,
        max_execution_ms: contract.max_execution_time(&config.tiers).as_millis(),
        warnings,
        errors,
    }
}
