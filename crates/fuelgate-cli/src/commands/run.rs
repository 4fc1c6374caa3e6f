//! Run command - Drive simulated contract calls through the scheduler.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;

use fuelgate::prelude::*;
use fuelgate_core::ContractFault;
use fuelgate_observe::{
    ExecutionId, ExecutionRecord, FanoutLogService, FuelSummary, LogLevel, OutcomeKind, RunReport,
};

use crate::OutputFormat;

const CONTRACT_ID: i64 = 1;

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Number of calls to make
    #[arg(long, default_value = "100")]
    pub calls: u64,

    /// Number of calls in flight at once
    #[arg(long, default_value = "8")]
    pub concurrency: usize,

    /// Simulated work per call in milliseconds
    #[arg(long, default_value = "20")]
    pub work_ms: u64,

    /// Fuel budget of each call
    #[arg(long, default_value = "100")]
    pub max_fuel: u64,

    /// Make every k-th call fail
    #[arg(long)]
    pub fail_every: Option<u64>,

    /// Give up on admission after this many milliseconds
    #[arg(long)]
    pub admission_timeout_ms: Option<u64>,

    /// Show tank and log metrics
    #[arg(long)]
    pub metrics: bool,
}

/// Execute the run command.
pub fn execute(args: RunArgs, config: VmConfig, format: OutputFormat, quiet: bool) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let collected = Arc::new(CollectingLogService::default());
    let report = runtime.block_on(simulate(&args, config, Arc::clone(&collected), quiet))?;

    match format {
        OutputFormat::Human => {
            println!("{}", report.to_text());
            if args.metrics {
                if let Some(fuel) = &report.fuel {
                    println!("Tank:");
                    println!("  Balance: {} / {}", fuel.fuel, fuel.capacity);
                }
                println!("Log:");
                println!("  Info: {}", collected.count(LogLevel::Info));
                println!("  Errors: {}", collected.count(LogLevel::Error));
                println!("  Panics: {}", collected.count(LogLevel::Panic));
            }
        }
        OutputFormat::Json => println!("{}", report.to_json_pretty()),
        OutputFormat::JsonCompact => println!("{}", serde_json::to_string(&report.to_json())?),
    }

    let failed = report.records.len() - report.count(OutcomeKind::Completed);
    if failed == 0 {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "{} of {} executions did not complete",
            failed,
            report.records.len()
        ))
    }
}

async fn simulate(
    args: &RunArgs,
    config: VmConfig,
    collected: Arc<CollectingLogService>,
    quiet: bool,
) -> Result<RunReport> {
    let log = FanoutLogService::new()
        .with(Arc::new(TracingLogService::new()))
        .with(collected);

    let vm = Fuelgate::builder()
        .with_config(config)
        .with_log_service(Arc::new(log))
        .with_contract(CONTRACT_ID, simulated_contract(args.work_ms, args.fail_every))
        .build()
        .context("Failed to create scheduler")?;
    vm.run().context("Failed to start scheduler")?;

    if !quiet {
        tracing::info!(
            calls = args.calls,
            concurrency = args.concurrency,
            max_fuel = args.max_fuel,
            "Starting simulation"
        );
    }

    let contract = Contract::new("simulated", 1, Fuel::new(args.max_fuel)).with_id(CONTRACT_ID);
    let next = Arc::new(AtomicU64::new(0));
    let started = Instant::now();

    let workers: Vec<_> = (0..args.concurrency.max(1))
        .map(|_| {
            let vm = vm.clone();
            let contract = contract.clone();
            let next = Arc::clone(&next);
            let calls = args.calls;
            let admission_timeout = args.admission_timeout_ms.map(Duration::from_millis);

            tokio::spawn(async move {
                let mut records = Vec::new();
                loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    if index >= calls {
                        break;
                    }

                    let ctx = match admission_timeout {
                        Some(timeout) => CallContext::with_timeout(timeout),
                        None => CallContext::new(),
                    };
                    let call = ContractCall::new(contract.clone())
                        .with_input(serde_json::json!({ "index": index }));

                    records.push(run_call(&vm, &ctx, &call, ExecutionId::new()).await);
                }
                records
            })
        })
        .collect();

    let mut report = RunReport::new();
    for worker in workers {
        for record in worker.await.context("Simulation worker failed")? {
            report.record(record);
        }
    }
    report.wall_time = started.elapsed();

    let stats = vm.stats().context("Failed to read tank")?;
    report.fuel = Some(FuelSummary {
        fuel: stats.fuel.units(),
        capacity: stats.capacity.units(),
        used_percent: stats.used_percent,
        total_burned: stats.total_burned,
        total_refueled: stats.total_refueled,
    });

    vm.close().await.context("Failed to close scheduler")?;
    Ok(report)
}

/// Execute one call and record it under the id the scheduler logged it with.
async fn run_call(
    vm: &FuelVm,
    ctx: &CallContext,
    call: &ContractCall,
    execution_id: ExecutionId,
) -> ExecutionRecord {
    let begin = Instant::now();
    let (outcome, message) = match vm.exec_contract_with_id(ctx, call, execution_id).await {
        Ok(_) => (OutcomeKind::Completed, None),
        Err(err) => (err.outcome(), Some(err.to_string())),
    };

    ExecutionRecord {
        execution_id,
        contract_id: call.contract_id(),
        outcome,
        latency: begin.elapsed(),
        message,
    }
}

fn simulated_contract(
    work_ms: u64,
    fail_every: Option<u64>,
) -> Arc<dyn fuelgate_core::ContractHandler> {
    let counter = Arc::new(AtomicU64::new(0));
    let work = Duration::from_millis(work_ms);

    handler_fn(move |input| {
        let count = counter.fetch_add(1, Ordering::Relaxed) + 1;
        let fail = fail_every.is_some_and(|k| k > 0 && count % k == 0);

        async move {
            tokio::time::sleep(work).await;
            if fail {
                return Err(ContractFault::new(format!("simulated failure on call {}", count)));
            }
            Ok(input)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_keeps_execution_id() {
        let vm = Fuelgate::builder()
            .with_contract(CONTRACT_ID, simulated_contract(0, Some(2)))
            .build()
            .unwrap();
        vm.run().unwrap();

        let contract = Contract::new("simulated", 1, Fuel::new(100)).with_id(CONTRACT_ID);
        let call = ContractCall::new(contract);

        let first_id = ExecutionId::new();
        let first = run_call(&vm, &CallContext::new(), &call, first_id).await;
        assert_eq!(first.execution_id, first_id);
        assert_eq!(first.contract_id, CONTRACT_ID);
        assert_eq!(first.outcome, OutcomeKind::Completed);

        let second_id = ExecutionId::new();
        let second = run_call(&vm, &CallContext::new(), &call, second_id).await;
        assert_eq!(second.execution_id, second_id);
        assert_eq!(second.outcome, OutcomeKind::ExecutionFailed);
        assert!(second.message.is_some_and(|m| m.contains("call 2")));

        vm.close().await.unwrap();
    }
}
