//! End-to-end behaviour of the scheduler with its default collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use fuelgate::prelude::*;
use fuelgate_core::{ContractFault, EngineError, EngineResult};
use fuelgate_observe::LogLevel;

const CONTRACT: i64 = 1;

fn call(max_fuel: u64) -> ContractCall {
    ContractCall::new(Contract::new("work", 7, Fuel::new(max_fuel)).with_id(CONTRACT))
        .with_input(serde_json::json!({ "n": 1 }))
}

fn sleeper(work: Duration) -> Arc<dyn fuelgate_core::ContractHandler> {
    handler_fn(move |input| async move {
        tokio::time::sleep(work).await;
        Ok(input)
    })
}

/// A builder whose station is too slow to interfere.
fn quiet_builder(capacity: u64, initial: u64, log: Arc<CollectingLogService>) -> FuelgateBuilder {
    Fuelgate::builder()
        .with_tank_capacity(Fuel::new(capacity))
        .with_initial_fuel(Fuel::new(initial))
        .with_refuel(Fuel::new(1), Duration::from_secs(3_600))
        .with_log_service(log)
}

fn balance(vm: &FuelVm) -> u64 {
    vm.stats().unwrap().fuel.units()
}

#[tokio::test(start_paused = true)]
async fn test_refund_never_exceeds_budget() {
    let log = Arc::new(CollectingLogService::default());
    let vm = quiet_builder(10_000, 10_000, log)
        .with_contract(CONTRACT, sleeper(Duration::from_millis(250)))
        .build()
        .unwrap();
    vm.run().unwrap();

    let output = vm
        .exec_contract(&CallContext::new(), &call(1_000))
        .await
        .unwrap();

    assert_eq!(output, serde_json::json!({ "n": 1 }));
    assert_eq!(balance(&vm), 10_000 - 250);
    vm.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_insufficient_fuel_pauses_engine() {
    let log = Arc::new(CollectingLogService::default());
    let vm = quiet_builder(1_000, 50, log)
        .with_contract(CONTRACT, sleeper(Duration::from_millis(1)))
        .build()
        .unwrap();
    vm.run().unwrap();

    let err = vm
        .exec_contract(&CallContext::new(), &call(100))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        VmError::InsufficientFuel {
            requested: Fuel::new(100),
            available: Fuel::new(50),
        }
    );
    assert!(err.is_retryable());
    assert_eq!(balance(&vm), 50);
    assert_eq!(vm.state(), EngineState::Paused);
    vm.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_invalid_contract_is_rejected_before_admission() {
    let log = Arc::new(CollectingLogService::default());
    let vm = quiet_builder(1_000, 1_000, log).build().unwrap();
    vm.run().unwrap();

    let nameless = ContractCall::new(Contract::new("", 7, Fuel::new(10)).with_id(CONTRACT));
    let err = vm
        .exec_contract(&CallContext::new(), &nameless)
        .await
        .unwrap_err();

    assert!(matches!(err, VmError::Invalid(_)));
    assert_eq!(balance(&vm), 1_000);
    vm.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_done_context_is_not_admitted() {
    let log = Arc::new(CollectingLogService::default());
    let vm = quiet_builder(1_000, 1_000, log)
        .with_contract(CONTRACT, sleeper(Duration::from_millis(1)))
        .build()
        .unwrap();
    vm.run().unwrap();

    let ctx = CallContext::new();
    ctx.cancel();

    let result = vm.exec_contract(&ctx, &call(10)).await;
    assert_eq!(result, Err(VmError::AdmissionTimeout));
    assert_eq!(balance(&vm), 1_000);
    vm.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_admission_times_out_while_paused() {
    let log = Arc::new(CollectingLogService::default());
    let vm = quiet_builder(1_000, 1_000, log.clone())
        .with_contract(CONTRACT, sleeper(Duration::from_millis(1)))
        .build()
        .unwrap();
    vm.run().unwrap();
    vm.pause().unwrap();

    let ctx = CallContext::with_timeout(Duration::from_millis(200));
    let result = vm.exec_contract(&ctx, &call(10)).await;

    assert_eq!(result, Err(VmError::AdmissionTimeout));
    assert_eq!(balance(&vm), 1_000);
    assert!(log.contains(LogLevel::Info, "waiting for engine to resume"));
    vm.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_resume_wakes_every_waiter() {
    let log = Arc::new(CollectingLogService::default());
    let vm = quiet_builder(10_000, 10_000, log)
        .with_contract(CONTRACT, sleeper(Duration::from_millis(10)))
        .build()
        .unwrap();
    vm.run().unwrap();
    vm.pause().unwrap();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let vm = vm.clone();
            tokio::spawn(async move { vm.exec_contract(&CallContext::new(), &call(100)).await })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(waiters.iter().all(|w| !w.is_finished()));
    assert_eq!(balance(&vm), 10_000);

    vm.resume().unwrap();
    for waiter in waiters {
        assert!(waiter.await.unwrap().is_ok());
    }
    assert_eq!(balance(&vm), 10_000 - 3 * 10);
    vm.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_station_and_meter_recover_paused_engine() {
    let log = Arc::new(CollectingLogService::default());
    let vm = Fuelgate::builder()
        .with_tank_capacity(Fuel::new(1_000))
        .with_initial_fuel(Fuel::ZERO)
        .with_refuel(Fuel::new(50), Duration::from_millis(100))
        .with_log_service(log.clone())
        .with_contract(CONTRACT, sleeper(Duration::from_millis(1)))
        .build()
        .unwrap();
    vm.run().unwrap();

    let err = vm
        .exec_contract(&CallContext::new(), &call(100))
        .await
        .unwrap_err();
    assert!(matches!(err, VmError::InsufficientFuel { .. }));
    assert_eq!(vm.state(), EngineState::Paused);

    let waiter = {
        let vm = vm.clone();
        tokio::spawn(async move { vm.exec_contract(&CallContext::new(), &call(100)).await })
    };

    // Usage is still above the low water mark at the first meter tick.
    tokio::time::sleep(Duration::from_millis(900)).await;
    assert_eq!(vm.state(), EngineState::Paused);
    assert!(!waiter.is_finished());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(waiter.await.unwrap().is_ok());
    assert!(log.contains(LogLevel::Info, "resume engine, fuel reserve recovered"));

    vm.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_meter_hysteresis() {
    let log = Arc::new(CollectingLogService::default());
    let vm = quiet_builder(100, 100, log).build().unwrap();
    vm.run().unwrap();

    vm.tank().burn(Fuel::new(94)).unwrap();
    assert_eq!(vm.meter_tick(), None);

    vm.tank().burn(Fuel::new(1)).unwrap();
    assert_eq!(vm.meter_tick(), Some(MeterAction::Pause));

    // Back below the pause mark but above the resume mark.
    vm.tank().refuel(Fuel::new(20)).unwrap();
    assert_eq!(vm.meter_tick(), None);
    assert_eq!(vm.state(), EngineState::Paused);

    vm.tank().refuel(Fuel::new(10)).unwrap();
    assert_eq!(vm.meter_tick(), Some(MeterAction::Resume));
    assert_eq!(vm.meter_tick(), None);

    vm.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_tier_decides_execution_deadline() {
    let log = Arc::new(CollectingLogService::default());
    let tiers = FuelTiers::new([
        (Duration::from_secs(1), Fuel::new(100)),
        (Duration::from_secs(5), Fuel::new(500)),
        (Duration::from_secs(10), Fuel::new(2_000)),
    ]);
    let vm = quiet_builder(100_000, 100_000, log)
        .with_tiers(tiers)
        .with_contract(CONTRACT, sleeper(Duration::from_secs(6)))
        .build()
        .unwrap();
    vm.run().unwrap();

    let result = vm.exec_contract(&CallContext::new(), &call(300)).await;
    assert_eq!(result, Err(VmError::ExecutionTimeout(Duration::from_secs(5))));
    assert_eq!(balance(&vm), 100_000 - 300);

    // Beyond every tier the absolute maximum applies.
    let result = vm.exec_contract(&CallContext::new(), &call(5_000)).await;
    assert!(result.is_ok());

    vm.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_contract_fault_is_execution_failure() {
    let log = Arc::new(CollectingLogService::default());
    let vm = quiet_builder(1_000, 1_000, log)
        .with_contract(
            CONTRACT,
            handler_fn(|_| async move { Err(ContractFault::new("division by zero")) }),
        )
        .build()
        .unwrap();
    vm.run().unwrap();

    let result = vm.exec_contract(&CallContext::new(), &call(100)).await;
    assert_eq!(
        result,
        Err(VmError::ExecutionFailed("division by zero".to_string()))
    );
    assert_eq!(balance(&vm), 900);
    vm.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_engine_error_is_reported() {
    let log = Arc::new(CollectingLogService::default());
    let vm = quiet_builder(1_000, 1_000, log.clone()).build().unwrap();
    vm.run().unwrap();

    // No body registered for the contract.
    let result = vm.exec_contract(&CallContext::new(), &call(100)).await;
    assert_eq!(
        result,
        Err(VmError::Engine(EngineError::ContractNotFound(CONTRACT)))
    );
    assert!(log.contains(LogLevel::Error, "Contract not found"));
    assert_eq!(balance(&vm), 900);
    vm.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_lifecycle_guards() {
    let log = Arc::new(CollectingLogService::default());
    let vm = quiet_builder(1_000, 1_000, log).build().unwrap();

    assert_eq!(vm.close().await, Err(VmError::StillInitializing));
    assert_eq!(vm.state(), EngineState::Initializing);

    vm.run().unwrap();
    assert_eq!(vm.run(), Err(VmError::AlreadyRunning));

    vm.close().await.unwrap();
    assert_eq!(vm.close().await, Err(VmError::AlreadyClosed));
    assert_eq!(vm.run(), Err(VmError::AlreadyClosed));

    let result = vm.exec_contract(&CallContext::new(), &call(10)).await;
    assert_eq!(result, Err(VmError::AlreadyClosed));
}

/// Delegates lifecycle to a [`LocalEngine`] and panics on the first calls.
struct FlakyEngine {
    inner: LocalEngine,
    panics_left: AtomicUsize,
}

#[async_trait]
impl EngineService for FlakyEngine {
    fn run(&self) -> EngineResult<()> {
        self.inner.run()
    }

    fn pause(&self) -> EngineResult<()> {
        self.inner.pause()
    }

    fn resume(&self) -> EngineResult<()> {
        self.inner.resume()
    }

    fn stop(&self) -> EngineResult<()> {
        self.inner.stop()
    }

    fn state(&self) -> EngineState {
        self.inner.state()
    }

    async fn exec_contract(
        &self,
        _ctx: &CallContext,
        call: &ContractCall,
    ) -> EngineResult<Execution> {
        let should_panic = self
            .panics_left
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if should_panic {
            panic!("engine exploded");
        }
        Ok(Execution::Completed(call.input.clone()))
    }
}

#[tokio::test(start_paused = true)]
async fn test_engine_panic_is_isolated() {
    let log = Arc::new(CollectingLogService::default());
    let engine = Arc::new(FlakyEngine {
        inner: LocalEngine::with_defaults(),
        panics_left: AtomicUsize::new(1),
    });
    let vm = quiet_builder(1_000, 1_000, log.clone())
        .with_engine(engine)
        .build()
        .unwrap();
    vm.run().unwrap();

    let result = vm.exec_contract(&CallContext::new(), &call(100)).await;
    assert_eq!(
        result,
        Err(VmError::ExecutionFailed("engine exploded".to_string()))
    );
    assert!(log.contains(LogLevel::Panic, "engine exploded"));
    assert_eq!(balance(&vm), 900);

    let output = vm
        .exec_contract(&CallContext::new(), &call(100))
        .await
        .unwrap();
    assert_eq!(output, serde_json::json!({ "n": 1 }));
    assert!(vm.is_running());

    vm.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tank_stays_within_capacity_under_load() {
    let log = Arc::new(CollectingLogService::default());
    let vm = Fuelgate::builder()
        .with_tank_capacity(Fuel::new(1_000))
        .with_refuel(Fuel::new(100), Duration::from_millis(5))
        .with_tick_interval(Duration::from_millis(10))
        .with_log_service(log)
        .with_contract(CONTRACT, sleeper(Duration::from_millis(2)))
        .build()
        .unwrap();
    vm.run().unwrap();

    let calls: Vec<_> = (0..64)
        .map(|_| {
            let vm = vm.clone();
            tokio::spawn(async move {
                let ctx = CallContext::with_timeout(Duration::from_secs(10));
                let result = vm.exec_contract(&ctx, &call(200)).await;
                let stats = vm.stats().unwrap();
                assert!(stats.fuel <= stats.capacity);
                result
            })
        })
        .collect();

    for handle in calls {
        match handle.await.unwrap() {
            Ok(_) | Err(VmError::InsufficientFuel { .. }) | Err(VmError::AdmissionTimeout) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    let stats = vm.stats().unwrap();
    assert!(stats.fuel <= stats.capacity);
    vm.close().await.unwrap();
}
