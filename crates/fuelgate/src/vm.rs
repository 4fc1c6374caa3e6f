//! The fuel-metered execution scheduler.
//!
//! [`FuelVm`] sits in front of an engine. Every call pre-pays its fuel
//! budget from the tank, runs under the deadline of its fuel tier, and gets
//! the unused part of the budget back. A background meter pauses the engine
//! when the tank runs low and resumes it once the station has refilled
//! enough of it. Callers arriving while the engine is paused wait at an
//! admission gate until it resumes or their context ends.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fuelgate_core::{
    CallContext, ContractCall, EngineError, EngineService, EngineState, Execution, Fuel, VmCaller,
    panic_message,
};
use fuelgate_observe::{ExecutionId, LogService};
use fuelgate_resource::{FuelStat, FuelStationService, FuelTankService, ResourceError};

use crate::config::MeterConfig;
use crate::error::{VmError, VmResult};
use crate::meter::{Meter, MeterAction};

const RESUME_MESSAGE: &str = "resume engine, fuel reserve recovered";
const PAUSE_MESSAGE: &str = "pause engine, fuel reserve depleted";
const WAITING_MESSAGE: &str = "waiting for engine to resume";

/// A fuel-metered execution scheduler.
///
/// Cloning is cheap and every clone drives the same scheduler.
#[derive(Clone)]
pub struct FuelVm {
    inner: Arc<VmInner>,
}

struct VmInner {
    engine: Arc<dyn EngineService>,
    tank: Arc<dyn FuelTankService>,
    station: Arc<dyn FuelStationService>,
    log: Arc<dyn LogService>,
    meter: Meter,
    tick_interval: Duration,
    admission: Notify,
    lifecycle: CancellationToken,
    meter_task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl FuelVm {
    /// Create a scheduler over the given collaborators.
    ///
    /// The scheduler starts in the engine's current state, which should be
    /// [`EngineState::Initializing`].
    pub fn new(
        engine: Arc<dyn EngineService>,
        tank: Arc<dyn FuelTankService>,
        station: Arc<dyn FuelStationService>,
        log: Arc<dyn LogService>,
        meter: MeterConfig,
    ) -> VmResult<Self> {
        meter.validate()?;

        Ok(Self {
            inner: Arc::new(VmInner {
                engine,
                tank,
                station,
                log,
                meter: Meter::new(&meter),
                tick_interval: meter.tick_interval,
                admission: Notify::new(),
                lifecycle: CancellationToken::new(),
                meter_task: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Start the engine, the fuel station and the meter loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run(&self) -> VmResult<()> {
        let inner = &self.inner;
        match inner.engine.state() {
            EngineState::Initializing => {}
            EngineState::Stopped => return Err(VmError::AlreadyClosed),
            EngineState::Running | EngineState::Paused => return Err(VmError::AlreadyRunning),
        }

        inner.engine.run().map_err(|err| match err {
            EngineError::InvalidTransition { .. } => VmError::AlreadyRunning,
            EngineError::Stopped => VmError::AlreadyClosed,
            other => VmError::Engine(other),
        })?;

        // The engine cannot go back to Initializing, so a station that
        // fails to start stops the scheduler for good.
        if let Err(err) = inner.station.resume_refueling(&inner.lifecycle) {
            inner.lifecycle.cancel();
            if let Err(stop_err) = inner.engine.stop() {
                inner.log.report_error(&stop_err);
            }
            inner.closed.store(true, Ordering::Release);
            inner.admission.notify_waiters();
            warn!(error = %err, "Fuel station failed to start, engine stopped");
            return Err(VmError::Resource(err));
        }
        inner.admission.notify_waiters();

        let handle = tokio::spawn(meter_loop(
            Arc::downgrade(&self.inner),
            inner.tick_interval,
            inner.lifecycle.clone(),
        ));
        *inner.meter_task.lock() = Some(handle);

        info!(
            tick_ms = inner.tick_interval.as_millis(),
            low_water = inner.meter.low_water(),
            high_water = inner.meter.high_water(),
            "Fuel VM running"
        );
        Ok(())
    }

    /// Pause admission of new calls.
    pub fn pause(&self) -> VmResult<()> {
        self.inner.engine.pause().map_err(lifecycle_error)
    }

    /// Resume admission and wake every waiting caller.
    pub fn resume(&self) -> VmResult<()> {
        self.inner.engine.resume().map_err(lifecycle_error)?;
        self.inner.admission.notify_waiters();
        Ok(())
    }

    /// Stop the engine for good.
    ///
    /// Waiting callers fail with [`VmError::AlreadyClosed`]; the meter loop
    /// and the station wind down in the background.
    pub fn stop(&self) -> VmResult<()> {
        let result = self.inner.engine.stop().map_err(VmError::Engine);
        self.inner.lifecycle.cancel();
        self.inner.admission.notify_waiters();
        info!("Fuel VM stopped");
        result
    }

    /// Shut everything down and wait for the background work to end.
    pub async fn close(&self) -> VmResult<()> {
        let inner = &self.inner;
        match inner.engine.state() {
            EngineState::Stopped => return Err(VmError::AlreadyClosed),
            EngineState::Initializing => return Err(VmError::StillInitializing),
            EngineState::Running | EngineState::Paused => {}
        }
        if inner.closed.swap(true, Ordering::AcqRel) {
            return Err(VmError::AlreadyClosed);
        }

        inner.lifecycle.cancel();
        let stopped = inner.engine.stop();
        inner.admission.notify_waiters();

        inner.station.stop_refueling().await?;

        let meter_task = inner.meter_task.lock().take();
        if let Some(handle) = meter_task {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    inner
                        .log
                        .report_panic(&panic_message(err.into_panic().as_ref()));
                }
            }
        }

        info!("Fuel VM closed");
        stopped.map_err(VmError::Engine)
    }

    /// Current engine state.
    pub fn state(&self) -> EngineState {
        self.inner.engine.state()
    }

    /// Check whether calls are being admitted.
    pub fn is_running(&self) -> bool {
        self.inner.engine.is_running()
    }

    /// Snapshot of the tank.
    pub fn stats(&self) -> VmResult<FuelStat> {
        Ok(self.inner.tank.stats()?)
    }

    /// The engine behind this scheduler.
    pub fn engine(&self) -> &Arc<dyn EngineService> {
        &self.inner.engine
    }

    /// The tank calls are paid from.
    pub fn tank(&self) -> &Arc<dyn FuelTankService> {
        &self.inner.tank
    }

    /// The station refilling the tank.
    pub fn station(&self) -> &Arc<dyn FuelStationService> {
        &self.inner.station
    }

    /// Run one meter tick now and return the transition it made.
    ///
    /// The background loop calls the same logic every tick interval.
    pub fn meter_tick(&self) -> Option<MeterAction> {
        self.inner.guarded_tick()
    }

    /// Execute a contract.
    ///
    /// The call waits while the engine is paused, pre-pays
    /// `call.max_fuel()`, and is refunded the part of it that the measured
    /// run time did not use. Timed-out and failed executions are not refunded.
    pub async fn exec_contract(
        &self,
        ctx: &CallContext,
        call: &ContractCall,
    ) -> VmResult<serde_json::Value> {
        self.exec_contract_with_id(ctx, call, ExecutionId::new()).await
    }

    /// Execute a contract under a caller-chosen execution id.
    ///
    /// Behaves like [`FuelVm::exec_contract`]; every log line of the call
    /// carries `execution_id`, so callers can tie their own records to it.
    pub async fn exec_contract_with_id(
        &self,
        ctx: &CallContext,
        call: &ContractCall,
        execution_id: ExecutionId,
    ) -> VmResult<serde_json::Value> {
        let inner = &self.inner;
        let contract_id = call.contract_id();

        call.contract.validate()?;
        if ctx.is_done() {
            return Err(VmError::AdmissionTimeout);
        }

        self.admit(ctx, execution_id).await?;

        let max_fuel = call.max_fuel();
        if let Err(err) = inner.tank.burn(max_fuel) {
            return Err(match err {
                ResourceError::InsufficientFuel {
                    requested,
                    available,
                } => {
                    if let Err(pause_err) = inner.engine.pause() {
                        inner.log.report_error(&pause_err);
                    }
                    warn!(
                        %execution_id,
                        contract_id,
                        requested = requested.units(),
                        available = available.units(),
                        "Insufficient fuel, engine paused"
                    );
                    VmError::InsufficientFuel {
                        requested,
                        available,
                    }
                }
                other => VmError::Resource(other),
            });
        }
        debug!(%execution_id, contract_id, max_fuel = max_fuel.units(), "Execution admitted");

        let engine = Arc::clone(&inner.engine);
        let task_ctx = ctx.clone();
        let task_call = call.clone();
        let started = Instant::now();
        let joined =
            tokio::spawn(async move { engine.exec_contract(&task_ctx, &task_call).await }).await;
        let elapsed = started.elapsed();

        match joined {
            Ok(Ok(Execution::Completed(value))) => {
                self.refund(execution_id, max_fuel, elapsed)?;
                debug!(
                    %execution_id,
                    contract_id,
                    elapsed_ms = elapsed.as_millis(),
                    "Execution completed"
                );
                Ok(value)
            }
            Ok(Ok(Execution::TimedOut(limit))) => {
                warn!(%execution_id, contract_id, limit_ms = limit.as_millis(), "Execution timed out");
                Err(VmError::ExecutionTimeout(limit))
            }
            Ok(Ok(Execution::Aborted(reason))) => {
                warn!(%execution_id, contract_id, %reason, "Execution aborted");
                Err(VmError::ExecutionFailed(reason))
            }
            Ok(Err(err)) => {
                inner.log.report_error(&err);
                Err(VmError::Engine(err))
            }
            Err(join_err) => {
                let message = if join_err.is_panic() {
                    panic_message(join_err.into_panic().as_ref())
                } else {
                    "engine task was cancelled".to_string()
                };
                inner.log.report_panic(&message);
                Err(VmError::ExecutionFailed(message))
            }
        }
    }

    /// Wait until the engine is running.
    async fn admit(&self, ctx: &CallContext, execution_id: ExecutionId) -> VmResult<()> {
        let inner = &self.inner;
        loop {
            // Register before checking so a resume in between is not missed.
            let notified = inner.admission.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if ctx.is_done() {
                return Err(VmError::AdmissionTimeout);
            }
            match inner.engine.state() {
                EngineState::Running => return Ok(()),
                EngineState::Stopped => return Err(VmError::AlreadyClosed),
                EngineState::Initializing | EngineState::Paused => {}
            }

            debug!(%execution_id, "Execution waiting for admission");
            inner.log.report_info(WAITING_MESSAGE);

            tokio::select! {
                _ = &mut notified => {}
                _ = ctx.done() => return Err(VmError::AdmissionTimeout),
            }
        }
    }

    fn refund(&self, execution_id: ExecutionId, max_fuel: Fuel, elapsed: Duration) -> VmResult<()> {
        let actual = Fuel::from_duration(elapsed);
        let surplus = max_fuel.saturating_sub(actual);
        if surplus.is_zero() {
            debug!(%execution_id, actual = actual.units(), "No fuel to refund");
            return Ok(());
        }

        if let Err(err) = self.inner.tank.refuel(surplus) {
            self.inner.log.report_error(&err);
            return Err(VmError::Resource(err));
        }
        debug!(%execution_id, actual = actual.units(), refund = surplus.units(), "Refunded fuel");
        Ok(())
    }
}

impl VmInner {
    fn guarded_tick(&self) -> Option<MeterAction> {
        match catch_unwind(AssertUnwindSafe(|| self.tick())) {
            Ok(action) => action,
            Err(payload) => {
                self.log.report_panic(&panic_message(payload.as_ref()));
                None
            }
        }
    }

    fn tick(&self) -> Option<MeterAction> {
        let stat = match self.tank.stats() {
            Ok(stat) => stat,
            Err(err) => {
                self.log.report_error(&err);
                return None;
            }
        };

        let action = self.meter.decide(self.engine.state(), &stat)?;
        let (result, message) = match action {
            MeterAction::Pause => (self.engine.pause(), PAUSE_MESSAGE),
            MeterAction::Resume => (self.engine.resume(), RESUME_MESSAGE),
        };

        if let Err(err) = result {
            self.log.report_error(&err);
            return None;
        }
        if action == MeterAction::Resume {
            self.admission.notify_waiters();
        }

        self.log.report_info(message);
        info!(
            fuel = stat.fuel.units(),
            capacity = stat.capacity.units(),
            used_percent = stat.used_percent,
            "{}",
            message
        );
        Some(action)
    }
}

impl Drop for VmInner {
    fn drop(&mut self) {
        self.lifecycle.cancel();
    }
}

async fn meter_loop(vm: Weak<VmInner>, tick_interval: Duration, lifecycle: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + tick_interval, tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = lifecycle.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(inner) = vm.upgrade() else {
            break;
        };
        inner.guarded_tick();
    }

    debug!("Meter loop ended");
}

fn lifecycle_error(err: EngineError) -> VmError {
    match err {
        EngineError::Stopped => VmError::AlreadyClosed,
        other => VmError::Engine(other),
    }
}

impl std::fmt::Debug for FuelVm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuelVm")
            .field("state", &self.state())
            .field("meter", &self.inner.meter)
            .field("tick_interval", &self.inner.tick_interval)
            .finish()
    }
}
