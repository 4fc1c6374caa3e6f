//! Passive refueling of the tank.
//!
//! A fuel station credits the tank with a fixed amount at a fixed interval,
//! independent of execution traffic. It is the "income" that lets a paused
//! engine come back.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use fuelgate_core::Fuel;
use fuelgate_observe::LogService;

use crate::error::{ResourceError, ResourceResult};
use crate::tank::FuelTankService;

/// Configuration for a fuel station.
#[derive(Debug, Clone)]
pub struct StationConfig {
    /// Fuel delivered per interval.
    pub refuel_amount: Fuel,
    /// Time between deliveries.
    pub refuel_interval: Duration,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            refuel_amount: Fuel::new(500),
            refuel_interval: Duration::from_millis(100),
        }
    }
}

impl StationConfig {
    /// Create a station configuration.
    pub fn new(refuel_amount: Fuel, refuel_interval: Duration) -> Self {
        Self {
            refuel_amount,
            refuel_interval,
        }
    }

    /// Set the amount delivered per interval.
    pub fn with_refuel_amount(mut self, amount: Fuel) -> Self {
        self.refuel_amount = amount;
        self
    }

    /// Set the interval between deliveries.
    pub fn with_refuel_interval(mut self, interval: Duration) -> Self {
        self.refuel_interval = interval;
        self
    }

    /// Fuel delivered per second at this rate.
    pub fn rate_per_second(&self) -> f64 {
        let secs = self.refuel_interval.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.refuel_amount.units() as f64 / secs
    }

    /// Check the configuration.
    pub fn validate(&self) -> ResourceResult<()> {
        if self.refuel_interval.is_zero() {
            return Err(ResourceError::InvalidConfig(
                "refuel interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Background refueling of a tank.
#[async_trait]
pub trait FuelStationService: Send + Sync {
    /// Start refueling until `ctx` is cancelled or refueling is stopped.
    ///
    /// Calling it while already refueling does nothing.
    fn resume_refueling(&self, ctx: &CancellationToken) -> ResourceResult<()>;

    /// Stop refueling and wait until the background work has ended.
    async fn stop_refueling(&self) -> ResourceResult<()>;

    /// Check whether the background work is active.
    fn is_refueling(&self) -> bool;
}

struct Worker {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// A station trickling fuel into a tank from a tokio task.
pub struct LocalFuelStation {
    config: StationConfig,
    tank: Arc<dyn FuelTankService>,
    log: Arc<dyn LogService>,
    worker: Mutex<Option<Worker>>,
    total_delivered: Arc<AtomicU64>,
}

impl LocalFuelStation {
    /// Create a station feeding `tank`.
    pub fn new(
        config: StationConfig,
        tank: Arc<dyn FuelTankService>,
        log: Arc<dyn LogService>,
    ) -> ResourceResult<Self> {
        config.validate()?;

        Ok(Self {
            config,
            tank,
            log,
            worker: Mutex::new(None),
            total_delivered: Arc::new(AtomicU64::new(0)),
        })
    }

    /// The station configuration.
    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    /// Fuel offered to the tank so far.
    pub fn total_delivered(&self) -> u64 {
        self.total_delivered.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl FuelStationService for LocalFuelStation {
    fn resume_refueling(&self, ctx: &CancellationToken) -> ResourceResult<()> {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ResourceError::Unavailable(format!("no tokio runtime: {}", e)))?;

        let token = ctx.child_token();
        let tank = Arc::clone(&self.tank);
        let log = Arc::clone(&self.log);
        let delivered = Arc::clone(&self.total_delivered);
        let amount = self.config.refuel_amount;
        let interval = self.config.refuel_interval;
        let stop = token.clone();

        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match tank.refuel(amount) {
                    Ok(()) => {
                        delivered.fetch_add(amount.units(), Ordering::Relaxed);
                    }
                    Err(err) => log.report_error(&err),
                }
            }

            debug!("Fuel station task ended");
        });

        info!(
            amount = amount.units(),
            interval_ms = interval.as_millis(),
            "Fuel station refueling"
        );

        *worker = Some(Worker { token, handle });
        Ok(())
    }

    async fn stop_refueling(&self) -> ResourceResult<()> {
        let worker = self.worker.lock().take();
        let Some(worker) = worker else {
            return Ok(());
        };

        worker.token.cancel();
        if let Err(err) = worker.handle.await {
            if err.is_panic() {
                self.log
                    .report_panic(&fuelgate_core::panic_message(err.into_panic().as_ref()));
            }
        }

        info!(delivered = self.total_delivered(), "Fuel station stopped");
        Ok(())
    }

    fn is_refueling(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }
}

impl std::fmt::Debug for LocalFuelStation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFuelStation")
            .field("config", &self.config)
            .field("refueling", &self.is_refueling())
            .field("total_delivered", &self.total_delivered())
            .finish()
    }
}
