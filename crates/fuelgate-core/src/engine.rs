//! The engine interface and an in-process engine.
//!
//! An engine executes contract bodies and owns the lifecycle state the
//! scheduler gates on. [`EngineService`] is the seam the scheduler talks to;
//! [`LocalEngine`] runs registered Rust handlers on the tokio runtime.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::context::CallContext;
use crate::contract::{ContractCall, ContractId};
use crate::error::{EngineError, EngineResult};
use crate::fuel::FuelTiers;

/// Lifecycle state of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// Created, not yet started.
    Initializing,
    /// Accepting executions.
    Running,
    /// Temporarily refusing admission.
    Paused,
    /// Shut down for good.
    Stopped,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Initializing => "initializing",
            EngineState::Running => "running",
            EngineState::Paused => "paused",
            EngineState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Outcome of a single engine invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    /// The body finished and produced a value.
    Completed(serde_json::Value),
    /// The body ran past its allowed time and was stopped.
    TimedOut(Duration),
    /// The body terminated abnormally.
    Aborted(String),
}

impl Execution {
    /// Check whether the body finished normally.
    pub fn is_completed(&self) -> bool {
        matches!(self, Execution::Completed(_))
    }
}

/// Executor of contract bodies.
///
/// The engine's [`state`](EngineService::state) is authoritative: the
/// scheduler reads it to gate admission and only ever requests transitions.
#[async_trait]
pub trait EngineService: Send + Sync {
    /// Start the engine: `Initializing -> Running`.
    fn run(&self) -> EngineResult<()>;

    /// Pause admission: `Running -> Paused`.
    fn pause(&self) -> EngineResult<()>;

    /// Resume admission: `Paused -> Running`.
    fn resume(&self) -> EngineResult<()>;

    /// Stop the engine for good.
    fn stop(&self) -> EngineResult<()>;

    /// Current lifecycle state.
    fn state(&self) -> EngineState;

    /// Check whether the engine is running.
    fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    /// Execute a contract.
    ///
    /// Timeouts and abnormal terminations are reported through [`Execution`];
    /// an `Err` is an ordinary engine failure.
    async fn exec_contract(&self, ctx: &CallContext, call: &ContractCall)
    -> EngineResult<Execution>;
}

/// A fault raised by a contract body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ContractFault(pub String);

impl ContractFault {
    /// Create a fault with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The body of a contract, as run by [`LocalEngine`].
#[async_trait]
pub trait ContractHandler: Send + Sync + 'static {
    /// Run the body with the given input.
    async fn invoke(&self, input: serde_json::Value) -> Result<serde_json::Value, ContractFault>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ContractHandler for FnHandler<F>
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value, ContractFault>> + Send + 'static,
{
    async fn invoke(&self, input: serde_json::Value) -> Result<serde_json::Value, ContractFault> {
        (self.0)(input).await
    }
}

/// Wrap an async closure as a contract body.
///
/// # Example
///
/// ```
/// use fuelgate_core::engine::handler_fn;
///
/// let echo = handler_fn(|input| async move { Ok(input) });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn ContractHandler>
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value, ContractFault>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Render a panic payload as text.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// An engine running registered handlers on the current tokio runtime.
///
/// Each execution is spawned on its own task and bounded by the tier table;
/// a body that outlives its tier is aborted.
///
/// # Example
///
/// ```
/// use fuelgate_core::engine::{handler_fn, EngineService, LocalEngine};
///
/// let engine = LocalEngine::with_defaults();
/// engine.register(1, handler_fn(|input| async move { Ok(input) }));
/// engine.run().unwrap();
/// assert!(engine.is_running());
/// ```
pub struct LocalEngine {
    config: EngineConfig,
    state: RwLock<EngineState>,
    contracts: DashMap<ContractId, Arc<dyn ContractHandler>>,
}

impl LocalEngine {
    /// Create an engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        info!(
            tiers = config.tiers.tiers().len(),
            enforce_timeout = config.enforce_timeout,
            "Created local engine"
        );

        Self {
            config,
            state: RwLock::new(EngineState::Initializing),
            contracts: DashMap::new(),
        }
    }

    /// Create an engine with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    /// The tier table bounding executions.
    pub fn tiers(&self) -> &FuelTiers {
        &self.config.tiers
    }

    /// Register the body of a contract, replacing any previous one.
    pub fn register(
        &self,
        id: ContractId,
        handler: Arc<dyn ContractHandler>,
    ) -> Option<Arc<dyn ContractHandler>> {
        debug!(contract_id = id, "Registered contract body");
        self.contracts.insert(id, handler)
    }

    /// Remove the body of a contract.
    pub fn unregister(&self, id: ContractId) -> bool {
        self.contracts.remove(&id).is_some()
    }

    /// Check whether a body is registered for `id`.
    pub fn is_registered(&self, id: ContractId) -> bool {
        self.contracts.contains_key(&id)
    }

    fn transition(&self, to: EngineState, allowed_from: &[EngineState]) -> EngineResult<()> {
        let mut state = self.state.write();
        let from = *state;

        if from == EngineState::Stopped && to != EngineState::Stopped {
            return Err(EngineError::Stopped);
        }
        if !allowed_from.contains(&from) {
            return Err(EngineError::InvalidTransition { from, to });
        }

        *state = to;
        if from != to {
            debug!(%from, %to, "Engine state changed");
        }
        Ok(())
    }
}

#[async_trait]
impl EngineService for LocalEngine {
    fn run(&self) -> EngineResult<()> {
        self.transition(EngineState::Running, &[EngineState::Initializing])
    }

    fn pause(&self) -> EngineResult<()> {
        self.transition(
            EngineState::Paused,
            &[EngineState::Running, EngineState::Paused],
        )
    }

    fn resume(&self) -> EngineResult<()> {
        self.transition(
            EngineState::Running,
            &[EngineState::Paused, EngineState::Running],
        )
    }

    fn stop(&self) -> EngineResult<()> {
        self.transition(
            EngineState::Stopped,
            &[
                EngineState::Initializing,
                EngineState::Running,
                EngineState::Paused,
                EngineState::Stopped,
            ],
        )
    }

    fn state(&self) -> EngineState {
        *self.state.read()
    }

    async fn exec_contract(
        &self,
        ctx: &CallContext,
        call: &ContractCall,
    ) -> EngineResult<Execution> {
        // Work admitted before a pause still runs; only a dead engine refuses it.
        let state = self.state();
        if matches!(state, EngineState::Initializing | EngineState::Stopped) {
            return Err(EngineError::NotRunning(state));
        }

        let id = call.contract_id();
        let handler = self
            .contracts
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(EngineError::ContractNotFound(id))?;

        let limit = call.contract.max_execution_time(&self.config.tiers);
        let enforce_timeout = self.config.enforce_timeout;
        let input = call.input.clone();

        let mut task = tokio::spawn(async move { handler.invoke(input).await });
        let deadline = async move {
            if enforce_timeout {
                tokio::time::sleep(limit).await;
            } else {
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            joined = &mut task => match joined {
                Ok(Ok(value)) => Ok(Execution::Completed(value)),
                Ok(Err(fault)) => {
                    debug!(contract_id = id, %fault, "Contract body faulted");
                    Ok(Execution::Aborted(fault.to_string()))
                }
                Err(err) if err.is_panic() => {
                    let message = panic_message(err.into_panic().as_ref());
                    warn!(contract_id = id, panic = %message, "Contract body panicked");
                    Ok(Execution::Aborted(message))
                }
                Err(_) => Ok(Execution::Aborted("contract task was cancelled".to_string())),
            },
            _ = deadline => {
                task.abort();
                warn!(contract_id = id, limit_ms = limit.as_millis(), "Contract execution timed out");
                Ok(Execution::TimedOut(limit))
            }
            _ = ctx.done() => {
                task.abort();
                debug!(contract_id = id, "Contract execution cancelled by caller");
                Err(EngineError::Cancelled)
            }
        }
    }
}

impl fmt::Debug for LocalEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalEngine")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("contracts", &self.contracts.len())
            .finish()
    }
}
