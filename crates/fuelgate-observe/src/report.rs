//! Execution reports.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(Uuid);

impl ExecutionId {
    /// Create a new random execution ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a single execution request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// The contract completed.
    Completed,
    /// The caller gave up before admission.
    AdmissionTimeout,
    /// The tank could not cover the pre-payment.
    InsufficientFuel,
    /// The contract ran past its allowed time.
    ExecutionTimeout,
    /// The contract terminated abnormally.
    ExecutionFailed,
    /// Any other error.
    Error,
}

impl OutcomeKind {
    /// Check if the outcome is successful.
    pub fn is_success(self) -> bool {
        matches!(self, OutcomeKind::Completed)
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OutcomeKind::Completed => "completed",
            OutcomeKind::AdmissionTimeout => "admission timeout",
            OutcomeKind::InsufficientFuel => "insufficient fuel",
            OutcomeKind::ExecutionTimeout => "execution timeout",
            OutcomeKind::ExecutionFailed => "execution failed",
            OutcomeKind::Error => "error",
        };
        f.write_str(name)
    }
}

/// Record of one execution request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Unique execution ID.
    pub execution_id: ExecutionId,
    /// Contract that was called.
    pub contract_id: i64,
    /// How it ended.
    pub outcome: OutcomeKind,
    /// Time from request to answer.
    pub latency: Duration,
    /// Error message, when it failed.
    pub message: Option<String>,
}

/// Tank levels at the end of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FuelSummary {
    /// Balance left in the tank.
    pub fuel: u64,
    /// Tank capacity.
    pub capacity: u64,
    /// Share of the capacity in use, in percent.
    pub used_percent: f64,
    /// Fuel burned over the run.
    pub total_burned: u64,
    /// Fuel returned over the run.
    pub total_refueled: u64,
}

/// Report of a batch of executions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// Per-request records.
    pub records: Vec<ExecutionRecord>,
    /// Wall-clock duration of the run.
    pub wall_time: Duration,
    /// Tank levels after the run.
    pub fuel: Option<FuelSummary>,
}

impl RunReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record.
    pub fn record(&mut self, record: ExecutionRecord) {
        self.records.push(record);
    }

    /// Number of records with the given outcome.
    pub fn count(&self, outcome: OutcomeKind) -> usize {
        self.records.iter().filter(|r| r.outcome == outcome).count()
    }

    /// Outcome counts, ordered by outcome.
    pub fn counts(&self) -> BTreeMap<OutcomeKind, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.outcome).or_insert(0) += 1;
        }
        counts
    }

    /// Check whether every execution completed.
    pub fn is_success(&self) -> bool {
        self.records.iter().all(|r| r.outcome.is_success())
    }

    /// Mean latency over all records.
    pub fn mean_latency(&self) -> Duration {
        if self.records.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.records.iter().map(|r| r.latency).sum();
        total / self.records.len() as u32
    }

    /// Format as human-readable text.
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Executions: {}\n", self.records.len()));
        output.push_str(&format!("Wall time: {:?}\n", self.wall_time));
        output.push_str(&format!("Mean latency: {:?}\n", self.mean_latency()));

        output.push_str("\nOutcomes:\n");
        for (outcome, count) in self.counts() {
            output.push_str(&format!("  {}: {}\n", outcome, count));
        }

        if let Some(fuel) = &self.fuel {
            output.push_str("\nFuel:\n");
            output.push_str(&format!("  Balance: {} / {}\n", fuel.fuel, fuel.capacity));
            output.push_str(&format!("  Used: {:.1}%\n", fuel.used_percent));
            output.push_str(&format!("  Burned: {}\n", fuel.total_burned));
            output.push_str(&format!("  Refueled: {}\n", fuel.total_refueled));
        }

        output
    }

    /// Format as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Format as pretty JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(outcome: OutcomeKind, latency_ms: u64) -> ExecutionRecord {
        ExecutionRecord {
            execution_id: ExecutionId::new(),
            contract_id: 1,
            outcome,
            latency: Duration::from_millis(latency_ms),
            message: None,
        }
    }

    #[test]
    fn test_execution_id() {
        assert_ne!(ExecutionId::new(), ExecutionId::new());
    }

    #[test]
    fn test_counts() {
        let mut report = RunReport::new();
        report.record(record(OutcomeKind::Completed, 10));
        report.record(record(OutcomeKind::Completed, 30));
        report.record(record(OutcomeKind::InsufficientFuel, 2));

        assert_eq!(report.count(OutcomeKind::Completed), 2);
        assert_eq!(report.counts()[&OutcomeKind::InsufficientFuel], 1);
        assert!(!report.is_success());
        assert_eq!(report.mean_latency(), Duration::from_millis(14));
    }

    #[test]
    fn test_empty_report() {
        let report = RunReport::new();
        assert!(report.is_success());
        assert_eq!(report.mean_latency(), Duration::ZERO);
    }

    #[test]
    fn test_to_text() {
        let mut report = RunReport::new();
        report.record(record(OutcomeKind::ExecutionTimeout, 5));
        report.fuel = Some(FuelSummary {
            fuel: 900,
            capacity: 1_000,
            used_percent: 10.0,
            total_burned: 100,
            total_refueled: 0,
        });

        let text = report.to_text();
        assert!(text.contains("execution timeout: 1"));
        assert!(text.contains("Balance: 900 / 1000"));
    }

    #[test]
    fn test_to_json() {
        let mut report = RunReport::new();
        report.record(record(OutcomeKind::Completed, 1));

        let json = report.to_json();
        assert_eq!(json["records"][0]["outcome"], "completed");
    }
}
