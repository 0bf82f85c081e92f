//! The orchestration core.
//!
//! Two agent kinds run the same bounded reasoning loop: a [`Worker`] over a
//! fixed set of raw capabilities, and a [`Manager`] whose toolset also
//! includes workers exposed as delegatable meta-capabilities. Both consult a
//! reasoning [`Oracle`](oracle::Oracle) at each step and spend exactly one
//! unit of their own step budget per step; a delegation costs the manager
//! one step no matter how many steps the worker consumes.
//!
//! Budgets are strictly per-run and never pooled. History is append-only
//! and scoped to one run; a worker's run never outlives the delegation call
//! that spawned it.

pub mod manager;
pub mod oracle;
pub mod worker;

pub use manager::Manager;
pub use oracle::{LlmOracle, Oracle};
pub use worker::Worker;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// One decision produced by the reasoning oracle.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Invoke a raw capability with JSON arguments.
    Invoke { capability: String, args: Value },
    /// Hand a sub-goal to a worker agent and wait for its terminal outcome.
    Delegate { worker: String, subgoal: String },
    /// Stop the run and return the final answer.
    Terminate { answer: Value },
}

/// What one executed step produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The capability returned a result.
    Observation(String),
    /// The capability failed recoverably; the loop continued.
    CapabilityError(String),
    /// A delegated worker run reached a terminal state.
    Delegation(DelegationOutcome),
    /// The agent terminated with its final answer.
    Final(Value),
}

impl StepOutcome {
    /// Render the outcome as text the oracle can observe on the next step.
    pub fn render(&self) -> String {
        match self {
            StepOutcome::Observation(text) => text.clone(),
            StepOutcome::CapabilityError(reason) => format!("Error: {reason}"),
            StepOutcome::Delegation(DelegationOutcome::Completed { answer }) => {
                render_answer(answer)
            }
            StepOutcome::Delegation(DelegationOutcome::Failed { reason }) => {
                format!("Delegation failed: {reason}")
            }
            StepOutcome::Final(answer) => render_answer(answer),
        }
    }
}

/// Terminal outcome of one delegation call, as seen by the manager.
#[derive(Debug, Clone, PartialEq)]
pub enum DelegationOutcome {
    /// The worker completed and returned its final answer.
    Completed { answer: Value },
    /// The worker exhausted its budget or failed; described, never re-thrown.
    Failed { reason: String },
}

/// Render a final answer as plain text (strings unquoted, other JSON as-is).
fn render_answer(answer: &Value) -> String {
    match answer {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One iteration of an agent's loop. Append-only, scoped to one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// 1-based position in the run.
    pub index: u32,
    pub action: Action,
    pub outcome: StepOutcome,
}

/// A step counter owned exclusively by one agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    initial: u32,
    remaining: u32,
}

impl Budget {
    pub fn new(max_steps: u32) -> Self {
        Self {
            initial: max_steps,
            remaining: max_steps,
        }
    }

    /// Debit one step. Saturates at zero.
    pub fn spend(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    pub fn initial(&self) -> u32 {
        self.initial
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Steps executed so far.
    pub fn spent(&self) -> u32 {
        self.initial - self.remaining
    }
}

/// Lifecycle of an agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    /// The oracle terminated with a final answer.
    Completed,
    /// The step budget ran out before an answer. Expected, not a fault.
    Exhausted,
    /// A hard fault ended the run.
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Exhausted => write!(f, "exhausted"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// State of one agent run: history, budget accounting, terminal outcome.
///
/// Created when an agent starts processing a directive and returned to the
/// caller once terminal; nothing in it is shared across runs.
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub id: Uuid,
    pub agent: String,
    pub directive: String,
    pub status: RunStatus,
    pub budget: Budget,
    pub history: Vec<Step>,
    /// Final answer, present once `status` is `Completed`.
    pub answer: Option<Value>,
    /// Failure description, present once `status` is `Failed`.
    pub failure: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl AgentRun {
    pub fn new(agent: &str, directive: &str, max_steps: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent: agent.to_string(),
            directive: directive.to_string(),
            status: RunStatus::Running,
            budget: Budget::new(max_steps),
            history: Vec::new(),
            answer: None,
            failure: None,
            started_at: Utc::now(),
        }
    }

    /// Append a step to the history.
    pub(crate) fn record(&mut self, action: Action, outcome: StepOutcome) {
        let index = self.history.len() as u32 + 1;
        self.history.push(Step {
            index,
            action,
            outcome,
        });
    }

    pub(crate) fn complete(&mut self, answer: Value) {
        self.status = RunStatus::Completed;
        self.answer = Some(answer);
    }

    pub(crate) fn exhaust(&mut self) {
        self.status = RunStatus::Exhausted;
    }

    pub(crate) fn fail(&mut self, reason: String) {
        self.status = RunStatus::Failed;
        self.failure = Some(reason);
    }

    pub fn steps_executed(&self) -> u32 {
        self.history.len() as u32
    }
}

/// Error surfaced to the external caller when a manager run does not
/// complete. Always structured; a raw fault trace never escapes the core.
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    /// The manager ran out of steps before producing an answer.
    #[error("step budget exhausted after {steps} steps")]
    BudgetExhausted { steps: u32 },
    /// The manager run failed hard.
    #[error("{reason}")]
    Failed { reason: String },
}
