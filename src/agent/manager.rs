//! Manager agent: the reasoning loop that owns the overall run.
//!
//! The manager's toolset is the union of raw capabilities and delegate
//! handles to workers. A delegation looks like any other capability call to
//! the manager's oracle, but executing it spawns a fresh worker run, waits
//! for its terminal state, and folds the outcome back into the manager's
//! own history as that step's result.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::tools::{ToolError, ToolRegistry, ToolSpec};

use super::oracle::Oracle;
use super::worker::Worker;
use super::{Action, AgentRun, DelegationOutcome, OrchestrationError, RunStatus, StepOutcome};

const AGENT_NAME: &str = "manager";

/// The top-level agent. Shared immutably across requests; each `run` call
/// owns its own state, so concurrent directives stay fully isolated.
pub struct Manager {
    tools: ToolRegistry,
    workers: Vec<Arc<Worker>>,
    toolset: Vec<ToolSpec>,
    oracle: Arc<dyn Oracle>,
}

impl Manager {
    pub fn new(tools: ToolRegistry, workers: Vec<Arc<Worker>>, oracle: Arc<dyn Oracle>) -> Self {
        let mut toolset = tools.specs();
        toolset.extend(workers.iter().map(|w| w.delegate_spec()));
        Self {
            tools,
            workers,
            toolset,
            oracle,
        }
    }

    fn worker(&self, name: &str) -> Option<&Arc<Worker>> {
        self.workers.iter().find(|w| w.name() == name)
    }

    /// Run the orchestration and map the terminal state to the caller's
    /// contract: the final answer on completion, a structured error
    /// otherwise.
    pub async fn execute(
        &self,
        directive: &str,
        max_steps: u32,
    ) -> Result<Value, OrchestrationError> {
        let run = self.run(directive, max_steps).await;
        match run.status {
            RunStatus::Completed => Ok(run.answer.unwrap_or(Value::Null)),
            RunStatus::Exhausted => Err(OrchestrationError::BudgetExhausted {
                steps: run.steps_executed(),
            }),
            _ => Err(OrchestrationError::Failed {
                reason: run
                    .failure
                    .unwrap_or_else(|| "run ended without an answer".to_string()),
            }),
        }
    }

    /// Run the bounded loop to a terminal state, returning the full run
    /// with its history and budget accounting.
    pub async fn run(&self, directive: &str, max_steps: u32) -> AgentRun {
        let mut run = AgentRun::new(AGENT_NAME, directive, max_steps);
        info!(run = %run.id, budget = max_steps, "manager run started");

        loop {
            if run.budget.is_exhausted() {
                run.exhaust();
                break;
            }

            let action = match self
                .oracle
                .decide(directive, &self.toolset, &run.history)
                .await
            {
                Ok(action) => action,
                Err(e) => {
                    run.fail(format!("oracle failure: {e}"));
                    break;
                }
            };
            run.budget.spend();

            match action {
                Action::Terminate { answer } => {
                    run.record(
                        Action::Terminate {
                            answer: answer.clone(),
                        },
                        StepOutcome::Final(answer.clone()),
                    );
                    run.complete(answer);
                    break;
                }
                Action::Invoke { capability, args } => {
                    debug!(%capability, "invoking capability");
                    match self.tools.dispatch(&capability, args.clone()).await {
                        Ok(result) => {
                            run.record(
                                Action::Invoke { capability, args },
                                StepOutcome::Observation(result),
                            );
                        }
                        Err(ToolError::Recoverable(reason)) => {
                            warn!(%capability, %reason, "capability failed, continuing");
                            run.record(
                                Action::Invoke { capability, args },
                                StepOutcome::CapabilityError(reason),
                            );
                        }
                        Err(ToolError::Fault(reason)) => {
                            run.record(
                                Action::Invoke { capability, args },
                                StepOutcome::CapabilityError(reason.clone()),
                            );
                            run.fail(reason);
                            break;
                        }
                    }
                }
                Action::Delegate { worker, subgoal } => {
                    let outcome = match self.worker(&worker) {
                        Some(w) => {
                            info!(worker = %worker, "delegating sub-goal");
                            let report = w.run(&subgoal).await;
                            StepOutcome::Delegation(Self::fold(&worker, report))
                        }
                        None => StepOutcome::CapabilityError(format!("unknown worker: {worker}")),
                    };
                    run.record(Action::Delegate { worker, subgoal }, outcome);
                }
            }
        }

        info!(
            run = %run.id,
            status = %run.status,
            steps = run.steps_executed(),
            "manager run finished"
        );
        run
    }

    /// Fold a worker's terminal state into one delegation outcome. Worker
    /// failures are described, never re-thrown.
    fn fold(worker: &str, report: AgentRun) -> DelegationOutcome {
        match report.status {
            RunStatus::Completed => DelegationOutcome::Completed {
                answer: report.answer.unwrap_or(Value::Null),
            },
            RunStatus::Exhausted => DelegationOutcome::Failed {
                reason: format!(
                    "worker '{worker}' exhausted its step budget after {} steps without an answer",
                    report.steps_executed()
                ),
            },
            RunStatus::Failed => DelegationOutcome::Failed {
                reason: format!(
                    "worker '{worker}' failed: {}",
                    report
                        .failure
                        .unwrap_or_else(|| "no failure reason recorded".to_string())
                ),
            },
            RunStatus::Running => DelegationOutcome::Failed {
                reason: format!("worker '{worker}' did not reach a terminal state"),
            },
        }
    }
}
