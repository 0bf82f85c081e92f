//! Worker agent: a bounded reasoning loop over a fixed capability set.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::tools::{ToolError, ToolKind, ToolRegistry, ToolSpec};

use super::oracle::Oracle;
use super::{Action, AgentRun, StepOutcome};

/// An agent with a restricted toolset and its own step budget.
///
/// Workers hold only raw capabilities, never other agents, so delegation
/// depth is bounded to one level and step accounting stays per-run.
pub struct Worker {
    name: String,
    description: String,
    tools: ToolRegistry,
    toolset: Vec<ToolSpec>,
    max_steps: u32,
    oracle: Arc<dyn Oracle>,
}

impl Worker {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        tools: ToolRegistry,
        max_steps: u32,
        oracle: Arc<dyn Oracle>,
    ) -> Self {
        let toolset = tools.specs();
        Self {
            name: name.into(),
            description: description.into(),
            tools,
            toolset,
            max_steps,
            oracle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description managers use to decide when to delegate to this worker.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// How a manager advertises this worker to its own oracle: a callable
    /// taking a single sub-goal string.
    pub(crate) fn delegate_spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "task": {
                        "type": "string",
                        "description": "The task to hand to this agent, as a complete standalone instruction"
                    }
                },
                "required": ["task"]
            }),
            kind: ToolKind::Delegate,
        }
    }

    /// Run the bounded loop to a terminal state. Never panics or returns an
    /// error: every outcome, including budget exhaustion and hard faults, is
    /// reported through the run's status.
    pub async fn run(&self, directive: &str) -> AgentRun {
        let mut run = AgentRun::new(&self.name, directive, self.max_steps);
        info!(agent = %self.name, run = %run.id, budget = self.max_steps, "worker run started");

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
                    debug!(agent = %self.name, %capability, "invoking capability");
                    match self.tools.dispatch(&capability, args.clone()).await {
                        Ok(result) => {
                            run.record(
                                Action::Invoke { capability, args },
                                StepOutcome::Observation(result),
                            );
                        }
                        Err(ToolError::Recoverable(reason)) => {
                            warn!(agent = %self.name, %capability, %reason, "capability failed, continuing");
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
                // Workers hold no delegate handles; treat a stray delegate
                // decision like any other unknown capability.
                Action::Delegate { worker, subgoal } => {
                    let reason = format!("unknown capability: {worker}");
                    warn!(agent = %self.name, %reason, "oracle asked a worker to delegate");
                    run.record(
                        Action::Delegate { worker, subgoal },
                        StepOutcome::CapabilityError(reason),
                    );
                }
            }
        }

        info!(
            agent = %self.name,
            run = %run.id,
            status = %run.status,
            steps = run.steps_executed(),
            "worker run finished"
        );
        run
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::agent::{Budget, RunStatus, Step};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;

    /// Oracle that replays a fixed script of decisions.
    pub(crate) struct ScriptedOracle {
        script: Mutex<Vec<Action>>,
    }

    impl ScriptedOracle {
        pub(crate) fn new(script: Vec<Action>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
            })
        }
    }

    #[async_trait]
    impl Oracle for ScriptedOracle {
        async fn decide(
            &self,
            _directive: &str,
            _toolset: &[ToolSpec],
            _history: &[Step],
        ) -> anyhow::Result<Action> {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                // Keep asking for the same no-op capability; used by
                // budget-exhaustion tests.
                return Ok(Action::Invoke {
                    capability: "echo".to_string(),
                    args: json!({"text": "again"}),
                });
            }
            Ok(script.remove(0))
        }
    }

    /// Capability that returns its input.
    pub(crate) struct Echo;

    #[async_trait]
    impl crate::tools::Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, args: Value) -> Result<String, ToolError> {
            Ok(args["text"].as_str().unwrap_or_default().to_string())
        }
    }

    /// Capability that fails recoverably on the first call, succeeds after.
    struct FlakyOnce {
        failed: Mutex<bool>,
    }

    impl FlakyOnce {
        fn new() -> Self {
            Self {
                failed: Mutex::new(false),
            }
        }
    }

    #[async_trait]
    impl crate::tools::Tool for FlakyOnce {
        fn name(&self) -> &str {
            "flaky"
        }

        fn description(&self) -> &str {
            "Fails once, then succeeds"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, _args: Value) -> Result<String, ToolError> {
            let mut failed = self.failed.lock().unwrap();
            if !*failed {
                *failed = true;
                return Err(ToolError::recoverable("upstream hiccup"));
            }
            Ok("recovered".to_string())
        }
    }

    /// Capability that raises a hard fault.
    struct Broken;

    #[async_trait]
    impl crate::tools::Tool for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn description(&self) -> &str {
            "Always faults"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, _args: Value) -> Result<String, ToolError> {
            Err(ToolError::fault("transport wedged"))
        }
    }

    fn invoke(capability: &str) -> Action {
        Action::Invoke {
            capability: capability.to_string(),
            args: json!({}),
        }
    }

    fn worker_with(tools: Vec<Arc<dyn crate::tools::Tool>>, script: Vec<Action>, budget: u32) -> Worker {
        Worker::new(
            "test_worker",
            "A worker under test",
            ToolRegistry::with_tools(tools),
            budget,
            ScriptedOracle::new(script),
        )
    }

    fn assert_budget_invariant(run: &AgentRun) {
        assert_eq!(
            run.budget.remaining(),
            run.budget.initial() - run.steps_executed()
        );
        assert!(run.steps_executed() <= run.budget.initial());
    }

    #[tokio::test]
    async fn immediate_terminate_takes_exactly_one_step() {
        let worker = worker_with(
            vec![],
            vec![Action::Terminate {
                answer: json!("done"),
            }],
            50,
        );

        let run = worker.run("do nothing").await;

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.answer, Some(json!("done")));
        assert_eq!(run.steps_executed(), 1);
        assert_eq!(run.budget.remaining(), 49);
        assert_budget_invariant(&run);
    }

    #[tokio::test]
    async fn never_terminating_oracle_exhausts_exactly_the_budget() {
        let worker = worker_with(vec![Arc::new(Echo)], vec![], 4);

        let run = worker.run("loop forever").await;

        assert_eq!(run.status, RunStatus::Exhausted);
        assert_eq!(run.steps_executed(), 4);
        assert_eq!(run.budget.remaining(), 0);
        assert!(run.answer.is_none());
        assert_budget_invariant(&run);
    }

    #[tokio::test]
    async fn recoverable_failure_is_recorded_and_the_loop_continues() {
        let worker = worker_with(
            vec![Arc::new(FlakyOnce::new())],
            vec![
                invoke("flaky"),
                invoke("flaky"),
                Action::Terminate {
                    answer: json!("ok"),
                },
            ],
            10,
        );

        let run = worker.run("retry through a hiccup").await;

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.steps_executed(), 3);
        assert_eq!(
            run.history[0].outcome,
            StepOutcome::CapabilityError("upstream hiccup".to_string())
        );
        assert_eq!(
            run.history[1].outcome,
            StepOutcome::Observation("recovered".to_string())
        );
        assert_budget_invariant(&run);
    }

    #[tokio::test]
    async fn hard_fault_fails_the_run() {
        let worker = worker_with(
            vec![Arc::new(Broken)],
            vec![
                invoke("broken"),
                Action::Terminate {
                    answer: json!("unreachable"),
                },
            ],
            10,
        );

        let run = worker.run("touch the broken tool").await;

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.failure.as_deref(), Some("transport wedged"));
        assert_eq!(run.steps_executed(), 1);
        assert!(run.answer.is_none());
        assert_budget_invariant(&run);
    }

    #[tokio::test]
    async fn unknown_capability_is_recoverable() {
        let worker = worker_with(
            vec![],
            vec![
                invoke("does_not_exist"),
                Action::Terminate {
                    answer: json!("ok"),
                },
            ],
            10,
        );

        let run = worker.run("call something missing").await;

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(
            run.history[0].outcome,
            StepOutcome::CapabilityError("unknown capability: does_not_exist".to_string())
        );
    }

    #[tokio::test]
    async fn stray_delegate_decision_is_recoverable() {
        let worker = worker_with(
            vec![],
            vec![
                Action::Delegate {
                    worker: "other_agent".to_string(),
                    subgoal: "nope".to_string(),
                },
                Action::Terminate {
                    answer: json!("ok"),
                },
            ],
            10,
        );

        let run = worker.run("try to delegate").await;

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(
            run.history[0].outcome,
            StepOutcome::CapabilityError("unknown capability: other_agent".to_string())
        );
    }

    #[tokio::test]
    async fn identical_scripts_produce_identical_runs() {
        let script = || {
            vec![
                invoke("echo"),
                Action::Terminate {
                    answer: json!({"result": "same"}),
                },
            ]
        };

        let first = worker_with(vec![Arc::new(Echo)], script(), 10).run("go").await;
        let second = worker_with(vec![Arc::new(Echo)], script(), 10).run("go").await;

        assert_eq!(first.history, second.history);
        assert_eq!(first.answer, second.answer);
        assert_eq!(first.status, second.status);
    }

    #[test]
    fn delegate_spec_requires_a_task_string() {
        let worker = worker_with(vec![], vec![], 1);
        let spec = worker.delegate_spec();

        assert_eq!(spec.name, "test_worker");
        assert_eq!(spec.kind, ToolKind::Delegate);
        assert_eq!(spec.parameters["required"][0], "task");
        assert_eq!(spec.parameters["properties"]["task"]["type"], "string");
    }

    #[test]
    fn zero_budget_exhausts_without_consulting_the_oracle() {
        let worker = worker_with(vec![], vec![], 0);
        let run = tokio_test::block_on(worker.run("no budget"));

        assert_eq!(run.status, RunStatus::Exhausted);
        assert_eq!(run.steps_executed(), 0);
        assert_eq!(run.budget, Budget::new(0));
    }
}
