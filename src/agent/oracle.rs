//! The reasoning oracle seam.
//!
//! Agents never talk to a language model directly: they hand the oracle
//! their directive, toolset, and history, and get back one [`Action`].
//! [`LlmOracle`] is the production implementation over [`LlmClient`];
//! scripted oracles substitute for it in tests.

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::llm::{ChatMessage, ChatResponse, LlmClient, Role, ToolDefinition};
use crate::tools::{ToolKind, ToolSpec};

use super::{Action, Step};

/// Decision function consumed by the agent loops.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Decide the next action for an agent, given its directive, the
    /// toolset it may use, and the steps executed so far.
    async fn decide(
        &self,
        directive: &str,
        toolset: &[ToolSpec],
        history: &[Step],
    ) -> anyhow::Result<Action>;
}

const SYSTEM_PROMPT: &str = "You are an autonomous agent working toward the goal \
in the user message. At each turn either call exactly one of the available tools, \
or, when the goal is fulfilled, reply with the final answer and no tool call. \
When the goal asks for a specific output format, your final reply must contain \
exactly that output and nothing else.";

/// LLM-backed oracle: renders the run as a chat transcript, advertises the
/// toolset as tool definitions, and maps the model response to an action.
pub struct LlmOracle {
    client: Arc<dyn LlmClient>,
    model: String,
}

impl LlmOracle {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    fn definitions(toolset: &[ToolSpec]) -> Vec<ToolDefinition> {
        toolset
            .iter()
            .map(|spec| ToolDefinition {
                tool_type: "function".to_string(),
                function: crate::llm::FunctionDefinition {
                    name: spec.name.clone(),
                    description: spec.description.clone(),
                    parameters: spec.parameters.clone(),
                },
            })
            .collect()
    }

    /// Replay the run as a chat transcript: one assistant tool-call message
    /// and one tool-result message per executed step.
    fn transcript(directive: &str, history: &[Step]) -> Vec<ChatMessage> {
        let mut messages = vec![
            ChatMessage::new(Role::System, SYSTEM_PROMPT),
            ChatMessage::new(Role::User, directive),
        ];

        for step in history {
            let call_id = format!("call_{}", step.index);
            let (name, args) = match &step.action {
                Action::Invoke { capability, args } => (capability.clone(), args.to_string()),
                Action::Delegate { worker, subgoal } => {
                    (worker.clone(), json!({ "task": subgoal }).to_string())
                }
                // A terminate step ends the run; it never precedes another
                // oracle consultation.
                Action::Terminate { .. } => continue,
            };
            messages.push(ChatMessage::tool_call(&call_id, name, args));
            messages.push(ChatMessage::tool_result(step.outcome.render(), &call_id));
        }

        messages
    }

    /// Map the model response to a tagged action, using the toolset to tell
    /// delegate calls apart from capability calls.
    fn parse_action(response: ChatResponse, toolset: &[ToolSpec]) -> anyhow::Result<Action> {
        if let Some(mut calls) = response.tool_calls {
            if !calls.is_empty() {
                if calls.len() > 1 {
                    tracing::warn!(
                        "model returned {} tool calls, only the first is executed",
                        calls.len()
                    );
                }
                let call = calls.remove(0);
                let name = call.function.name;
                let args: Value = if call.function.arguments.trim().is_empty() {
                    json!({})
                } else {
                    serde_json::from_str(&call.function.arguments)
                        .with_context(|| format!("malformed arguments for '{name}'"))?
                };

                let kind = toolset.iter().find(|s| s.name == name).map(|s| s.kind);
                return match kind {
                    Some(ToolKind::Delegate) => {
                        let subgoal = args
                            .get("task")
                            .and_then(Value::as_str)
                            .with_context(|| {
                                format!("delegate call to '{name}' is missing the 'task' argument")
                            })?
                            .to_string();
                        Ok(Action::Delegate {
                            worker: name,
                            subgoal,
                        })
                    }
                    // Unknown names dispatch as capability calls; the
                    // registry reports them as recoverable errors.
                    _ => Ok(Action::Invoke {
                        capability: name,
                        args,
                    }),
                };
            }
        }

        let content = response.content.unwrap_or_default();
        let trimmed = content.trim();
        if trimmed.is_empty() {
            anyhow::bail!("model returned neither a tool call nor content");
        }
        Ok(Action::Terminate {
            answer: parse_answer(trimmed),
        })
    }
}

#[async_trait]
impl Oracle for LlmOracle {
    async fn decide(
        &self,
        directive: &str,
        toolset: &[ToolSpec],
        history: &[Step],
    ) -> anyhow::Result<Action> {
        let definitions = Self::definitions(toolset);
        let messages = Self::transcript(directive, history);
        let tools = (!definitions.is_empty()).then_some(definitions.as_slice());

        let response = self
            .client
            .chat_completion(&self.model, &messages, tools)
            .await?;

        Self::parse_action(response, toolset)
    }
}

/// Interpret final-answer content: JSON when it parses as JSON (with or
/// without a code fence), plain string otherwise. Best-effort only; the
/// core never enforces an output shape.
fn parse_answer(content: &str) -> Value {
    let body = strip_code_fence(content);
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(content.to_string()))
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the optional language tag on the opening fence.
    match rest.split_once('\n') {
        Some((_tag, body)) => body.trim(),
        None => rest.trim(),
    }
}
