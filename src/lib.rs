//! # Newsdesk
//!
//! An autonomous newsletter agent service.
//!
//! Newsdesk exposes an HTTP API that accepts a list of news sources and a
//! list of recipient addresses, templates them into a natural-language
//! directive, and hands the directive to a bounded multi-agent
//! orchestration core:
//!
//! ```text
//!        ┌──────────────────────────────────┐
//!        │          Manager agent           │
//!        │  (delegates sub-goals, budgeted) │
//!        └────────────────┬─────────────────┘
//!                         │ sub-goal in, final answer out
//!                         ▼
//!        ┌──────────────────────────────────┐
//!        │        Newsletter worker         │
//!        │  web_search · visit_page ·       │
//!        │  send_email (own step budget)    │
//!        └──────────────────────────────────┘
//! ```
//!
//! Each agent runs a sequential reasoning loop: consult the oracle, execute
//! the chosen action, record the step, spend one unit of budget. A run ends
//! `Completed`, `Exhausted` (budget spent before an answer), or `Failed`.
//!
//! ## Modules
//! - `agent`: the orchestration core (manager, worker, oracle seam, budgets)
//! - `tools`: capability contracts and the web/email implementations
//! - `llm`: chat completion client used by the LLM-backed oracle
//! - `api`: HTTP surface (request validation, directive templating)

pub mod agent;
pub mod api;
pub mod config;
pub mod llm;
pub mod tools;

pub use config::Config;
