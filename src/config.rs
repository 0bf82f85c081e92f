//! Service configuration.
//!
//! One explicit configuration record, built from the environment once at
//! process start and passed by reference into the agents, tools, and HTTP
//! layer. No module-level state.

use anyhow::Context;

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds on (`NEWSDESK_PORT`, default 3000).
    pub port: u16,
    /// OpenRouter API key (`OPENROUTER_API_KEY`, required).
    pub openrouter_api_key: String,
    /// Model id used by the reasoning oracle (`NEWSDESK_MODEL`).
    pub model: String,
    /// Step budget for the manager agent (`MANAGER_MAX_STEPS`, default 10).
    pub manager_max_steps: u32,
    /// Step budget for the newsletter worker (`WORKER_MAX_STEPS`, default 5).
    pub worker_max_steps: u32,
    /// Outbound mail settings.
    pub smtp: SmtpConfig,
}

/// SMTP settings for the email dispatch tool.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// Relay hostname (`SMTP_SERVER`, default smtp.gmail.com).
    pub server: String,
    /// STARTTLS port (`SMTP_PORT`, default 587).
    pub port: u16,
    /// Sender address, also the login user (`SENDER_EMAIL`, required).
    pub sender: String,
    /// Login password (`SENDER_PASSWORD`, required).
    pub password: String,
}

impl Config {
    /// Build the configuration from environment variables.
    ///
    /// Fails fast on missing credentials so a misconfigured process never
    /// reaches the serving loop.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            port: parse_env("NEWSDESK_PORT", 3000)?,
            openrouter_api_key: required("OPENROUTER_API_KEY")?,
            model: std::env::var("NEWSDESK_MODEL")
                .unwrap_or_else(|_| "openai/gpt-4.1-mini".to_string()),
            manager_max_steps: parse_env("MANAGER_MAX_STEPS", 10)?,
            worker_max_steps: parse_env("WORKER_MAX_STEPS", 5)?,
            smtp: SmtpConfig {
                server: std::env::var("SMTP_SERVER")
                    .unwrap_or_else(|_| "smtp.gmail.com".to_string()),
                port: parse_env("SMTP_PORT", 587)?,
                sender: required("SENDER_EMAIL")?,
                password: required("SENDER_PASSWORD")?,
            },
        })
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    std::env::var(name).with_context(|| format!("{name} is not set"))
}

fn parse_env<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{name} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}
