//! Email dispatch tool.
//!
//! Delivers a message over an authenticated SMTP STARTTLS session and
//! reports the outcome as a boolean, so the agent can react to a failed
//! delivery instead of aborting the run.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::{json, Value};

use crate::config::SmtpConfig;

use super::{Tool, ToolError};

const SUBJECT: &str = "Today's News Letter";

/// Send an email to a recipient. Has external effects; not idempotent.
pub struct SendEmail {
    config: SmtpConfig,
}

impl SendEmail {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Tool for SendEmail {
    fn name(&self) -> &str {
        "send_email"
    }

    fn description(&self) -> &str {
        "Send an email to a specified email address with the given content. Returns true if the email was sent successfully, false otherwise."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "email_address": {
                    "type": "string",
                    "description": "The recipient's email address"
                },
                "content": {
                    "type": "string",
                    "description": "The email content/body"
                }
            },
            "required": ["email_address", "content"]
        })
    }

    fn has_side_effects(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let address = args["email_address"]
            .as_str()
            .ok_or_else(|| ToolError::recoverable("Missing 'email_address' argument"))?;
        let content = args["content"]
            .as_str()
            .ok_or_else(|| ToolError::recoverable("Missing 'content' argument"))?;

        let to: Mailbox = address
            .parse()
            .map_err(|e| ToolError::recoverable(format!("invalid recipient '{address}': {e}")))?;
        // The sender comes from configuration; failing to parse it means the
        // process is misconfigured, not that the agent chose bad arguments.
        let from: Mailbox = self
            .config
            .sender
            .parse()
            .map_err(|e| ToolError::fault(format!("invalid sender address: {e}")))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(content.to_string())
            .map_err(|e| ToolError::recoverable(format!("failed to build message: {e}")))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.server)
            .map_err(|e| ToolError::fault(format!("failed to open SMTP transport: {e}")))?
            .port(self.config.port)
            .credentials(Credentials::new(
                self.config.sender.clone(),
                self.config.password.clone(),
            ))
            .build();

        match transport.send(message).await {
            Ok(_) => {
                tracing::info!(recipient = address, "email delivered");
                Ok("true".to_string())
            }
            Err(e) => {
                tracing::warn!(recipient = address, error = %e, "email delivery failed");
                Ok("false".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> SendEmail {
        SendEmail::new(SmtpConfig {
            server: "smtp.example.com".to_string(),
            port: 587,
            sender: "sender@example.com".to_string(),
            password: "secret".to_string(),
        })
    }

    #[tokio::test]
    async fn missing_arguments_are_recoverable() {
        let err = tool()
            .execute(json!({"content": "hello"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Recoverable(_)));

        let err = tool()
            .execute(json!({"email_address": "a@b.com"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("content"));
    }

    #[tokio::test]
    async fn invalid_recipient_is_recoverable() {
        let err = tool()
            .execute(json!({"email_address": "not an address", "content": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Recoverable(_)));
        assert!(err.to_string().contains("invalid recipient"));
    }

    #[test]
    fn dispatch_is_effectful() {
        assert!(tool().has_side_effects());
    }
}
