//! HTTP route handlers.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::agent::{LlmOracle, Manager, Oracle, Worker};
use crate::config::Config;
use crate::llm::{LlmClient, OpenRouterClient};
use crate::tools::{SendEmail, ToolRegistry, VisitPage, WebSearch};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// The top-level agent. One instance serves all requests; every run is
    /// isolated state owned by that call.
    pub manager: Arc<Manager>,
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let manager = Arc::new(build_manager(&config));
    let state = Arc::new(AppState {
        config: config.clone(),
        manager,
    });

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Wire the agents: one LLM-backed oracle shared read-only by the manager
/// and the newsletter worker; the worker owns the web and email tools.
fn build_manager(config: &Config) -> Manager {
    let client: Arc<dyn LlmClient> =
        Arc::new(OpenRouterClient::new(config.openrouter_api_key.clone()));
    let oracle: Arc<dyn Oracle> = Arc::new(LlmOracle::new(client, config.model.clone()));

    let tools = ToolRegistry::with_tools(vec![
        Arc::new(WebSearch),
        Arc::new(VisitPage),
        Arc::new(SendEmail::new(config.smtp.clone())),
    ]);
    let worker = Arc::new(Worker::new(
        "newsletter_agent",
        "An agent that helps to create a newsletter by searching for news, \
         visiting webpages, and sending emails.",
        tools,
        config.worker_max_steps,
        Arc::clone(&oracle),
    ));

    Manager::new(ToolRegistry::new(), vec![worker], oracle)
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/newsletter", post(newsletter))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

type ApiError = (StatusCode, Json<Value>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.into() })),
    )
}

/// GET / - service greeting.
async fn home() -> Json<Value> {
    Json(json!({
        "message": "Welcome to the Newsdesk newsletter service! Please send a POST request with your sources and emails."
    }))
}

/// POST /newsletter - run the orchestration for one directive.
///
/// The body is parsed by hand so every rejection is a 400 with a JSON error
/// payload; the caller never sees a framework rejection or a fault trace.
async fn newsletter(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<Value>, ApiError> {
    let body: Value = serde_json::from_str(&body)
        .map_err(|_| bad_request("Invalid request. Expected JSON with 'sources' array."))?;
    let (sources, emails) = parse_request(&body).map_err(bad_request)?;

    let directive = build_directive(&sources, &emails);
    tracing::info!(
        sources = sources.len(),
        recipients = emails.len(),
        "newsletter requested"
    );

    match state
        .manager
        .execute(&directive, state.config.manager_max_steps)
        .await
    {
        Ok(answer) => Ok(Json(answer)),
        Err(e) => {
            tracing::error!(error = %e, "orchestration did not complete");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            ))
        }
    }
}

/// Validate the request body into source names and recipient addresses.
fn parse_request(body: &Value) -> Result<(Vec<String>, Vec<String>), String> {
    let sources = parse_string_list(body, "sources", "Sources")?;
    let emails = parse_string_list(body, "emails", "Emails")?;
    Ok((sources, emails))
}

fn parse_string_list(body: &Value, key: &str, label: &str) -> Result<Vec<String>, String> {
    let Some(value) = body.get(key) else {
        return Err(format!("Invalid request. Expected JSON with '{key}' array."));
    };
    let Some(items) = value.as_array() else {
        return Err(format!("{label} must be an array of strings."));
    };
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| format!("All {key} must be strings."))
        })
        .collect()
}

/// Template the validated lists into the manager's directive.
fn build_directive(sources: &[String], emails: &[String]) -> String {
    let sources = sources.join(", ");
    let emails = emails.join(", ");
    format!(
        "Use the newsletter_agent to get the most viewed news today from {sources}. \
         Format it into an array of json objects with title, summary and url. \
         Use the newsletter_agent to send the formatted news as a newsletter email \
         with the title 'Today's News' to these email addresses: {emails}. \
         Return the final output from the formatted news. The format should be an \
         array of {{\"title\": string, \"summary\": string, \"url\": string}} objects."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::worker::tests::ScriptedOracle;
    use crate::agent::Action;
    use crate::config::SmtpConfig;

    fn test_config() -> Config {
        Config {
            port: 0,
            openrouter_api_key: "test-key".to_string(),
            model: "test-model".to_string(),
            manager_max_steps: 10,
            worker_max_steps: 5,
            smtp: SmtpConfig {
                server: "smtp.example.com".to_string(),
                port: 587,
                sender: "sender@example.com".to_string(),
                password: "secret".to_string(),
            },
        }
    }

    fn state_with_script(script: Vec<Action>) -> Arc<AppState> {
        let manager = Manager::new(ToolRegistry::new(), vec![], ScriptedOracle::new(script));
        Arc::new(AppState {
            config: test_config(),
            manager: Arc::new(manager),
        })
    }

    #[test]
    fn parse_request_accepts_valid_payloads() {
        let body = json!({
            "sources": ["BBC", "Reuters"],
            "emails": ["a@example.com"]
        });
        let (sources, emails) = parse_request(&body).unwrap();
        assert_eq!(sources, vec!["BBC", "Reuters"]);
        assert_eq!(emails, vec!["a@example.com"]);
    }

    #[test]
    fn parse_request_rejects_bad_payloads() {
        let missing_sources = json!({"emails": []});
        assert_eq!(
            parse_request(&missing_sources).unwrap_err(),
            "Invalid request. Expected JSON with 'sources' array."
        );

        let not_an_array = json!({"sources": "BBC", "emails": []});
        assert_eq!(
            parse_request(&not_an_array).unwrap_err(),
            "Sources must be an array of strings."
        );

        let mixed_types = json!({"sources": ["BBC", 3], "emails": []});
        assert_eq!(
            parse_request(&mixed_types).unwrap_err(),
            "All sources must be strings."
        );

        let missing_emails = json!({"sources": []});
        assert_eq!(
            parse_request(&missing_emails).unwrap_err(),
            "Invalid request. Expected JSON with 'emails' array."
        );

        let bad_emails = json!({"sources": [], "emails": [42]});
        assert_eq!(
            parse_request(&bad_emails).unwrap_err(),
            "All emails must be strings."
        );
    }

    #[test]
    fn directive_mentions_every_source_and_recipient() {
        let directive = build_directive(
            &["BBC".to_string(), "Reuters".to_string()],
            &["a@example.com".to_string(), "b@example.com".to_string()],
        );

        assert!(directive.contains("BBC, Reuters"));
        assert!(directive.contains("a@example.com, b@example.com"));
        assert!(directive.contains("newsletter_agent"));
        assert!(directive.contains("title, summary and url"));
    }

    #[tokio::test]
    async fn newsletter_passes_the_manager_answer_through() {
        let answer = json!([{"title": "T", "summary": "S", "url": "U"}]);
        let state = state_with_script(vec![Action::Terminate {
            answer: answer.clone(),
        }]);

        let Json(result) = newsletter(
            State(state),
            r#"{"sources": ["BBC"], "emails": ["a@example.com"]}"#.to_string(),
        )
        .await
        .unwrap();

        assert_eq!(result, answer);
    }

    #[tokio::test]
    async fn invalid_body_is_a_400_with_a_json_error() {
        let state = state_with_script(vec![]);

        let (status, Json(body)) = newsletter(State(state), "not json".to_string())
            .await
            .unwrap_err();

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn orchestration_failure_is_a_500_with_a_json_error() {
        // Empty script + empty toolset: the manager exhausts its budget.
        let state = state_with_script(vec![]);

        let (status, Json(body)) = newsletter(
            State(state),
            r#"{"sources": ["BBC"], "emails": ["a@example.com"]}"#.to_string(),
        )
        .await
        .unwrap_err();

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("step budget exhausted"));
    }
}
