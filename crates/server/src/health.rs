use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use punchcard_slack::api::SlackApi;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    slack_api: Arc<dyn SlackApi>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub chat_api: HealthCheck,
    pub checked_at: String,
}

pub fn router(slack_api: Arc<dyn SlackApi>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { slack_api })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    slack_api: Arc<dyn SlackApi>,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(slack_api)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let chat_api = chat_api_check(state.slack_api.as_ref()).await;
    let ready = chat_api.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "punchcard-server runtime initialized".to_string(),
        },
        chat_api,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn chat_api_check(slack_api: &dyn SlackApi) -> HealthCheck {
    match slack_api.auth_probe().await {
        Ok(()) => HealthCheck { status: "ready", detail: "slack auth probe succeeded".to_string() },
        Err(error) => HealthCheck {
            status: "degraded",
            detail: format!("slack auth probe failed: {error}"),
        },
    }
}
