use std::sync::Arc;
use std::time::Duration;

use punchcard_core::config::{AppConfig, ConfigError, LoadOptions};
use punchcard_slack::api::{HttpSlackApi, SlackApi};
use punchcard_slack::events::report_router;
use punchcard_slack::transport::{InteractionRunner, NoopEventTransport, ReconnectPolicy};
use punchcard_tracker::HttpTrackerClient;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub slack_api: Arc<dyn SlackApi>,
    pub runner: InteractionRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let slack_http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.interaction.deadline_secs.max(5)))
        .build()
        .map_err(BootstrapError::HttpClient)?;
    let tracker_http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.tracker.timeout_secs))
        .build()
        .map_err(BootstrapError::HttpClient)?;

    let slack_api: Arc<dyn SlackApi> = Arc::new(HttpSlackApi::new(slack_http, &config.slack));
    let work_items = Arc::new(HttpTrackerClient::new(tracker_http, &config.tracker));

    let router = report_router(slack_api.clone(), work_items, &config.report.channel_id);
    info!(
        event_name = "system.bootstrap.router_wired",
        correlation_id = "bootstrap",
        handler_count = router.handler_count(),
        report_channel = %config.report.channel_id,
        "interaction router wired for both report flows"
    );

    // The concrete delivery mechanism (socket mode / events receiver) is an
    // external adapter; out of the box the runner idles on a noop transport.
    let runner = InteractionRunner::new(
        Arc::new(NoopEventTransport),
        router,
        ReconnectPolicy::default(),
        Duration::from_secs(config.interaction.deadline_secs),
    );

    Ok(Application { config, slack_api, runner })
}

#[cfg(test)]
mod tests {
    use punchcard_core::config::{ConfigOverrides, LoadOptions};

    use super::bootstrap;

    fn valid_overrides() -> ConfigOverrides {
        ConfigOverrides {
            slack_bot_token: Some("xoxb-test".to_string()),
            slack_signing_secret: Some("sekrit".to_string()),
            tracker_api_key: Some("lin_api_test".to_string()),
            report_channel_id: Some("C0TEST".to_string()),
            ..ConfigOverrides::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_a_bot_token() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                slack_bot_token: Some("invalid-token".to_string()),
                ..valid_overrides()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("invalid token must fail bootstrap").to_string();
        assert!(message.contains("slack.bot_token"));
    }

    #[tokio::test]
    async fn bootstrap_wires_both_flows() {
        let app = bootstrap(LoadOptions {
            overrides: valid_overrides(),
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap should succeed with valid overrides");

        assert_eq!(app.config.report.channel_id, "C0TEST");
    }
}
