use async_trait::async_trait;
use punchcard_core::config::SlackConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;

use crate::blocks::{MessageTemplate, ModalView};

/// Opaque id of one open modal instance. Every update of a dialog must
/// target the id minted when that dialog was opened; holding it in a newtype
/// keeps trigger ids, user ids, and view ids from ever being interchanged.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ViewInstanceId(String);

impl ViewInstanceId {
    /// Only the platform hands out view ids: `views.open` responses and
    /// inbound interaction payloads.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ViewInstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum SlackApiError {
    #[error("slack transport failed during `{method}`: {source}")]
    Transport { method: &'static str, source: reqwest::Error },
    #[error("slack `{method}` returned error `{code}`")]
    Api { method: &'static str, code: String },
    #[error("slack `{method}` response was malformed: {detail}")]
    Malformed { method: &'static str, detail: String },
}

impl SlackApiError {
    /// An update aimed at a view instance the platform no longer knows:
    /// fatal to that one flow, harmless to everything else.
    pub fn is_stale_view(&self) -> bool {
        matches!(
            self,
            Self::Api { code, .. } if code == "not_found" || code == "view_not_found"
        )
    }
}

/// The narrow slice of the Slack Web API this bot consumes.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// Opens a modal against a short-lived trigger token and returns the id
    /// of the created view instance.
    async fn open_view(
        &self,
        trigger_id: &str,
        view: ModalView,
    ) -> Result<ViewInstanceId, SlackApiError>;

    /// Replaces the contents of an open modal in place.
    async fn update_view(
        &self,
        view_id: &ViewInstanceId,
        view: ModalView,
    ) -> Result<(), SlackApiError>;

    /// Posts a rendered message to a channel. One shot, no retry.
    async fn post_message(
        &self,
        channel_id: &str,
        message: MessageTemplate,
    ) -> Result<(), SlackApiError>;

    /// Best-effort identity lookup. A profile without an email is `Ok(None)`.
    async fn user_email(&self, user_id: &str) -> Result<Option<String>, SlackApiError>;

    /// Cheap liveness probe (`auth.test`) for the health endpoint.
    async fn auth_probe(&self) -> Result<(), SlackApiError>;
}

/// `SlackApi` over the real Web API with a process-wide reqwest client.
pub struct HttpSlackApi {
    http: Client,
    base_url: String,
    bot_token: SecretString,
}

impl HttpSlackApi {
    pub fn new(http: Client, config: &SlackConfig) -> Self {
        Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
        }
    }

    async fn call(&self, method: &'static str, body: Value) -> Result<Value, SlackApiError> {
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|source| SlackApiError::Transport { method, source })?;

        let payload: Value = response
            .json()
            .await
            .map_err(|source| SlackApiError::Transport { method, source })?;

        if payload.get("ok").and_then(Value::as_bool) == Some(true) {
            Ok(payload)
        } else {
            let code = payload
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error")
                .to_string();
            Err(SlackApiError::Api { method, code })
        }
    }
}

#[async_trait]
impl SlackApi for HttpSlackApi {
    async fn open_view(
        &self,
        trigger_id: &str,
        view: ModalView,
    ) -> Result<ViewInstanceId, SlackApiError> {
        let payload =
            self.call("views.open", json!({ "trigger_id": trigger_id, "view": view })).await?;

        payload
            .pointer("/view/id")
            .and_then(Value::as_str)
            .map(ViewInstanceId::new)
            .ok_or_else(|| SlackApiError::Malformed {
                method: "views.open",
                detail: "response carries no `view.id`".to_string(),
            })
    }

    async fn update_view(
        &self,
        view_id: &ViewInstanceId,
        view: ModalView,
    ) -> Result<(), SlackApiError> {
        self.call("views.update", json!({ "view_id": view_id.as_str(), "view": view }))
            .await
            .map(|_| ())
    }

    async fn post_message(
        &self,
        channel_id: &str,
        message: MessageTemplate,
    ) -> Result<(), SlackApiError> {
        self.call(
            "chat.postMessage",
            json!({
                "channel": channel_id,
                "text": message.fallback_text,
                "blocks": message.blocks,
            }),
        )
        .await
        .map(|_| ())
    }

    async fn user_email(&self, user_id: &str) -> Result<Option<String>, SlackApiError> {
        let payload = self.call("users.profile.get", json!({ "user": user_id })).await?;

        Ok(payload
            .pointer("/profile/email")
            .and_then(Value::as_str)
            .filter(|email| !email.trim().is_empty())
            .map(str::to_owned))
    }

    async fn auth_probe(&self) -> Result<(), SlackApiError> {
        self.call("auth.test", json!({})).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::{SlackApiError, ViewInstanceId};

    #[test]
    fn stale_view_detection_covers_both_error_codes() {
        let stale =
            SlackApiError::Api { method: "views.update", code: "not_found".to_string() };
        assert!(stale.is_stale_view());

        let stale =
            SlackApiError::Api { method: "views.update", code: "view_not_found".to_string() };
        assert!(stale.is_stale_view());

        let other =
            SlackApiError::Api { method: "views.update", code: "invalid_blocks".to_string() };
        assert!(!other.is_stale_view());
    }

    #[test]
    fn view_instance_ids_compare_by_value() {
        assert_eq!(ViewInstanceId::new("V123"), ViewInstanceId::new("V123"));
        assert_ne!(ViewInstanceId::new("V123"), ViewInstanceId::new("V124"));
        assert_eq!(ViewInstanceId::new("V123").to_string(), "V123");
    }
}
