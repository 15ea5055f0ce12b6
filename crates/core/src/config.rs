use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub tracker: TrackerConfig,
    pub report: ReportConfig,
    pub interaction: InteractionConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub bot_token: SecretString,
    pub signing_secret: SecretString,
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct TrackerConfig {
    pub api_key: SecretString,
    pub endpoint: String,
    pub page_size: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ReportConfig {
    /// Channel every published report lands in. Not user-selectable.
    pub channel_id: String,
}

#[derive(Clone, Debug)]
pub struct InteractionConfig {
    /// Budget for one inbound event end to end. Slack trigger tokens expire
    /// after a few seconds, so work past this point is wasted anyway.
    pub deadline_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub slack_bot_token: Option<String>,
    pub slack_signing_secret: Option<String>,
    pub tracker_api_key: Option<String>,
    pub tracker_endpoint: Option<String>,
    pub report_channel_id: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slack: SlackConfig {
                bot_token: String::new().into(),
                signing_secret: String::new().into(),
                api_base_url: "https://slack.com/api".to_string(),
            },
            tracker: TrackerConfig {
                api_key: String::new().into(),
                endpoint: "https://api.linear.app/graphql".to_string(),
                page_size: 50,
                timeout_secs: 10,
            },
            report: ReportConfig { channel_id: String::new() },
            interaction: InteractionConfig { deadline_secs: 3 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("punchcard.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(slack) = patch.slack {
            if let Some(bot_token_value) = slack.bot_token {
                self.slack.bot_token = secret_value(bot_token_value);
            }
            if let Some(signing_secret_value) = slack.signing_secret {
                self.slack.signing_secret = secret_value(signing_secret_value);
            }
            if let Some(api_base_url) = slack.api_base_url {
                self.slack.api_base_url = api_base_url;
            }
        }

        if let Some(tracker) = patch.tracker {
            if let Some(api_key_value) = tracker.api_key {
                self.tracker.api_key = secret_value(api_key_value);
            }
            if let Some(endpoint) = tracker.endpoint {
                self.tracker.endpoint = endpoint;
            }
            if let Some(page_size) = tracker.page_size {
                self.tracker.page_size = page_size;
            }
            if let Some(timeout_secs) = tracker.timeout_secs {
                self.tracker.timeout_secs = timeout_secs;
            }
        }

        if let Some(report) = patch.report {
            if let Some(channel_id) = report.channel_id {
                self.report.channel_id = channel_id;
            }
        }

        if let Some(interaction) = patch.interaction {
            if let Some(deadline_secs) = interaction.deadline_secs {
                self.interaction.deadline_secs = deadline_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PUNCHCARD_SLACK_BOT_TOKEN") {
            self.slack.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("PUNCHCARD_SLACK_SIGNING_SECRET") {
            self.slack.signing_secret = secret_value(value);
        }
        if let Some(value) = read_env("PUNCHCARD_SLACK_API_BASE_URL") {
            self.slack.api_base_url = value;
        }

        if let Some(value) = read_env("PUNCHCARD_TRACKER_API_KEY") {
            self.tracker.api_key = secret_value(value);
        }
        if let Some(value) = read_env("PUNCHCARD_TRACKER_ENDPOINT") {
            self.tracker.endpoint = value;
        }
        if let Some(value) = read_env("PUNCHCARD_TRACKER_PAGE_SIZE") {
            self.tracker.page_size = parse_u32("PUNCHCARD_TRACKER_PAGE_SIZE", &value)?;
        }
        if let Some(value) = read_env("PUNCHCARD_TRACKER_TIMEOUT_SECS") {
            self.tracker.timeout_secs = parse_u64("PUNCHCARD_TRACKER_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PUNCHCARD_REPORT_CHANNEL_ID") {
            self.report.channel_id = value;
        }

        if let Some(value) = read_env("PUNCHCARD_INTERACTION_DEADLINE_SECS") {
            self.interaction.deadline_secs =
                parse_u64("PUNCHCARD_INTERACTION_DEADLINE_SECS", &value)?;
        }

        if let Some(value) = read_env("PUNCHCARD_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PUNCHCARD_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("PUNCHCARD_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        if let Some(value) = read_env("PUNCHCARD_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("PUNCHCARD_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(bot_token);
        }
        if let Some(signing_secret) = overrides.slack_signing_secret {
            self.slack.signing_secret = secret_value(signing_secret);
        }
        if let Some(api_key) = overrides.tracker_api_key {
            self.tracker.api_key = secret_value(api_key);
        }
        if let Some(endpoint) = overrides.tracker_endpoint {
            self.tracker.endpoint = endpoint;
        }
        if let Some(channel_id) = overrides.report_channel_id {
            self.report.channel_id = channel_id;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_slack(&self.slack)?;
        validate_tracker(&self.tracker)?;
        validate_report(&self.report)?;
        validate_interaction(&self.interaction)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("punchcard.toml"), PathBuf::from("config/punchcard.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions > Bot User OAuth Token".to_string()
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used the app-level token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    if slack.signing_secret.expose_secret().is_empty() {
        return Err(ConfigError::Validation(
            "slack.signing_secret is required. Get it from https://api.slack.com/apps > Your App > Basic Information > Signing Secret".to_string()
        ));
    }

    if !slack.api_base_url.starts_with("http://") && !slack.api_base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "slack.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_tracker(tracker: &TrackerConfig) -> Result<(), ConfigError> {
    if tracker.api_key.expose_secret().is_empty() {
        return Err(ConfigError::Validation(
            "tracker.api_key is required for work-item lookups".to_string(),
        ));
    }

    if !tracker.endpoint.starts_with("http://") && !tracker.endpoint.starts_with("https://") {
        return Err(ConfigError::Validation(
            "tracker.endpoint must start with http:// or https://".to_string(),
        ));
    }

    if tracker.page_size == 0 || tracker.page_size > 250 {
        return Err(ConfigError::Validation(
            "tracker.page_size must be in range 1..=250".to_string(),
        ));
    }

    if tracker.timeout_secs == 0 || tracker.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "tracker.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_report(report: &ReportConfig) -> Result<(), ConfigError> {
    if report.channel_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "report.channel_id is required (channel id like `C0123456789` or `#channel-name`)"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_interaction(interaction: &InteractionConfig) -> Result<(), ConfigError> {
    if interaction.deadline_secs == 0 || interaction.deadline_secs > 30 {
        return Err(ConfigError::Validation(
            "interaction.deadline_secs must be in range 1..=30 (Slack trigger tokens expire within seconds)".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    slack: Option<SlackPatch>,
    tracker: Option<TrackerPatch>,
    report: Option<ReportPatch>,
    interaction: Option<InteractionPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    bot_token: Option<String>,
    signing_secret: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TrackerPatch {
    api_key: Option<String>,
    endpoint: Option<String>,
    page_size: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ReportPatch {
    channel_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct InteractionPatch {
    deadline_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn set_required_vars() {
        env::set_var("PUNCHCARD_SLACK_BOT_TOKEN", "xoxb-test");
        env::set_var("PUNCHCARD_SLACK_SIGNING_SECRET", "sekrit");
        env::set_var("PUNCHCARD_TRACKER_API_KEY", "lin_api_test");
        env::set_var("PUNCHCARD_REPORT_CHANNEL_ID", "C0TEST");
    }

    const REQUIRED_VARS: &[&str] = &[
        "PUNCHCARD_SLACK_BOT_TOKEN",
        "PUNCHCARD_SLACK_SIGNING_SECRET",
        "PUNCHCARD_TRACKER_API_KEY",
        "PUNCHCARD_REPORT_CHANNEL_ID",
    ];

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_PUNCHCARD_BOT_TOKEN", "xoxb-from-env");
        set_required_vars();
        env::remove_var("PUNCHCARD_SLACK_BOT_TOKEN");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("punchcard.toml");
            fs::write(
                &path,
                r#"
[slack]
bot_token = "${TEST_PUNCHCARD_BOT_TOKEN}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.slack.bot_token.expose_secret() == "xoxb-from-env",
                "bot token should be interpolated from the environment",
            )
        })();

        clear_vars(REQUIRED_VARS);
        clear_vars(&["TEST_PUNCHCARD_BOT_TOKEN"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("PUNCHCARD_REPORT_CHANNEL_ID", "C0FROMENV");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("punchcard.toml");
            fs::write(
                &path,
                r#"
[report]
channel_id = "C0FROMFILE"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.report.channel_id == "C0FROMENV",
                "env channel id should win over the file value",
            )?;
            ensure(config.logging.level == "debug", "programmatic log level should win over file")
        })();

        clear_vars(REQUIRED_VARS);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("PUNCHCARD_SLACK_BOT_TOKEN", "xapp-wrong-kind");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message)
                    if message.contains("slack.bot_token") && message.contains("app-level token")
            );
            ensure(has_message, "validation failure should name slack.bot_token with a hint")
        })();

        clear_vars(REQUIRED_VARS);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("PUNCHCARD_TRACKER_API_KEY", "lin_api_supersecret");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("lin_api_supersecret"), "debug output should hide the api key")?;
            ensure(!debug.contains("xoxb-test"), "debug output should hide the bot token")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )
        })();

        clear_vars(REQUIRED_VARS);
        result
    }

    #[test]
    fn deadline_outside_range_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("PUNCHCARD_INTERACTION_DEADLINE_SECS", "0");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected validation failure for zero deadline".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::Validation(ref message)
                        if message.contains("interaction.deadline_secs")
                ),
                "validation failure should name interaction.deadline_secs",
            )
        })();

        clear_vars(REQUIRED_VARS);
        clear_vars(&["PUNCHCARD_INTERACTION_DEADLINE_SECS"]);
        result
    }
}
