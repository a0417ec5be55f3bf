use std::env;
use std::fs;
use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

/// Global application options, shared by every handler instance.
#[derive(Clone, Debug)]
pub struct AppOptions {
    /// Fetch the invoking user's full Slack profile on every invocation.
    pub fetch_slack_profile: bool,
    /// Where user sessions are persisted.
    pub database_url: String,
    pub bind_address: String,
    pub slack: SlackOptions,
    pub logging: LoggingOptions,
}

#[derive(Clone, Debug, Default)]
pub struct SlackOptions {
    /// Shared secret Slack stamps on every webhook body.
    pub verification_token: Option<SecretString>,
    /// User-scoped token (xoxp), the default sending identity.
    pub app_token: Option<SecretString>,
    /// Bot token (xoxb), required for bot-as-sender conversations.
    pub bot_token: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct LoggingOptions {
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

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            fetch_slack_profile: false,
            database_url: "sqlite://sessions.db?mode=rwc".to_owned(),
            bind_address: "0.0.0.0:3000".to_owned(),
            slack: SlackOptions::default(),
            logging: LoggingOptions { level: "info".to_owned(), format: LogFormat::Compact },
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    fetch_slack_profile: Option<bool>,
    database_url: Option<String>,
    bind_address: Option<String>,
    #[serde(default)]
    slack: FileSlack,
    #[serde(default)]
    logging: FileLogging,
}

#[derive(Debug, Default, Deserialize)]
struct FileSlack {
    verification_token: Option<String>,
    app_token: Option<String>,
    bot_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileLogging {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppOptions {
    /// Loads options from an optional TOML file, then applies
    /// `SLASHKIT_*` environment overrides on top.
    pub fn load(load: LoadOptions) -> Result<Self, ConfigError> {
        let mut options = Self::default();
        let path = load.config_path.unwrap_or_else(|| PathBuf::from("slashkit.toml"));
        match fs::read_to_string(&path) {
            Ok(contents) => options.apply_file(&path, &contents)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                if load.require_file {
                    return Err(ConfigError::MissingConfigFile(path));
                }
            }
            Err(err) => return Err(ConfigError::ReadFile { path, source: err }),
        }
        options.apply_env(|key| env::var(key).ok())?;
        Ok(options)
    }

    fn apply_file(&mut self, path: &PathBuf, contents: &str) -> Result<(), ConfigError> {
        let file: FileConfig = toml::from_str(contents)
            .map_err(|source| ConfigError::ParseFile { path: path.clone(), source })?;
        if let Some(fetch) = file.fetch_slack_profile {
            self.fetch_slack_profile = fetch;
        }
        if let Some(url) = file.database_url {
            self.database_url = url;
        }
        if let Some(addr) = file.bind_address {
            self.bind_address = addr;
        }
        if let Some(token) = file.slack.verification_token {
            self.slack.verification_token = Some(token.into());
        }
        if let Some(token) = file.slack.app_token {
            self.slack.app_token = Some(token.into());
        }
        if let Some(token) = file.slack.bot_token {
            self.slack.bot_token = Some(token.into());
        }
        if let Some(level) = file.logging.level {
            self.logging.level = level;
        }
        if let Some(format) = file.logging.format {
            self.logging.format = format;
        }
        Ok(())
    }

    /// Environment overrides, injectable for tests.
    fn apply_env(
        &mut self,
        get: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = get("SLASHKIT_FETCH_SLACK_PROFILE") {
            self.fetch_slack_profile = parse_bool("SLASHKIT_FETCH_SLACK_PROFILE", &value)?;
        }
        if let Some(url) = get("SLASHKIT_DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(addr) = get("SLASHKIT_BIND_ADDRESS") {
            self.bind_address = addr;
        }
        if let Some(token) = get("SLASHKIT_SLACK_VERIFICATION_TOKEN") {
            self.slack.verification_token = Some(token.into());
        }
        if let Some(token) = get("SLASHKIT_SLACK_APP_TOKEN") {
            self.slack.app_token = Some(token.into());
        }
        if let Some(token) = get("SLASHKIT_SLACK_BOT_TOKEN") {
            self.slack.bot_token = Some(token.into());
        }
        if let Some(level) = get("SLASHKIT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = get("SLASHKIT_LOG_FORMAT") {
            self.logging.format = match format.as_str() {
                "compact" => LogFormat::Compact,
                "pretty" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError::InvalidEnvOverride {
                        key: "SLASHKIT_LOG_FORMAT".to_owned(),
                        value: format,
                    })
                }
            };
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride {
            key: key.to_owned(),
            value: value.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use secrecy::ExposeSecret;

    use super::{AppOptions, LogFormat};

    #[test]
    fn file_values_override_defaults() {
        let mut options = AppOptions::default();
        options
            .apply_file(
                &PathBuf::from("test.toml"),
                r#"
                fetch_slack_profile = true
                database_url = "sqlite://custom.db"

                [slack]
                bot_token = "xoxb-123"

                [logging]
                level = "debug"
                format = "json"
                "#,
            )
            .expect("parse");
        assert!(options.fetch_slack_profile);
        assert_eq!(options.database_url, "sqlite://custom.db");
        assert_eq!(
            options.slack.bot_token.as_ref().map(|t| t.expose_secret().to_owned()),
            Some("xoxb-123".to_owned())
        );
        assert_eq!(options.logging.level, "debug");
        assert_eq!(options.logging.format, LogFormat::Json);
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let env = HashMap::from([
            ("SLASHKIT_DATABASE_URL".to_owned(), "sqlite://env.db".to_owned()),
            ("SLASHKIT_LOG_FORMAT".to_owned(), "pretty".to_owned()),
            ("SLASHKIT_FETCH_SLACK_PROFILE".to_owned(), "true".to_owned()),
        ]);
        let mut options = AppOptions::default();
        options.apply_env(|key| env.get(key).cloned()).expect("apply");
        assert_eq!(options.database_url, "sqlite://env.db");
        assert_eq!(options.logging.format, LogFormat::Pretty);
        assert!(options.fetch_slack_profile);
    }

    #[test]
    fn malformed_boolean_override_is_rejected() {
        let mut options = AppOptions::default();
        let result = options.apply_env(|key| {
            (key == "SLASHKIT_FETCH_SLACK_PROFILE").then(|| "maybe".to_owned())
        });
        assert!(result.is_err());
    }

    #[test]
    fn malformed_file_is_rejected() {
        let mut options = AppOptions::default();
        assert!(options.apply_file(&PathBuf::from("bad.toml"), "not = [toml").is_err());
    }
}
