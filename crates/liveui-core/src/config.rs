//! Configuration loading and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level LiveUI configuration.
///
/// Every section is optional; accessors fall back to the built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<AppConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "localhost".into()
}

fn default_port() -> u16 {
    8501
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_title")]
    pub title: String,
}

fn default_title() -> String {
    "LiveUI App".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which a session is swept (default: 300).
    #[serde(default = "default_session_timeout")]
    pub timeout_secs: u64,

    /// How often the sweep runs (default: 60).
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_session_timeout() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Outbound queue length per connection before it is considered dead.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Keep-alive ping interval (default: 54).
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Upper bound for a single websocket write (default: 10).
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,
}

fn default_queue_capacity() -> usize {
    256
}

fn default_ping_interval() -> u64 {
    54
}

fn default_write_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "liveui_gateway=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: None,
            filters: Vec::new(),
            output: default_log_output(),
        }
    }
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let Ok(re) = regex::Regex::new(r"\$\{([^}]+)\}") else {
        return input.to_string();
    };
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Load config from a JSON5 file. A missing file yields the defaults.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(crate::error::LiveUiError::Io)?;

        // Substitute ${ENV_VAR} references before parsing
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::LiveUiError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Default config file path.
    pub fn config_path() -> PathBuf {
        data_dir().join("config.json")
    }

    pub fn host(&self) -> String {
        self.server
            .as_ref()
            .map(|s| s.host.clone())
            .unwrap_or_else(default_host)
    }

    pub fn port(&self) -> u16 {
        self.server.as_ref().map(|s| s.port).unwrap_or_else(default_port)
    }

    /// `host:port` for binding the HTTP listener.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host(), self.port())
    }

    pub fn title(&self) -> String {
        self.app
            .as_ref()
            .map(|a| a.title.clone())
            .unwrap_or_else(default_title)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(
            self.session
                .as_ref()
                .map(|s| s.timeout_secs)
                .unwrap_or(default_session_timeout()),
        )
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(
            self.session
                .as_ref()
                .map(|s| s.sweep_interval_secs)
                .unwrap_or(default_sweep_interval()),
        )
    }

    pub fn queue_capacity(&self) -> usize {
        self.connection
            .as_ref()
            .map(|c| c.queue_capacity)
            .unwrap_or(default_queue_capacity())
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(
            self.connection
                .as_ref()
                .map(|c| c.ping_interval_secs)
                .unwrap_or(default_ping_interval()),
        )
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(
            self.connection
                .as_ref()
                .map(|c| c.write_timeout_secs)
                .unwrap_or(default_write_timeout()),
        )
    }

    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// Override the listen address, keeping whichever part is not given.
    pub fn set_server(&mut self, host: Option<String>, port: Option<u16>) {
        let server = self.server.get_or_insert_with(|| ServerConfig {
            host: default_host(),
            port: default_port(),
        });
        if let Some(host) = host {
            server.host = host;
        }
        if let Some(port) = port {
            server.port = port;
        }
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.app = Some(AppConfig {
            title: title.into(),
        });
    }

    /// Check the config for values that would break the runtime.
    ///
    /// Returns `(warnings, errors)`.
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if let Some(session) = &self.session {
            if session.timeout_secs == 0 {
                errors.push("session.timeout_secs must be greater than zero".to_string());
            }
            if session.sweep_interval_secs == 0 {
                errors.push("session.sweep_interval_secs must be greater than zero".to_string());
            }
            if session.timeout_secs > 0 && session.timeout_secs < session.sweep_interval_secs {
                warnings.push(format!(
                    "session.timeout_secs ({}) is shorter than sweep_interval_secs ({}); sessions will outlive their timeout",
                    session.timeout_secs, session.sweep_interval_secs
                ));
            }
        }

        if let Some(conn) = &self.connection {
            if conn.queue_capacity == 0 {
                errors.push("connection.queue_capacity must be greater than zero".to_string());
            }
            if conn.ping_interval_secs == 0 {
                errors.push("connection.ping_interval_secs must be greater than zero".to_string());
            }
            if conn.write_timeout_secs == 0 {
                errors.push("connection.write_timeout_secs must be greater than zero".to_string());
            }
        }

        if let Some(logging) = &self.logging {
            if !matches!(logging.format.as_str(), "plain" | "json") {
                warnings.push(format!(
                    "logging.format '{}' is unknown; falling back to plain",
                    logging.format
                ));
            }
        }

        (warnings, errors)
    }
}

/// Base data directory: `~/.liveui`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".liveui")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        // SAFETY: test-only, single-threaded test runner
        unsafe { std::env::set_var("TEST_LIVEUI_TITLE", "Dashboard") };
        let input = r#"{"title": "${TEST_LIVEUI_TITLE}", "other": "plain"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains("Dashboard"));
        assert!(result.contains("plain"));
        unsafe { std::env::remove_var("TEST_LIVEUI_TITLE") };
    }

    #[test]
    fn test_env_var_missing() {
        let input = r#"{"key": "${NONEXISTENT_VAR_LIVEUI_TEST}"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains(r#""""#));
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port(), 8501);
        assert_eq!(config.host(), "localhost");
        assert_eq!(config.title(), "LiveUI App");
        assert_eq!(config.session_timeout(), Duration::from_secs(300));
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.queue_capacity(), 256);
        assert_eq!(config.ping_interval(), Duration::from_secs(54));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.address(), "localhost:8501");
    }

    #[test]
    fn test_load_json5_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                // comments are fine in JSON5
                server: { host: "0.0.0.0", port: 9000 },
                app: { title: "Ops" },
                session: { timeout_secs: 30 },
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.address(), "0.0.0.0:9000");
        assert_eq!(config.title(), "Ops");
        assert_eq!(config.session_timeout(), Duration::from_secs(30));
        // Unset fields in a present section still get their defaults
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_load_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ server: ").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, crate::error::LiveUiError::Config(_)));
    }

    #[test]
    fn test_logging_config_defaults() {
        let json_str = r#"{ "logging": {} }"#;
        let config: Config = json5::from_str(json_str).unwrap();
        let logging = config.logging.expect("logging should be present");
        assert_eq!(logging.format, "plain");
        assert!(logging.level.is_none());
        assert_eq!(logging.output, "stderr");
        assert!(logging.filters.is_empty());
    }

    #[test]
    fn test_validate_zero_timeout_errors() {
        let config = Config {
            session: Some(SessionConfig {
                timeout_secs: 0,
                sweep_interval_secs: 60,
            }),
            ..Config::default()
        };
        let (_warnings, errors) = config.validate();
        assert!(
            errors.iter().any(|e| e.contains("timeout_secs")),
            "Expected an error about timeout_secs, got: {errors:?}"
        );
    }

    #[test]
    fn test_validate_timeout_shorter_than_sweep_warns() {
        let config = Config {
            session: Some(SessionConfig {
                timeout_secs: 10,
                sweep_interval_secs: 60,
            }),
            connection: Some(ConnectionConfig {
                queue_capacity: 0,
                ping_interval_secs: 54,
                write_timeout_secs: 10,
            }),
            ..Config::default()
        };
        let (warnings, errors) = config.validate();
        assert_eq!(warnings.len(), 1);
        assert!(errors.iter().any(|e| e.contains("queue_capacity")));
    }

    #[test]
    fn test_validate_zero_write_timeout_errors() {
        let config = Config {
            connection: Some(ConnectionConfig {
                queue_capacity: 16,
                ping_interval_secs: 54,
                write_timeout_secs: 0,
            }),
            ..Config::default()
        };
        let (_warnings, errors) = config.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("write_timeout_secs"), "got: {errors:?}");
    }

    #[test]
    fn test_cli_overrides_keep_other_parts() {
        let mut config = Config::default();
        config.set_server(None, Some(9000));
        assert_eq!(config.address(), "localhost:9000");

        config.set_server(Some("0.0.0.0".into()), None);
        assert_eq!(config.address(), "0.0.0.0:9000");

        config.set_title("Ops");
        assert_eq!(config.title(), "Ops");
        assert_eq!(config.logging().format, "plain");
    }
}
