//! Process configuration read from the environment.

use std::time::Duration;

use thiserror::Error;

/// Service name reported by the liveness probe.
pub const SERVICE_NAME: &str = "videogames-assistant";

/// Default application name registered with the agent runtime.
pub const DEFAULT_APP_NAME: &str = "videogames_assistant";

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost,http://localhost:8080,http://localhost:8501,*";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_RUNTIME_URL: &str = "http://localhost:8000";

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings shared by both front ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// CORS origins; `*` allows any origin.
    pub allowed_origins: Vec<String>,
    /// Serve the embedded web interface at `/dev-ui`.
    pub serve_web_interface: bool,
    pub port: u16,
    /// Base URL of the agent runtime.
    pub runtime_url: String,
    pub app_name: String,
    /// Session Store retention limit; `None` keeps every session.
    pub session_capacity: Option<usize>,
    /// Relay idle timeout; `None` waits indefinitely.
    pub relay_idle_timeout: Option<Duration>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            allowed_origins: parse_origins(DEFAULT_ALLOWED_ORIGINS),
            serve_web_interface: true,
            port: DEFAULT_PORT,
            runtime_url: DEFAULT_RUNTIME_URL.to_string(),
            app_name: DEFAULT_APP_NAME.to_string(),
            session_capacity: None,
            relay_idle_timeout: None,
        }
    }
}

impl ServiceConfig {
    /// Read the configuration from process environment variables.
    ///
    /// # Errors
    /// Returns error if a numeric variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns error if a numeric variable cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            config.allowed_origins = parse_origins(&origins);
        }
        if let Some(flag) = lookup("SERVE_WEB_INTERFACE") {
            config.serve_web_interface = flag.to_lowercase() == "true";
        }
        if let Some(port) = lookup("PORT") {
            config.port = parse_number("PORT", &port)?;
        }
        if let Some(url) = lookup("AGENT_RUNTIME_URL") {
            config.runtime_url = url.trim_end_matches('/').to_string();
        }
        if let Some(name) = lookup("AGENT_APP_NAME").filter(|n| !n.is_empty()) {
            config.app_name = name;
        }
        if let Some(capacity) = lookup("SESSION_CAPACITY") {
            config.session_capacity = Some(parse_number("SESSION_CAPACITY", &capacity)?);
        }
        if let Some(secs) = lookup("RELAY_IDLE_TIMEOUT_SECS") {
            config.relay_idle_timeout = Some(Duration::from_secs(parse_number(
                "RELAY_IDLE_TIMEOUT_SECS",
                &secs,
            )?));
        }

        Ok(config)
    }

    /// Whether the origin list contains the `*` wildcard.
    #[must_use]
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_number<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
