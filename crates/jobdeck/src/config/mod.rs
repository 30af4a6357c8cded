use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use reqwest::Url;

const DEFAULT_JOB_SEARCH_URL: &str = "https://jsearch.p.rapidapi.com";
const DEFAULT_TAVUS_URL: &str = "https://tavusapi.com";
const DEFAULT_TAVUS_PERSONA: &str = "pe13ed370726";
const DEFAULT_TAVUS_REPLICA: &str = "r9d30b0e55ac";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the tracker service and its outbound gateways.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub backend: BackendConfig,
    pub search: SearchConfig,
    pub avatar: AvatarConfig,
    pub sessions: SessionConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = LogFormat::from_str(
            &env::var("APP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
        );

        let timeout_secs = env::var("HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidTimeout)?;
        let request_timeout = Duration::from_secs(timeout_secs);

        let idle_secs = env::var("SESSION_IDLE_SECS")
            .unwrap_or_else(|_| "1800".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidSessionIdle)?;

        let backend = BackendConfig {
            url: optional_url("SUPABASE_URL")?,
            api_key: optional_var("SUPABASE_KEY"),
            request_timeout,
        };

        let search = SearchConfig {
            url: required_url("JOB_SEARCH_URL", DEFAULT_JOB_SEARCH_URL)?,
            api_key: optional_var("JOB_SEARCH_API_KEY"),
            request_timeout,
        };

        let avatar = AvatarConfig {
            url: required_url("TAVUS_API_URL", DEFAULT_TAVUS_URL)?,
            api_key: optional_var("TAVUS_API_KEY"),
            persona_id: optional_var("TAVUS_PERSONA_ID")
                .unwrap_or_else(|| DEFAULT_TAVUS_PERSONA.to_string()),
            replica_id: match env::var("TAVUS_REPLICA_ID") {
                Ok(value) if value.trim().is_empty() => None,
                Ok(value) => Some(value.trim().to_string()),
                Err(_) => Some(DEFAULT_TAVUS_REPLICA.to_string()),
            },
            request_timeout,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                format: log_format,
            },
            backend,
            search,
            avatar,
            sessions: SessionConfig {
                idle_timeout: Duration::from_secs(idle_secs),
            },
        })
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn optional_url(key: &'static str) -> Result<Option<Url>, ConfigError> {
    optional_var(key)
        .map(|raw| parse_url(key, &raw))
        .transpose()
}

fn required_url(key: &'static str, default: &str) -> Result<Url, ConfigError> {
    let raw = optional_var(key).unwrap_or_else(|| default.to_string());
    parse_url(key, &raw)
}

fn parse_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|err| ConfigError::InvalidUrl {
        key,
        reason: err.to_string(),
    })
}

/// Appends `path` to `base`, keeping any path prefix the base URL already carries.
pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, String> {
    let raw = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&raw).map_err(|err| err.to_string())
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Output flavor for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

/// Hosted relational backend (PostgREST/Supabase). Without a URL the service falls back to
/// an in-memory store.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub url: Option<Url>,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

/// Per-user tracker sessions kept in memory by the service.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub idle_timeout: Duration,
}

/// Third-party job listing search API.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub url: Url,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

/// Hosted avatar video session API used for mock interviews.
#[derive(Debug, Clone)]
pub struct AvatarConfig {
    pub url: Url,
    pub api_key: Option<String>,
    pub persona_id: String,
    pub replica_id: Option<String>,
    pub request_timeout: Duration,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidTimeout,
    InvalidSessionIdle,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidUrl {
        key: &'static str,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidTimeout => {
                write!(f, "HTTP_TIMEOUT_SECS must be a whole number of seconds")
            }
            ConfigError::InvalidSessionIdle => {
                write!(f, "SESSION_IDLE_SECS must be a whole number of seconds")
            }
            ConfigError::InvalidHost { source } => {
                write!(f, "APP_HOST must be a valid IP address ({source})")
            }
            ConfigError::InvalidUrl { key, reason } => {
                write!(f, "{key} must be an absolute URL ({reason})")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidTimeout
            | ConfigError::InvalidSessionIdle
            | ConfigError::InvalidUrl { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
