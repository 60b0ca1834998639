//! Configuration types for webscraper-client

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{num::NonZeroU32, path::PathBuf, time::Duration};

/// URL dialect spoken by the scraper server
///
/// The two sibling front ends expose the same actions under different paths:
/// one puts the task name into the path, the other passes it as a `name`
/// parameter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointStyle {
    /// `/idpscraper/run_task/{name}` (default)
    #[default]
    PathSegment,
    /// `/webscraper/ajax/schedule_task` with `name=...`
    QueryParam,
}

impl EndpointStyle {
    /// Base path used when none is configured
    pub fn default_base_path(&self) -> &'static str {
        match self {
            EndpointStyle::PathSegment => "/idpscraper",
            EndpointStyle::QueryParam => "/webscraper/ajax",
        }
    }

    /// Header carrying the session token when none is configured
    ///
    /// The Django front end checks `X-CSRFToken` against its `csrftoken`
    /// cookie; the web2py front end reads `Authorization`.
    pub fn default_auth_header(&self) -> &'static str {
        match self {
            EndpointStyle::PathSegment => "X-CSRFToken",
            EndpointStyle::QueryParam => "Authorization",
        }
    }

    /// Cookie that must echo the session token when none is configured
    pub fn default_token_cookie(&self) -> Option<&'static str> {
        match self {
            EndpointStyle::PathSegment => Some("csrftoken"),
            EndpointStyle::QueryParam => None,
        }
    }
}

/// HTTP transport settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout (default: 24 hours, effectively unbounded)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Session token sent with every request
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Header carrying the token (None = dialect default)
    #[serde(default)]
    pub auth_header: Option<String>,

    /// Cookie echoing the token (None = dialect default, "" = no cookie)
    #[serde(default)]
    pub token_cookie: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            auth_token: None,
            auth_header: None,
            token_cookie: None,
        }
    }
}

/// Bulk export settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory exported artifacts are written to (default: ".")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// File name of the assembled export (default: "data.txt")
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// What to do when the target file already exists
    #[serde(default)]
    pub file_collision: FileCollisionAction,

    /// Page size sent as `limit` (None = server default, field omitted)
    #[serde(default)]
    pub page_limit: Option<NonZeroU32>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            file_name: default_file_name(),
            file_collision: FileCollisionAction::default(),
            page_limit: None,
        }
    }
}

/// Main configuration for [`ScraperClient`](crate::ScraperClient)
///
/// Every field has a default, so an empty JSON object is a valid
/// configuration pointing at `http://localhost:8000`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Scheme, host and port of the scraper server
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// URL dialect of the server
    #[serde(default)]
    pub endpoint_style: EndpointStyle,

    /// Path prefix of every endpoint (None = dialect default)
    #[serde(default)]
    pub base_path: Option<String>,

    /// Interval between task status polls (default: 2 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// HTTP transport settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Bulk export settings
    #[serde(default)]
    pub export: ExportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            endpoint_style: EndpointStyle::default(),
            base_path: None,
            poll_interval: default_poll_interval(),
            http: HttpConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Config {
    /// Configuration for a server at `base_url` with every other setting defaulted
    pub fn for_server(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Parse a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Effective path prefix, without a trailing slash
    pub fn base_path(&self) -> &str {
        self.base_path
            .as_deref()
            .unwrap_or_else(|| self.endpoint_style.default_base_path())
            .trim_end_matches('/')
    }

    /// Header the session token is sent in
    pub fn auth_header(&self) -> &str {
        self.http
            .auth_header
            .as_deref()
            .unwrap_or_else(|| self.endpoint_style.default_auth_header())
    }

    /// Cookie the session token is echoed in, if any
    pub fn token_cookie(&self) -> Option<&str> {
        match self.http.token_cookie.as_deref() {
            Some("") => None,
            Some(name) => Some(name),
            None => self.endpoint_style.default_token_cookie(),
        }
    }

    /// Check the configuration for values the client cannot work with
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url).map_err(|e| Error::Config {
            message: format!("invalid base URL '{}': {}", self.base_url, e),
            key: Some("base_url".to_string()),
        })?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config {
                message: format!("base URL '{}' must be an http(s) URL", self.base_url),
                key: Some("base_url".to_string()),
            });
        }

        if let Some(path) = &self.base_path
            && !path.is_empty()
            && !path.starts_with('/')
        {
            return Err(Error::Config {
                message: format!("base path '{}' must start with '/'", path),
                key: Some("base_path".to_string()),
            });
        }

        if self.poll_interval.is_zero() {
            return Err(Error::Config {
                message: "poll interval must be greater than zero".to_string(),
                key: Some("poll_interval".to_string()),
            });
        }

        if reqwest::header::HeaderName::from_bytes(self.auth_header().as_bytes()).is_err() {
            return Err(Error::Config {
                message: format!("invalid auth header name '{}'", self.auth_header()),
                key: Some("http.auth_header".to_string()),
            });
        }

        if let Some(token) = &self.http.auth_token
            && reqwest::header::HeaderValue::from_str(token).is_err()
        {
            return Err(Error::Config {
                message: "auth token is not a valid header value".to_string(),
                key: Some("http.auth_token".to_string()),
            });
        }

        if self.http.request_timeout.is_zero() {
            return Err(Error::Config {
                message: "request timeout must be greater than zero".to_string(),
                key: Some("http.request_timeout".to_string()),
            });
        }

        if self.export.file_name.trim().is_empty()
            || self.export.file_name.contains(['/', '\\'])
        {
            return Err(Error::Config {
                message: format!("invalid export file name '{}'", self.export.file_name),
                key: Some("export.file_name".to_string()),
            });
        }

        Ok(())
    }
}

/// File collision handling strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Append (1), (2), etc. to filename (default)
    #[default]
    Rename,
    /// Overwrite existing file
    Overwrite,
    /// Refuse to write, keep existing
    Skip,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(24 * 3600)
}

fn default_user_agent() -> String {
    concat!("webscraper-client/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_file_name() -> String {
    "data.txt".to_string()
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
