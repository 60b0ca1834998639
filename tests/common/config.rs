//! Test configuration helpers for mock servers and live-server credentials

use serde_json::Value;
use std::time::Duration;
use tempfile::TempDir;
use webscraper_client::{Config, EndpointStyle, ScraperClient};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Error type for test configuration
#[derive(Debug)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Config error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Client for a mock server, exporting into a fresh temp directory
///
/// Returns the client and temp directory (keep temp_dir alive for test duration)
pub fn create_test_client(server: &MockServer, style: EndpointStyle) -> (ScraperClient, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let mut config = Config {
        endpoint_style: style,
        poll_interval: Duration::from_millis(20),
        ..Config::for_server(server.uri())
    };
    config.export.output_dir = temp_dir.path().to_path_buf();

    let client = ScraperClient::new(config).expect("Failed to create client");
    (client, temp_dir)
}

/// Serve `pages` from the page endpoint, keyed by the cursor each page answers
pub async fn mount_pages(server: &MockServer, endpoint: &str, pages: Vec<(&str, Value)>) {
    for (cursor, body) in pages {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .and(CursorIs(cursor.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }
}

/// Matches a form body whose `cursor` field is exactly the given value
struct CursorIs(String);

impl wiremock::Match for CursorIs {
    fn matches(&self, request: &wiremock::Request) -> bool {
        url::form_urlencoded::parse(&request.body)
            .any(|(key, value)| key == "cursor" && value == self.0)
    }
}

/// Load the live server configuration from environment variables
///
/// Required environment variables:
/// - `SCRAPER_BASE_URL` - Server URL (e.g., http://localhost:8000)
///
/// Optional environment variables:
/// - `SCRAPER_STYLE` - `path_segment` (default) or `query_param`
/// - `SCRAPER_AUTH_TOKEN` - Value of the Authorization header
/// - `SCRAPER_TASK` - Existing task with stored results
pub fn load_live_config() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();

    let base_url = std::env::var("SCRAPER_BASE_URL")
        .map_err(|_| ConfigError("SCRAPER_BASE_URL not set in environment".to_string()))?;

    let endpoint_style = match std::env::var("SCRAPER_STYLE").ok().as_deref() {
        Some("query_param") => EndpointStyle::QueryParam,
        Some("path_segment") | None => EndpointStyle::PathSegment,
        Some(other) => return Err(ConfigError(format!("unknown SCRAPER_STYLE '{}'", other))),
    };

    let mut config = Config {
        endpoint_style,
        ..Config::for_server(base_url)
    };
    config.http.auth_token = std::env::var("SCRAPER_AUTH_TOKEN").ok();
    Ok(config)
}

/// Whether live server credentials are available
pub fn has_live_server() -> bool {
    load_live_config().is_ok()
}

/// Task used by live tests
pub fn live_task_name() -> String {
    std::env::var("SCRAPER_TASK").unwrap_or_else(|_| "immowelt.de".to_string())
}
