//! Custom test assertions for integration tests

use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;
use webscraper_client::Event;
use wiremock::MockServer;

/// Drain every event already published on `events`
pub fn drain_events(events: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}

/// Wait for the first event matching `predicate`
///
/// Returns None on timeout or when the channel closes.
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    predicate: F,
) -> Option<Event>
where
    F: Fn(&Event) -> bool,
{
    tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// Cursor field of every page request the server received, in order
pub async fn received_cursors(server: &MockServer, endpoint: &str) -> Vec<String> {
    server
        .received_requests()
        .await
        .expect("request recording is enabled")
        .iter()
        .filter(|request| request.url.path() == endpoint)
        .filter_map(|request| {
            url::form_urlencoded::parse(&request.body)
                .find(|(key, _)| key == "cursor")
                .map(|(_, value)| value.into_owned())
        })
        .collect()
}

/// Paths of every request the server received, in order
pub async fn received_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .expect("request recording is enabled")
        .iter()
        .map(|request| request.url.path().to_string())
        .collect()
}

/// Assert that `path` holds exactly `expected` JSON lines
pub fn assert_json_lines(path: &Path, expected: usize) -> Vec<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|line| serde_json::from_str(line).expect("every line is a JSON record"))
        .collect();
    assert_eq!(
        lines.len(),
        expected,
        "expected {} records in {}",
        expected,
        path.display()
    );
    lines
}

/// Assert that a directory holds no files
pub fn assert_dir_empty(dir: &Path) {
    let entries: Vec<_> = std::fs::read_dir(dir)
        .expect("directory exists")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    assert!(entries.is_empty(), "unexpected files: {:?}", entries);
}
