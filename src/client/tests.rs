use super::*;
use crate::config::{EndpointStyle, FileCollisionAction};
use crate::export::{ExportOutcome, MemorySink};
use crate::form::{SelectorSpec, SelectorType, TaskForm};
use serde_json::json;
use std::num::NonZeroU32;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, style: EndpointStyle) -> ScraperClient {
    let config = Config {
        endpoint_style: style,
        poll_interval: Duration::from_millis(10),
        ..Config::for_server(server.uri())
    };
    ScraperClient::new(config).unwrap()
}

fn task(name: &str) -> TaskName {
    TaskName::new(name).unwrap()
}

fn form(name: &str) -> TaskForm {
    let mut form = TaskForm::new(task(name));
    form.url_selectors[0].url = "http://example.com/list".into();
    form.selectors[0] = SelectorSpec {
        name: "id".into(),
        xpath: "//a/@data-id".into(),
        kind: SelectorType::Integer,
        regex: String::new(),
        is_key: true,
    };
    form
}

fn page(cursor: &str, has_next: bool, ids: std::ops::Range<u32>) -> serde_json::Value {
    let results: Vec<_> = ids.map(|i| json!({ "id": i })).collect();
    json!({ "cursor": cursor, "has_next": has_next, "results": results })
}

async fn received_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect()
}

#[tokio::test]
async fn run_task_saves_before_running() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/idpscraper/save_task/alpha"))
        .and(body_string_contains("name=alpha"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/idpscraper/run_task/alpha"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, EndpointStyle::PathSegment);
    let mut events = client.subscribe();
    client.run_task(&form("alpha")).await.unwrap();

    assert_eq!(
        received_paths(&server).await,
        vec!["/idpscraper/save_task/alpha", "/idpscraper/run_task/alpha"]
    );
    assert!(matches!(events.recv().await.unwrap(), Event::TaskSaved { task } if task == "alpha"));
    assert!(
        matches!(events.recv().await.unwrap(), Event::TaskRunStarted { task } if task == "alpha")
    );
}

#[tokio::test]
async fn failed_save_prevents_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/idpscraper/save_task/alpha"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = client_for(&server, EndpointStyle::PathSegment);
    let err = client.run_task(&form("alpha")).await.unwrap_err();

    match err {
        Error::Transport(TransportError::Status { status, body, .. }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(received_paths(&server).await.len(), 1);
}

#[tokio::test]
async fn run_failure_reported_in_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/idpscraper/run_task/alpha"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "results": "no such table" })),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, EndpointStyle::PathSegment);
    let err = client.run_saved_task(&task("alpha")).await.unwrap_err();
    assert_eq!(err.error_code(), "rejected");
    assert!(err.to_string().contains("no such table"));
}

#[tokio::test]
async fn invalid_form_is_not_sent() {
    let server = MockServer::start().await;
    let client = client_for(&server, EndpointStyle::PathSegment);

    let mut form = form("alpha");
    form.url_selectors[0].url = "http://example.com/%s/%s/%s".into();

    let err = client.save_task(&form).await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    assert!(received_paths(&server).await.is_empty());
}

#[tokio::test]
async fn lookbehind_regex_is_saved_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/idpscraper/save_task/alpha"))
        .and(body_string_contains("selector_regex%5B%5D=%28%3F%3C%3DEUR+%29%5Cd%2B"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, EndpointStyle::PathSegment);
    let mut form = form("alpha");
    form.selectors[0].regex = r"(?<=EUR )\d+".into();

    client.save_task(&form).await.unwrap();
}

#[tokio::test]
async fn new_task_form_can_be_saved_as_created() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/idpscraper/save_task/fresh"))
        .and(body_string_contains("url%5B%5D=&"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, EndpointStyle::PathSegment);
    client.save_task(&TaskForm::new(task("fresh"))).await.unwrap();
}

#[tokio::test]
async fn query_param_dialect_sends_name_as_parameter() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webscraper/ajax/schedule_task"))
        .and(body_string_contains("name=alpha"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/webscraper/ajax/task_status"))
        .and(query_param("name", "alpha"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "Running" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, EndpointStyle::QueryParam);
    client.run_saved_task(&task("alpha")).await.unwrap();
    let status = client.task_status(&task("alpha")).await.unwrap();
    assert_eq!(status.status, "Running");
    assert!(!status.is_finished());
}

#[tokio::test]
async fn create_task_rejects_blank_names_locally() {
    let server = MockServer::start().await;
    let client = client_for(&server, EndpointStyle::PathSegment);

    let err = client.create_task("   ").await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    assert!(received_paths(&server).await.is_empty());
}

#[tokio::test]
async fn create_and_delete_task() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/idpscraper/new_task"))
        .and(body_string_contains("name=beta"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/idpscraper/delete_results/beta"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/idpscraper/delete_task/beta"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, EndpointStyle::PathSegment);
    let mut events = client.subscribe();

    let beta = client.create_task("beta").await.unwrap();
    client.delete_results(&beta).await.unwrap();
    client.delete_task(&beta).await.unwrap();

    assert!(matches!(events.recv().await.unwrap(), Event::TaskCreated { .. }));
    assert!(matches!(events.recv().await.unwrap(), Event::ResultsDeleted { .. }));
    assert!(matches!(events.recv().await.unwrap(), Event::TaskDeleted { .. }));
}

#[tokio::test]
async fn selector_names_accept_both_listing_shapes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/idpscraper/get_task_selectors/alpha"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "name": "id", "xpath": "//a" }, "price"])),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, EndpointStyle::PathSegment);
    let names = client.task_selector_names(&task("alpha")).await.unwrap();
    assert_eq!(names, vec!["id", "price"]);
}

#[tokio::test]
async fn test_task_returns_the_preview() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/idpscraper/save_task/alpha"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/idpscraper/test_task/alpha"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": "id: 7" })))
        .mount(&server)
        .await;

    let client = client_for(&server, EndpointStyle::PathSegment);
    let preview = client.test_task(&form("alpha")).await.unwrap();
    assert_eq!(preview, "id: 7");
}

#[tokio::test]
async fn auth_token_is_sent_with_every_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/idpscraper/task_status/alpha"))
        .and(header("x-csrftoken", "secret"))
        .and(header("cookie", "csrftoken=secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/idpscraper/delete_results/alpha"))
        .and(header("x-csrftoken", "secret"))
        .and(header("cookie", "csrftoken=secret"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = Config::for_server(server.uri());
    config.http.auth_token = Some("secret".to_string());
    let client = ScraperClient::new(config).unwrap();

    assert!(client.task_status(&task("alpha")).await.unwrap().is_finished());
    client.delete_results(&task("alpha")).await.unwrap();
}

#[tokio::test]
async fn auth_header_name_is_configurable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webscraper/ajax/delete_task"))
        .and(header("x-session", "Token secret"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = Config {
        endpoint_style: EndpointStyle::QueryParam,
        ..Config::for_server(server.uri())
    };
    config.http.auth_token = Some("Token secret".to_string());
    config.http.auth_header = Some("X-Session".to_string());
    let client = ScraperClient::new(config).unwrap();

    client.delete_task(&task("alpha")).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(!requests[0].headers.contains_key("cookie"));
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn wait_for_task_polls_until_finished() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/idpscraper/task_status/alpha"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "Running" })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/idpscraper/task_status/alpha"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "" })))
        .mount(&server)
        .await;

    let client = client_for(&server, EndpointStyle::PathSegment);
    let mut events = client.subscribe();

    let status = client
        .wait_for_task(&task("alpha"), &CancellationToken::new())
        .await
        .unwrap();
    assert!(status.is_finished());
    assert_eq!(received_paths(&server).await.len(), 3);

    // One event per change, not per poll
    let mut changes = Vec::new();
    while let Ok(Event::TaskStatusChanged { status, .. }) = events.try_recv() {
        changes.push(status);
    }
    assert_eq!(changes, vec!["Running".to_string(), String::new()]);
}

#[tokio::test]
async fn wait_for_task_stops_when_cancelled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/idpscraper/task_status/alpha"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "Running" })))
        .mount(&server)
        .await;

    let client = client_for(&server, EndpointStyle::PathSegment);
    let cancel = CancellationToken::new();
    let waiter = {
        let client = client.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { client.wait_for_task(&task("alpha"), &cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let result = waiter.await.unwrap();
    assert!(matches!(result, Err(Error::Cancelled)));
}

#[tokio::test]
async fn export_sends_cursor_and_limit_as_form_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/idpscraper/get_data"))
        .and(body_string_contains("cursor=&"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page("c1", true, 0..2)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/idpscraper/get_data"))
        .and(body_string_contains("cursor=c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page("", false, 2..3)))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = Config::for_server(server.uri());
    config.export.page_limit = NonZeroU32::new(2);
    let client = ScraperClient::new(config).unwrap();
    let sink = Arc::new(MemorySink::new());

    let mut session = client.export_session_with_sink(task("alpha"), sink.clone());
    let outcome = session.export(true).await.unwrap();

    assert_eq!(
        outcome,
        ExportOutcome::Delivered {
            pages: 2,
            records: 3
        }
    );
    for request in server.received_requests().await.unwrap() {
        let body = String::from_utf8(request.body.clone()).unwrap();
        assert!(body.contains("name=alpha"), "body was {body}");
        assert!(body.contains("limit=2"), "body was {body}");
    }
    assert_eq!(sink.artifacts()[0].record_count(), 3);
}

#[tokio::test]
async fn malformed_page_aborts_the_export() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/idpscraper/get_data"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server, EndpointStyle::PathSegment);
    let sink = Arc::new(MemorySink::new());
    let mut session = client.export_session_with_sink(task("alpha"), sink.clone());

    let err = session.export(true).await.unwrap_err();
    assert_eq!(err.error_code(), "page_fetch_failed");
    assert_eq!(sink.deliveries(), 0);
}

#[tokio::test]
async fn export_all_writes_the_output_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/idpscraper/get_data"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "cursor": null, "has_next": false, "results": "a\nb\n" })),
        )
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::for_server(server.uri());
    config.export.output_dir = temp_dir.path().to_path_buf();
    let client = ScraperClient::new(config).unwrap();

    let written = client
        .export_all(task("alpha"), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(written, temp_dir.path().join("data.txt"));
    assert_eq!(std::fs::read_to_string(&written).unwrap(), "a\nb\n");
}

#[tokio::test]
async fn spreadsheet_is_named_after_the_task() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/webscraper/ajax/export_excel"))
        .and(query_param("name", "alpha"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"xlsx".to_vec()))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let mut config = Config {
        endpoint_style: EndpointStyle::QueryParam,
        ..Config::for_server(server.uri())
    };
    config.export.file_collision = FileCollisionAction::Rename;
    let client = ScraperClient::new(config).unwrap();

    let first = client
        .download_spreadsheet(&task("alpha"), temp_dir.path())
        .await
        .unwrap();
    let second = client
        .download_spreadsheet(&task("alpha"), temp_dir.path())
        .await
        .unwrap();

    assert_eq!(first, temp_dir.path().join("alpha.xlsx"));
    assert_eq!(second, temp_dir.path().join("alpha (1).xlsx"));
    assert_eq!(std::fs::read(&first).unwrap(), b"xlsx");
}

#[tokio::test]
async fn task_specification_is_returned_as_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/idpscraper/export_task/alpha.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string("Task(name='alpha')\n"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/webscraper/ajax/export_task"))
        .and(query_param("name", "alpha"))
        .respond_with(ResponseTemplate::new(200).set_body_string("db.task.insert(name='alpha')"))
        .expect(1)
        .mount(&server)
        .await;

    let django = client_for(&server, EndpointStyle::PathSegment);
    assert_eq!(
        django.export_task_spec(&task("alpha")).await.unwrap(),
        "Task(name='alpha')\n"
    );

    let web2py = client_for(&server, EndpointStyle::QueryParam);
    assert_eq!(
        web2py.export_task_spec(&task("alpha")).await.unwrap(),
        "db.task.insert(name='alpha')"
    );
}

#[tokio::test]
async fn missing_task_specification_is_a_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/idpscraper/export_task/ghost.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server, EndpointStyle::PathSegment);
    let err = client.export_task_spec(&task("ghost")).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(TransportError::Status { status: 404, .. })
    ));
}

#[tokio::test]
async fn console_command_returns_its_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/idpscraper/run_command"))
        .and(body_string_contains("command=1%2B1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": "2" })))
        .mount(&server)
        .await;

    let client = client_for(&server, EndpointStyle::PathSegment);
    assert_eq!(client.run_command("1+1").await.unwrap(), "2");
    assert!(matches!(
        client.run_command(" ").await,
        Err(Error::Validation { .. })
    ));
}

#[test]
fn invalid_config_is_rejected() {
    let config = Config::for_server("not a url");
    assert!(matches!(
        ScraperClient::new(config),
        Err(Error::Config { .. })
    ));
}
