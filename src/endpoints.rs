//! Endpoint table of the scraper server
//!
//! Resolves every client action to a method, URL and parameter placement for
//! the configured [`EndpointStyle`]. Task names are always percent-encoded as
//! a single path segment or as a `name` parameter, never spliced into the
//! path verbatim.

use crate::config::{Config, EndpointStyle};
use crate::error::{Error, Result};
use crate::types::TaskName;
use reqwest::Method;
use url::Url;

/// Server action
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// Store a task configuration
    SaveTask,
    /// Start (or schedule) a task run
    RunTask,
    /// Read the run status of a task
    TaskStatus,
    /// Fetch one page of a task's results
    FetchPage,
    /// Run a task on its first URL without storing results
    TestTask,
    /// Delete every stored result of a task
    DeleteResults,
    /// Delete a task and its results
    DeleteTask,
    /// Create an empty task
    CreateTask,
    /// List the selector names of a task
    SelectorNames,
    /// Download a task's results as a spreadsheet
    ExportSpreadsheet,
    /// Download a task's configuration as plain text
    ExportTask,
    /// Evaluate a developer console command
    RunCommand,
}

impl Action {
    /// Whether the action addresses a single task
    pub fn needs_task(self) -> bool {
        !matches!(self, Action::FetchPage | Action::RunCommand)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Action::SaveTask => "save task",
            Action::RunTask => "run task",
            Action::TaskStatus => "task status",
            Action::FetchPage => "fetch page",
            Action::TestTask => "test task",
            Action::DeleteResults => "delete results",
            Action::DeleteTask => "delete task",
            Action::CreateTask => "create task",
            Action::SelectorNames => "selector names",
            Action::ExportSpreadsheet => "export spreadsheet",
            Action::ExportTask => "export task",
            Action::RunCommand => "run command",
        };
        f.write_str(name)
    }
}

/// A resolved request, ready to be sent
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointRequest {
    /// HTTP method
    pub method: Method,
    /// Full URL without query string
    pub url: Url,
    /// Query string parameters
    pub query: Vec<(String, String)>,
    /// Form body parameters (POST only)
    pub form: Vec<(String, String)>,
}

impl EndpointRequest {
    fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            query: Vec::new(),
            form: Vec::new(),
        }
    }

    /// Add a parameter where this method carries them (query for GET, body otherwise)
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if self.method == Method::GET {
            self.query.push((key.into(), value.into()));
        } else {
            self.form.push((key.into(), value.into()));
        }
        self
    }

    /// Add several parameters, keeping their order
    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in params {
            self = self.param(key, value);
        }
        self
    }

    /// Path used to identify the endpoint in logs and errors
    pub fn endpoint(&self) -> String {
        self.url.path().to_string()
    }
}

/// Endpoint table for one server
#[derive(Clone, Debug)]
pub struct Endpoints {
    base: Url,
    style: EndpointStyle,
}

impl Endpoints {
    /// Build the table from the client configuration
    pub fn new(config: &Config) -> Result<Self> {
        let mut base = Url::parse(&config.base_url).map_err(|e| Error::Config {
            message: format!("invalid base URL '{}': {}", config.base_url, e),
            key: Some("base_url".to_string()),
        })?;
        if base.cannot_be_a_base() {
            return Err(Error::Config {
                message: format!("base URL '{}' cannot carry a path", config.base_url),
                key: Some("base_url".to_string()),
            });
        }
        base.set_path(config.base_path());
        base.set_query(None);
        base.set_fragment(None);

        Ok(Self {
            base,
            style: config.endpoint_style,
        })
    }

    /// Dialect of this table
    pub fn style(&self) -> EndpointStyle {
        self.style
    }

    /// Resolve an action for a task
    pub fn resolve(&self, action: Action, task: Option<&TaskName>) -> Result<EndpointRequest> {
        let task = match (action.needs_task(), task) {
            (true, None) => {
                return Err(Error::validation(
                    "task name",
                    format!("required for {}", action),
                ));
            }
            (_, task) => task,
        };

        let request = match self.style {
            EndpointStyle::PathSegment => self.resolve_path_segment(action, task)?,
            EndpointStyle::QueryParam => self.resolve_query_param(action, task)?,
        };
        Ok(request)
    }

    fn resolve_path_segment(
        &self,
        action: Action,
        task: Option<&TaskName>,
    ) -> Result<EndpointRequest> {
        let name = task.map(TaskName::as_str).unwrap_or_default();
        let request = match action {
            Action::SaveTask => EndpointRequest::new(Method::POST, self.url(&["save_task", name])?),
            Action::RunTask => EndpointRequest::new(Method::POST, self.url(&["run_task", name])?),
            Action::TaskStatus => {
                EndpointRequest::new(Method::GET, self.url(&["task_status", name])?)
            }
            Action::FetchPage => EndpointRequest::new(Method::POST, self.url(&["get_data"])?),
            Action::TestTask => EndpointRequest::new(Method::GET, self.url(&["test_task", name])?),
            Action::DeleteResults => {
                EndpointRequest::new(Method::POST, self.url(&["delete_results", name])?)
            }
            Action::DeleteTask => {
                EndpointRequest::new(Method::POST, self.url(&["delete_task", name])?)
            }
            Action::CreateTask => {
                EndpointRequest::new(Method::POST, self.url(&["new_task"])?).param("name", name)
            }
            Action::SelectorNames => {
                EndpointRequest::new(Method::GET, self.url(&["get_task_selectors", name])?)
            }
            Action::ExportSpreadsheet => {
                let file = format!("{}.xlsx", name);
                EndpointRequest::new(Method::GET, self.url(&["export_excel", &file])?)
            }
            Action::ExportTask => {
                let file = format!("{}.txt", name);
                EndpointRequest::new(Method::GET, self.url(&["export_task", &file])?)
            }
            Action::RunCommand => EndpointRequest::new(Method::POST, self.url(&["run_command"])?),
        };
        Ok(request)
    }

    fn resolve_query_param(
        &self,
        action: Action,
        task: Option<&TaskName>,
    ) -> Result<EndpointRequest> {
        let (method, segment) = match action {
            Action::SaveTask => (Method::POST, "save_task"),
            Action::RunTask => (Method::POST, "schedule_task"),
            Action::TaskStatus => (Method::GET, "task_status"),
            Action::FetchPage => (Method::POST, "get_data"),
            Action::TestTask => (Method::POST, "test_task"),
            Action::DeleteResults => (Method::POST, "delete_results"),
            Action::DeleteTask => (Method::POST, "delete_task"),
            Action::CreateTask => (Method::GET, "new_task"),
            Action::SelectorNames => (Method::GET, "get_task_selector_names"),
            Action::ExportSpreadsheet => (Method::GET, "export_excel"),
            Action::ExportTask => (Method::GET, "export_task"),
            Action::RunCommand => (Method::POST, "run_command"),
        };

        let request = EndpointRequest::new(method, self.url(&[segment])?);
        // The saved form already carries the name field
        let request = match task {
            Some(task) if action != Action::SaveTask => request.param("name", task.as_str()),
            _ => request,
        };
        Ok(request)
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config {
                message: format!("base URL '{}' cannot carry a path", self.base),
                key: Some("base_url".to_string()),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}
