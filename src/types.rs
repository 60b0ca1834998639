//! Core types for webscraper-client

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::num::NonZeroU32;

/// Flash text shown while an export is still loading pages
pub const EXPORT_PROGRESS_MESSAGE: &str =
    "Data is being prepared. This can take some time depending on the size of the database.";

/// Flash text shown once an export has been handed to its sink
pub const EXPORT_COMPLETE_MESSAGE: &str = "All data successfully loaded";

/// Name of a server-side scraper task (never empty)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskName(String);

impl TaskName {
    /// Validate and wrap a task name
    ///
    /// Empty and whitespace-only names are rejected, the same names the
    /// "new task" prompt refuses to submit.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::validation("task name", "must not be empty"));
        }
        Ok(Self(name))
    }

    /// Borrow the name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for TaskName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<&str> for TaskName {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl AsRef<str> for TaskName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for TaskName {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        TaskName::new(name).map_err(serde::de::Error::custom)
    }
}

/// One request for a page of a task's results
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportQuery {
    /// Task whose results are exported
    pub task_name: TaskName,
    /// Opaque position token ("" = from the beginning)
    pub cursor: String,
    /// Page size bound (None = server default)
    pub page_limit: Option<NonZeroU32>,
}

impl ExportQuery {
    /// Query for the first page of a task
    pub fn first_page(task_name: TaskName, page_limit: Option<NonZeroU32>) -> Self {
        Self {
            task_name,
            cursor: String::new(),
            page_limit,
        }
    }

    /// Form fields of the request
    ///
    /// `limit` is only present when a page limit is set; the server applies
    /// its own default otherwise.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("name", self.task_name.to_string()),
            ("cursor", self.cursor.clone()),
        ];
        if let Some(limit) = self.page_limit {
            fields.push(("limit", limit.to_string()));
        }
        fields
    }
}

/// Data carried by one result page
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PagePayload {
    /// Pre-rendered text chunk
    Text(String),
    /// Structured records
    Records(Vec<serde_json::Value>),
}

impl PagePayload {
    /// Records in this chunk; a text chunk yields one string per non-empty line
    pub fn records(&self) -> Vec<serde_json::Value> {
        match self {
            PagePayload::Text(text) => text
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| serde_json::Value::String(line.to_string()))
                .collect(),
            PagePayload::Records(records) => records.clone(),
        }
    }

    /// Number of records without materializing them
    pub fn record_count(&self) -> usize {
        match self {
            PagePayload::Text(text) => text.lines().filter(|l| !l.trim().is_empty()).count(),
            PagePayload::Records(records) => records.len(),
        }
    }

    /// Append the bytes of this chunk to `buf`
    ///
    /// Text is copied verbatim; records become newline-delimited JSON.
    pub fn write_to(&self, buf: &mut Vec<u8>) -> Result<()> {
        match self {
            PagePayload::Text(text) => buf.extend_from_slice(text.as_bytes()),
            PagePayload::Records(records) => {
                for record in records {
                    serde_json::to_writer(&mut *buf, record)?;
                    buf.push(b'\n');
                }
            }
        }
        Ok(())
    }
}

/// One page of a task's results
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(from = "WirePage")]
pub struct ExportPage {
    /// Cursor of the following page
    pub next_cursor: String,
    /// Whether the server has more pages
    pub has_next: bool,
    /// Data of this page
    pub payload: PagePayload,
}

#[derive(Deserialize)]
struct WirePage {
    #[serde(default)]
    cursor: Option<String>,
    has_next: bool,
    results: PagePayload,
}

impl From<WirePage> for ExportPage {
    fn from(page: WirePage) -> Self {
        Self {
            next_cursor: page.cursor.unwrap_or_default(),
            has_next: page.has_next,
            payload: page.results,
        }
    }
}

/// Run state reported by the server
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Server status text; empty once the task has finished
    #[serde(default)]
    pub status: String,
}

impl TaskStatus {
    /// Whether the task is no longer running
    pub fn is_finished(&self) -> bool {
        self.status.trim().is_empty()
    }
}

/// Simple or advanced task editor view
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Only the essential selector fields (default)
    #[default]
    Simple,
    /// Every selector field, including regex and key flags
    Advanced,
}

impl ViewMode {
    /// Switch to the other view
    pub fn toggle(self) -> Self {
        match self {
            ViewMode::Simple => ViewMode::Advanced,
            ViewMode::Advanced => ViewMode::Simple,
        }
    }

    /// URL fragment marking this view
    pub fn fragment(self) -> &'static str {
        match self {
            ViewMode::Simple => "",
            ViewMode::Advanced => "advanced",
        }
    }

    /// Restore the view from a URL fragment (with or without the leading '#')
    pub fn from_fragment(fragment: &str) -> Self {
        if fragment.trim_start_matches('#').is_empty() {
            ViewMode::Simple
        } else {
            ViewMode::Advanced
        }
    }

    /// Label of the button that switches away from this view
    pub fn toggle_label(self) -> &'static str {
        match self {
            ViewMode::Simple => "Advanced View",
            ViewMode::Advanced => "Simple View",
        }
    }

    /// Whether advanced-only fields are shown
    pub fn shows_advanced(self) -> bool {
        self == ViewMode::Advanced
    }
}

/// Event emitted by the client
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A result page was appended to an export
    ExportPageLoaded {
        /// Task being exported
        task: String,
        /// Number of pages loaded so far
        pages: usize,
        /// Records in this page
        records: usize,
        /// Whether the server reported more pages
        has_next: bool,
    },

    /// An export was handed to its sink
    ExportComplete {
        /// Task that was exported
        task: String,
        /// Number of pages in the artifact
        pages: usize,
        /// Number of records in the artifact
        records: usize,
    },

    /// An export was aborted and its pages discarded
    ExportFailed {
        /// Task being exported
        task: String,
        /// Error message
        error: String,
    },

    /// A task configuration was saved
    TaskSaved {
        /// Task name
        task: String,
    },

    /// A task run was triggered
    TaskRunStarted {
        /// Task name
        task: String,
    },

    /// A task was created
    TaskCreated {
        /// Task name
        task: String,
    },

    /// A task was deleted
    TaskDeleted {
        /// Task name
        task: String,
    },

    /// All results of a task were deleted
    ResultsDeleted {
        /// Task name
        task: String,
    },

    /// The polled status of a task changed
    TaskStatusChanged {
        /// Task name
        task: String,
        /// New status text (empty = finished)
        status: String,
    },
}

impl Event {
    /// Transient status text for this event, if the front end would flash one
    pub fn flash_message(&self) -> Option<String> {
        match self {
            Event::ExportPageLoaded { .. } => Some(EXPORT_PROGRESS_MESSAGE.to_string()),
            Event::ExportComplete { .. } => Some(EXPORT_COMPLETE_MESSAGE.to_string()),
            Event::ExportFailed { error, .. } => Some(error.clone()),
            _ => None,
        }
    }
}
