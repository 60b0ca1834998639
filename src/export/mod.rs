//! Cursor-paginated bulk export
//!
//! An [`ExportSession`] pulls every page of a task's results through a
//! [`Transport`], strictly one request at a time, and hands the assembled
//! [`ExportArtifact`] to a [`Sink`] exactly once.
//!
//! The pages are trusted as sent: they are concatenated in arrival order with
//! no deduplication and no page-count check. A server that repeats a cursor
//! or keeps reporting `has_next` makes the export grow without bound.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use webscraper_client::{Config, ScraperClient, TaskName};
//! use webscraper_client::export::{ExportSession, MemorySink};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(ScraperClient::new(Config::default())?);
//! let sink = Arc::new(MemorySink::new());
//! let mut session = ExportSession::new(TaskName::new("alpha")?, client, sink.clone());
//!
//! session.export(true).await?;
//! println!("{} records", sink.artifacts()[0].record_count());
//! # Ok(())
//! # }
//! ```

mod sink;


pub use sink::{FileSink, MemorySink, Sink};

use crate::error::{ExportError, TransportError};
use crate::types::{Event, ExportPage, ExportQuery, PagePayload, TaskName};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One request/response exchange for a result page
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the page described by `query`
    async fn fetch_page(&self, query: &ExportQuery) -> Result<ExportPage, TransportError>;
}

/// Fully assembled export of one task
#[derive(Clone, Debug, PartialEq)]
pub struct ExportArtifact {
    /// Task that was exported
    pub task_name: TaskName,
    /// Page payloads in server order
    pub chunks: Vec<PagePayload>,
    /// When the last page was appended
    pub assembled_at: DateTime<Utc>,
}

impl ExportArtifact {
    /// Number of pages
    pub fn pages(&self) -> usize {
        self.chunks.len()
    }

    /// Every record of every page, in order
    pub fn records(&self) -> Vec<serde_json::Value> {
        self.chunks.iter().flat_map(PagePayload::records).collect()
    }

    /// Total number of records
    pub fn record_count(&self) -> usize {
        self.chunks.iter().map(PagePayload::record_count).sum()
    }

    /// Concatenated bytes of all pages
    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        let mut buf = Vec::new();
        for chunk in &self.chunks {
            chunk.write_to(&mut buf)?;
        }
        Ok(buf)
    }
}

/// Result of one [`ExportSession::export`] call
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportOutcome {
    /// A page was loaded and the call stopped; call again to continue
    Paused {
        /// Pages loaded so far
        pages: usize,
        /// Whether the server reported more pages
        has_next: bool,
    },
    /// The artifact was handed to the sink
    Delivered {
        /// Pages in the artifact
        pages: usize,
        /// Records in the artifact
        records: usize,
    },
}

/// Lifecycle of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Pages may still be requested
    Active,
    /// The artifact has been delivered; the session is closed
    Delivered,
}

/// Pagination state of one export
pub struct ExportSession {
    task_name: TaskName,
    page_limit: Option<NonZeroU32>,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn Sink>,
    events: Option<broadcast::Sender<Event>>,
    cancel: CancellationToken,
    cursor: String,
    has_next: bool,
    accumulated: Vec<PagePayload>,
    requests_issued: u64,
    state: SessionState,
}

impl ExportSession {
    /// Start a fresh export of `task_name`
    pub fn new(task_name: TaskName, transport: Arc<dyn Transport>, sink: Arc<dyn Sink>) -> Self {
        Self {
            task_name,
            page_limit: None,
            transport,
            sink,
            events: None,
            cancel: CancellationToken::new(),
            cursor: String::new(),
            has_next: true,
            accumulated: Vec::new(),
            requests_issued: 0,
            state: SessionState::Active,
        }
    }

    /// Bound every page to `limit` records
    pub fn with_page_limit(mut self, limit: Option<NonZeroU32>) -> Self {
        self.page_limit = limit;
        self
    }

    /// Publish progress and completion on `events`
    pub fn with_events(mut self, events: broadcast::Sender<Event>) -> Self {
        self.events = Some(events);
        self
    }

    /// Abort the export when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Task being exported
    pub fn task_name(&self) -> &TaskName {
        &self.task_name
    }

    /// Cursor the next request will carry
    pub fn cursor(&self) -> &str {
        &self.cursor
    }

    /// Whether the server reported more pages
    pub fn has_next(&self) -> bool {
        self.has_next
    }

    /// Pages accumulated and not yet delivered
    pub fn pages_loaded(&self) -> usize {
        self.accumulated.len()
    }

    /// Requests sent by this session, including failed ones
    pub fn requests_issued(&self) -> u64 {
        self.requests_issued
    }

    /// Lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Load pages, and deliver the artifact once the server has no more
    ///
    /// With `fetch_all` every remaining page is requested back to back. Without
    /// it exactly one page is requested per call and the cursor is kept for the
    /// next call. A call made after the last page was loaded issues no request
    /// and delivers immediately.
    ///
    /// On a transport failure or cancellation the accumulated pages are
    /// discarded, nothing reaches the sink, and the session starts over from
    /// the first page on the next call.
    pub async fn export(&mut self, fetch_all: bool) -> Result<ExportOutcome, ExportError> {
        if self.state == SessionState::Delivered {
            return Err(ExportError::AlreadyDelivered {
                task: self.task_name.to_string(),
            });
        }

        loop {
            if !self.has_next {
                return self.deliver().await;
            }

            self.load_next_page().await?;

            if !fetch_all {
                return Ok(ExportOutcome::Paused {
                    pages: self.accumulated.len(),
                    has_next: self.has_next,
                });
            }
        }
    }

    async fn load_next_page(&mut self) -> Result<(), ExportError> {
        let query = ExportQuery {
            cursor: self.cursor.clone(),
            ..ExportQuery::first_page(self.task_name.clone(), self.page_limit)
        };

        debug!(
            task = %self.task_name,
            cursor = %query.cursor,
            limit = ?query.page_limit,
            "requesting result page"
        );
        self.requests_issued += 1;

        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = self.transport.fetch_page(&query) => Some(result),
        };

        let page = match fetched {
            Some(Ok(page)) => page,
            Some(Err(source)) => {
                let error = ExportError::Transport {
                    task: self.task_name.to_string(),
                    cursor: query.cursor,
                    source,
                };
                self.abort(&error);
                return Err(error);
            }
            None => {
                let error = ExportError::Cancelled {
                    task: self.task_name.to_string(),
                };
                self.abort(&error);
                return Err(error);
            }
        };

        let records = page.payload.record_count();
        self.cursor = page.next_cursor;
        self.has_next = page.has_next;
        self.accumulated.push(page.payload);

        self.emit(Event::ExportPageLoaded {
            task: self.task_name.to_string(),
            pages: self.accumulated.len(),
            records,
            has_next: self.has_next,
        });
        Ok(())
    }

    async fn deliver(&mut self) -> Result<ExportOutcome, ExportError> {
        let artifact = ExportArtifact {
            task_name: self.task_name.clone(),
            chunks: self.accumulated.clone(),
            assembled_at: Utc::now(),
        };
        let pages = artifact.pages();
        let records = artifact.record_count();

        if let Err(e) = self.sink.deliver(artifact).await {
            warn!(task = %self.task_name, error = %e, "export sink failed");
            return Err(ExportError::Sink {
                task: self.task_name.to_string(),
                reason: e.to_string(),
            });
        }

        self.accumulated.clear();
        self.state = SessionState::Delivered;
        info!(task = %self.task_name, pages, records, "export delivered");
        self.emit(Event::ExportComplete {
            task: self.task_name.to_string(),
            pages,
            records,
        });

        Ok(ExportOutcome::Delivered { pages, records })
    }

    fn abort(&mut self, error: &ExportError) {
        warn!(
            task = %self.task_name,
            discarded_pages = self.accumulated.len(),
            error = %error,
            "export aborted"
        );
        self.accumulated.clear();
        self.cursor.clear();
        self.has_next = true;
        self.emit(Event::ExportFailed {
            task: self.task_name.to_string(),
            error: error.to_string(),
        });
    }

    fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            // No subscribers is fine
            events.send(event).ok();
        }
    }
}

impl std::fmt::Debug for ExportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportSession")
            .field("task_name", &self.task_name)
            .field("page_limit", &self.page_limit)
            .field("cursor", &self.cursor)
            .field("has_next", &self.has_next)
            .field("pages_loaded", &self.accumulated.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
