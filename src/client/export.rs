//! Bulk export over HTTP and spreadsheet downloads.

use crate::config::EndpointStyle;
use crate::endpoints::Action;
use crate::error::{Error, Result, TransportError};
use crate::export::{ExportOutcome, ExportSession, FileSink, Sink, Transport};
use crate::types::{ExportPage, ExportQuery, TaskName};
use crate::utils::{filename_from_response, get_unique_path};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::ScraperClient;

#[async_trait]
impl Transport for ScraperClient {
    async fn fetch_page(&self, query: &ExportQuery) -> std::result::Result<ExportPage, TransportError> {
        let request = self
            .request(Action::FetchPage, None)?
            .params(query.form_fields());
        self.send_json(request).await
    }
}

impl ScraperClient {
    /// Export session writing to the configured output file
    ///
    /// The session uses the configured page limit and publishes its progress
    /// on this client's event channel.
    pub fn export_session(&self, task: TaskName) -> ExportSession {
        let sink = Arc::new(FileSink::from_config(&self.config.export));
        self.export_session_with_sink(task, sink)
    }

    /// Export session delivering to `sink`
    pub fn export_session_with_sink(&self, task: TaskName, sink: Arc<dyn Sink>) -> ExportSession {
        ExportSession::new(task, Arc::new(self.clone()), sink)
            .with_page_limit(self.config.export.page_limit)
            .with_events(self.event_tx.clone())
    }

    /// Fetch every page of a task's results and write them to the output file
    ///
    /// Returns the path that was written, which differs from the configured
    /// one when an existing file forced a rename.
    pub async fn export_all(&self, task: TaskName, cancel: CancellationToken) -> Result<PathBuf> {
        let sink = Arc::new(FileSink::from_config(&self.config.export));
        let mut session = self
            .export_session_with_sink(task, sink.clone())
            .with_cancellation(cancel);

        match session.export(true).await? {
            ExportOutcome::Delivered { .. } => {}
            ExportOutcome::Paused { .. } => {
                return Err(Error::Other(
                    "export stopped before the last page".to_string(),
                ));
            }
        }

        sink.written_paths()
            .pop()
            .ok_or_else(|| Error::Other("export delivered without writing a file".to_string()))
    }

    /// Download a task's results as a spreadsheet into `dir`
    pub async fn download_spreadsheet(&self, task: &TaskName, dir: &Path) -> Result<PathBuf> {
        let request = self.request(Action::ExportSpreadsheet, Some(task))?;
        let endpoint = request.endpoint();
        // Only the path dialect ends its URL with the file name
        let url = match self.endpoints.style() {
            EndpointStyle::PathSegment => request.url.to_string(),
            EndpointStyle::QueryParam => String::new(),
        };

        let response = self.send(request).await?;
        let fallback = format!("{}.xlsx", task);
        let file_name = filename_from_response(&response, &url, &fallback);
        let bytes = response
            .bytes()
            .await
            .map_err(|source| TransportError::Request { endpoint, source })?;

        tokio::fs::create_dir_all(dir).await?;
        let target = get_unique_path(&dir.join(file_name), self.config.export.file_collision)?;
        tokio::fs::write(&target, &bytes).await?;

        info!(task = %task, path = %target.display(), bytes = bytes.len(), "spreadsheet downloaded");
        Ok(target)
    }

    /// Task configuration as the server renders it for export
    pub async fn export_task_spec(&self, task: &TaskName) -> Result<String> {
        let request = self.request(Action::ExportTask, Some(task))?;
        let endpoint = request.endpoint();
        let response = self.send(request).await?;
        let text = response
            .text()
            .await
            .map_err(|source| TransportError::Request { endpoint, source })?;

        debug!(task = %task, bytes = text.len(), "task specification exported");
        Ok(text)
    }
}
