//! Task status reads and completion polling.

use crate::endpoints::Action;
use crate::error::{Error, Result};
use crate::types::{Event, TaskName, TaskStatus};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::ScraperClient;

impl ScraperClient {
    /// Current run status of a task
    pub async fn task_status(&self, task: &TaskName) -> Result<TaskStatus> {
        let request = self.request(Action::TaskStatus, Some(task))?;
        Ok(self.send_json(request).await?)
    }

    /// Poll a task until its status is empty (finished)
    ///
    /// Polls every `poll_interval`, starting immediately. Every change of the
    /// status text is published as [`Event::TaskStatusChanged`]. A failed poll
    /// ends the wait with that error; cancelling `cancel` ends it with
    /// [`Error::Cancelled`].
    pub async fn wait_for_task(
        &self,
        task: &TaskName,
        cancel: &CancellationToken,
    ) -> Result<TaskStatus> {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_status: Option<String> = None;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(task = %task, "status polling cancelled");
                    return Err(Error::Cancelled);
                }
                _ = ticker.tick() => {}
            }

            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(task = %task, "status polling cancelled");
                    return Err(Error::Cancelled);
                }
                status = self.task_status(task) => status?,
            };

            if last_status.as_deref() != Some(status.status.as_str()) {
                debug!(task = %task, status = %status.status, "task status changed");
                self.emit(Event::TaskStatusChanged {
                    task: task.to_string(),
                    status: status.status.clone(),
                });
                last_status = Some(status.status.clone());
            }

            if status.is_finished() {
                info!(task = %task, "task finished");
                return Ok(status);
            }
        }
    }
}
