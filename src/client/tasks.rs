//! Task actions: save, run, test, create and delete.

use crate::endpoints::Action;
use crate::error::{Result, TransportError};
use crate::form::TaskForm;
use crate::types::{Event, TaskName};
use serde::Deserialize;
use tracing::{info, warn};

use super::ScraperClient;

/// Body of actions answering with a message
#[derive(Debug, Default, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    results: Option<String>,
}

/// One entry of a selector listing; servers send either names or selector objects
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SelectorEntry {
    Name(String),
    Selector { name: String },
}

impl SelectorEntry {
    fn into_name(self) -> String {
        match self {
            SelectorEntry::Name(name) | SelectorEntry::Selector { name } => name,
        }
    }
}

impl ScraperClient {
    /// Store a task configuration
    ///
    /// The form is validated first; nothing is sent for an invalid form.
    pub async fn save_task(&self, form: &TaskForm) -> Result<()> {
        form.validate()?;

        let request = self
            .request(Action::SaveTask, Some(&form.name))?
            .params(form.to_form_pairs());
        self.send_ack(request).await?;

        info!(task = %form.name, "task saved");
        self.emit(Event::TaskSaved {
            task: form.name.to_string(),
        });
        Ok(())
    }

    /// Save the task, then start a run of it
    ///
    /// The run request is only sent after the save has been acknowledged.
    pub async fn run_task(&self, form: &TaskForm) -> Result<()> {
        self.save_task(form).await?;
        self.run_saved_task(&form.name).await
    }

    /// Start a run of the task as currently stored on the server
    pub async fn run_saved_task(&self, task: &TaskName) -> Result<()> {
        let request = self.request(Action::RunTask, Some(task))?;
        let endpoint = request.endpoint();
        let response = self.send(request).await?;

        // A failed run is reported as 200 with the exception text in `results`
        let body = response
            .bytes()
            .await
            .map_err(|source| TransportError::Request {
                endpoint: endpoint.clone(),
                source,
            })?;
        if let Ok(MessageResponse {
            results: Some(message),
        }) = serde_json::from_slice::<MessageResponse>(&body)
            && !message.is_empty()
        {
            warn!(task = %task, error = %message, "server rejected task run");
            return Err(TransportError::Rejected { endpoint, message }.into());
        }

        info!(task = %task, "task run started");
        self.emit(Event::TaskRunStarted {
            task: task.to_string(),
        });
        Ok(())
    }

    /// Save the task, then run it once without storing results
    ///
    /// Returns the preview message the server renders from the first page.
    pub async fn test_task(&self, form: &TaskForm) -> Result<String> {
        self.save_task(form).await?;

        let request = self.request(Action::TestTask, Some(&form.name))?;
        let response: MessageResponse = self.send_json(request).await?;
        Ok(response.results.unwrap_or_default())
    }

    /// Create an empty task
    ///
    /// Blank names are rejected before any request is made.
    pub async fn create_task(&self, name: &str) -> Result<TaskName> {
        let task = TaskName::new(name)?;

        let request = self.request(Action::CreateTask, Some(&task))?;
        self.send_ack(request).await?;

        info!(task = %task, "task created");
        self.emit(Event::TaskCreated {
            task: task.to_string(),
        });
        Ok(task)
    }

    /// Delete every stored result of a task
    pub async fn delete_results(&self, task: &TaskName) -> Result<()> {
        let request = self.request(Action::DeleteResults, Some(task))?;
        self.send_ack(request).await?;

        info!(task = %task, "task results deleted");
        self.emit(Event::ResultsDeleted {
            task: task.to_string(),
        });
        Ok(())
    }

    /// Delete a task and its results
    pub async fn delete_task(&self, task: &TaskName) -> Result<()> {
        let request = self.request(Action::DeleteTask, Some(task))?;
        self.send_ack(request).await?;

        info!(task = %task, "task deleted");
        self.emit(Event::TaskDeleted {
            task: task.to_string(),
        });
        Ok(())
    }

    /// Selector names of a task, in the task's order
    ///
    /// Used to fill the field choices of a URL selector that reads another
    /// task's results.
    pub async fn task_selector_names(&self, task: &TaskName) -> Result<Vec<String>> {
        let request = self.request(Action::SelectorNames, Some(task))?;
        let entries: Vec<SelectorEntry> = self.send_json(request).await?;
        Ok(entries.into_iter().map(SelectorEntry::into_name).collect())
    }
}
