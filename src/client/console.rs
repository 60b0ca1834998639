//! Developer console commands.

use crate::endpoints::Action;
use crate::error::{Error, Result};
use serde::Deserialize;
use tracing::debug;

use super::ScraperClient;

#[derive(Debug, Deserialize)]
struct CommandResponse {
    #[serde(default)]
    results: String,
}

impl ScraperClient {
    /// Evaluate a command on the server and return its printed result
    ///
    /// The server evaluates the command with full privileges; only point this
    /// at servers you control.
    pub async fn run_command(&self, command: &str) -> Result<String> {
        if command.trim().is_empty() {
            return Err(Error::validation("command", "must not be empty"));
        }

        debug!(command_len = command.len(), "running console command");
        let request = self
            .request(Action::RunCommand, None)?
            .param("command", command);
        let response: CommandResponse = self.send_json(request).await?;
        Ok(response.results)
    }
}
