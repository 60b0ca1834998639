//! # webscraper-client
//!
//! Client library for a scraper configuration server: edit and run scraper
//! tasks, poll their status, and pull a task's full result set out through
//! cursor-paginated bulk export.
//!
//! ## Design Philosophy
//!
//! webscraper-client is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Progress and completion are published as events
//! - **Dialect-aware** - Works against both server URL schemes
//!
//! ## Quick Start
//!
//! ```no_run
//! use webscraper_client::{Config, ScraperClient, TaskName};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ScraperClient::new(Config::for_server("http://localhost:8000"))?;
//!
//!     // Subscribe to events
//!     let mut events = client.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             if let Some(message) = event.flash_message() {
//!                 println!("{message}");
//!             }
//!         }
//!     });
//!
//!     let path = client
//!         .export_all(TaskName::new("immowelt.de")?, CancellationToken::new())
//!         .await?;
//!     println!("exported to {}", path.display());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Scraper server client (decomposed into focused submodules)
pub mod client;
/// Configuration types
pub mod config;
/// Endpoint table for both server dialects
pub mod endpoints;
/// Error types
pub mod error;
/// Cursor-paginated bulk export
pub mod export;
/// Task editor form
pub mod form;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use client::ScraperClient;
pub use config::{Config, EndpointStyle, ExportConfig, FileCollisionAction, HttpConfig};
pub use endpoints::{Action, EndpointRequest, Endpoints};
pub use error::{Error, ExportError, Result, TransportError};
pub use export::{
    ExportArtifact, ExportOutcome, ExportSession, FileSink, MemorySink, SessionState, Sink,
    Transport,
};
pub use form::{SelectorSpec, SelectorType, TaskForm, UrlSelectorSpec};
pub use types::{
    EXPORT_COMPLETE_MESSAGE, EXPORT_PROGRESS_MESSAGE, Event, ExportPage, ExportQuery,
    PagePayload, TaskName, TaskStatus, ViewMode,
};

use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Export every page of a task, aborting cleanly on a termination signal.
///
/// Runs [`ScraperClient::export_all`] and cancels it when the process
/// receives a termination signal. An interrupted export writes nothing.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use webscraper_client::{Config, ScraperClient, TaskName, export_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = ScraperClient::new(Config::default())?;
///     let path = export_with_shutdown(&client, TaskName::new("alpha")?).await?;
///     println!("{}", path.display());
///     Ok(())
/// }
/// ```
pub async fn export_with_shutdown(client: &ScraperClient, task: TaskName) -> Result<PathBuf> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            cancel.cancel();
        })
    };

    let result = client.export_all(task, cancel).await;
    watcher.abort();
    result
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal, cancelling export");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C), cancelling export");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C), cancelling export");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal, cancelling export");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal, cancelling export");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    }
}
