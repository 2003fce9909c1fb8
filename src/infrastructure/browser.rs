//! Browser session abstraction
//!
//! The engine never talks to an automation runtime directly. It drives a
//! `BrowserPage` obtained from a `SessionFactory`, which keeps browser-process
//! lifecycle outside the crate and lets tests substitute scripted pages.

use crate::domain::SiteTarget;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Transport / session level failures reported by a page
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Operation '{operation}' timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("No element matches selector: {selector}")]
    ElementNotFound { selector: String },

    #[error("Operation not supported by this session: {operation}")]
    Unsupported { operation: String },

    #[error("Session is closed")]
    Closed,

    #[error("Transport error: {0}")]
    Transport(String),
}

impl SessionError {
    /// Worth retrying at the point of occurrence
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Navigation { .. } | Self::Timeout { .. } | Self::Transport(_))
    }

    /// The session itself is gone; nothing further can succeed on it
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Closed)
    }

    pub fn timeout(operation: &str, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.to_string(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Captured page state used for failure diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub bytes: Vec<u8>,
    /// File extension without the dot ("png", "html", ...)
    pub extension: String,
}

/// One open page inside an isolated browsing context.
///
/// Every waiting operation takes an explicit timeout; operations without one
/// are expected to be bounded by the caller (see [`bounded`]).
#[async_trait]
pub trait BrowserPage: Send {
    async fn goto(&mut self, url: &str, timeout: Duration) -> SessionResult<()>;

    async fn reload(&mut self, timeout: Duration) -> SessionResult<()>;

    /// `Ok(false)` when the idle signal did not fire within `timeout`
    async fn wait_for_network_idle(&mut self, timeout: Duration) -> SessionResult<bool>;

    /// Rendered document markup
    async fn content(&mut self) -> SessionResult<String>;

    fn current_url(&self) -> String;

    /// Whether the first element matching `selector` is visible
    async fn is_visible(&mut self, selector: &str) -> SessionResult<bool>;

    /// Activate the first element matching `selector`
    async fn click(&mut self, selector: &str) -> SessionResult<()>;

    async fn snapshot(&mut self) -> SessionResult<Snapshot>;

    async fn close(&mut self) -> SessionResult<()>;
}

/// Creates one isolated page per run; pages are never shared between runs
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, target: &SiteTarget) -> SessionResult<Box<dyn BrowserPage>>;
}

/// Bound a session operation by `timeout`
pub async fn bounded<T, F>(operation: &str, timeout: Duration, fut: F) -> SessionResult<T>
where
    F: Future<Output = SessionResult<T>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or_else(|_| Err(SessionError::timeout(operation, timeout)))
}
