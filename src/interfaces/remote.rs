use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::status::DesktopStatus;

/// Reports connectivity and activity of the desktop application.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self) -> Result<DesktopStatus>;

    /// Asks the bridge to re-establish its desktop connection.
    async fn check_connection(&self) -> Result<bool>;
}

/// Lightweight reachability check for the language-model backend.
#[async_trait]
pub trait LlmProbe: Send + Sync {
    /// `Ok(false)` is a reachable endpoint reporting a failed probe; `Err` is a
    /// failed call.
    async fn probe(&self, prompt: &str) -> Result<bool>;
}

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, prompt: &str) -> Result<Value>;
}
