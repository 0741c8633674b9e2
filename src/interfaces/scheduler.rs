use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// A job fired on a fixed period, first tick immediately at start.
///
/// Runs are detached from the timer, so a slow run never delays the next
/// tick; jobs that must not overlap decide that inside `run`.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &str;
    fn period(&self) -> Duration;
    async fn run(&self) -> Result<()>;
}
