use std::sync::Arc;

use tracing::{info, warn};

use crate::error::Result;
use crate::interfaces::remote::CommandExecutor;
use crate::poller::StatusPoller;
use crate::session::PollTrigger;
use crate::status::CommandResult;

/// Sends user instructions to the command executor.
///
/// A submission holds the session's dispatch slot from before the network
/// call until after the follow-up status refresh has been reserved, so busy
/// never drops between the command and its refresh.
pub struct CommandDispatcher {
    executor: Arc<dyn CommandExecutor>,
    poller: Arc<StatusPoller>,
}

impl CommandDispatcher {
    pub fn new(executor: Arc<dyn CommandExecutor>, poller: Arc<StatusPoller>) -> Self {
        Self { executor, poller }
    }

    /// Rejected with [`crate::error::Rejection`] when the prompt is blank, an
    /// operation is in flight, or the session is closed. Executor failures
    /// are not errors here; they come back as [`CommandResult::Failure`].
    pub async fn submit(&self, prompt: &str) -> Result<CommandResult> {
        let session = self.poller.session();
        let ticket = session.begin_dispatch(prompt)?;
        let prompt = prompt.trim();

        info!(prompt, "submitting command");
        let result = match self.executor.execute(prompt).await {
            Ok(payload) => CommandResult::Success(payload),
            Err(err) => {
                warn!(error = %err, "command failed");
                CommandResult::failure(err.detail())
            }
        };
        ticket.record(result.clone());

        let refresh = session.begin_poll(PollTrigger::AfterCommand);
        drop(ticket);
        if let Some(refresh) = refresh {
            self.poller.run_cycle(&refresh).await;
        }
        Ok(result)
    }
}
