use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::config::ConsoleConfig;
use crate::dispatcher::CommandDispatcher;
use crate::error::Result;
use crate::interfaces::remote::{CommandExecutor, LlmProbe, StatusSource};
use crate::poller::{PollReport, StatusPoller};
use crate::providers::http::HttpBridge;
use crate::scheduler::Scheduler;
use crate::session::Session;
use crate::status::{CommandResult, StatusRecord};

/// The three remote collaborators the console talks to.
#[derive(Clone)]
pub struct Remotes {
    pub status: Arc<dyn StatusSource>,
    pub probe: Arc<dyn LlmProbe>,
    pub executor: Arc<dyn CommandExecutor>,
}

impl Remotes {
    pub fn http(config: &ConsoleConfig) -> Result<Self> {
        let bridge = Arc::new(HttpBridge::from_config(config)?);
        Ok(Self {
            status: bridge.clone(),
            probe: bridge.clone(),
            executor: bridge,
        })
    }
}

/// A mounted console session: status polling plus command dispatch.
///
/// Must be mounted inside a tokio runtime. Polling starts at mount and stops
/// at `teardown` (or drop); results of calls still in flight at that point
/// are discarded.
pub struct Console {
    session: Arc<Session>,
    poller: Arc<StatusPoller>,
    dispatcher: CommandDispatcher,
    scheduler: Scheduler,
}

impl Console {
    pub fn from_config(config: &ConsoleConfig) -> Result<Self> {
        config.validate()?;
        let remotes = Remotes::http(config)?;
        Ok(Self::mount(config, remotes))
    }

    pub fn mount(config: &ConsoleConfig, remotes: Remotes) -> Self {
        let session = Arc::new(Session::new());
        let poller = Arc::new(
            StatusPoller::new(session.clone(), remotes.status, remotes.probe)
                .with_policy(config.merge_policy)
                .with_probe_prompt(config.probe_prompt.clone())
                .with_period(config.poll_interval()),
        );
        let dispatcher = CommandDispatcher::new(remotes.executor, poller.clone());

        let mut scheduler = Scheduler::new();
        scheduler.register_job(poller.clone());
        scheduler.start();
        info!(
            interval_ms = config.poll_interval_ms,
            policy = ?config.merge_policy,
            "console mounted"
        );

        Self {
            session,
            poller,
            dispatcher,
            scheduler,
        }
    }

    pub fn status(&self) -> StatusRecord {
        self.session.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusRecord> {
        self.session.subscribe()
    }

    pub fn last_result(&self) -> Option<CommandResult> {
        self.session.command_result()
    }

    pub fn subscribe_results(&self) -> watch::Receiver<Option<CommandResult>> {
        self.session.subscribe_results()
    }

    pub fn is_busy(&self) -> bool {
        self.session.is_busy()
    }

    pub fn is_polling(&self) -> bool {
        self.scheduler.is_running()
    }

    pub async fn submit(&self, prompt: &str) -> Result<CommandResult> {
        self.dispatcher.submit(prompt).await
    }

    pub async fn refresh(&self) -> Option<PollReport> {
        self.poller.poll().await
    }

    pub async fn reconnect(&self) -> Result<bool> {
        self.poller.reconnect().await
    }

    /// Closes the session before stopping the timer so no late write lands.
    pub async fn teardown(mut self) {
        self.session.close();
        self.scheduler.stop().await;
        info!("console torn down");
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        self.session.close();
    }
}
