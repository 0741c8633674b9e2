use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{Rejection, Result};
use crate::interfaces::remote::{LlmProbe, StatusSource};
use crate::interfaces::scheduler::ScheduledJob;
use crate::session::{Applied, PollTicket, PollTrigger, Session};
use crate::status::{MergePolicy, PollObservation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    pub cycle: u64,
    pub trigger: PollTrigger,
    pub desktop_ok: bool,
    pub llm_ok: bool,
    pub applied: Applied,
}

/// Fetches desktop status and probes the LLM backend concurrently, then
/// merges both slots into the session record.
pub struct StatusPoller {
    session: Arc<Session>,
    source: Arc<dyn StatusSource>,
    probe: Arc<dyn LlmProbe>,
    policy: MergePolicy,
    probe_prompt: String,
    period: Duration,
}

impl StatusPoller {
    pub fn new(
        session: Arc<Session>,
        source: Arc<dyn StatusSource>,
        probe: Arc<dyn LlmProbe>,
    ) -> Self {
        Self {
            session,
            source,
            probe,
            policy: MergePolicy::default(),
            probe_prompt: "ping".to_string(),
            period: Duration::from_secs(3),
        }
    }

    pub fn with_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_probe_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.probe_prompt = prompt.into();
        self
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// One on-demand cycle. `None` once the session is closed.
    pub async fn poll(&self) -> Option<PollReport> {
        self.poll_with(PollTrigger::Manual).await
    }

    pub async fn poll_with(&self, trigger: PollTrigger) -> Option<PollReport> {
        let ticket = self.session.begin_poll(trigger)?;
        Some(self.run_cycle(&ticket).await)
    }

    /// Runs a cycle under a ticket the caller already holds.
    pub async fn run_cycle(&self, ticket: &PollTicket<'_>) -> PollReport {
        let cycle = ticket.cycle();
        let (desktop, llm) = tokio::join!(
            self.source.fetch_status(),
            self.probe.probe(&self.probe_prompt)
        );

        let desktop = match desktop {
            Ok(status) => Some(status),
            Err(err) => {
                warn!(cycle, error = %err, "status source unavailable, keeping last known desktop state");
                None
            }
        };
        let llm = match llm {
            Ok(reachable) => Some(reachable),
            Err(err) => {
                warn!(cycle, error = %err, "llm probe failed, keeping last known llm state");
                None
            }
        };

        let observation = PollObservation { desktop, llm };
        let desktop_ok = observation.desktop.is_some();
        let llm_ok = observation.llm.is_some();
        let applied = ticket.apply(&observation.admitted(self.policy));

        let report = PollReport {
            cycle,
            trigger: ticket.trigger(),
            desktop_ok,
            llm_ok,
            applied,
        };
        debug!(?report, "poll cycle settled");
        report
    }

    /// Asks the bridge to reconnect and records the desktop flag it reports.
    pub async fn reconnect(&self) -> Result<bool> {
        let ticket = self
            .session
            .begin_poll(PollTrigger::Manual)
            .ok_or(Rejection::TornDown)?;
        match self.source.check_connection().await {
            Ok(connected) => {
                ticket.apply_desktop_connected(connected);
                info!(connected, "reconnect attempt finished");
                Ok(connected)
            }
            Err(err) => {
                warn!(error = %err, "reconnect request failed");
                Err(err)
            }
        }
    }
}

#[async_trait]
impl ScheduledJob for StatusPoller {
    fn name(&self) -> &str {
        "status_poller"
    }

    fn period(&self) -> Duration {
        self.period
    }

    async fn run(&self) -> Result<()> {
        self.poll_with(PollTrigger::Timer).await;
        Ok(())
    }
}
