#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use qgis_console::console::Remotes;
use qgis_console::dispatcher::CommandDispatcher;
use qgis_console::error::ConsoleError;
use qgis_console::interfaces::remote::{CommandExecutor, LlmProbe, StatusSource};
use qgis_console::poller::StatusPoller;
use qgis_console::session::Session;
use qgis_console::status::{parse_activity, DesktopStatus, MergePolicy};
use serde_json::Value;
use tokio::sync::{Barrier, Semaphore};

pub type Outcome<T> = std::result::Result<T, String>;

/// Replays queued outcomes, then repeats the fallback.
pub struct Script<T> {
    queue: Mutex<VecDeque<Outcome<T>>>,
    fallback: Outcome<T>,
    gate: Option<Arc<Semaphore>>,
    barrier: Option<Arc<Barrier>>,
    calls: AtomicUsize,
}

impl<T: Clone> Script<T> {
    pub fn always(fallback: Outcome<T>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback,
            gate: None,
            barrier: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn meeting(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }

    pub fn push(&self, outcome: Outcome<T>) {
        self.queue.lock().unwrap().push_back(outcome);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn next(&self) -> qgis_console::Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        let outcome = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        outcome.map_err(ConsoleError::Http)
    }
}

pub struct FakeSource {
    pub status: Script<DesktopStatus>,
    pub connection: Script<bool>,
}

impl FakeSource {
    pub fn new(status: Script<DesktopStatus>) -> Self {
        Self {
            status,
            connection: Script::always(Ok(true)),
        }
    }
}

#[async_trait]
impl StatusSource for FakeSource {
    async fn fetch_status(&self) -> qgis_console::Result<DesktopStatus> {
        self.status.next().await
    }

    async fn check_connection(&self) -> qgis_console::Result<bool> {
        self.connection.next().await
    }
}

pub struct FakeProbe {
    pub script: Script<bool>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeProbe {
    pub fn new(script: Script<bool>) -> Self {
        Self {
            script,
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LlmProbe for FakeProbe {
    async fn probe(&self, prompt: &str) -> qgis_console::Result<bool> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.script.next().await
    }
}

pub struct FakeExecutor {
    pub script: Script<Value>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeExecutor {
    pub fn new(script: Script<Value>) -> Self {
        Self {
            script,
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CommandExecutor for FakeExecutor {
    async fn execute(&self, prompt: &str) -> qgis_console::Result<Value> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.script.next().await
    }
}

pub fn desktop(connected: bool, dir: &str, activity: Option<&str>) -> DesktopStatus {
    DesktopStatus {
        connected,
        current_directory: dir.to_string(),
        last_activity: activity.and_then(parse_activity),
    }
}

pub struct Harness {
    pub session: Arc<Session>,
    pub source: Arc<FakeSource>,
    pub probe: Arc<FakeProbe>,
    pub executor: Arc<FakeExecutor>,
    pub poller: Arc<StatusPoller>,
    pub dispatcher: CommandDispatcher,
}

impl Harness {
    pub fn new(source: FakeSource, probe: FakeProbe, executor: FakeExecutor) -> Self {
        Self::with_policy(source, probe, executor, MergePolicy::PerSource)
    }

    pub fn with_policy(
        source: FakeSource,
        probe: FakeProbe,
        executor: FakeExecutor,
        policy: MergePolicy,
    ) -> Self {
        let session = Arc::new(Session::new());
        let source = Arc::new(source);
        let probe = Arc::new(probe);
        let executor = Arc::new(executor);
        let poller = Arc::new(
            StatusPoller::new(session.clone(), source.clone(), probe.clone()).with_policy(policy),
        );
        let dispatcher = CommandDispatcher::new(executor.clone(), poller.clone());
        Self {
            session,
            source,
            probe,
            executor,
            poller,
            dispatcher,
        }
    }

    pub fn healthy() -> Self {
        Self::new(
            FakeSource::new(Script::always(Ok(desktop(true, "/data", None)))),
            FakeProbe::new(Script::always(Ok(true))),
            FakeExecutor::new(Script::always(Ok(serde_json::json!({"status": "success"})))),
        )
    }
}

pub fn remotes(source: Arc<FakeSource>, probe: Arc<FakeProbe>, executor: Arc<FakeExecutor>) -> Remotes {
    Remotes {
        status: source,
        probe,
        executor,
    }
}

/// Waits until `condition` holds, failing the test after two seconds.
pub async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
