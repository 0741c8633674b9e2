mod support;

use std::sync::Arc;
use std::time::Duration;

use qgis_console::session::PollTrigger;
use qgis_console::status::{parse_activity, MergePolicy};
use serde_json::json;
use tokio::sync::{Barrier, Semaphore};

use support::{desktop, eventually, FakeExecutor, FakeProbe, FakeSource, Harness, Script};

fn idle_executor() -> FakeExecutor {
    FakeExecutor::new(Script::always(Ok(json!({}))))
}

#[tokio::test]
async fn status_and_probe_calls_are_issued_concurrently() {
    let barrier = Arc::new(Barrier::new(2));
    let harness = Harness::new(
        FakeSource::new(Script::always(Ok(desktop(true, "/data", None))).meeting(barrier.clone())),
        FakeProbe::new(Script::always(Ok(true)).meeting(barrier)),
        idle_executor(),
    );

    let report = tokio::time::timeout(Duration::from_secs(2), harness.poller.poll())
        .await
        .expect("sequential calls would never meet at the barrier")
        .expect("session is active");
    assert!(report.desktop_ok && report.llm_ok);
    assert!(report.applied.desktop && report.applied.llm);

    let record = harness.session.snapshot();
    assert!(record.desktop_connected);
    assert!(record.llm_connected);
    assert_eq!(record.current_directory, "/data");
    assert!(!record.busy);
}

#[tokio::test]
async fn probe_failure_keeps_llm_state_and_applies_desktop_fields() {
    let source = Script::always(Ok(desktop(true, "/data", Some("2024-05-01 10:30:00"))));
    source.push(Ok(desktop(false, "/old", None)));
    let probe = Script::always(Err("llm unreachable".to_string()));
    probe.push(Ok(true));
    let harness = Harness::new(FakeSource::new(source), FakeProbe::new(probe), idle_executor());

    harness.poller.poll().await.unwrap();
    let record = harness.session.snapshot();
    assert!(record.llm_connected);
    assert_eq!(record.current_directory, "/old");

    let report = harness.poller.poll().await.unwrap();
    assert!(report.desktop_ok);
    assert!(!report.llm_ok);

    let record = harness.session.snapshot();
    assert!(record.desktop_connected);
    assert_eq!(record.current_directory, "/data");
    assert_eq!(record.last_activity, parse_activity("2024-05-01 10:30:00"));
    assert!(record.llm_connected);
    assert!(!record.busy);
}

#[tokio::test]
async fn alternating_failures_never_regress_to_stale_values() {
    let steps: Vec<(Option<&str>, Option<bool>)> = vec![
        (Some("/a"), Some(true)),
        (None, Some(false)),
        (Some("/b"), None),
        (None, None),
        (Some("/c"), Some(true)),
        (None, Some(true)),
        (Some("/d"), None),
        (None, None),
    ];

    let source = Script::always(Err("unused".to_string()));
    let probe = Script::always(Err("unused".to_string()));
    for (dir, reachable) in &steps {
        source.push(match dir {
            Some(dir) => Ok(desktop(true, dir, None)),
            None => Err("status endpoint down".to_string()),
        });
        probe.push(match reachable {
            Some(reachable) => Ok(*reachable),
            None => Err("probe endpoint down".to_string()),
        });
    }
    let harness = Harness::new(FakeSource::new(source), FakeProbe::new(probe), idle_executor());

    let mut expected_dir = String::new();
    let mut expected_connected = false;
    let mut expected_llm = false;
    for (dir, reachable) in steps {
        if let Some(dir) = dir {
            expected_dir = dir.to_string();
            expected_connected = true;
        }
        if let Some(reachable) = reachable {
            expected_llm = reachable;
        }
        harness.poller.poll().await.unwrap();

        let record = harness.session.snapshot();
        assert_eq!(record.current_directory, expected_dir);
        assert_eq!(record.desktop_connected, expected_connected);
        assert_eq!(record.llm_connected, expected_llm);
        assert!(!record.busy);
    }
}

#[tokio::test]
async fn joint_only_policy_skips_partial_cycles() {
    let source = Script::always(Ok(desktop(true, "/data", None)));
    let probe = Script::always(Err("probe down".to_string()));
    let harness = Harness::with_policy(
        FakeSource::new(source),
        FakeProbe::new(probe),
        idle_executor(),
        MergePolicy::JointOnly,
    );

    let report = harness.poller.poll().await.unwrap();
    assert!(report.desktop_ok);
    assert!(!report.applied.any());

    let record = harness.session.snapshot();
    assert!(!record.desktop_connected);
    assert!(record.current_directory.is_empty());
    assert!(!record.busy);
}

#[tokio::test]
async fn reachable_probe_reporting_failure_marks_llm_offline() {
    let probe = Script::always(Ok(false));
    probe.push(Ok(true));
    let harness = Harness::new(
        FakeSource::new(Script::always(Ok(desktop(true, "/data", None)))),
        FakeProbe::new(probe),
        idle_executor(),
    );

    harness.poller.poll().await.unwrap();
    assert!(harness.session.snapshot().llm_connected);
    harness.poller.poll().await.unwrap();
    assert!(!harness.session.snapshot().llm_connected);
    assert_eq!(
        harness.probe.prompts.lock().unwrap().as_slice(),
        ["ping".to_string(), "ping".to_string()]
    );
}

#[tokio::test]
async fn busy_is_held_for_the_whole_cycle() {
    let gate = Arc::new(Semaphore::new(0));
    let harness = Harness::new(
        FakeSource::new(Script::always(Ok(desktop(true, "/data", None))).gated(gate.clone())),
        FakeProbe::new(Script::always(Ok(true))),
        idle_executor(),
    );

    let poller = harness.poller.clone();
    let cycle = tokio::spawn(async move { poller.poll_with(PollTrigger::Timer).await });

    let source = harness.source.clone();
    eventually(|| source.status.calls() == 1).await;
    assert!(harness.session.snapshot().busy);
    assert!(harness.poller.poll_with(PollTrigger::Timer).await.is_none());

    gate.add_permits(1);
    let report = cycle.await.unwrap().unwrap();
    assert_eq!(report.trigger, PollTrigger::Timer);
    assert!(!harness.session.snapshot().busy);
    assert_eq!(harness.source.status.calls(), 1);
}

#[tokio::test]
async fn reconnect_updates_only_desktop_flag() {
    let harness = Harness::healthy();
    harness.poller.poll().await.unwrap();

    harness.source.connection.push(Ok(false));
    let connected = harness.poller.reconnect().await.unwrap();
    assert!(!connected);

    let record = harness.session.snapshot();
    assert!(!record.desktop_connected);
    assert_eq!(record.current_directory, "/data");
    assert!(record.llm_connected);
    assert!(!record.busy);

    harness.source.connection.push(Err("bridge down".to_string()));
    assert!(harness.poller.reconnect().await.is_err());
    assert!(!harness.session.snapshot().busy);
}

#[tokio::test]
async fn closed_session_ignores_poll_requests() {
    let harness = Harness::healthy();
    harness.session.close();
    assert!(harness.poller.poll().await.is_none());
    assert_eq!(harness.source.status.calls(), 0);
    assert_eq!(harness.probe.script.calls(), 0);
}
