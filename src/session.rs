use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::debug;

use crate::dispatch_fsm::{transition, DispatchEvent, DispatchState};
use crate::error::{Rejection, Result};
use crate::status::{CommandResult, PollObservation, StatusRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollTrigger {
    Timer,
    AfterCommand,
    Manual,
}

#[derive(Debug, Default)]
struct Ledger {
    active: bool,
    polls_in_flight: usize,
    dispatch: DispatchState,
    next_cycle: u64,
    desktop_cycle: u64,
    llm_cycle: u64,
}

impl Ledger {
    fn busy(&self) -> bool {
        self.polls_in_flight > 0 || self.dispatch.holds_busy()
    }
}

/// Which slots of an observation actually reached the record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Applied {
    pub desktop: bool,
    pub llm: bool,
}

impl Applied {
    pub fn any(self) -> bool {
        self.desktop || self.llm
    }
}

/// Session-lifetime state shared by the poller, the dispatcher and readers.
///
/// All mutation goes through tickets handed out by `begin_poll` and
/// `begin_dispatch`; the busy flag is derived from the outstanding tickets and
/// is never set directly. Once `close` runs every write becomes a no-op.
pub struct Session {
    ledger: Mutex<Ledger>,
    record: watch::Sender<StatusRecord>,
    result: watch::Sender<Option<CommandResult>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (record, _) = watch::channel(StatusRecord::default());
        let (result, _) = watch::channel(None);
        Self {
            ledger: Mutex::new(Ledger {
                active: true,
                ..Ledger::default()
            }),
            record,
            result,
        }
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> StatusRecord {
        self.record.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusRecord> {
        self.record.subscribe()
    }

    pub fn command_result(&self) -> Option<CommandResult> {
        self.result.borrow().clone()
    }

    pub fn subscribe_results(&self) -> watch::Receiver<Option<CommandResult>> {
        self.result.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.ledger().busy()
    }

    pub fn polls_in_flight(&self) -> usize {
        self.ledger().polls_in_flight
    }

    pub fn dispatch_state(&self) -> DispatchState {
        self.ledger().dispatch
    }

    /// Marks the session torn down. The record keeps its last published value.
    pub fn close(&self) {
        let mut ledger = self.ledger();
        if ledger.active {
            ledger.active = false;
            debug!(
                polls_in_flight = ledger.polls_in_flight,
                dispatch = ?ledger.dispatch,
                "session closed"
            );
        }
    }

    fn publish_busy(&self, ledger: &Ledger) {
        if !ledger.active {
            return;
        }
        let busy = ledger.busy();
        self.record.send_if_modified(|record| {
            if record.busy == busy {
                return false;
            }
            record.busy = busy;
            true
        });
    }

    /// Registers a poll cycle. Timer ticks are skipped while another cycle is
    /// still in flight; other triggers always get a ticket while active.
    pub fn begin_poll(&self, trigger: PollTrigger) -> Option<PollTicket<'_>> {
        let mut ledger = self.ledger();
        if !ledger.active {
            return None;
        }
        if trigger == PollTrigger::Timer && ledger.polls_in_flight > 0 {
            debug!(in_flight = ledger.polls_in_flight, "skipping timer tick");
            return None;
        }
        ledger.polls_in_flight += 1;
        ledger.next_cycle += 1;
        let cycle = ledger.next_cycle;
        self.publish_busy(&ledger);
        Some(PollTicket {
            session: self,
            cycle,
            trigger,
        })
    }

    /// Moves the dispatch machine to `Submitting`, raising busy before any
    /// network call is made.
    pub fn begin_dispatch(&self, prompt: &str) -> Result<DispatchTicket<'_>> {
        if prompt.trim().is_empty() {
            return Err(Rejection::EmptyPrompt.into());
        }
        let mut ledger = self.ledger();
        if !ledger.active {
            return Err(Rejection::TornDown.into());
        }
        if ledger.busy() {
            return Err(Rejection::Busy.into());
        }
        let next = transition(ledger.dispatch, DispatchEvent::Submit).ok_or(Rejection::Busy)?;
        ledger.dispatch = next;
        self.publish_busy(&ledger);
        Ok(DispatchTicket { session: self })
    }
}

/// An in-flight poll cycle. Dropping it releases its share of busy.
pub struct PollTicket<'a> {
    session: &'a Session,
    cycle: u64,
    trigger: PollTrigger,
}

impl PollTicket<'_> {
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn trigger(&self) -> PollTrigger {
        self.trigger
    }

    /// Writes the admitted slots unless a later cycle already wrote them.
    pub fn apply(&self, observation: &PollObservation) -> Applied {
        let mut ledger = self.session.ledger();
        let mut applied = Applied::default();
        if !ledger.active {
            return applied;
        }
        let cycle = self.cycle;
        self.session.record.send_if_modified(|record| {
            let before = record.clone();
            if let Some(desktop) = &observation.desktop {
                if cycle > ledger.desktop_cycle {
                    record.apply_desktop(desktop);
                    ledger.desktop_cycle = cycle;
                    applied.desktop = true;
                }
            }
            if let Some(reachable) = observation.llm {
                if cycle > ledger.llm_cycle {
                    record.apply_llm(reachable);
                    ledger.llm_cycle = cycle;
                    applied.llm = true;
                }
            }
            *record != before
        });
        applied
    }

    /// Writes only the desktop connectivity flag, e.g. after a reconnect.
    pub fn apply_desktop_connected(&self, connected: bool) -> bool {
        let mut ledger = self.session.ledger();
        if !ledger.active || self.cycle <= ledger.desktop_cycle {
            return false;
        }
        ledger.desktop_cycle = self.cycle;
        self.session.record.send_if_modified(|record| {
            let changed = record.desktop_connected != connected;
            record.desktop_connected = connected;
            changed
        });
        true
    }
}

impl Drop for PollTicket<'_> {
    fn drop(&mut self) {
        let mut ledger = self.session.ledger();
        ledger.polls_in_flight = ledger.polls_in_flight.saturating_sub(1);
        self.session.publish_busy(&ledger);
    }
}

/// The submission slot of the dispatch machine. Dropping it returns the
/// machine to `Idle` on every exit path.
pub struct DispatchTicket<'a> {
    session: &'a Session,
}

impl DispatchTicket<'_> {
    pub fn record(&self, result: CommandResult) {
        let mut ledger = self.session.ledger();
        let event = if result.is_success() {
            DispatchEvent::Succeed
        } else {
            DispatchEvent::Fail
        };
        if let Some(next) = transition(ledger.dispatch, event) {
            ledger.dispatch = next;
        }
        if ledger.active {
            self.session.result.send_replace(Some(result));
        }
    }
}

impl Drop for DispatchTicket<'_> {
    fn drop(&mut self) {
        let mut ledger = self.session.ledger();
        let event = if ledger.dispatch == DispatchState::Submitting {
            DispatchEvent::Abort
        } else {
            DispatchEvent::Settle
        };
        ledger.dispatch = transition(ledger.dispatch, event).unwrap_or(DispatchState::Idle);
        self.session.publish_busy(&ledger);
    }
}
