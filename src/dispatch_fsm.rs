use rust_fsm::*;

state_machine! {
    dispatch_flow(Idle)

    Idle(Submit) => Submitting,

    Submitting(Succeed) => Succeeded,
    Submitting(Fail) => Failed,
    Submitting(Abort) => Idle,

    Succeeded(Settle) => Idle,
    Failed(Settle) => Idle
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DispatchState {
    #[default]
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

impl DispatchState {
    /// Every state except `Idle` holds the busy flag.
    pub fn holds_busy(self) -> bool {
        !matches!(self, DispatchState::Idle)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchEvent {
    Submit,
    Succeed,
    Fail,
    Abort,
    Settle,
}

fn hydrate(machine: &mut dispatch_flow::StateMachine, state: DispatchState) -> Result<(), ()> {
    match state {
        DispatchState::Idle => Ok(()),
        DispatchState::Submitting => {
            machine.consume(&dispatch_flow::Input::Submit).map_err(|_| ())?;
            Ok(())
        }
        DispatchState::Succeeded => {
            machine.consume(&dispatch_flow::Input::Submit).map_err(|_| ())?;
            machine.consume(&dispatch_flow::Input::Succeed).map_err(|_| ())?;
            Ok(())
        }
        DispatchState::Failed => {
            machine.consume(&dispatch_flow::Input::Submit).map_err(|_| ())?;
            machine.consume(&dispatch_flow::Input::Fail).map_err(|_| ())?;
            Ok(())
        }
    }
}

fn expected_next_state(current: DispatchState, event: DispatchEvent) -> Option<DispatchState> {
    match (current, event) {
        (DispatchState::Idle, DispatchEvent::Submit) => Some(DispatchState::Submitting),
        (DispatchState::Submitting, DispatchEvent::Succeed) => Some(DispatchState::Succeeded),
        (DispatchState::Submitting, DispatchEvent::Fail) => Some(DispatchState::Failed),
        (DispatchState::Submitting, DispatchEvent::Abort) => Some(DispatchState::Idle),
        (DispatchState::Succeeded, DispatchEvent::Settle) => Some(DispatchState::Idle),
        (DispatchState::Failed, DispatchEvent::Settle) => Some(DispatchState::Idle),
        _ => None,
    }
}

/// Guarded transition; `None` means the event is not allowed from `current`.
pub fn transition(current: DispatchState, event: DispatchEvent) -> Option<DispatchState> {
    let mut machine = dispatch_flow::StateMachine::new();
    hydrate(&mut machine, current).ok()?;

    let input = match event {
        DispatchEvent::Submit => dispatch_flow::Input::Submit,
        DispatchEvent::Succeed => dispatch_flow::Input::Succeed,
        DispatchEvent::Fail => dispatch_flow::Input::Fail,
        DispatchEvent::Abort => dispatch_flow::Input::Abort,
        DispatchEvent::Settle => dispatch_flow::Input::Settle,
    };

    machine.consume(&input).ok()?;
    expected_next_state(current, event)
}
