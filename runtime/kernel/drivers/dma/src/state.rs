// Licensed under the Apache-2.0 license

//! Per-channel lifecycle.
//!
//! `Reset` is left by engine bring-up (`Init`) or directly by starting a
//! chain. A running channel returns to `Idle` when it is disabled or when
//! its last active descriptor completes.

use smlang::statemachine;

statemachine! {
    derive_states: [Debug, Clone, Copy, Eq],
    derive_events: [Clone, Copy, Debug],
    transitions: {
        *Reset + Init = Idle,
        Reset + Start = Running,
        Reset + Stop = Reset,

        Idle + Start = Running,
        Idle + Stop = Idle,

        Running + Start = Running,
        Running + Freeze = Frozen,
        Running + Unfreeze = Running,
        Running + Stop = Idle,
        Running + Drained = Idle,

        Frozen + Start = Frozen,
        Frozen + Freeze = Frozen,
        Frozen + Unfreeze = Running,
        Frozen + Stop = Idle,

        _ + ChannelReset = Reset,
    }
}

pub type ChannelState = States;
pub type ChannelEvent = Events;

pub struct ChannelContext;

impl StateMachineContext for ChannelContext {}

pub type ChannelStateMachine = StateMachine<ChannelContext>;

pub fn new_state_machine() -> ChannelStateMachine {
    StateMachine::new(ChannelContext)
}
