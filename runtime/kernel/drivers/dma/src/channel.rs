// Licensed under the Apache-2.0 license

//! Software side of one APBH channel: the pending/active descriptor FIFOs,
//! the lifecycle state and per-channel counters.
//!
//! `pending` holds work the hardware has not been told about. `active` holds
//! descriptors that each own one semaphore unit, oldest first. A descriptor
//! is in exactly one of the two lists until it is completed or discarded.

use std::collections::VecDeque;

use crate::descriptor::{CommandFlags, Descriptor};
use crate::error::DmaError;
use crate::state::{new_state_machine, ChannelEvent, ChannelState, ChannelStateMachine};

/// Point-in-time view of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStatus {
    pub index: u32,
    pub state: ChannelState,
    pub busy: bool,
    pub pending_count: u32,
    pub active_count: u32,
    pub owner: Option<String>,
    pub irq_enabled: bool,
    pub completed: u64,
    pub spurious: u64,
    pub errors: u64,
}

pub struct Channel {
    index: u32,
    pending: VecDeque<Descriptor>,
    active: VecDeque<Descriptor>,
    pending_count: u32,
    active_count: u32,
    pub(crate) busy: bool,
    sm: ChannelStateMachine,
    pub(crate) owner: Option<String>,
    pub(crate) irq_enabled: bool,
    next_seq: u64,
    pub(crate) completed: u64,
    pub(crate) spurious: u64,
    pub(crate) errors: u64,
}

impl Channel {
    pub fn new(index: u32) -> Self {
        Channel {
            index,
            pending: VecDeque::new(),
            active: VecDeque::new(),
            pending_count: 0,
            active_count: 0,
            busy: false,
            sm: new_state_machine(),
            owner: None,
            irq_enabled: false,
            next_seq: 0,
            completed: 0,
            spurious: 0,
            errors: 0,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn state(&self) -> ChannelState {
        *self.sm.state()
    }

    pub fn pending_count(&self) -> u32 {
        self.pending_count
    }

    pub fn active_count(&self) -> u32 {
        self.active_count
    }

    pub fn pending(&self) -> impl Iterator<Item = &Descriptor> {
        self.pending.iter()
    }

    pub fn active(&self) -> impl Iterator<Item = &Descriptor> {
        self.active.iter()
    }

    pub fn active_at(&self, position: usize) -> Option<&Descriptor> {
        self.active.get(position)
    }

    pub fn active_tail(&self) -> Option<&Descriptor> {
        self.active.back()
    }

    /// Drive the lifecycle, failing with `InvalidState` when `event` is not
    /// accepted in the current state.
    pub(crate) fn transition(
        &mut self,
        event: ChannelEvent,
        op: &'static str,
    ) -> Result<ChannelState, DmaError> {
        let (channel, state) = (self.index, self.state());
        self.sm
            .process_event(event)
            .map(|next| *next)
            .map_err(|_| DmaError::InvalidState {
                channel,
                op,
                state,
            })
    }

    /// Append `descriptor` to the pending FIFO and chain it behind the
    /// current tail of the channel.
    pub fn enqueue(&mut self, mut descriptor: Descriptor, max_pending: u32) -> Result<u64, DmaError> {
        descriptor.validate()?;
        if self.pending_count >= max_pending {
            return Err(DmaError::ChannelFull(self.index));
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        descriptor.set_seq(seq);
        descriptor.flags |= CommandFlags::DEC_SEM;

        let tail = match self.pending.back_mut() {
            Some(tail) => Some(tail),
            None => self.active.back_mut(),
        };
        if let Some(tail) = tail {
            tail.link(descriptor.address());
        }

        self.pending.push_back(descriptor);
        self.pending_count += 1;
        Ok(seq)
    }

    /// Move the `n` oldest pending descriptors to the back of `active`.
    /// Returns the addresses of the promoted descriptors.
    pub fn promote_pending_to_active(&mut self, n: u32) -> Vec<u32> {
        let n = n.min(self.pending_count);
        let mut promoted = Vec::with_capacity(n as usize);
        for descriptor in self.pending.drain(..n as usize) {
            promoted.push(descriptor.address());
            self.active.push_back(descriptor);
        }
        self.pending_count -= n;
        self.active_count += n;
        promoted
    }

    /// Pop the oldest active descriptor. `None` means nothing was in flight.
    pub fn complete_oldest(&mut self) -> Option<Descriptor> {
        let descriptor = self.active.pop_front()?;
        self.active_count -= 1;
        Some(descriptor)
    }

    /// Drop all queued work, returning it so the caller can recycle it.
    pub(crate) fn clear(&mut self) -> Vec<Descriptor> {
        let mut dropped: Vec<Descriptor> = self.active.drain(..).collect();
        dropped.extend(self.pending.drain(..));
        self.active_count = 0;
        self.pending_count = 0;
        self.busy = false;
        dropped
    }

    pub fn status(&self) -> ChannelStatus {
        ChannelStatus {
            index: self.index,
            state: self.state(),
            busy: self.busy,
            pending_count: self.pending_count,
            active_count: self.active_count,
            owner: self.owner.clone(),
            irq_enabled: self.irq_enabled,
            completed: self.completed,
            spurious: self.spurious,
            errors: self.errors,
        }
    }
}
