// Licensed under the Apache-2.0 license

//! APBH DMA engine.
//!
//! The engine owns the register window and one [`Channel`] per served
//! hardware channel. Each channel sits behind its own lock, so queue
//! bookkeeping and the channel's registers are always updated together and
//! channels never contend with each other. Block-wide control bits are
//! serialized by a separate lock that is only taken at bring-up and
//! teardown.

use std::ops::Range;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, error, info, warn};
use poll_common::poll_count;
use registers_generated::apbh::bits::{ChSema, Ctrl0};
use registers_generated::apbh::regs::{CH_NXTCMDAR_OFFSET, CH_SEMA_OFFSET, CTRL0_OFFSET};

use crate::channel::{Channel, ChannelStatus};
use crate::config::EngineConfig;
use crate::descriptor::{Command, Descriptor, DescriptorPool};
use crate::error::DmaError;
use crate::hil::{Reg, RegisterWindow};
use crate::layout::{BitLocation, RegisterLayout};
use crate::state::{ChannelEvent, ChannelState};

/// Pending interrupt sources of one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IrqStatus {
    pub complete: bool,
    pub error: bool,
}

impl IrqStatus {
    pub fn is_pending(&self) -> bool {
        self.complete || self.error
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Engine<W: RegisterWindow> {
    window: W,
    layout: &'static dyn RegisterLayout,
    config: EngineConfig,
    channels: Vec<Mutex<Channel>>,
    pool: Mutex<DescriptorPool>,
    global: Mutex<()>,
}

impl<W: RegisterWindow> Engine<W> {
    /// Soft-reset the block, power it up and apply the burst settings.
    ///
    /// Fails with `ResetTimeout` when the block does not leave reset within
    /// `reset_poll_limit` polls; no engine is returned in that case.
    pub fn init(window: W, config: EngineConfig) -> Result<Self, DmaError> {
        config.validate()?;
        let layout = config.revision.layout();
        let channels = config.channels().map(|ch| Mutex::new(Channel::new(ch))).collect();
        let pool = DescriptorPool::new(config.descriptor_base, config.descriptor_count);

        let engine = Engine {
            window,
            layout,
            config,
            channels,
            pool: Mutex::new(pool),
            global: Mutex::new(()),
        };
        engine.reset_block()?;
        for channel in engine.channels.iter() {
            lock(channel).transition(ChannelEvent::Init, "init")?;
        }

        info!(
            "APBH DMA ({:?}) up: channels {:?}, burst {}, burst8 {}",
            engine.layout.revision(),
            engine.config.channels(),
            engine.config.burst,
            engine.config.burst8
        );
        Ok(engine)
    }

    fn reset_block(&self) -> Result<(), DmaError> {
        let _global = lock(&self.global);
        let ctrl0: Reg<'_, W, Ctrl0::Register> = Reg::new(&self.window, CTRL0_OFFSET);

        ctrl0.set_bits(Ctrl0::Sftrst::SET);
        let delay = Duration::from_micros(self.config.reset_poll_delay_us);
        let polls = poll_count(self.config.reset_poll_limit, delay, || {
            !ctrl0.extract().is_set(Ctrl0::Sftrst)
        })
        .map_err(|timeout| {
            error!("APBH DMA soft reset did not complete: {}", timeout);
            DmaError::ResetTimeout(timeout.polls)
        })?;
        debug!("APBH DMA left soft reset after {} polls", polls);

        ctrl0.clear_bits(Ctrl0::Clkgate::SET);
        if self.config.burst {
            ctrl0.set_bits(Ctrl0::ApbBurstEn::SET);
        } else {
            ctrl0.clear_bits(Ctrl0::ApbBurstEn::SET);
        }
        if self.config.burst8 {
            ctrl0.set_bits(Ctrl0::AhbBurst8En::SET);
        } else {
            ctrl0.clear_bits(Ctrl0::AhbBurst8En::SET);
        }
        Ok(())
    }

    /// Gate the clocks of every served channel and of the whole block.
    pub fn shutdown(&self) {
        for channel in self.channels.iter() {
            let mut channel = lock(channel);
            let index = channel.index();
            if let Err(err) = self.disable_locked(&mut channel) {
                warn!("channel {} not disabled on shutdown: {}", index, err);
            }
        }
        let _global = lock(&self.global);
        let ctrl0: Reg<'_, W, Ctrl0::Register> = Reg::new(&self.window, CTRL0_OFFSET);
        ctrl0.set_bits(Ctrl0::Clkgate::SET);
        info!("APBH DMA shut down");
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn layout(&self) -> &'static dyn RegisterLayout {
        self.layout
    }

    /// Hardware channel indices served by this engine.
    pub fn channels(&self) -> Range<u32> {
        self.config.channels()
    }

    fn channel(&self, index: u32) -> Result<MutexGuard<'_, Channel>, DmaError> {
        let slot = index
            .checked_sub(self.config.channel_base)
            .filter(|slot| *slot < self.config.channel_count)
            .ok_or(DmaError::InvalidChannel(index))?;
        Ok(lock(&self.channels[slot as usize]))
    }

    fn check_channel(&self, index: u32) -> Result<(), DmaError> {
        if self.config.channels().contains(&index) {
            Ok(())
        } else {
            Err(DmaError::InvalidChannel(index))
        }
    }

    fn sema(&self, index: u32) -> Reg<'_, W, ChSema::Register> {
        Reg::new(
            &self.window,
            self.layout.channel_bank(index) + CH_SEMA_OFFSET,
        )
    }

    fn write_nxtcmdar(&self, index: u32, address: u32) {
        self.window
            .write(self.layout.channel_bank(index) + CH_NXTCMDAR_OFFSET, address);
    }

    fn set_bit(&self, bit: BitLocation) {
        self.window.set_bits(bit.offset, bit.mask);
    }

    fn clear_bit(&self, bit: BitLocation) {
        self.window.clear_bits(bit.offset, bit.mask);
    }

    fn bit_is_set(&self, bit: BitLocation) -> bool {
        bit.is_set(self.window.read(bit.offset))
    }

    /// Number of descriptors the hardware still has to run on `index`.
    pub fn read_semaphore(&self, index: u32) -> Result<u32, DmaError> {
        self.check_channel(index)?;
        Ok(self.sema(index).extract().read(ChSema::Phore))
    }

    /// Queue `descriptor` on `index`. Returns its sequence number on the channel.
    pub fn enqueue(&self, index: u32, descriptor: Descriptor) -> Result<u64, DmaError> {
        let mut channel = self.channel(index)?;
        let seq = channel.enqueue(descriptor, self.config.max_pending)?;
        debug!(
            "ch{}: queued descriptor {} ({} pending)",
            index,
            seq,
            channel.pending_count()
        );
        Ok(seq)
    }

    /// Hand pending work on `index` to the hardware.
    ///
    /// A channel whose chain is already running is only extended: the new
    /// descriptors are added to the semaphore and the chain head is never
    /// reprogrammed. An idle channel is restarted from its oldest active
    /// descriptor the hardware has not finished yet.
    pub fn enable(&self, index: u32) -> Result<(), DmaError> {
        let mut channel = self.channel(index)?;
        let sema = self.sema(index);
        let count = sema.extract().read(ChSema::Phore);
        let room = self
            .config
            .max_in_flight
            .saturating_sub(channel.active_count());

        if channel.busy {
            if channel.pending_count() == 0 {
                return Ok(());
            }
            if !channel.active_tail().is_some_and(|tail| tail.chain) {
                debug!("ch{}: running chain ends here, nothing to extend", index);
                return Ok(());
            }
            let n = channel.pending_count().min(room);
            if n == 0 {
                debug!("ch{}: {} descriptors in flight, deferring", index, channel.active_count());
                return Ok(());
            }
            channel.transition(ChannelEvent::Start, "enable")?;

            let first_new = channel.active_count() as usize;
            channel.promote_pending_to_active(n);
            if count < 2 {
                // The hardware may already have fetched past the old tail.
                if let Some(next) = channel.active_at(first_new) {
                    self.write_nxtcmdar(index, next.address());
                }
            }
            sema.write(ChSema::IncrementSema.val(n));
            debug!(
                "ch{}: extended running chain by {} (semaphore was {})",
                index, n, count
            );
            return Ok(());
        }

        // Active descriptors the semaphore no longer covers have already run
        // and wait for `on_completion`; the restart begins after them.
        let finished = channel.active_count().saturating_sub(count);
        let n = channel.pending_count().min(room);
        channel.promote_pending_to_active(n);
        let Some(head) = channel.active_at(finished as usize).map(Descriptor::address) else {
            return Ok(());
        };
        channel.transition(ChannelEvent::Start, "enable")?;

        let active = channel.active_count();
        if count + finished > active {
            warn!(
                "ch{}: semaphore {} exceeds {} unfinished descriptors",
                index,
                count,
                active - finished
            );
        }
        self.write_nxtcmdar(index, head);
        sema.write(ChSema::IncrementSema.val(active.saturating_sub(finished + count)));
        self.clear_bit(self.layout.clkgate_bit(index));
        channel.busy = true;
        debug!(
            "ch{}: started chain at {:#x} with {} descriptors",
            index,
            head,
            active - finished
        );
        Ok(())
    }

    fn disable_locked(&self, channel: &mut Channel) -> Result<(), DmaError> {
        channel.transition(ChannelEvent::Stop, "disable")?;
        self.set_bit(self.layout.clkgate_bit(channel.index()));
        channel.busy = false;
        Ok(())
    }

    /// Stop the channel clock. Queued work stays queued.
    pub fn disable(&self, index: u32) -> Result<(), DmaError> {
        let mut channel = self.channel(index)?;
        self.disable_locked(&mut channel)?;
        debug!("ch{}: disabled", index);
        Ok(())
    }

    pub fn freeze(&self, index: u32) -> Result<(), DmaError> {
        let mut channel = self.channel(index)?;
        channel.transition(ChannelEvent::Freeze, "freeze")?;
        self.set_bit(self.layout.freeze_bit(index));
        debug!("ch{}: frozen", index);
        Ok(())
    }

    pub fn unfreeze(&self, index: u32) -> Result<(), DmaError> {
        let mut channel = self.channel(index)?;
        channel.transition(ChannelEvent::Unfreeze, "unfreeze")?;
        self.clear_bit(self.layout.freeze_bit(index));
        debug!("ch{}: unfrozen", index);
        Ok(())
    }

    fn reset_locked(&self, channel: &mut Channel) -> Result<(), DmaError> {
        channel.transition(ChannelEvent::ChannelReset, "reset")?;
        self.set_bit(self.layout.reset_bit(channel.index()));
        self.clear_bit(self.layout.freeze_bit(channel.index()));
        let dropped = channel.clear();
        if !dropped.is_empty() {
            debug!(
                "ch{}: reset dropped {} descriptors",
                channel.index(),
                dropped.len()
            );
        }
        self.recycle(dropped);
        Ok(())
    }

    /// Reset the channel in hardware and discard everything queued on it.
    pub fn reset(&self, index: u32) -> Result<(), DmaError> {
        let mut channel = self.channel(index)?;
        self.reset_locked(&mut channel)
    }

    /// Return pool descriptors the engine is discarding.
    fn recycle(&self, descriptors: Vec<Descriptor>) {
        let mut pool = lock(&self.pool);
        for descriptor in descriptors {
            if pool.owns(descriptor.address()) {
                let address = descriptor.address();
                if let Err(err) = pool.free(descriptor) {
                    warn!("descriptor {:#x} not recycled: {}", address, err);
                }
            }
        }
    }

    pub fn irq_status(&self, index: u32) -> Result<IrqStatus, DmaError> {
        self.check_channel(index)?;
        Ok(IrqStatus {
            complete: self.bit_is_set(self.layout.cmdcmplt_irq_bit(index)),
            error: self.bit_is_set(self.layout.error_irq_bit(index)),
        })
    }

    pub fn irq_is_pending(&self, index: u32) -> Result<bool, DmaError> {
        Ok(self.irq_status(index)?.is_pending())
    }

    /// Clear the completion and error flags of `index`.
    pub fn ack_irq(&self, index: u32) -> Result<(), DmaError> {
        self.check_channel(index)?;
        self.clear_bit(self.layout.cmdcmplt_irq_bit(index));
        self.clear_bit(self.layout.error_irq_bit(index));
        Ok(())
    }

    /// Enable or mask the completion interrupt of `index`.
    pub fn enable_irq(&self, index: u32, enable: bool) -> Result<(), DmaError> {
        let mut channel = self.channel(index)?;
        self.enable_irq_locked(&mut channel, enable);
        Ok(())
    }

    fn enable_irq_locked(&self, channel: &mut Channel, enable: bool) {
        let bit = self.layout.cmdcmplt_irq_enable_bit(channel.index());
        if enable {
            self.set_bit(bit);
        } else {
            self.clear_bit(bit);
        }
        channel.irq_enabled = enable;
    }

    /// Retire the descriptors the hardware has finished on `index`.
    ///
    /// The number finished is the active count minus what the semaphore
    /// still holds. A completion that finished nothing is counted as
    /// spurious and otherwise ignored. Descriptors
    /// that asked for a completion notification are passed to `callback`
    /// after the channel lock is released, the others are recycled.
    /// Returns the number of descriptors retired.
    pub fn on_completion<F>(&self, index: u32, mut callback: F) -> Result<u32, DmaError>
    where
        F: FnMut(Descriptor),
    {
        let mut notify = Vec::new();
        let mut discard = Vec::new();
        {
            let mut channel = self.channel(index)?;
            let outstanding = self.sema(index).extract().read(ChSema::Phore);
            let finished = channel.active_count().saturating_sub(outstanding);
            if finished == 0 {
                channel.spurious += 1;
                warn!(
                    "{} ({} active, semaphore {})",
                    DmaError::SpuriousCompletion(index),
                    channel.active_count(),
                    outstanding
                );
                return Ok(0);
            }

            for _ in 0..finished {
                let Some(descriptor) = channel.complete_oldest() else {
                    break;
                };
                channel.completed += 1;
                if descriptor.completion_flag {
                    notify.push(descriptor);
                } else {
                    discard.push(descriptor);
                }
            }

            if channel.active_count() == 0 {
                channel.busy = false;
                if channel.state() == ChannelState::Running {
                    channel.transition(ChannelEvent::Drained, "complete")?;
                }
            }
            debug!(
                "ch{}: retired {} descriptors, {} still active",
                index,
                finished,
                channel.active_count()
            );
        }

        let retired = (notify.len() + discard.len()) as u32;
        self.recycle(discard);
        for descriptor in notify {
            callback(descriptor);
        }
        Ok(retired)
    }

    /// Account a hardware error flagged on `index`.
    pub fn on_error(&self, index: u32) -> Result<DmaError, DmaError> {
        let mut channel = self.channel(index)?;
        channel.errors += 1;
        let err = DmaError::ChannelError(index);
        warn!("{}", err);
        Ok(err)
    }

    /// Claim `index` for `owner`.
    pub fn request(&self, index: u32, owner: &str) -> Result<(), DmaError> {
        let mut channel = self.channel(index)?;
        match &channel.owner {
            Some(current) if current != owner => Err(DmaError::ChannelInUse {
                channel: index,
                owner: current.clone(),
            }),
            _ => {
                channel.owner = Some(owner.to_string());
                info!("ch{}: requested by {}", index, owner);
                Ok(())
            }
        }
    }

    /// Give `index` back: reset it, mask its interrupt and drop ownership.
    pub fn release(&self, index: u32, owner: &str) -> Result<(), DmaError> {
        let mut channel = self.channel(index)?;
        if let Some(current) = &channel.owner {
            if current != owner {
                return Err(DmaError::ChannelInUse {
                    channel: index,
                    owner: current.clone(),
                });
            }
        }
        self.reset_locked(&mut channel)?;
        self.enable_irq_locked(&mut channel, false);
        channel.owner = None;
        info!("ch{}: released by {}", index, owner);
        Ok(())
    }

    pub fn status(&self, index: u32) -> Result<ChannelStatus, DmaError> {
        Ok(self.channel(index)?.status())
    }

    pub fn channel_state(&self, index: u32) -> Result<ChannelState, DmaError> {
        Ok(self.channel(index)?.state())
    }

    /// Run `f` with the channel locked, for inspecting its queues.
    pub fn with_channel<R>(
        &self,
        index: u32,
        f: impl FnOnce(&Channel) -> R,
    ) -> Result<R, DmaError> {
        let channel = self.channel(index)?;
        Ok(f(&*channel))
    }

    pub fn alloc_descriptor(&self, command: Command) -> Result<Descriptor, DmaError> {
        lock(&self.pool).alloc(command)
    }

    pub fn free_descriptor(&self, descriptor: Descriptor) -> Result<(), DmaError> {
        lock(&self.pool).free(descriptor)
    }

    pub fn free_descriptors(&self) -> usize {
        lock(&self.pool).available()
    }
}
