/*++

Licensed under the Apache-2.0 license.

File Name:

    apbh_dma.rs

Abstract:

    File contains the APBH descriptor-chain DMA block emulation.

--*/

use dma_driver::{BitLocation, HardwareRevision, RegisterLayout, RegisterWindow};
use registers_generated::apbh::bits::{ChSema, Ctrl0};
use registers_generated::apbh::regs::{
    CHANNEL_STRIDE, CH_CMD_OFFSET, CH_CURCMDAR_OFFSET, CH_NXTCMDAR_OFFSET, CH_SEMA_OFFSET,
    CTRL0_OFFSET, CTRL1_OFFSET, CTRL2_OFFSET,
};
use registers_generated::apbh::{mx28, CLR_ALIAS_OFFSET, SET_ALIAS_OFFSET, TOG_ALIAS_OFFSET};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tock_registers::LocalRegisterCopy;

#[derive(Default, Clone)]
struct ChannelBank {
    curcmdar: u32,
    nxtcmdar: u32,
    cmd: u32,
    sema: u32,
    nxtcmdar_writes: Vec<u32>,
}

struct ApbhState {
    ctrl0: u32,
    ctrl1: u32,
    ctrl2: u32,
    channel_ctrl: u32,
    channels: Vec<ChannelBank>,
    reset_countdown: u32,
    stuck_in_reset: bool,
}

impl ApbhState {
    fn ctrl0(&self) -> LocalRegisterCopy<u32, Ctrl0::Register> {
        LocalRegisterCopy::new(self.ctrl0)
    }

    fn in_soft_reset(&self) -> bool {
        self.ctrl0().is_set(Ctrl0::Sftrst)
    }
}

/// Emulated APBH DMA block.
///
/// Global registers decode their SET/CLR/TOG aliases. Writes to `SEMA` add
/// to the channel semaphore. A soft reset stays asserted for a number of
/// `CTRL0` reads before it clears on its own. Descriptor execution is
/// stepped explicitly with [`EmulatedApbh::complete_descriptor`].
pub struct EmulatedApbh {
    layout: &'static dyn RegisterLayout,
    reset_latency: u32,
    state: Mutex<ApbhState>,
}

impl EmulatedApbh {
    pub const DEFAULT_RESET_LATENCY: u32 = 3;

    pub fn new(revision: HardwareRevision) -> Self {
        Self::with_reset_latency(revision, Self::DEFAULT_RESET_LATENCY)
    }

    /// Soft reset clears after `reset_latency` reads of `CTRL0`.
    pub fn with_reset_latency(revision: HardwareRevision, reset_latency: u32) -> Self {
        let layout = revision.layout();
        let mut state = ApbhState {
            ctrl0: 0,
            ctrl1: 0,
            ctrl2: 0,
            channel_ctrl: 0,
            channels: vec![ChannelBank::default(); layout.channel_count() as usize],
            reset_countdown: 0,
            stuck_in_reset: false,
        };
        Self::power_on(layout, &mut state);
        Self {
            layout,
            reset_latency,
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, ApbhState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn power_on(layout: &dyn RegisterLayout, state: &mut ApbhState) {
        let gates = (0..layout.channel_count()).fold(0, |acc, ch| acc | layout.clkgate_bit(ch).mask);
        state.ctrl0 = gates | Ctrl0::Clkgate::SET.value;
        state.ctrl1 = 0;
        state.ctrl2 = 0;
        state.channel_ctrl = 0;
        for bank in state.channels.iter_mut() {
            *bank = ChannelBank::default();
        }
    }

    /// Keep the soft reset bit asserted forever.
    pub fn set_stuck_in_reset(&self, stuck: bool) {
        self.state().stuck_in_reset = stuck;
    }

    fn global_mut<'a>(&self, state: &'a mut ApbhState, offset: usize) -> Option<&'a mut u32> {
        match offset {
            CTRL0_OFFSET => Some(&mut state.ctrl0),
            CTRL1_OFFSET => Some(&mut state.ctrl1),
            CTRL2_OFFSET => Some(&mut state.ctrl2),
            mx28::CHANNEL_CTRL_OFFSET if self.layout.revision() == HardwareRevision::Mx28 => {
                Some(&mut state.channel_ctrl)
            }
            _ => None,
        }
    }

    fn global_value(&self, state: &ApbhState, offset: usize) -> u32 {
        match offset {
            CTRL0_OFFSET => state.ctrl0,
            CTRL1_OFFSET => state.ctrl1,
            CTRL2_OFFSET => state.ctrl2,
            mx28::CHANNEL_CTRL_OFFSET if self.layout.revision() == HardwareRevision::Mx28 => {
                state.channel_ctrl
            }
            _ => 0,
        }
    }

    fn bank_base(&self) -> usize {
        self.layout.channel_bank(0)
    }

    /// Split a channel bank offset into `(channel, register)`.
    fn decode_bank(&self, offset: usize) -> Option<(usize, usize)> {
        let rel = offset.checked_sub(self.bank_base())?;
        let channel = rel / CHANNEL_STRIDE;
        if channel >= self.layout.channel_count() as usize {
            return None;
        }
        Some((channel, rel % CHANNEL_STRIDE))
    }

    fn bit(&self, state: &ApbhState, bit: BitLocation) -> bool {
        bit.is_set(self.global_value(state, bit.offset))
    }

    fn write_global(&self, state: &mut ApbhState, offset: usize, value: u32) {
        let base = offset & !0xf;
        let was_in_reset = state.in_soft_reset();
        let Some(reg) = self.global_mut(state, base) else {
            return;
        };
        match offset - base {
            SET_ALIAS_OFFSET => *reg |= value,
            CLR_ALIAS_OFFSET => *reg &= !value,
            TOG_ALIAS_OFFSET => *reg ^= value,
            _ => *reg = value,
        }

        if base == CTRL0_OFFSET && !was_in_reset && state.in_soft_reset() {
            Self::power_on(self.layout, state);
            state.ctrl0 |= Ctrl0::Sftrst::SET.value;
            state.reset_countdown = self.reset_latency;
        }

        // Channel reset bits self-clear once the channel is back to its
        // power-on state.
        for ch in 0..self.layout.channel_count() {
            let reset = self.layout.reset_bit(ch);
            if reset.offset == base && self.bit(state, reset) {
                state.channels[ch as usize] = ChannelBank::default();
                if let Some(reg) = self.global_mut(state, base) {
                    *reg &= !reset.mask;
                }
            }
        }
    }

    fn write_bank(&self, state: &mut ApbhState, channel: usize, reg: usize, value: u32) {
        let bank = &mut state.channels[channel];
        match reg {
            CH_NXTCMDAR_OFFSET => {
                bank.nxtcmdar = value;
                bank.nxtcmdar_writes.push(value);
            }
            CH_SEMA_OFFSET => {
                let increment = LocalRegisterCopy::<u32, ChSema::Register>::new(value)
                    .read(ChSema::IncrementSema);
                bank.sema = (bank.sema + increment) & 0xff;
            }
            // CURCMDAR, CMD, BAR and DEBUG are read-only.
            _ => {}
        }
    }

    fn read_bank(&self, state: &ApbhState, channel: usize, reg: usize) -> u32 {
        let bank = &state.channels[channel];
        match reg {
            CH_CURCMDAR_OFFSET => bank.curcmdar,
            CH_NXTCMDAR_OFFSET => bank.nxtcmdar,
            CH_CMD_OFFSET => bank.cmd,
            CH_SEMA_OFFSET => ChSema::Phore.val(bank.sema).value,
            _ => 0,
        }
    }

    fn channel_runs(&self, state: &ApbhState, ch: u32) -> bool {
        !state.in_soft_reset()
            && !state.ctrl0().is_set(Ctrl0::Clkgate)
            && !self.bit(state, self.layout.clkgate_bit(ch))
            && !self.bit(state, self.layout.freeze_bit(ch))
    }

    /// Let channel `ch` finish the descriptor it is working on.
    ///
    /// Nothing happens unless the channel is clocked, not frozen and has a
    /// semaphore unit left. Returns whether a descriptor completed.
    pub fn complete_descriptor(&self, ch: u32) -> bool {
        let mut state = self.state();
        if !self.channel_runs(&state, ch) || state.channels[ch as usize].sema == 0 {
            return false;
        }
        let bank = &mut state.channels[ch as usize];
        bank.sema -= 1;
        bank.curcmdar = bank.nxtcmdar;
        let irq = self.layout.cmdcmplt_irq_bit(ch);
        if let Some(reg) = self.global_mut(&mut state, irq.offset) {
            *reg |= irq.mask;
        }
        true
    }

    /// Complete descriptors on `ch` until it stops. Returns how many ran.
    pub fn run_channel(&self, ch: u32) -> u32 {
        let mut count = 0;
        while self.complete_descriptor(ch) {
            count += 1;
        }
        count
    }

    /// Flag a bus error on `ch`.
    pub fn raise_error(&self, ch: u32) {
        let mut state = self.state();
        let irq = self.layout.error_irq_bit(ch);
        if let Some(reg) = self.global_mut(&mut state, irq.offset) {
            *reg |= irq.mask | (irq.mask << 16);
        }
    }

    /// Whether the block would assert its interrupt line.
    pub fn irq_line(&self) -> bool {
        let state = self.state();
        (0..self.layout.channel_count()).any(|ch| {
            (self.bit(&state, self.layout.cmdcmplt_irq_bit(ch))
                && self.bit(&state, self.layout.cmdcmplt_irq_enable_bit(ch)))
                || self.bit(&state, self.layout.error_irq_bit(ch))
        })
    }

    /// Every value written to `NXTCMDAR` of `ch`, oldest first.
    pub fn nxtcmdar_writes(&self, ch: u32) -> Vec<u32> {
        self.state().channels[ch as usize].nxtcmdar_writes.clone()
    }

    pub fn semaphore(&self, ch: u32) -> u32 {
        self.state().channels[ch as usize].sema
    }

    pub fn is_gated(&self, ch: u32) -> bool {
        let state = self.state();
        self.bit(&state, self.layout.clkgate_bit(ch))
    }

    pub fn is_frozen(&self, ch: u32) -> bool {
        let state = self.state();
        self.bit(&state, self.layout.freeze_bit(ch))
    }

    pub fn block_gated(&self) -> bool {
        self.state().ctrl0().is_set(Ctrl0::Clkgate)
    }

    pub fn ctrl0(&self) -> LocalRegisterCopy<u32, Ctrl0::Register> {
        self.state().ctrl0()
    }
}

impl RegisterWindow for EmulatedApbh {
    fn read(&self, offset: usize) -> u32 {
        let mut state = self.state();
        if offset < self.bank_base() {
            let base = offset & !0xf;
            if base == CTRL0_OFFSET && state.in_soft_reset() && !state.stuck_in_reset {
                if state.reset_countdown == 0 {
                    state.ctrl0 &= !Ctrl0::Sftrst::SET.value;
                } else {
                    state.reset_countdown -= 1;
                }
            }
            return self.global_value(&state, base);
        }
        match self.decode_bank(offset) {
            Some((channel, reg)) => self.read_bank(&state, channel, reg),
            None => 0,
        }
    }

    fn write(&self, offset: usize, value: u32) {
        let mut state = self.state();
        if offset < self.bank_base() {
            self.write_global(&mut state, offset, value);
        } else if let Some((channel, reg)) = self.decode_bank(offset) {
            self.write_bank(&mut state, channel, reg, value);
        }
    }
}
