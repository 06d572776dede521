// Licensed under the Apache-2.0 license

//! Where per-channel control bits live on each APBH generation.
//!
//! MX23 packs reset, clock gate and freeze for its 8 channels into `CTRL0`.
//! MX28 has 16 channels, keeps the clock gates in `CTRL0` and moves reset
//! and freeze into a dedicated `CHANNEL_CTRL` register.

use registers_generated::apbh::bits::{
    Mx23Ctrl0, Mx23Ctrl1, Mx23Ctrl2, Mx28ChannelCtrl, Mx28Ctrl0, Mx28Ctrl1, Mx28Ctrl2,
};
use registers_generated::apbh::regs::{CHANNEL_STRIDE, CTRL0_OFFSET, CTRL1_OFFSET, CTRL2_OFFSET};
use registers_generated::apbh::{mx23, mx28};
use serde::{Deserialize, Serialize};

/// A single bit of a register with SET/CLR/TOG aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitLocation {
    pub offset: usize,
    pub mask: u32,
}

impl BitLocation {
    const fn new(offset: usize, mask: u32) -> Self {
        BitLocation { offset, mask }
    }

    pub fn is_set(&self, value: u32) -> bool {
        value & self.mask != 0
    }
}

/// Register placement strategy for one hardware generation.
pub trait RegisterLayout: Send + Sync {
    fn revision(&self) -> HardwareRevision;

    /// Number of channels the block implements.
    fn channel_count(&self) -> u32;

    /// Offset of the register bank for `channel`.
    fn channel_bank(&self, channel: u32) -> usize;

    fn reset_bit(&self, channel: u32) -> BitLocation;
    fn freeze_bit(&self, channel: u32) -> BitLocation;
    fn clkgate_bit(&self, channel: u32) -> BitLocation;
    fn cmdcmplt_irq_bit(&self, channel: u32) -> BitLocation;
    fn cmdcmplt_irq_enable_bit(&self, channel: u32) -> BitLocation;
    fn error_irq_bit(&self, channel: u32) -> BitLocation;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareRevision {
    Mx23,
    #[default]
    Mx28,
}

impl HardwareRevision {
    pub fn layout(self) -> &'static dyn RegisterLayout {
        match self {
            HardwareRevision::Mx23 => &Mx23Layout,
            HardwareRevision::Mx28 => &Mx28Layout,
        }
    }
}

pub struct Mx23Layout;

impl RegisterLayout for Mx23Layout {
    fn revision(&self) -> HardwareRevision {
        HardwareRevision::Mx23
    }

    fn channel_count(&self) -> u32 {
        mx23::CHANNEL_COUNT
    }

    fn channel_bank(&self, channel: u32) -> usize {
        mx23::CHANNEL_BANK_BASE + channel as usize * CHANNEL_STRIDE
    }

    fn reset_bit(&self, channel: u32) -> BitLocation {
        BitLocation::new(
            CTRL0_OFFSET,
            Mx23Ctrl0::ResetChannel.val(1 << channel).value,
        )
    }

    fn freeze_bit(&self, channel: u32) -> BitLocation {
        BitLocation::new(
            CTRL0_OFFSET,
            Mx23Ctrl0::FreezeChannel.val(1 << channel).value,
        )
    }

    fn clkgate_bit(&self, channel: u32) -> BitLocation {
        BitLocation::new(
            CTRL0_OFFSET,
            Mx23Ctrl0::ClkgateChannel.val(1 << channel).value,
        )
    }

    fn cmdcmplt_irq_bit(&self, channel: u32) -> BitLocation {
        BitLocation::new(
            CTRL1_OFFSET,
            Mx23Ctrl1::ChCmdcmpltIrq.val(1 << channel).value,
        )
    }

    fn cmdcmplt_irq_enable_bit(&self, channel: u32) -> BitLocation {
        BitLocation::new(
            CTRL1_OFFSET,
            Mx23Ctrl1::ChCmdcmpltIrqEn.val(1 << channel).value,
        )
    }

    fn error_irq_bit(&self, channel: u32) -> BitLocation {
        BitLocation::new(CTRL2_OFFSET, Mx23Ctrl2::ChErrorIrq.val(1 << channel).value)
    }
}

pub struct Mx28Layout;

impl RegisterLayout for Mx28Layout {
    fn revision(&self) -> HardwareRevision {
        HardwareRevision::Mx28
    }

    fn channel_count(&self) -> u32 {
        mx28::CHANNEL_COUNT
    }

    fn channel_bank(&self, channel: u32) -> usize {
        mx28::CHANNEL_BANK_BASE + channel as usize * CHANNEL_STRIDE
    }

    fn reset_bit(&self, channel: u32) -> BitLocation {
        BitLocation::new(
            mx28::CHANNEL_CTRL_OFFSET,
            Mx28ChannelCtrl::ResetChannel.val(1 << channel).value,
        )
    }

    fn freeze_bit(&self, channel: u32) -> BitLocation {
        BitLocation::new(
            mx28::CHANNEL_CTRL_OFFSET,
            Mx28ChannelCtrl::FreezeChannel.val(1 << channel).value,
        )
    }

    fn clkgate_bit(&self, channel: u32) -> BitLocation {
        BitLocation::new(
            CTRL0_OFFSET,
            Mx28Ctrl0::ClkgateChannel.val(1 << channel).value,
        )
    }

    fn cmdcmplt_irq_bit(&self, channel: u32) -> BitLocation {
        BitLocation::new(
            CTRL1_OFFSET,
            Mx28Ctrl1::ChCmdcmpltIrq.val(1 << channel).value,
        )
    }

    fn cmdcmplt_irq_enable_bit(&self, channel: u32) -> BitLocation {
        BitLocation::new(
            CTRL1_OFFSET,
            Mx28Ctrl1::ChCmdcmpltIrqEn.val(1 << channel).value,
        )
    }

    fn error_irq_bit(&self, channel: u32) -> BitLocation {
        BitLocation::new(CTRL2_OFFSET, Mx28Ctrl2::ChErrorIrq.val(1 << channel).value)
    }
}
