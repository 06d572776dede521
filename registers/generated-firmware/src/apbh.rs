// Licensed under the Apache-2.0 license

//! APBH bridge DMA registers.
//!
//! The global control registers (`CTRL0`, `CTRL1`, `CTRL2` and, on MX28,
//! `CHANNEL_CTRL`) have SET, CLR and TOG aliases at +0x4, +0x8 and +0xC.
//! Writing a mask to an alias ORs, clears or toggles those bits in the base
//! register. The per-channel banks have no aliases.

pub const SET_ALIAS_OFFSET: usize = 0x4;
pub const CLR_ALIAS_OFFSET: usize = 0x8;
pub const TOG_ALIAS_OFFSET: usize = 0xc;

/// Size of the register window for one APBH instance.
pub const APBH_WINDOW_SIZE: usize = 0x2000;

pub mod regs {
    pub const CTRL0_OFFSET: usize = 0x000;
    pub const CTRL1_OFFSET: usize = 0x010;
    pub const CTRL2_OFFSET: usize = 0x020;

    /// Distance between two consecutive channel banks.
    pub const CHANNEL_STRIDE: usize = 0x70;

    // Offsets within a channel bank.
    pub const CH_CURCMDAR_OFFSET: usize = 0x00;
    pub const CH_NXTCMDAR_OFFSET: usize = 0x10;
    pub const CH_CMD_OFFSET: usize = 0x20;
    pub const CH_BAR_OFFSET: usize = 0x30;
    pub const CH_SEMA_OFFSET: usize = 0x40;
    pub const CH_DEBUG1_OFFSET: usize = 0x50;
    pub const CH_DEBUG2_OFFSET: usize = 0x60;
}

pub mod mx23 {
    pub const CHANNEL_COUNT: u32 = 8;
    pub const CHANNEL_BANK_BASE: usize = 0x040;
}

pub mod mx28 {
    pub const CHANNEL_COUNT: u32 = 16;
    pub const CHANNEL_CTRL_OFFSET: usize = 0x030;
    pub const CHANNEL_BANK_BASE: usize = 0x100;
}

pub mod bits {
    use tock_registers::register_bitfields;

    register_bitfields! {
        u32,
        /// Global bits shared by both generations.
        pub Ctrl0 [
            Sftrst OFFSET(31) NUMBITS(1) [],
            Clkgate OFFSET(30) NUMBITS(1) [],
            AhbBurst8En OFFSET(29) NUMBITS(1) [],
            ApbBurstEn OFFSET(28) NUMBITS(1) [],
        ],
        pub Mx23Ctrl0 [
            ResetChannel OFFSET(16) NUMBITS(8) [],
            ClkgateChannel OFFSET(8) NUMBITS(8) [],
            FreezeChannel OFFSET(0) NUMBITS(8) [],
        ],
        pub Mx23Ctrl1 [
            ChCmdcmpltIrqEn OFFSET(16) NUMBITS(8) [],
            ChCmdcmpltIrq OFFSET(0) NUMBITS(8) [],
        ],
        pub Mx23Ctrl2 [
            ChErrorStatus OFFSET(16) NUMBITS(8) [],
            ChErrorIrq OFFSET(0) NUMBITS(8) [],
        ],
        pub Mx28Ctrl0 [
            ClkgateChannel OFFSET(0) NUMBITS(16) [],
        ],
        pub Mx28Ctrl1 [
            ChCmdcmpltIrqEn OFFSET(16) NUMBITS(16) [],
            ChCmdcmpltIrq OFFSET(0) NUMBITS(16) [],
        ],
        pub Mx28Ctrl2 [
            ChErrorStatus OFFSET(16) NUMBITS(16) [],
            ChErrorIrq OFFSET(0) NUMBITS(16) [],
        ],
        pub Mx28ChannelCtrl [
            ResetChannel OFFSET(16) NUMBITS(16) [],
            FreezeChannel OFFSET(0) NUMBITS(16) [],
        ],
        pub ChSema [
            Phore OFFSET(16) NUMBITS(8) [],
            IncrementSema OFFSET(0) NUMBITS(8) [],
        ],
        /// Word 1 of a hardware descriptor, mirrored in the channel CMD register.
        pub ChCmd [
            XferCount OFFSET(16) NUMBITS(16) [],
            Cmdwords OFFSET(12) NUMBITS(4) [],
            Haltonterminate OFFSET(8) NUMBITS(1) [],
            Wait4endcmd OFFSET(7) NUMBITS(1) [],
            Semaphore OFFSET(6) NUMBITS(1) [],
            Nandwait4ready OFFSET(5) NUMBITS(1) [],
            Nandlock OFFSET(4) NUMBITS(1) [],
            Irqoncmplt OFFSET(3) NUMBITS(1) [],
            Chain OFFSET(2) NUMBITS(1) [],
            Command OFFSET(0) NUMBITS(2) [
                NoDmaXfer = 0,
                DmaWrite = 1,
                DmaRead = 2,
                DmaSense = 3,
            ],
        ],
    }
}
