// Licensed under the Apache-2.0 license.

//! Channel engine for the i.MX23/i.MX28 APBH descriptor-chain DMA block.

pub mod channel;
pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod hil;
pub mod irq;
pub mod layout;
pub mod state;

pub use channel::{Channel, ChannelStatus};
pub use config::EngineConfig;
pub use descriptor::{Command, CommandFlags, Descriptor, DescriptorPool};
pub use engine::{Engine, IrqStatus};
pub use error::DmaError;
pub use hil::{DmaClient, MmioWindow, Reg, RegisterWindow};
pub use irq::{CompletionWorker, DmaEvents, IrqLatch, IrqNotifier};
pub use layout::{BitLocation, HardwareRevision, RegisterLayout};
pub use state::ChannelState;
