// Licensed under the Apache-2.0 license

use thiserror::Error;

use crate::state::ChannelState;

/// Errors reported by the DMA engine.
#[derive(Error, Debug)]
pub enum DmaError {
    #[error("DMA block still in soft reset after {0} polls")]
    ResetTimeout(u32),
    #[error("pending queue of channel {0} is full")]
    ChannelFull(u32),
    #[error("channel {0} is not served by this engine")]
    InvalidChannel(u32),
    #[error("completion signalled on channel {0} with no active descriptor")]
    SpuriousCompletion(u32),
    #[error("cannot {op} channel {channel} while {state:?}")]
    InvalidState {
        channel: u32,
        op: &'static str,
        state: ChannelState,
    },
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(&'static str),
    #[error("channel {channel} is owned by {owner}")]
    ChannelInUse { channel: u32, owner: String },
    #[error("descriptor pool exhausted")]
    PoolExhausted,
    #[error("hardware reported an error on channel {0}")]
    ChannelError(u32),
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to parse engine configuration")]
    ConfigParse(#[from] toml::de::Error),
    #[error("failed to read engine configuration")]
    ConfigIo(#[from] std::io::Error),
}
