// Licensed under the Apache-2.0 license

//! Engine bring-up parameters, loadable from TOML.
//!
//! ```toml
//! revision = "mx28"
//! channel_base = 4
//! channel_count = 8
//! burst = true
//! ```
//!
//! Keys that are left out take their defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DmaError;
use crate::layout::HardwareRevision;

/// Width of the semaphore counter.
pub const MAX_SEMAPHORE: u32 = 0xff;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub revision: HardwareRevision,
    /// First hardware channel served by this engine.
    pub channel_base: u32,
    pub channel_count: u32,
    pub burst: bool,
    pub burst8: bool,
    /// Descriptors a channel may hold before `enqueue` pushes back.
    pub max_pending: u32,
    /// Descriptors a channel may have handed to hardware at once.
    pub max_in_flight: u32,
    pub reset_poll_limit: u32,
    pub reset_poll_delay_us: u64,
    /// Bus address of the descriptor pool.
    pub descriptor_base: u32,
    pub descriptor_count: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            revision: HardwareRevision::Mx28,
            channel_base: 0,
            channel_count: 16,
            burst: false,
            burst8: false,
            max_pending: 64,
            max_in_flight: MAX_SEMAPHORE,
            reset_poll_limit: 10_000,
            reset_poll_delay_us: 1,
            descriptor_base: 0x4000_0000,
            descriptor_count: 256,
        }
    }
}

impl EngineConfig {
    pub fn new(revision: HardwareRevision, channel_base: u32, channel_count: u32) -> Self {
        EngineConfig {
            revision,
            channel_base,
            channel_count,
            ..Default::default()
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, DmaError> {
        let config: EngineConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, DmaError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn validate(&self) -> Result<(), DmaError> {
        let available = self.revision.layout().channel_count();
        if self.channel_count == 0 {
            return Err(DmaError::InvalidConfig("no channels configured".into()));
        }
        if self.channel_base.saturating_add(self.channel_count) > available {
            return Err(DmaError::InvalidConfig(format!(
                "channels {}..{} exceed the {} channels of {:?}",
                self.channel_base,
                self.channel_base.saturating_add(self.channel_count),
                available,
                self.revision
            )));
        }
        if self.max_in_flight == 0 || self.max_in_flight > MAX_SEMAPHORE {
            return Err(DmaError::InvalidConfig(format!(
                "max_in_flight must be within 1..={MAX_SEMAPHORE}"
            )));
        }
        if self.max_pending == 0 {
            return Err(DmaError::InvalidConfig("max_pending must be non-zero".into()));
        }
        if self.reset_poll_limit == 0 {
            return Err(DmaError::InvalidConfig(
                "reset_poll_limit must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Hardware channels served, in ascending order.
    pub fn channels(&self) -> std::ops::Range<u32> {
        self.channel_base..self.channel_base + self.channel_count
    }
}
