// Licensed under the Apache-2.0 license

//! Register definitions for the APBH descriptor-chain DMA block.

#![no_std]

pub mod apbh;
