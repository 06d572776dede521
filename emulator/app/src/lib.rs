/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the APBH DMA emulator.

--*/

mod demo;

pub use demo::{load_config, run, DemoSummary, DmaDemoArgs};
