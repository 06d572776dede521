/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the DMA emulator peripheral library.

--*/

mod apbh_dma;

pub use apbh_dma::EmulatedApbh;
