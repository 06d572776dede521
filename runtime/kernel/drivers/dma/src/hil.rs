// Licensed under the Apache-2.0 license.

//! HIL interfaces between the APBH DMA engine and its host.
//!
//! The engine consumes a [`RegisterWindow`] (32-bit access to the block's
//! register window) and reports finished work through a [`DmaClient`].

use core::marker::PhantomData;
use core::ptr::NonNull;
use std::sync::Arc;

use log::error;

use registers_generated::apbh::{CLR_ALIAS_OFFSET, SET_ALIAS_OFFSET, TOG_ALIAS_OFFSET};
use tock_registers::fields::FieldValue;
use tock_registers::{LocalRegisterCopy, RegisterLongName};

use crate::descriptor::Descriptor;
use crate::error::DmaError;

/// 32-bit aligned access to a memory-mapped register window.
///
/// Offsets are byte offsets from the start of the window. Registers that
/// carry SET/CLR/TOG aliases can be modified without a read-modify-write
/// through the provided methods.
pub trait RegisterWindow: Send + Sync {
    /// Read the register at `offset`.
    fn read(&self, offset: usize) -> u32;

    /// Write `value` to the register at `offset`.
    fn write(&self, offset: usize, value: u32);

    /// OR `mask` into the register at `offset` through its SET alias.
    fn set_bits(&self, offset: usize, mask: u32) {
        self.write(offset + SET_ALIAS_OFFSET, mask);
    }

    /// Clear the bits of `mask` in the register at `offset` through its CLR alias.
    fn clear_bits(&self, offset: usize, mask: u32) {
        self.write(offset + CLR_ALIAS_OFFSET, mask);
    }

    /// Flip the bits of `mask` in the register at `offset` through its TOG alias.
    fn toggle_bits(&self, offset: usize, mask: u32) {
        self.write(offset + TOG_ALIAS_OFFSET, mask);
    }
}

impl<T: RegisterWindow + ?Sized> RegisterWindow for &T {
    fn read(&self, offset: usize) -> u32 {
        (**self).read(offset)
    }
    fn write(&self, offset: usize, value: u32) {
        (**self).write(offset, value)
    }
    fn set_bits(&self, offset: usize, mask: u32) {
        (**self).set_bits(offset, mask)
    }
    fn clear_bits(&self, offset: usize, mask: u32) {
        (**self).clear_bits(offset, mask)
    }
    fn toggle_bits(&self, offset: usize, mask: u32) {
        (**self).toggle_bits(offset, mask)
    }
}

impl<T: RegisterWindow + ?Sized> RegisterWindow for Arc<T> {
    fn read(&self, offset: usize) -> u32 {
        (**self).read(offset)
    }
    fn write(&self, offset: usize, value: u32) {
        (**self).write(offset, value)
    }
    fn set_bits(&self, offset: usize, mask: u32) {
        (**self).set_bits(offset, mask)
    }
    fn clear_bits(&self, offset: usize, mask: u32) {
        (**self).clear_bits(offset, mask)
    }
    fn toggle_bits(&self, offset: usize, mask: u32) {
        (**self).toggle_bits(offset, mask)
    }
}

/// A single register in a window, typed by its bitfield definition.
pub struct Reg<'a, W: RegisterWindow + ?Sized, R: RegisterLongName> {
    window: &'a W,
    offset: usize,
    _register: PhantomData<R>,
}

impl<'a, W: RegisterWindow + ?Sized, R: RegisterLongName> Reg<'a, W, R> {
    pub fn new(window: &'a W, offset: usize) -> Self {
        Reg {
            window,
            offset,
            _register: PhantomData,
        }
    }

    pub fn get(&self) -> u32 {
        self.window.read(self.offset)
    }

    pub fn set(&self, value: u32) {
        self.window.write(self.offset, value)
    }

    /// Snapshot the register so fields can be decoded.
    pub fn extract(&self) -> LocalRegisterCopy<u32, R> {
        LocalRegisterCopy::new(self.get())
    }

    /// Overwrite the whole register with `field`.
    pub fn write(&self, field: FieldValue<u32, R>) {
        self.set(field.value)
    }

    /// Set the bits that are set in `field` via the SET alias.
    pub fn set_bits(&self, field: FieldValue<u32, R>) {
        self.window.set_bits(self.offset, field.value)
    }

    /// Clear the bits that are set in `field` via the CLR alias.
    pub fn clear_bits(&self, field: FieldValue<u32, R>) {
        self.window.clear_bits(self.offset, field.value)
    }

    /// Toggle the bits that are set in `field` via the TOG alias.
    pub fn toggle_bits(&self, field: FieldValue<u32, R>) {
        self.window.toggle_bits(self.offset, field.value)
    }
}

/// Volatile access to a mapped register window.
pub struct MmioWindow {
    base: NonNull<u32>,
    len: usize,
}

// The window is device memory; every access is a single volatile 32-bit
// load or store.
unsafe impl Send for MmioWindow {}
unsafe impl Sync for MmioWindow {}

impl MmioWindow {
    /// # Safety
    ///
    /// `base` must point to `len` bytes of mapped device memory that stays
    /// valid, and is not accessed through any other path, for the lifetime
    /// of the returned value.
    pub unsafe fn new(base: NonNull<u32>, len: usize) -> Self {
        MmioWindow { base, len }
    }

    fn word(&self, offset: usize) -> Option<*mut u32> {
        debug_assert!(
            offset % 4 == 0 && offset + 4 <= self.len,
            "register offset {offset:#x} outside window"
        );
        if offset % 4 != 0 || offset + 4 > self.len {
            error!("register offset {:#x} outside window, access dropped", offset);
            return None;
        }
        // SAFETY: bounds and alignment checked above.
        Some(unsafe { self.base.as_ptr().add(offset / 4) })
    }
}

impl RegisterWindow for MmioWindow {
    fn read(&self, offset: usize) -> u32 {
        match self.word(offset) {
            // SAFETY: `word` returns an in-bounds, aligned pointer into the window.
            Some(word) => unsafe { core::ptr::read_volatile(word) },
            None => 0,
        }
    }

    fn write(&self, offset: usize, value: u32) {
        if let Some(word) = self.word(offset) {
            // SAFETY: `word` returns an in-bounds, aligned pointer into the window.
            unsafe { core::ptr::write_volatile(word, value) }
        }
    }
}

/// A client for receiving finished DMA work.
pub trait DmaClient {
    /// Called for every completed descriptor that requested a completion
    /// notification.
    fn transfer_complete(&self, channel: u32, descriptor: Descriptor);

    /// Called when the hardware flags an error on `channel`.
    fn transfer_error(&self, channel: u32, error: DmaError);
}
