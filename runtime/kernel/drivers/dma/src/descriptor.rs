// Licensed under the Apache-2.0 license

//! Hardware-chainable DMA descriptors and the pool they are carved from.
//!
//! In memory a descriptor is three words (next pointer, command word, buffer
//! address) followed by up to 15 PIO words that the hardware writes to the
//! peripheral before the transfer.

use arrayvec::ArrayVec;
use bitflags::bitflags;
use registers_generated::apbh::bits::ChCmd;
use tock_registers::fields::FieldValue;

use crate::error::DmaError;

pub const MAX_PIO_WORDS: usize = 15;

/// Bytes reserved per descriptor in the pool.
pub const DESCRIPTOR_STRIDE: u32 = 0x60;

/// Largest transfer a single descriptor can describe.
pub const MAX_XFER_COUNT: u32 = 0xffff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Peripheral to memory.
    Read,
    /// Memory to peripheral.
    Write,
    /// Only PIO words are written.
    NoDmaXfer,
    /// Sense/terminate the chain.
    Terminator,
}

impl Command {
    fn field(self) -> FieldValue<u32, ChCmd::Register> {
        // The APBH names directions from the memory side: DMA_WRITE stores
        // into memory.
        match self {
            Command::Read => ChCmd::Command::DmaWrite,
            Command::Write => ChCmd::Command::DmaRead,
            Command::NoDmaXfer => ChCmd::Command::NoDmaXfer,
            Command::Terminator => ChCmd::Command::DmaSense,
        }
    }

    fn moves_data(self) -> bool {
        matches!(self, Command::Read | Command::Write)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CommandFlags: u32 {
        const DEC_SEM = 1 << 0;
        const WAIT4END = 1 << 1;
        const NAND_LOCK = 1 << 2;
        const NAND_WAIT4READY = 1 << 3;
        const HALT_ON_TERMINATE = 1 << 4;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    address: u32,
    seq: u64,
    pub command: Command,
    pub chain: bool,
    pub completion_flag: bool,
    pub flags: CommandFlags,
    pub buffer_address: usize,
    pub length: u32,
    pub next: u32,
    pub pio_words: ArrayVec<u32, MAX_PIO_WORDS>,
}

impl Descriptor {
    /// A descriptor living at bus address `address`.
    pub fn new(address: u32, command: Command) -> Self {
        Descriptor {
            address,
            seq: 0,
            command,
            chain: false,
            completion_flag: false,
            flags: CommandFlags::WAIT4END,
            buffer_address: 0,
            length: 0,
            next: 0,
            pio_words: ArrayVec::new(),
        }
    }

    pub fn with_buffer(mut self, buffer_address: usize, length: u32) -> Self {
        self.buffer_address = buffer_address;
        self.length = length;
        self
    }

    pub fn with_completion(mut self, completion_flag: bool) -> Self {
        self.completion_flag = completion_flag;
        self
    }

    pub fn with_flags(mut self, flags: CommandFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_pio_words(mut self, words: &[u32]) -> Result<Self, DmaError> {
        self.pio_words
            .try_extend_from_slice(words)
            .map_err(|_| DmaError::InvalidDescriptor("too many PIO words"))?;
        Ok(self)
    }

    /// Bus address of the descriptor itself.
    pub fn address(&self) -> u32 {
        self.address
    }

    /// Position in the enqueue order of its channel, assigned on enqueue.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn set_seq(&mut self, seq: u64) {
        self.seq = seq;
    }

    /// Link this descriptor to `next` in the hardware chain.
    pub(crate) fn link(&mut self, next: u32) {
        self.chain = true;
        self.next = next;
    }

    pub fn validate(&self) -> Result<(), DmaError> {
        if self.length > MAX_XFER_COUNT {
            return Err(DmaError::InvalidDescriptor("transfer longer than 64 KiB"));
        }
        if u32::try_from(self.buffer_address).is_err() {
            return Err(DmaError::InvalidDescriptor(
                "buffer address outside the 32-bit bus",
            ));
        }
        if !self.command.moves_data() && self.length != 0 {
            return Err(DmaError::InvalidDescriptor(
                "command without data transfer has a length",
            ));
        }
        Ok(())
    }

    /// Encode word 1 of the hardware descriptor.
    pub fn command_word(&self) -> u32 {
        let flag = |set: bool| u32::from(set);
        let value = self.command.field()
            + ChCmd::Chain.val(flag(self.chain))
            + ChCmd::Irqoncmplt.val(flag(self.completion_flag))
            + ChCmd::Semaphore.val(flag(self.flags.contains(CommandFlags::DEC_SEM)))
            + ChCmd::Wait4endcmd.val(flag(self.flags.contains(CommandFlags::WAIT4END)))
            + ChCmd::Nandlock.val(flag(self.flags.contains(CommandFlags::NAND_LOCK)))
            + ChCmd::Nandwait4ready.val(flag(self.flags.contains(CommandFlags::NAND_WAIT4READY)))
            + ChCmd::Haltonterminate.val(flag(
                self.flags.contains(CommandFlags::HALT_ON_TERMINATE),
            ))
            + ChCmd::Cmdwords.val(self.pio_words.len() as u32)
            + ChCmd::XferCount.val(self.length);
        value.value
    }
}

/// Fixed region of descriptor slots handed out by address.
#[derive(Debug)]
pub struct DescriptorPool {
    base: u32,
    capacity: u32,
    free: Vec<u32>,
}

impl DescriptorPool {
    pub fn new(base: u32, capacity: u32) -> Self {
        // Hand out the lowest addresses first.
        let free = (0..capacity)
            .rev()
            .map(|slot| base + slot * DESCRIPTOR_STRIDE)
            .collect();
        DescriptorPool {
            base,
            capacity,
            free,
        }
    }

    pub fn alloc(&mut self, command: Command) -> Result<Descriptor, DmaError> {
        let address = self.free.pop().ok_or(DmaError::PoolExhausted)?;
        Ok(Descriptor::new(address, command))
    }

    pub fn free(&mut self, descriptor: Descriptor) -> Result<(), DmaError> {
        let address = descriptor.address();
        if !self.owns(address) {
            return Err(DmaError::InvalidDescriptor("not allocated from this pool"));
        }
        if self.free.contains(&address) {
            return Err(DmaError::InvalidDescriptor("descriptor freed twice"));
        }
        self.free.push(address);
        Ok(())
    }

    pub fn owns(&self, address: u32) -> bool {
        let end = self.base as u64 + self.capacity as u64 * DESCRIPTOR_STRIDE as u64;
        (self.base as u64..end).contains(&(address as u64))
            && (address - self.base) % DESCRIPTOR_STRIDE == 0
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }
}
