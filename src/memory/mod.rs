//! Memory structure

pub mod cache;
pub mod config;
pub mod decoder;
pub mod hierarchy;
pub mod line;
pub mod main_memory;
pub mod observer;
pub mod replacement;
pub mod set;
pub mod write_policy;

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::MemoryResult;

/// Simulated machine words are 32 bits wide
pub type Word = u32;

/// Number of bytes in a word
pub const WORD_BYTES: u64 = 4;

/// Number of address bits selecting a byte within a word
pub const BYTE_OFFSET_BITS: u32 = 2;

pub fn get_log_2(value: u64) -> u32 {
    assert!(value > 0);
    63 - value.leading_zeros()
}

pub fn is_pow_2(value: u64) -> bool {
    value != 0 && value & (value - 1) == 0
}

pub fn get_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1 << bits) - 1
    }
}

/// Words moved by a block fetch, and what the transfer cost
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transfer {
    pub data: Vec<Word>,
    pub cycles: u32,
}

/// Storage behind a cache: main memory or the next cache level.
///
/// Addresses handed to a backing store are always word-aligned.
pub trait BackingStore {
    /// Read `words` consecutive words starting at `address`
    fn fetch_block(&mut self, address: u64, words: usize) -> MemoryResult<Transfer>;

    /// Write `data` starting at `address`, returning the cycles spent
    fn store_block(&mut self, address: u64, data: &[Word]) -> MemoryResult<u32>;
}

impl<B: BackingStore + ?Sized> BackingStore for Box<B> {
    fn fetch_block(&mut self, address: u64, words: usize) -> MemoryResult<Transfer> {
        (**self).fetch_block(address, words)
    }

    fn store_block(&mut self, address: u64, data: &[Word]) -> MemoryResult<u32> {
        (**self).store_block(address, data)
    }
}

/// A store shared by several upper levels, e.g. an L2 behind split L1s.
/// Accesses are strictly sequential, so the borrow never overlaps.
impl<B: BackingStore + ?Sized> BackingStore for Rc<RefCell<B>> {
    fn fetch_block(&mut self, address: u64, words: usize) -> MemoryResult<Transfer> {
        self.borrow_mut().fetch_block(address, words)
    }

    fn store_block(&mut self, address: u64, data: &[Word]) -> MemoryResult<u32> {
        self.borrow_mut().store_block(address, data)
    }
}

/// Outcome of a single cache access
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessResult {
    /// Word read, `None` for writes
    pub data: Option<Word>,
    pub hit: bool,
    pub latency_cycles: u32,
}
