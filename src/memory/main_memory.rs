//! Main memory implemented
//! with lazily allocated pages

use std::collections::HashMap;
use std::ops::Range;

use log::trace;

use super::config::MemoryTiming;
use super::{BackingStore, Transfer, Word, WORD_BYTES};
use crate::error::{MemoryError, MemoryErrorKind, MemoryResult};

const PAGE_WIDTH: u32 = 12;
const PAGE_SIZE: u64 = 1 << PAGE_WIDTH;
const PAGE_WORDS: usize = (PAGE_SIZE / WORD_BYTES) as usize;

// Defines page type
type PageType = Box<[Word; PAGE_WORDS]>;

/// Word-addressed main memory. Untouched words read as zero.
#[derive(Debug)]
pub struct MainMemory {
    // pages[x][y] stores the word at (x << PAGE_WIDTH) | (y << 2)
    pages: HashMap<u64, PageType>,
    timing: MemoryTiming,
    address_width: u32,
    protected: Vec<Range<u64>>,
}

impl MainMemory {
    /// Make a new memory
    pub fn make(timing: MemoryTiming, address_width: u32) -> Self {
        Self { pages: HashMap::new(), timing, address_width, protected: Vec::new() }
    }

    pub fn timing(&self) -> MemoryTiming {
        self.timing
    }

    /// The page number of the address
    pub fn get_page_number(address: u64) -> u64 {
        address >> PAGE_WIDTH
    }

    /// The word index within its page
    pub fn get_page_offset(address: u64) -> usize {
        ((address & (PAGE_SIZE - 1)) / WORD_BYTES) as usize
    }

    /// Check if a page is allocated at the given address
    pub fn page_exists(&self, address: u64) -> bool {
        self.pages.contains_key(&Self::get_page_number(address))
    }

    /// Allocate a page of memory at the given address.
    /// Returns true iff the allocation was successful
    pub fn allocate_page(&mut self, address: u64) -> bool {
        let page = Self::get_page_number(address);
        if self.pages.contains_key(&page) {
            false
        } else {
            self.pages.insert(page, Box::new([0; PAGE_WORDS]));
            true
        }
    }

    /// Refuse stores into `range`
    pub fn protect(&mut self, range: Range<u64>) {
        self.protected.push(range);
    }

    /// Get the word at the given address
    pub fn get32(&self, address: u64) -> Word {
        self.pages
            .get(&Self::get_page_number(address))
            .map_or(0, |page| page[Self::get_page_offset(address)])
    }

    /// Set the word at the given address, allocating its page if needed
    pub fn set32(&mut self, address: u64, value: Word) {
        self.allocate_page(address);
        if let Some(page) = self.pages.get_mut(&Self::get_page_number(address)) {
            page[Self::get_page_offset(address)] = value;
        }
    }

    fn check(
        &self,
        address: u64,
        words: usize,
        write: bool,
    ) -> MemoryResult<()> {
        if address % WORD_BYTES != 0 {
            return Err(MemoryError::AlignmentError(address, WORD_BYTES as u32));
        }
        let out_of_bounds =
            MemoryError::AccessError { address, kind: MemoryErrorKind::OutOfBounds };
        let end = address
            .checked_add(words as u64 * WORD_BYTES)
            .ok_or(out_of_bounds.clone())?;
        if self.address_width < 64 && end > 1 << self.address_width {
            return Err(out_of_bounds);
        }
        if write
            && self
                .protected
                .iter()
                .any(|range| address < range.end && range.start < end)
        {
            return Err(MemoryError::AccessError {
                address,
                kind: MemoryErrorKind::WriteProtected,
            });
        }
        Ok(())
    }
}

impl BackingStore for MainMemory {
    fn fetch_block(&mut self, address: u64, words: usize) -> MemoryResult<Transfer> {
        self.check(address, words, false)?;
        let data = (0..words as u64)
            .map(|i| self.get32(address + i * WORD_BYTES))
            .collect();
        let cycles = self.timing.read_cycles(words);
        trace!("memory read {words} words at {address:#010x} ({cycles} cycles)");
        Ok(Transfer { data, cycles })
    }

    fn store_block(&mut self, address: u64, data: &[Word]) -> MemoryResult<u32> {
        self.check(address, data.len(), true)?;
        for (i, &word) in data.iter().enumerate() {
            self.set32(address + i as u64 * WORD_BYTES, word);
        }
        let cycles = self.timing.write_cycles(data.len());
        trace!("memory write {} words at {address:#010x} ({cycles} cycles)", data.len());
        Ok(cycles)
    }
}
