use std::collections::HashMap;

use cache_lib::error::MemoryResult;
use cache_lib::memory::{BackingStore, Transfer, Word, WORD_BYTES};

pub const FETCH_CYCLES: u32 = 5;
pub const STORE_CYCLES: u32 = 3;

/// Backing store that remembers every block stored to it
#[derive(Debug, Default)]
pub struct RecordingStore {
    pub words: HashMap<u64, Word>,
    pub fetches: Vec<u64>,
    pub stores: Vec<(u64, Vec<Word>)>,
}

impl RecordingStore {
    pub fn word(&self, address: u64) -> Word {
        self.words.get(&address).copied().unwrap_or(0)
    }
}

impl BackingStore for RecordingStore {
    fn fetch_block(&mut self, address: u64, words: usize) -> MemoryResult<Transfer> {
        self.fetches.push(address);
        let data = (0..words as u64).map(|i| self.word(address + i * WORD_BYTES)).collect();
        Ok(Transfer { data, cycles: FETCH_CYCLES })
    }

    fn store_block(&mut self, address: u64, data: &[Word]) -> MemoryResult<u32> {
        for (i, &word) in data.iter().enumerate() {
            self.words.insert(address + i as u64 * WORD_BYTES, word);
        }
        self.stores.push((address, data.to_vec()));
        Ok(STORE_CYCLES)
    }
}
