//! A single cache slot

use super::Word;

/// One way of a set. Lines are mutated only through their `CacheSet`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheLine {
    valid: bool,
    /// `None` when the cache is write-through and never tracks dirtiness
    dirty: Option<bool>,
    tag: u64,
    data: Vec<Word>,
}

impl CacheLine {
    /// Make an invalid line holding `block_size` zeroed words
    pub fn new(block_size: usize, tracks_dirty: bool) -> Self {
        Self {
            valid: false,
            dirty: tracks_dirty.then_some(false),
            tag: 0,
            data: vec![0; block_size],
        }
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Dirty bit, absent under write-through
    pub fn dirty(&self) -> Option<bool> {
        self.dirty
    }

    pub fn is_dirty(&self) -> bool {
        self.valid && self.dirty == Some(true)
    }

    pub fn tag(&self) -> u64 {
        self.tag
    }

    pub fn data(&self) -> &[Word] {
        &self.data
    }

    pub fn word(&self, offset: usize) -> Word {
        self.data[offset]
    }

    pub(super) fn fill(&mut self, tag: u64, data: Vec<Word>, dirty: bool) {
        debug_assert_eq!(data.len(), self.data.len());
        self.valid = true;
        self.tag = tag;
        self.data = data;
        if let Some(bit) = self.dirty.as_mut() {
            *bit = dirty;
        }
    }

    pub(super) fn set_word(&mut self, offset: usize, value: Word) {
        self.data[offset] = value;
    }

    /// No-op on lines without a dirty bit
    pub(super) fn set_dirty(&mut self, dirty: bool) {
        if let Some(bit) = self.dirty.as_mut() {
            *bit = dirty;
        }
    }

    pub(super) fn invalidate(&mut self) {
        self.valid = false;
        self.tag = 0;
        self.data.iter_mut().for_each(|word| *word = 0);
        self.set_dirty(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_line_is_invalid() {
        let line = CacheLine::new(4, true);
        assert!(!line.valid());
        assert_eq!(line.dirty(), Some(false));
        assert_eq!(line.data(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_write_through_has_no_dirty_bit() {
        let mut line = CacheLine::new(1, false);
        line.fill(3, vec![7], true);
        line.set_dirty(true);
        assert_eq!(line.dirty(), None);
        assert!(!line.is_dirty());
    }

    #[test]
    fn test_invalidate() {
        let mut line = CacheLine::new(2, true);
        line.fill(0x12, vec![1, 2], false);
        line.set_dirty(true);
        assert!(line.is_dirty());

        line.invalidate();
        assert!(!line.valid());
        assert_eq!(line.dirty(), Some(false));
        assert_eq!(line.data(), &[0, 0]);
    }
}
