//! A group of ways sharing one index

use super::line::CacheLine;
use super::replacement::{LineAccess, ReplacementPolicy};
use super::Word;

/// One set of an associative cache. The only mutation path into its lines.
#[derive(Debug)]
pub struct CacheSet {
    lines: Vec<CacheLine>,
    policy: Box<dyn ReplacementPolicy>,
}

impl CacheSet {
    pub fn new(
        associativity: usize,
        block_size: usize,
        tracks_dirty: bool,
        policy: Box<dyn ReplacementPolicy>,
    ) -> Self {
        Self {
            lines: vec![CacheLine::new(block_size, tracks_dirty); associativity],
            policy,
        }
    }

    /// Way holding `tag`, if any
    pub fn lookup(&self, tag: u64) -> Option<usize> {
        self.lines.iter().position(|line| line.valid() && line.tag() == tag)
    }

    pub fn line(&self, way: usize) -> &CacheLine {
        &self.lines[way]
    }

    pub fn lines(&self) -> &[CacheLine] {
        &self.lines
    }

    pub fn associativity(&self) -> usize {
        self.lines.len()
    }

    /// Record a hit on `way`
    pub fn touch(&mut self, way: usize) {
        self.policy.on_access(way, LineAccess::Hit);
    }

    /// Way to fill next: the first invalid one, otherwise the policy's victim.
    /// The set is left untouched, so a resident victim can still be
    /// written back before `install_at` replaces it.
    pub fn select_way(&mut self) -> usize {
        match self.lines.iter().position(|line| !line.valid()) {
            Some(way) => way,
            None => self.policy.victim(),
        }
    }

    /// Place a block in the set, returning the way used
    /// and the block that was displaced, if any
    pub fn install(
        &mut self,
        tag: u64,
        data: Vec<Word>,
        dirty: bool,
    ) -> (usize, Option<CacheLine>) {
        let way = self.select_way();
        (way, self.install_at(way, tag, data, dirty))
    }

    /// Place a block in `way`, returning the block it displaced
    pub fn install_at(
        &mut self,
        way: usize,
        tag: u64,
        data: Vec<Word>,
        dirty: bool,
    ) -> Option<CacheLine> {
        debug_assert!(self.lookup(tag).is_none(), "tag {tag:#x} already resident");

        let evicted = if self.lines[way].valid() {
            Some(self.evict(way))
        } else {
            None
        };

        self.lines[way].fill(tag, data, dirty);
        self.policy.on_access(way, LineAccess::Fill);
        evicted
    }

    /// Overwrite one word of a resident block
    pub fn write_word(&mut self, way: usize, offset: usize, value: Word) {
        self.lines[way].set_word(offset, value);
    }

    /// No-op under write-through
    pub fn mark_dirty(&mut self, way: usize) {
        self.lines[way].set_dirty(true);
    }

    /// No-op under write-through
    pub fn clear_dirty(&mut self, way: usize) {
        self.lines[way].set_dirty(false);
    }

    /// Invalidate `way`, returning what it held
    pub fn evict(&mut self, way: usize) -> CacheLine {
        let snapshot = self.lines[way].clone();
        self.lines[way].invalidate();
        self.policy.on_invalidate(way);
        snapshot
    }

    /// Invalidate every way and forget replacement history
    pub fn reset(&mut self) {
        self.lines.iter_mut().for_each(CacheLine::invalidate);
        self.policy.reset();
    }
}
