//! Cache implementation

use log::{debug, info, trace, warn};

use super::config::CacheConfig;
use super::decoder::{AddressDecoder, DecodedAddress};
use super::line::CacheLine;
use super::observer::{CacheEvent, CacheObserver, Observers, SubscriptionId};
use super::replacement::ReplacementPolicyKind;
use super::set::CacheSet;
use super::write_policy::WritePolicy;
use super::{AccessResult, BackingStore, Transfer, Word, WORD_BYTES};
use crate::error::{ConfigError, MemoryResult};

/// Set-associative cache in front of a backing store
#[derive(Debug)]
pub struct Cache<B: BackingStore> {
    name: String,
    config: CacheConfig,
    decoder: AddressDecoder,
    sets: Vec<CacheSet>,
    backing: B,
    observers: Observers,

    pub history: CacheHistory,
}

impl<B: BackingStore> Cache<B> {
    /// Validate `config` and build an empty cache.
    /// Nothing is constructed if the configuration is invalid.
    pub fn new(config: CacheConfig, backing: B) -> Result<Self, ConfigError> {
        let decoder = config.validate()?;

        let associativity = config.associativity as usize;
        let block_size = config.block_size as usize;
        let tracks_dirty = config.write_policy.tracks_dirty();
        let sets = (0..config.sets)
            .map(|index| {
                let seed = config.seed.wrapping_add(index);
                let policy =
                    config.replacement_policy.build(associativity, seed);
                CacheSet::new(associativity, block_size, tracks_dirty, policy)
            })
            .collect();

        info!(
            "cache: {} sets x {} ways x {} words, {:?}, {:?}, tag/index/offset = {}/{}/{}",
            config.sets,
            config.associativity,
            config.block_size,
            config.replacement_policy,
            config.write_policy,
            decoder.tag_bits(),
            decoder.index_bits(),
            decoder.offset_bits(),
        );
        if !config.enabled {
            warn!("cache is disabled, all accesses go to the next level");
        }

        Ok(Self {
            name: "cache".to_string(),
            config,
            decoder,
            sets,
            backing,
            observers: Observers::default(),
            history: CacheHistory::default(),
        })
    }

    /// Label used in log messages
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn decoder(&self) -> &AddressDecoder {
        &self.decoder
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Number of sets
    pub fn sets(&self) -> usize {
        self.sets.len()
    }

    /// Words per block
    pub fn block_size(&self) -> usize {
        self.config.block_size as usize
    }

    pub fn associativity(&self) -> usize {
        self.config.associativity as usize
    }

    pub fn write_policy(&self) -> WritePolicy {
        self.config.write_policy
    }

    pub fn replacement_policy(&self) -> ReplacementPolicyKind {
        self.config.replacement_policy
    }

    /// # Panics
    ///
    /// Panics if `index` is not below [`Cache::sets`].
    pub fn set(&self, index: usize) -> &CacheSet {
        &self.sets[index]
    }

    /// # Panics
    ///
    /// Panics if `set` or `way` is out of range.
    pub fn line(&self, set: usize, way: usize) -> &CacheLine {
        self.sets[set].line(way)
    }

    pub fn backing(&self) -> &B {
        &self.backing
    }

    pub fn backing_mut(&mut self) -> &mut B {
        &mut self.backing
    }

    pub fn into_backing(self) -> B {
        self.backing
    }

    /// Register an observer for change events
    pub fn subscribe(
        &mut self,
        observer: impl CacheObserver + 'static,
    ) -> SubscriptionId {
        self.observers.subscribe(Box::new(observer))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Computes the current miss rate of the cache
    pub fn get_miss_rate(&self) -> f64 {
        self.history.get_miss_rate()
    }

    /// Read the word containing `address`
    pub fn read(&mut self, address: u64) -> MemoryResult<AccessResult> {
        let word_address = address & !(WORD_BYTES - 1);
        if !self.config.enabled {
            let transfer = self.backing.fetch_block(word_address, 1)?;
            return Ok(AccessResult {
                data: transfer.data.first().copied(),
                hit: false,
                latency_cycles: transfer.cycles,
            });
        }

        let decoded = self.decoder.decode(address);
        let index = decoded.index;
        let mut cycles = self.config.hit_latency;

        let (way, hit) = match self.sets[index].lookup(decoded.tag) {
            Some(way) => {
                trace!("{}: read hit {address:#010x} set {index} way {way}", self.name);
                self.sets[index].touch(way);
                self.history.record_hit();
                (way, true)
            }
            None => {
                debug!("{}: read miss {address:#010x} set {index}", self.name);
                self.history.record_miss();
                let (way, fill_cycles) = self.fill(&decoded)?;
                cycles = cycles.saturating_add(fill_cycles);
                (way, false)
            }
        };

        let data = self.sets[index].line(way).word(decoded.offset);
        self.emit(index, way);
        self.history.record_cycles(cycles, self.config.hit_latency);

        Ok(AccessResult { data: Some(data), hit, latency_cycles: cycles })
    }

    /// Write `data` to the word containing `address`
    pub fn write(&mut self, address: u64, data: Word) -> MemoryResult<AccessResult> {
        let word_address = address & !(WORD_BYTES - 1);
        if !self.config.enabled {
            let cycles = self.backing.store_block(word_address, &[data])?;
            return Ok(AccessResult { data: None, hit: false, latency_cycles: cycles });
        }

        let decoded = self.decoder.decode(address);
        let index = decoded.index;
        let policy = self.config.write_policy;
        let mut cycles = self.config.hit_latency;

        let (way, hit) = match self.sets[index].lookup(decoded.tag) {
            Some(way) => {
                trace!("{}: write hit {address:#010x} set {index} way {way}", self.name);
                self.sets[index].touch(way);
                self.history.record_hit();
                (Some(way), true)
            }
            None => {
                self.history.record_miss();
                if policy.write_allocate() {
                    debug!("{}: write miss {address:#010x} set {index}, allocating", self.name);
                    let (way, fill_cycles) = self.fill(&decoded)?;
                    cycles = cycles.saturating_add(fill_cycles);
                    (Some(way), false)
                } else {
                    debug!("{}: write miss {address:#010x} set {index}, bypassing", self.name);
                    (None, false)
                }
            }
        };

        let propagate_now = match way {
            Some(way) => policy.on_write(self.sets[index].line(way)).propagate_now,
            // No line was touched, so observers hear nothing
            None => true,
        };

        // The line only takes the word once the backing store has it
        if propagate_now {
            match self.backing.store_block(word_address, &[data]) {
                Ok(store_cycles) => {
                    cycles = cycles.saturating_add(store_cycles);
                    self.history.memory_writes += 1;
                }
                Err(error) => {
                    // An allocating miss already refilled the line
                    if let (Some(way), false) = (way, hit) {
                        self.emit(index, way);
                    }
                    return Err(error);
                }
            }
        }

        if let Some(way) = way {
            let set = &mut self.sets[index];
            set.write_word(way, decoded.offset, data);
            if !propagate_now {
                set.mark_dirty(way);
            }
            self.emit(index, way);
        }
        self.history.record_cycles(cycles, self.config.hit_latency);

        Ok(AccessResult { data: None, hit, latency_cycles: cycles })
    }

    /// Write every dirty line back, in ascending (set, way) order.
    /// Returns the cycles spent.
    pub fn flush(&mut self) -> MemoryResult<u32> {
        let policy = self.config.write_policy;
        let mut cycles: u32 = 0;
        let mut flushed = 0;

        for index in 0..self.sets.len() {
            for way in 0..self.sets[index].associativity() {
                let line = self.sets[index].line(way);
                if !policy.on_evict(line).must_writeback {
                    continue;
                }
                let address = self.decoder.block_address(line.tag(), index);
                let written = self.backing.store_block(address, line.data())?;
                cycles = cycles.saturating_add(written);
                self.history.memory_writes += line.data().len() as u64;

                self.sets[index].clear_dirty(way);
                self.emit(index, way);
                flushed += 1;
            }
        }

        info!("{}: flushed {flushed} dirty lines in {cycles} cycles", self.name);
        Ok(cycles)
    }

    /// Invalidate every line and clear replacement state and statistics.
    /// Dirty data is dropped, not written back.
    pub fn reset(&mut self) {
        for index in 0..self.sets.len() {
            let resident: Vec<usize> = self.sets[index]
                .lines()
                .iter()
                .enumerate()
                .filter(|(_, line)| line.valid())
                .map(|(way, _)| way)
                .collect();
            self.sets[index].reset();
            for way in resident {
                self.emit(index, way);
            }
        }
        self.history = CacheHistory::default();
        debug!("{}: reset", self.name);
    }

    /// Bring the block of `decoded` in from the backing store,
    /// writing back whatever it displaces when needed.
    /// A victim stays resident until its write-back succeeds.
    /// Returns the way filled and the cycles spent.
    fn fill(&mut self, decoded: &DecodedAddress) -> MemoryResult<(usize, u32)> {
        let index = decoded.index;
        let block_size = self.block_size();
        let block_address = self.decoder.block_address(decoded.tag, index);

        let Transfer { data, mut cycles } =
            self.backing.fetch_block(block_address, block_size)?;
        self.history.memory_reads += block_size as u64;

        let way = self.sets[index].select_way();
        let victim = self.sets[index].line(way);
        if victim.valid() {
            let victim_address = self.decoder.block_address(victim.tag(), index);
            if self.config.write_policy.on_evict(victim).must_writeback {
                debug!(
                    "{}: writing back {victim_address:#010x} from set {index} way {way}",
                    self.name
                );
                let written = self.backing.store_block(victim_address, victim.data())?;
                cycles = cycles.saturating_add(written);
                self.history.memory_writes += victim.data().len() as u64;
            } else {
                debug!(
                    "{}: evicted {victim_address:#010x} from set {index} way {way}",
                    self.name
                );
            }
        }

        self.sets[index].install_at(way, decoded.tag, data, false);
        Ok((way, cycles))
    }

    fn emit(&mut self, set: usize, way: usize) {
        if self.observers.is_empty() {
            return;
        }
        let event = CacheEvent::from_line(set, way, self.sets[set].line(way));
        self.observers.notify(&event);
    }
}

/// A cache can stand in for memory behind another cache.
/// Blocks move word by word, so the reported cycles are the sum
/// of every word access at this level.
impl<B: BackingStore> BackingStore for Cache<B> {
    fn fetch_block(&mut self, address: u64, words: usize) -> MemoryResult<Transfer> {
        let mut transfer = Transfer { data: Vec::with_capacity(words), cycles: 0 };
        for i in 0..words as u64 {
            let result = self.read(address + i * WORD_BYTES)?;
            transfer.data.push(result.data.unwrap_or_default());
            transfer.cycles = transfer.cycles.saturating_add(result.latency_cycles);
        }
        Ok(transfer)
    }

    fn store_block(&mut self, address: u64, data: &[Word]) -> MemoryResult<u32> {
        let mut cycles: u32 = 0;
        for (i, &word) in data.iter().enumerate() {
            let result = self.write(address + i as u64 * WORD_BYTES, word)?;
            cycles = cycles.saturating_add(result.latency_cycles);
        }
        Ok(cycles)
    }
}

/// Access statistics of one cache
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct CacheHistory {
    pub num_hit: u64,
    pub num_miss: u64,
    /// Words fetched from the backing store
    pub memory_reads: u64,
    /// Words stored to the backing store
    pub memory_writes: u64,
    pub total_cycles: u64,
    /// Cycles spent beyond the hit latency
    pub stall_cycles: u64,
}

impl CacheHistory {
    pub fn record_hit(&mut self) {
        self.num_hit += 1;
    }

    pub fn record_miss(&mut self) {
        self.num_miss += 1;
    }

    fn record_cycles(&mut self, cycles: u32, hit_latency: u32) {
        self.total_cycles += cycles as u64;
        self.stall_cycles += cycles.saturating_sub(hit_latency) as u64;
    }

    pub fn accesses(&self) -> u64 {
        self.num_hit + self.num_miss
    }

    pub fn get_miss_rate(&self) -> f64 {
        if self.accesses() == 0 {
            0.
        } else {
            self.num_miss as f64 / self.accesses() as f64
        }
    }

    pub fn get_hit_rate(&self) -> f64 {
        if self.accesses() == 0 {
            0.
        } else {
            self.num_hit as f64 / self.accesses() as f64
        }
    }

    /// Mean cycles per access
    pub fn get_average_latency(&self) -> f64 {
        if self.accesses() == 0 {
            0.
        } else {
            self.total_cycles as f64 / self.accesses() as f64
        }
    }

    /// Speed-up over serving every access with `uncached_latency` cycles
    pub fn get_speed_improvement(&self, uncached_latency: u32) -> f64 {
        if self.total_cycles == 0 {
            1.
        } else {
            (self.accesses() * uncached_latency as u64) as f64
                / self.total_cycles as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::config::MemoryTiming;
    use crate::memory::main_memory::MainMemory;
    use crate::memory::observer::EventRecorder;

    fn make_cache(config: CacheConfig) -> Cache<MainMemory> {
        Cache::new(config, MainMemory::make(MemoryTiming::default(), 32)).unwrap()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let memory = MainMemory::make(MemoryTiming::default(), 32);
        let result = Cache::new(CacheConfig::new(5, 1, 1), memory);
        assert!(matches!(result, Err(ConfigError::NotPowerOfTwo { field: "sets", .. })));
    }

    #[test]
    fn test_read_miss_then_hit() {
        let mut cache = make_cache(CacheConfig::new(4, 2, 1));
        cache.backing_mut().set32(0x104, 0xabcd);

        let first = cache.read(0x104).unwrap();
        assert_eq!(first.data, Some(0xabcd));
        assert!(!first.hit);
        assert_eq!(first.latency_cycles, 1 + 20);

        let second = cache.read(0x106).unwrap();
        assert_eq!(second.data, Some(0xabcd));
        assert!(second.hit);
        assert_eq!(second.latency_cycles, 1);

        // Neighbouring word came in with the block
        assert!(cache.read(0x100).unwrap().hit);
        assert_eq!(cache.history.num_hit, 2);
        assert_eq!(cache.history.num_miss, 1);
        assert_eq!(cache.history.memory_reads, 2);
    }

    #[test]
    fn test_events_follow_accesses() {
        let mut cache = make_cache(CacheConfig::new(4, 1, 2));
        let recorder = EventRecorder::new();
        cache.subscribe(recorder.clone());

        cache.write(0x14, 7).unwrap();
        cache.read(0x14).unwrap();

        let events = recorder.events();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            CacheEvent { way: 0, set: 1, valid: true, dirty: true, tag: 1, data: vec![7] }
        );
        assert_eq!(events[1], events[0]);
    }

    #[test]
    fn test_write_no_allocate_bypasses() {
        let config = CacheConfig::new(4, 1, 1)
            .with_write_policy(WritePolicy::ThroughNoAllocate);
        let mut cache = make_cache(config);
        let recorder = EventRecorder::new();
        cache.subscribe(recorder.clone());

        let result = cache.write(0x20, 5).unwrap();
        assert!(!result.hit);
        assert_eq!(result.latency_cycles, 1 + 10);
        assert!(recorder.is_empty());
        assert!(!cache.line(0, 0).valid());
        assert_eq!(cache.backing().get32(0x20), 5);

        assert_eq!(cache.read(0x20).unwrap().data, Some(5));
    }

    #[test]
    fn test_disabled_cache_passes_through() {
        let mut cache = make_cache(CacheConfig::new(4, 1, 1).disabled());
        let recorder = EventRecorder::new();
        cache.subscribe(recorder.clone());

        cache.write(0x8, 3).unwrap();
        let result = cache.read(0x8).unwrap();
        assert_eq!(result.data, Some(3));
        assert!(!result.hit);
        assert!(recorder.is_empty());
        assert_eq!(cache.history.accesses(), 0);
    }

    #[test]
    fn test_reset() {
        let mut cache = make_cache(CacheConfig::new(2, 1, 1));
        cache.write(0x0, 1).unwrap();
        cache.write(0x4, 2).unwrap();
        let recorder = EventRecorder::new();
        cache.subscribe(recorder.clone());

        cache.reset();
        assert_eq!(recorder.len(), 2);
        assert!(recorder.events().iter().all(|event| !event.valid));
        assert!(!cache.line(0, 0).valid());
        assert_eq!(cache.history, CacheHistory::default());
        // Dirty data was dropped
        assert_eq!(cache.backing().get32(0x0), 0);
    }

    #[test]
    fn test_history_rates() {
        let history = CacheHistory {
            num_hit: 3,
            num_miss: 1,
            total_cycles: 24,
            ..Default::default()
        };
        assert_eq!(history.get_miss_rate(), 0.25);
        assert_eq!(history.get_hit_rate(), 0.75);
        assert_eq!(history.get_average_latency(), 6.);
        assert_eq!(history.get_speed_improvement(12), 2.);
        assert_eq!(CacheHistory::default().get_miss_rate(), 0.);
    }
}
