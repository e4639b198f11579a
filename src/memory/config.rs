//! Cache and hierarchy configuration

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::decoder::AddressDecoder;
use super::replacement::ReplacementPolicyKind;
use super::write_policy::WritePolicy;
use crate::error::{ConfigError, SimulatorResult};

/// Geometry and policies of one cache level.
/// `sets` and `block_size` (in words) must be powers of two.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub enabled: bool,
    pub sets: u64,
    pub block_size: u64,
    pub associativity: u64,
    pub replacement_policy: ReplacementPolicyKind,
    pub write_policy: WritePolicy,
    pub address_width: u32,
    pub hit_latency: u32,
    /// Seed for the random replacement policy
    pub seed: u64,
    /// Name of the level behind this one, main memory if absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_level: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sets: 1,
            block_size: 1,
            associativity: 1,
            replacement_policy: ReplacementPolicyKind::default(),
            write_policy: WritePolicy::default(),
            address_width: 32,
            hit_latency: 1,
            seed: 0,
            next_level: None,
        }
    }
}

impl CacheConfig {
    pub fn new(sets: u64, block_size: u64, associativity: u64) -> Self {
        Self { sets, block_size, associativity, ..Self::default() }
    }

    pub fn with_replacement(mut self, policy: ReplacementPolicyKind) -> Self {
        self.replacement_policy = policy;
        self
    }

    pub fn with_write_policy(mut self, policy: WritePolicy) -> Self {
        self.write_policy = policy;
        self
    }

    pub fn with_address_width(mut self, address_width: u32) -> Self {
        self.address_width = address_width;
        self
    }

    pub fn with_hit_latency(mut self, hit_latency: u32) -> Self {
        self.hit_latency = hit_latency;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_next_level(mut self, name: impl Into<String>) -> Self {
        self.next_level = Some(name.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Check the geometry and return the matching address decoder
    pub fn validate(&self) -> Result<AddressDecoder, ConfigError> {
        if self.associativity == 0 {
            return Err(ConfigError::ZeroAssociativity);
        }
        AddressDecoder::new(self.sets, self.block_size, self.address_width)
    }

    /// Capacity in words
    pub fn size_words(&self) -> u64 {
        self.sets * self.block_size * self.associativity
    }
}

/// Main memory access times, in cycles
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryTiming {
    pub read_time: u32,
    pub write_time: u32,
    pub burst_enabled: bool,
    /// Cost of every word after the first in a burst
    pub burst_time: u32,
}

impl Default for MemoryTiming {
    fn default() -> Self {
        Self { read_time: 10, write_time: 10, burst_enabled: false, burst_time: 2 }
    }
}

impl MemoryTiming {
    pub fn read_cycles(&self, words: usize) -> u32 {
        self.transfer_cycles(self.read_time, words)
    }

    pub fn write_cycles(&self, words: usize) -> u32 {
        self.transfer_cycles(self.write_time, words)
    }

    fn transfer_cycles(&self, first: u32, words: usize) -> u32 {
        let words = u32::try_from(words).unwrap_or(u32::MAX);
        if words == 0 {
            0
        } else if self.burst_enabled {
            first.saturating_add((words - 1).saturating_mul(self.burst_time))
        } else {
            words.saturating_mul(first)
        }
    }
}

/// Named cache levels in front of main memory
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HierarchyConfig {
    pub memory: MemoryTiming,
    pub levels: BTreeMap<String, CacheConfig>,
}

impl HierarchyConfig {
    /// One data cache in front of memory
    pub fn single_level(cache: CacheConfig) -> Self {
        let mut levels = BTreeMap::new();
        levels.insert("data".to_string(), cache);
        Self { memory: MemoryTiming::default(), levels }
    }

    /// Separate program and data caches sharing a level-2 cache
    pub fn split_with_level2(
        program: CacheConfig,
        data: CacheConfig,
        level2: CacheConfig,
    ) -> Self {
        let mut levels = BTreeMap::new();
        levels.insert("program".to_string(), program.with_next_level("l2"));
        levels.insert("data".to_string(), data.with_next_level("l2"));
        levels.insert("l2".to_string(), level2);
        Self { memory: MemoryTiming::default(), levels }
    }

    pub fn from_json(text: &str) -> SimulatorResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> SimulatorResult<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn to_json(&self) -> SimulatorResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate every level and make sure the level graph is acyclic
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, level) in &self.levels {
            level.validate()?;
            self.chain(name)?;
        }
        Ok(())
    }

    /// Names of the levels an access starting at `root` goes through
    pub fn chain(&self, root: &str) -> Result<Vec<String>, ConfigError> {
        let mut path: Vec<String> = Vec::new();
        let mut current = Some(root);
        while let Some(name) = current {
            let level = self
                .levels
                .get(name)
                .ok_or_else(|| ConfigError::UnknownLevel(name.to_string()))?;
            if path.iter().any(|seen| seen == name) {
                path.push(name.to_string());
                return Err(ConfigError::CyclicHierarchy(path));
            }
            path.push(name.to_string());
            current = level.next_level.as_deref();
        }
        Ok(path)
    }

    /// Widest address used by any level, 32 bits when there are none
    pub fn address_width(&self) -> u32 {
        self.levels.values().map(|level| level.address_width).max().unwrap_or(32)
    }
}
