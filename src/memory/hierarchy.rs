//! Multi-level cache hierarchy.
//!
//! Levels are built from a `HierarchyConfig` and may share the level
//! behind them, e.g. split program and data caches in front of one L2.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use log::info;

use super::cache::Cache;
use super::config::HierarchyConfig;
use super::main_memory::MainMemory;
use super::BackingStore;
use crate::error::{ConfigError, MemoryResult};

/// Whatever sits behind a level
pub type SharedStore = Rc<RefCell<dyn BackingStore>>;

/// A level that may be reached from several places
pub type SharedCache = Rc<RefCell<Cache<SharedStore>>>;

pub struct MemoryHierarchy {
    config: HierarchyConfig,
    memory: Rc<RefCell<MainMemory>>,
    levels: BTreeMap<String, SharedCache>,
}

impl MemoryHierarchy {
    /// Build every level of `config`, failing before anything is
    /// constructed if the configuration is invalid
    pub fn build(config: &HierarchyConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let memory = Rc::new(RefCell::new(MainMemory::make(
            config.memory,
            config.address_width(),
        )));
        let mut levels = BTreeMap::new();
        for name in config.levels.keys() {
            Self::build_level(config, name, &memory, &mut levels)?;
        }
        info!("built hierarchy with levels {:?}", levels.keys().collect::<Vec<_>>());

        Ok(Self { config: config.clone(), memory, levels })
    }

    fn build_level(
        config: &HierarchyConfig,
        name: &str,
        memory: &Rc<RefCell<MainMemory>>,
        built: &mut BTreeMap<String, SharedCache>,
    ) -> Result<SharedCache, ConfigError> {
        if let Some(level) = built.get(name) {
            return Ok(level.clone());
        }
        let level_config = config
            .levels
            .get(name)
            .ok_or_else(|| ConfigError::UnknownLevel(name.to_string()))?;

        let backing: SharedStore = match &level_config.next_level {
            Some(next) => {
                let next: SharedStore =
                    Self::build_level(config, next, memory, built)?;
                next
            }
            None => {
                let memory: SharedStore = memory.clone();
                memory
            }
        };

        let cache = Cache::new(level_config.clone(), backing)?.named(name);
        let cache = Rc::new(RefCell::new(cache));
        built.insert(name.to_string(), cache.clone());
        Ok(cache)
    }

    pub fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    pub fn level(&self, name: &str) -> Option<SharedCache> {
        self.levels.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.levels.keys().map(String::as_str)
    }

    pub fn memory(&self) -> Rc<RefCell<MainMemory>> {
        self.memory.clone()
    }

    /// Level names ordered so that every level comes before the one behind it
    pub fn flush_order(&self) -> Vec<String> {
        let mut names: Vec<(usize, String)> = self
            .levels
            .keys()
            .map(|name| {
                let depth = self.config.chain(name).map_or(0, |chain| chain.len());
                (depth, name.clone())
            })
            .collect();
        names.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        names.into_iter().map(|(_, name)| name).collect()
    }

    /// Flush every level, upper levels first so their dirty data
    /// reaches memory through the levels below
    pub fn flush_all(&self) -> MemoryResult<u32> {
        let mut cycles: u32 = 0;
        for name in self.flush_order() {
            let flushed = self.levels[&name].borrow_mut().flush()?;
            cycles = cycles.saturating_add(flushed);
        }
        Ok(cycles)
    }

    pub fn reset_all(&self) {
        for level in self.levels.values() {
            level.borrow_mut().reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::config::CacheConfig;

    fn split() -> HierarchyConfig {
        HierarchyConfig::split_with_level2(
            CacheConfig::new(4, 1, 1),
            CacheConfig::new(4, 1, 2),
            CacheConfig::new(16, 2, 2),
        )
    }

    #[test]
    fn test_levels_share_level2() {
        let hierarchy = MemoryHierarchy::build(&split()).unwrap();
        let data = hierarchy.level("data").unwrap();
        let program = hierarchy.level("program").unwrap();
        let l2 = hierarchy.level("l2").unwrap();

        data.borrow_mut().write(0x40, 9).unwrap();
        data.borrow_mut().flush().unwrap();
        assert_eq!(l2.borrow().history.num_miss, 1);

        // The program cache misses but finds the block in the shared L2
        let result = program.borrow_mut().read(0x40).unwrap();
        assert_eq!(result.data, Some(9));
        assert!(l2.borrow().history.num_hit >= 1);
    }

    #[test]
    fn test_flush_order() {
        let hierarchy = MemoryHierarchy::build(&split()).unwrap();
        assert_eq!(hierarchy.flush_order(), vec!["data", "program", "l2"]);
    }

    #[test]
    fn test_flush_all_reaches_memory() {
        let hierarchy = MemoryHierarchy::build(&split()).unwrap();
        let data = hierarchy.level("data").unwrap();
        data.borrow_mut().write(0x100, 0x55).unwrap();
        assert_eq!(hierarchy.memory().borrow().get32(0x100), 0);

        hierarchy.flush_all().unwrap();
        assert_eq!(hierarchy.memory().borrow().get32(0x100), 0x55);
    }

    #[test]
    fn test_invalid_level_fails_build() {
        let mut config = split();
        config.levels.get_mut("l2").unwrap().associativity = 0;
        assert_eq!(
            MemoryHierarchy::build(&config).err(),
            Some(ConfigError::ZeroAssociativity)
        );
    }
}
