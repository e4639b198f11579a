use std::process;

use cache_lib::error::{ConfigError, SimulatorResult};
use cache_lib::flags::CacheSimArgs;
use cache_lib::memory::config::{CacheConfig, HierarchyConfig};
use cache_lib::memory::hierarchy::MemoryHierarchy;
use cache_lib::memory::observer::EventRecorder;
use cache_lib::memory::replacement::ReplacementPolicyKind;
use cache_lib::memory::write_policy::WritePolicy;
use cache_lib::trace;
use log::LevelFilter;

fn main() {
    let flags = CacheSimArgs::from_env_or_exit();

    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(if flags.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    });
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();

    if let Err(e) = run(flags) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(flags: CacheSimArgs) -> SimulatorResult<()> {
    let mut config = match &flags.config {
        Some(path) => HierarchyConfig::load(path)?,
        None => HierarchyConfig::single_level(
            CacheConfig::new(16, 4, 2)
                .with_replacement(ReplacementPolicyKind::Lru)
                .with_write_policy(WritePolicy::Back),
        ),
    };

    // Command-line overrides apply to every level
    let replacement = flags.replacement.map(ReplacementPolicyKind::from);
    let write_policy = flags.write.map(WritePolicy::from);
    for level in config.levels.values_mut() {
        if let Some(seed) = flags.seed {
            level.seed = seed;
        }
        if let Some(replacement) = replacement {
            level.replacement_policy = replacement;
        }
        if let Some(write_policy) = write_policy {
            level.write_policy = write_policy;
        }
    }

    let hierarchy = MemoryHierarchy::build(&config)?;
    let level_name = flags.level.clone().unwrap_or_else(|| "data".to_string());
    let level = hierarchy
        .level(&level_name)
        .ok_or_else(|| ConfigError::UnknownLevel(level_name.clone()))?;

    let recorder = EventRecorder::new();
    if flags.events.is_some() {
        level.borrow_mut().subscribe(recorder.clone());
    }

    let operations = trace::fetch_operations(&flags.trace)?;
    let summary = {
        let mut cache = level.borrow_mut();
        trace::run_trace(&mut *cache, &operations)?
    };
    if flags.flush {
        hierarchy.flush_all()?;
    }

    if let Some(path) = &flags.events {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["set", "way", "valid", "dirty", "tag", "data"])?;
        for event in recorder.events() {
            let data: Vec<String> =
                event.data.iter().map(|word| format!("{:#010x}", word)).collect();
            writer.write_record([
                event.set.to_string(),
                event.way.to_string(),
                (event.valid as u8).to_string(),
                (event.dirty as u8).to_string(),
                format!("{:#x}", event.tag),
                data.join(" "),
            ])?;
        }
        writer.flush()?;
    }

    if flags.history {
        eprintln!(
            "[HISTORY] {} accesses to '{}': {} hits, {} misses, {} cycles",
            summary.accesses, level_name, summary.hits, summary.misses, summary.cycles
        );
        let memory_latency = config.memory.read_time;
        for name in hierarchy.flush_order() {
            if let Some(cache) = hierarchy.level(&name) {
                let cache = cache.borrow();
                let history = &cache.history;
                eprintln!("[HISTORY] {}: {:?}", name, history);
                eprintln!(
                    "[HISTORY] {}: miss rate = {:.2}, average latency = {:.2}, speed-up = {:.2}",
                    name,
                    history.get_miss_rate(),
                    history.get_average_latency(),
                    history.get_speed_improvement(memory_latency)
                );
            }
        }
    }

    Ok(())
}
