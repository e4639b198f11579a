//! Access traces
//!
//! One access per line: `r 0xADDR` or `w 0xADDR [DATA]`.
//! Blank lines and lines starting with `#` are ignored.

use std::path::Path;

use log::debug;

use crate::error::{SimulatorResult, TraceError};
use crate::memory::cache::Cache;
use crate::memory::{BackingStore, Word};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceOp {
    Read(u64),
    Write(u64, Word),
}

/// Totals over one trace replay
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraceSummary {
    pub accesses: u64,
    pub hits: u64,
    pub misses: u64,
    pub cycles: u64,
}

fn parse_hex_address(
    origin: &Path,
    line_num: usize,
    text: &str,
) -> Result<u64, TraceError> {
    let digits = text.strip_prefix("0x").ok_or_else(|| {
        TraceError::ParseError(
            origin.into(),
            format!(
                "Invalid address format at line {}: expected hexadecimal starting with '0x'",
                line_num
            ),
        )
    })?;
    u64::from_str_radix(digits, 16).map_err(|_| {
        TraceError::ParseError(
            origin.into(),
            format!("Invalid hexadecimal address at line {}", line_num),
        )
    })
}

fn parse_data(origin: &Path, line_num: usize, text: &str) -> Result<Word, TraceError> {
    let parsed = match text.strip_prefix("0x") {
        Some(digits) => Word::from_str_radix(digits, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| {
        TraceError::ParseError(
            origin.into(),
            format!("Invalid data '{}' at line {}", text, line_num),
        )
    })
}

/// Parse trace text; `origin` only labels errors
pub fn parse_operations(origin: &Path, content: &str) -> Result<Vec<TraceOp>, TraceError> {
    let mut operations = Vec::new();

    for (line_num, line) in content.lines().enumerate() {
        let line_num = line_num + 1;
        let line = line.trim();
        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let op = match (parts[0], parts.len()) {
            ("r", 2) => TraceOp::Read(parse_hex_address(origin, line_num, parts[1])?),
            ("w", 2) => {
                TraceOp::Write(parse_hex_address(origin, line_num, parts[1])?, 0)
            }
            ("w", 3) => TraceOp::Write(
                parse_hex_address(origin, line_num, parts[1])?,
                parse_data(origin, line_num, parts[2])?,
            ),
            ("r", _) | ("w", _) => {
                return Err(TraceError::ParseError(
                    origin.into(),
                    format!(
                        "Invalid format at line {}: expected 'op address [data]'",
                        line_num
                    ),
                ))
            }
            (other, _) => {
                return Err(TraceError::ParseError(
                    origin.into(),
                    format!(
                        "Invalid operation '{}' at line {}: expected 'r' or 'w'",
                        other, line_num
                    ),
                ))
            }
        };
        operations.push(op);
    }

    Ok(operations)
}

/// Fetch operations from the trace file
pub fn fetch_operations(trace_path: &Path) -> SimulatorResult<Vec<TraceOp>> {
    let content = std::fs::read_to_string(trace_path)?;
    Ok(parse_operations(trace_path, &content)?)
}

/// Replay `operations` against `cache`
pub fn run_trace<B: BackingStore>(
    cache: &mut Cache<B>,
    operations: &[TraceOp],
) -> SimulatorResult<TraceSummary> {
    let mut summary = TraceSummary::default();

    for op in operations {
        let result = match *op {
            TraceOp::Read(address) => cache.read(address)?,
            TraceOp::Write(address, data) => cache.write(address, data)?,
        };
        summary.accesses += 1;
        if result.hit {
            summary.hits += 1;
        } else {
            summary.misses += 1;
        }
        summary.cycles += result.latency_cycles as u64;
    }

    debug!("replayed {} accesses: {:?}", operations.len(), summary);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::config::{CacheConfig, MemoryTiming};
    use crate::memory::main_memory::MainMemory;

    fn parse(text: &str) -> Result<Vec<TraceOp>, TraceError> {
        parse_operations(Path::new("test.trace"), text)
    }

    #[test]
    fn test_parse() {
        let ops = parse("# warm up\nr 0x10\n\nw 0x14 0xff\nw 0x18 12\nw 0x1c\n").unwrap();
        assert_eq!(
            ops,
            vec![
                TraceOp::Read(0x10),
                TraceOp::Write(0x14, 0xff),
                TraceOp::Write(0x18, 12),
                TraceOp::Write(0x1c, 0),
            ]
        );
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["x 0x10", "r 10", "r 0xzz", "r", "w 0x10 1 2", "w 0x10 abc"] {
            assert!(parse(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_run_trace() {
        let memory = MainMemory::make(MemoryTiming::default(), 32);
        let mut cache = Cache::new(CacheConfig::new(4, 1, 1), memory).unwrap();
        let ops = parse("w 0x0 1\nr 0x0\nr 0x10\nr 0x0\n").unwrap();

        let summary = run_trace(&mut cache, &ops).unwrap();
        assert_eq!(summary.accesses, 4);
        assert_eq!(summary.hits, 1);
        assert_eq!(summary.misses, 3);
    }
}
