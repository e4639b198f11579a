use std::path::PathBuf;
use std::str::FromStr;

use crate::memory::replacement::ReplacementPolicyKind;
use crate::memory::write_policy::WritePolicy;

xflags::xflags! {
    /// Set-associative cache simulator driven by access traces.
    cmd CacheSimArgs {
        /// Path to the trace file.
        required trace: PathBuf

        /// JSON hierarchy configuration.
        /// Defaults to a single 16-set, 2-way, 4-word LRU write-back data cache.
        optional -c, --config path: PathBuf

        /// Level that receives the trace (default: data).
        optional -l, --level name: String

        /// Seed for random replacement, applied to every level.
        optional -s, --seed seed: u64

        /// Overrides the replacement policy of every level.
        /// RAND: Random
        /// LRU: Least recently used
        /// LFU: Least frequently used
        /// FIFO: First in, first out
        optional -r, --replacement policy: ReplacementArg

        /// Overrides the write policy of every level.
        /// WB: Write-back
        /// WT: Write-through, no allocate
        /// WTA: Write-through with write-allocate
        optional -w, --write write_policy: WriteArg

        /// Write every change event of the traced level to a CSV file.
        optional -e, --events path: PathBuf

        /// Flush all levels after the trace.
        optional --flush

        /// Print per-level statistics after simulation.
        optional --history

        /// Enables verbose mode, logging every miss and write-back.
        optional -v, --verbose
    }
}

#[derive(Debug)]
pub enum ReplacementArg {
    Random,
    Lru,
    Lfu,
    Fifo,
}

impl FromStr for ReplacementArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RAND" => Ok(ReplacementArg::Random),
            "LRU" => Ok(ReplacementArg::Lru),
            "LFU" => Ok(ReplacementArg::Lfu),
            "FIFO" => Ok(ReplacementArg::Fifo),
            _ => Err(format!(
                "Invalid replacement policy: '{}'. Expected 'RAND', 'LRU', 'LFU' or 'FIFO'.",
                s
            )),
        }
    }
}

impl From<ReplacementArg> for ReplacementPolicyKind {
    fn from(val: ReplacementArg) -> Self {
        match val {
            ReplacementArg::Random => ReplacementPolicyKind::Random,
            ReplacementArg::Lru => ReplacementPolicyKind::Lru,
            ReplacementArg::Lfu => ReplacementPolicyKind::Lfu,
            ReplacementArg::Fifo => ReplacementPolicyKind::Fifo,
        }
    }
}

#[derive(Debug)]
pub enum WriteArg {
    WriteBack,
    WriteThrough,
    WriteThroughAllocate,
}

impl FromStr for WriteArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "WB" => Ok(WriteArg::WriteBack),
            "WT" => Ok(WriteArg::WriteThrough),
            "WTA" => Ok(WriteArg::WriteThroughAllocate),
            _ => Err(format!(
                "Invalid write policy: '{}'. Expected 'WB', 'WT' or 'WTA'.",
                s
            )),
        }
    }
}

impl From<WriteArg> for WritePolicy {
    fn from(val: WriteArg) -> Self {
        match val {
            WriteArg::WriteBack => WritePolicy::Back,
            WriteArg::WriteThrough => WritePolicy::ThroughNoAllocate,
            WriteArg::WriteThroughAllocate => WritePolicy::ThroughAllocate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replacement_arg() {
        let kind: ReplacementPolicyKind = "fifo".parse::<ReplacementArg>().unwrap().into();
        assert_eq!(kind, ReplacementPolicyKind::Fifo);
        assert!("mru".parse::<ReplacementArg>().is_err());
    }

    #[test]
    fn test_write_arg() {
        let policy: WritePolicy = "WTA".parse::<WriteArg>().unwrap().into();
        assert_eq!(policy, WritePolicy::ThroughAllocate);
        assert!("back".parse::<WriteArg>().is_err());
    }
}
