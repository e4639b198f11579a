//! Write policies

use serde::{Deserialize, Serialize};

use super::line::CacheLine;

/// Reference: <https://inst.eecs.berkeley.edu/~cs61c/su20/pdfs/lectures/lec15.pdf>
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WriteHitPolicy {
    WriteBack,
    WriteThrough,
}

/// Reference: <https://inst.eecs.berkeley.edu/~cs61c/su20/pdfs/lectures/lec15.pdf>
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WriteMissPolicy {
    WriteAllocate,
    WriteNoAllocate,
}

/// Write policy of a cache. Write-back always allocates on a write miss.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WritePolicy {
    #[serde(rename = "write-through")]
    ThroughNoAllocate,
    #[serde(rename = "write-through-allocate")]
    ThroughAllocate,
    #[default]
    #[serde(rename = "write-back")]
    Back,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteAction {
    pub propagate_now: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvictAction {
    pub must_writeback: bool,
}

impl WritePolicy {
    /// What to do after a write landed in `_line`
    pub fn on_write(&self, _line: &CacheLine) -> WriteAction {
        WriteAction { propagate_now: self.hit_policy() == WriteHitPolicy::WriteThrough }
    }

    /// What to do before `line` leaves the cache
    pub fn on_evict(&self, line: &CacheLine) -> EvictAction {
        EvictAction {
            must_writeback: self.hit_policy() == WriteHitPolicy::WriteBack
                && line.is_dirty(),
        }
    }

    pub fn hit_policy(&self) -> WriteHitPolicy {
        match self {
            WritePolicy::Back => WriteHitPolicy::WriteBack,
            _ => WriteHitPolicy::WriteThrough,
        }
    }

    pub fn miss_policy(&self) -> WriteMissPolicy {
        match self {
            WritePolicy::ThroughNoAllocate => WriteMissPolicy::WriteNoAllocate,
            _ => WriteMissPolicy::WriteAllocate,
        }
    }

    /// Whether lines carry a dirty bit at all
    pub fn tracks_dirty(&self) -> bool {
        self.hit_policy() == WriteHitPolicy::WriteBack
    }

    pub fn write_allocate(&self) -> bool {
        self.miss_policy() == WriteMissPolicy::WriteAllocate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projections() {
        assert_eq!(WritePolicy::Back.miss_policy(), WriteMissPolicy::WriteAllocate);
        assert_eq!(
            WritePolicy::ThroughNoAllocate.miss_policy(),
            WriteMissPolicy::WriteNoAllocate
        );
        assert_eq!(
            WritePolicy::ThroughAllocate.hit_policy(),
            WriteHitPolicy::WriteThrough
        );
        assert!(WritePolicy::Back.tracks_dirty());
        assert!(!WritePolicy::ThroughAllocate.tracks_dirty());
    }

    #[test]
    fn test_write_back_defers() {
        let mut line = CacheLine::new(1, true);
        let policy = WritePolicy::Back;
        assert!(!policy.on_write(&line).propagate_now);
        assert!(!policy.on_evict(&line).must_writeback);

        line.fill(1, vec![5], true);
        assert!(policy.on_evict(&line).must_writeback);
    }

    #[test]
    fn test_write_through_propagates() {
        let line = CacheLine::new(1, false);
        for policy in [WritePolicy::ThroughAllocate, WritePolicy::ThroughNoAllocate] {
            assert!(policy.on_write(&line).propagate_now);
            assert!(!policy.on_evict(&line).must_writeback);
        }
    }

    #[test]
    fn test_serde_names() {
        let policy: WritePolicy =
            serde_json::from_str("\"write-through-allocate\"").unwrap();
        assert_eq!(policy, WritePolicy::ThroughAllocate);
        assert_eq!(
            serde_json::to_string(&WritePolicy::Back).unwrap(),
            "\"write-back\""
        );
    }
}
