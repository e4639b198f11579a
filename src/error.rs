use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the simulator
#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("Invalid configuration: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Memory error: {0}")]
    MemoryError(#[from] MemoryError),

    #[error("Trace error: {0}")]
    TraceError(#[from] TraceError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse configuration file: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

/// Errors raised while validating a cache or hierarchy configuration.
/// These are only ever produced at construction time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be a power of two, got {value}")]
    NotPowerOfTwo { field: &'static str, value: u64 },

    #[error("Associativity must be at least 1")]
    ZeroAssociativity,

    #[error("Unsupported address width: {0} (expected 32 or 64)")]
    UnsupportedAddressWidth(u32),

    #[error(
        "No bits left for the tag: {address_width}-bit address, \
         {index_bits} index bits, {offset_bits} offset bits"
    )]
    TagUnderflow {
        address_width: u32,
        index_bits: u32,
        offset_bits: u32,
    },

    #[error("Cache levels form a cycle: {}", .0.join(" -> "))]
    CyclicHierarchy(Vec<String>),

    #[error("Unknown cache level '{0}'")]
    UnknownLevel(String),
}

/// Errors related to backing-store operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Memory access error at address {address:#010x}: {kind}")]
    AccessError { address: u64, kind: MemoryErrorKind },

    #[error("Invalid memory alignment: address {0:#010x} is not aligned to {1} bytes")]
    AlignmentError(u64, u32),
}

/// Specific kinds of memory errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryErrorKind {
    #[error("Attempted to access memory outside addressable range")]
    OutOfBounds,

    #[error("Attempted to write to write-protected memory")]
    WriteProtected,
}

/// Errors related to access traces
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Failed to parse trace '{0}': {1}")]
    ParseError(PathBuf, String),
}

/// Type alias for Result with SimulatorError
pub type SimulatorResult<T> = Result<T, SimulatorError>;

/// Result of a backing-store operation
pub type MemoryResult<T> = Result<T, MemoryError>;
