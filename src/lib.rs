pub mod error;
pub mod flags;
pub mod memory;
pub mod trace;
