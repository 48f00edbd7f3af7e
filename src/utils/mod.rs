//! Generic utility primitives with zero domain knowledge.
//!
//! - `io` - File I/O with consistent error handling
//! - `parser` - Text extraction from command output
//! - `shell` - Shell quoting for displayed command lines

pub mod io;
pub mod parser;
pub mod shell;
