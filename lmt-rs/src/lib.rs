//! lmt-rs library
//!
//! Command definitions and output helpers behind the `lmt-rs` binary.

pub mod cli;
pub mod commands;
pub mod utils;
