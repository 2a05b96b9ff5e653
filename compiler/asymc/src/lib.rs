//! Asym CLI library.
//!
//! The binary in `main.rs` only dispatches; the commands live here so they
//! can be tested without spawning a process.

pub mod commands;
