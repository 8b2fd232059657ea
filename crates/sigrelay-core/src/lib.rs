//! # sigrelay-core
//!
//! Core types for the sigrelay signal relay.
//!
//! This crate is platform-agnostic and contains no OS calls.
//! All signal handling lives in `sigrelay`.
//!
//! ## Modules
//!
//! - `sigset` - 64-bit signal number sets
//! - `error` - Error types
//! - `logger` - Stderr backend for the `log` facade
//! - `env` - Environment variable utilities

pub mod sigset;
pub mod error;
pub mod logger;
pub mod env;

/// Signal number, same width as C `int`
pub type Signo = i32;

// Re-exports for convenience
pub use sigset::SigSet;
pub use error::{SignalError, SignalResult};
pub use env::{env_get, env_get_bool, env_get_opt};
