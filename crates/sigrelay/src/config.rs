//! Relay configuration
//!
//! Library defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder calls
//! 2. Environment variables (`from_env()`)
//! 3. Library defaults (`defaults`)
//!
//! # Example
//!
//! ```rust,ignore
//! use sigrelay::config::RelayConfig;
//!
//! let config = RelayConfig::from_env().max_drain(64);
//! ```

use sigrelay_core::env::{env_get, env_get_bool};
use sigrelay_core::{SignalError, SignalResult};

/// Library defaults
pub mod defaults {
    /// Snapshot boot dispositions and ignore every catchable signal at init
    pub const TRACK_DISPOSITIONS: bool = true;
    /// Install relay handlers with `SA_RESTART`
    pub const RESTART_SYSCALLS: bool = true;
    /// Records drained per `dispatch()`; 0 drains until the pipe is empty
    pub const MAX_DRAIN: usize = 0;
    /// Upper bound accepted for `max_drain`
    pub const MAX_DRAIN_LIMIT: usize = 1 << 20;
}

/// Configuration for a `SignalContext`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Run the disposition tracker during `init()`
    pub track_dispositions: bool,
    /// Interrupted syscalls restart instead of failing with EINTR
    pub restart_syscalls: bool,
    /// Records handled per `dispatch()` call, 0 = unlimited
    pub max_drain: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayConfig {
    /// Library defaults, no environment lookup
    pub fn new() -> Self {
        Self {
            track_dispositions: defaults::TRACK_DISPOSITIONS,
            restart_syscalls: defaults::RESTART_SYSCALLS,
            max_drain: defaults::MAX_DRAIN,
        }
    }

    /// Defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `SIGRELAY_TRACK_DISPOSITIONS` - snapshot and ignore signals at init (0/1)
    /// - `SIGRELAY_RESTART_SYSCALLS` - `SA_RESTART` on relay handlers (0/1)
    /// - `SIGRELAY_MAX_DRAIN` - records per dispatch, 0 = unlimited
    pub fn from_env() -> Self {
        Self {
            track_dispositions: env_get_bool(
                "SIGRELAY_TRACK_DISPOSITIONS",
                defaults::TRACK_DISPOSITIONS,
            ),
            restart_syscalls: env_get_bool("SIGRELAY_RESTART_SYSCALLS", defaults::RESTART_SYSCALLS),
            max_drain: env_get("SIGRELAY_MAX_DRAIN", defaults::MAX_DRAIN),
        }
    }

    // Builder methods

    pub fn track_dispositions(mut self, enable: bool) -> Self {
        self.track_dispositions = enable;
        self
    }

    pub fn restart_syscalls(mut self, enable: bool) -> Self {
        self.restart_syscalls = enable;
        self
    }

    pub fn max_drain(mut self, n: usize) -> Self {
        self.max_drain = n;
        self
    }

    /// `sa_flags` for relay handlers
    pub(crate) fn sa_flags(&self) -> libc::c_int {
        if self.restart_syscalls {
            libc::SA_RESTART
        } else {
            0
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> SignalResult<()> {
        if self.max_drain > defaults::MAX_DRAIN_LIMIT {
            return Err(SignalError::InvalidConfig("max_drain exceeds limit"));
        }
        Ok(())
    }
}
