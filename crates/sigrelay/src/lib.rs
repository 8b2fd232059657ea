//! # sigrelay
//!
//! Turns asynchronous Unix signals into ordered, pollable events for a
//! single-threaded event loop, and keeps enough bookkeeping to hand an
//! exec'd program the signal environment this process started with.
//!
//! This crate provides:
//! - A self-pipe relay (the only code that runs in signal context)
//! - A handler table with a race-free registration contract
//! - Boot disposition tracking and pre-exec restore
//! - Fork and teardown lifecycle operations
//!
//! ```rust,ignore
//! use sigrelay::{RelayConfig, SignalContext};
//!
//! let mut signals = SignalContext::new(RelayConfig::from_env());
//! signals.init()?;
//! signals.set_closure(libc::SIGHUP, |_| reload())?;
//!
//! // in the event loop, when readiness_descriptor() polls readable:
//! signals.dispatch();
//! ```

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        pub mod config;
        pub mod context;
        pub mod disposition;
        pub mod dispatch;
        pub mod names;
        pub mod os;
        pub mod registry;
        pub mod relay;
    } else {
        compile_error!("sigrelay requires a Unix platform");
    }
}

// Re-exports
pub use config::RelayConfig;
pub use context::{managed_signals, LifecycleState, SignalContext};
pub use disposition::{Disposition, DispositionSets};
pub use names::{resolve, signal_name};
pub use registry::{ContextHandler, HandlerRegistry, SignalAction, SignalHandler, SignalSlot};
pub use relay::RelayChannel;
pub use sigrelay_core::{logger, SigSet, SignalError, SignalResult, Signo};

/// Platform constants
pub mod constants {
    use sigrelay_core::Signo;

    cfg_if::cfg_if! {
        if #[cfg(any(target_os = "linux", target_os = "android"))] {
            /// Highest signal number the handler table covers
            pub const MAX_SIGNAL: Signo = 64;
        } else {
            /// Highest signal number the handler table covers
            pub const MAX_SIGNAL: Signo = 31;
        }
    }

    /// Bytes per relayed signal record
    pub const RECORD_SIZE: usize = std::mem::size_of::<libc::c_int>();
}
