//! Symbolic signal names
//!
//! `resolve` maps the control tokens used in configuration and command
//! lines to signal numbers. `signal_name` goes the other way for logs.

use sigrelay_core::Signo;
use std::borrow::Cow;

/// Map a control token to its signal number
///
/// | Token    | Signal        |
/// |----------|---------------|
/// | `STOP`   | `SIGTERM`     |
/// | `RELOAD` | `SIGHUP`      |
/// | `DATA`   | `SIGUSR1`     |
/// | `STATS`  | `SIGUSR2`     |
/// | `JSON`   | `SIGRTMIN+2` (feature `json`, Linux only) |
pub fn resolve(name: &str) -> Option<Signo> {
    match name {
        "STOP" => Some(libc::SIGTERM),
        "RELOAD" => Some(libc::SIGHUP),
        "DATA" => Some(libc::SIGUSR1),
        "STATS" => Some(libc::SIGUSR2),
        "JSON" => json_signal(),
        _ => None,
    }
}

/// Signal used for the JSON state dump request, when built with it
pub fn json_signal() -> Option<Signo> {
    cfg_if::cfg_if! {
        if #[cfg(all(feature = "json", target_os = "linux"))] {
            Some(libc::SIGRTMIN() + 2)
        } else {
            None
        }
    }
}

macro_rules! define_names {
    ($($signal:ident,)*) => {
        /// Symbolic name of `signo`, e.g. `SIGHUP` or `SIGRTMIN+2`
        pub fn signal_name(signo: Signo) -> Cow<'static, str> {
            match signo {
                $(libc::$signal => stringify!($signal).into(),)*
                _ => realtime_name(signo)
                    .unwrap_or_else(|| format!("unknown signal ({})", signo).into()),
            }
        }
    };
}

define_names! {
    SIGHUP,
    SIGINT,
    SIGQUIT,
    SIGILL,
    SIGTRAP,
    SIGABRT,
    SIGBUS,
    SIGFPE,
    SIGKILL,
    SIGUSR1,
    SIGSEGV,
    SIGUSR2,
    SIGPIPE,
    SIGALRM,
    SIGTERM,
    SIGCHLD,
    SIGCONT,
    SIGSTOP,
    SIGTSTP,
    SIGTTIN,
    SIGTTOU,
    SIGURG,
    SIGXCPU,
    SIGXFSZ,
    SIGVTALRM,
    SIGPROF,
    SIGWINCH,
    SIGIO,
    SIGSYS,
}

fn realtime_name(signo: Signo) -> Option<Cow<'static, str>> {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "linux")] {
            let (min, max) = (libc::SIGRTMIN(), libc::SIGRTMAX());
            if signo >= min && signo <= max {
                return Some(format!("SIGRTMIN+{}", signo - min).into());
            }
            None
        } else {
            let _ = signo;
            None
        }
    }
}
