//! Boot-time signal disposition tracking
//!
//! At init every catchable signal is moved to "ignore" so nothing can take
//! its default action behind the event loop's back. The state found at boot
//! is remembered so a program exec'd later sees the environment this
//! process inherited, not the process's own handlers.

use crate::names::signal_name;
use crate::os;
use sigrelay_core::{SigSet, SignalResult, Signo};

/// OS-level action for a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// `SIG_DFL`
    Default,
    /// `SIG_IGN`
    Ignore,
    /// A handler function, by address
    Handler(usize),
}

impl Disposition {
    pub(crate) fn from_raw(handler: libc::sighandler_t) -> Self {
        match handler {
            libc::SIG_DFL => Disposition::Default,
            libc::SIG_IGN => Disposition::Ignore,
            addr => Disposition::Handler(addr as usize),
        }
    }

    pub(crate) fn as_raw(&self) -> libc::sighandler_t {
        match self {
            Disposition::Default => libc::SIG_DFL,
            Disposition::Ignore => libc::SIG_IGN,
            Disposition::Handler(addr) => *addr as libc::sighandler_t,
        }
    }
}

/// Signals whose disposition is never altered: fatal program errors and
/// the two signals that cannot be caught.
pub const NEVER_TOUCH: [Signo; 6] = [
    libc::SIGILL,
    libc::SIGFPE,
    libc::SIGSEGV,
    libc::SIGBUS,
    libc::SIGKILL,
    libc::SIGSTOP,
];

/// Whether `signo` is in the never-touch set
#[inline]
pub fn is_never_touch(signo: Signo) -> bool {
    NEVER_TOUCH.contains(&signo)
}

/// Query the current disposition of `signo` without changing it
pub fn current(signo: Signo) -> SignalResult<Disposition> {
    let act = os::query(signo)?;
    Ok(Disposition::from_raw(act.sa_sigaction))
}

/// Force `signo` to `disposition` with no flags and an empty mask
pub(crate) fn force(signo: Signo, disposition: Disposition) -> SignalResult<Disposition> {
    let old = os::install(signo, disposition.as_raw(), 0)?;
    Ok(Disposition::from_raw(old.sa_sigaction))
}

/// The three signal sets kept across the process lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispositionSets {
    /// Signals that were already ignored when the process started
    pub ignored_at_boot: SigSet,
    /// Signals that had their default (or a handler) at start and were forced to ignore
    pub default_at_boot: SigSet,
    /// Signals this process armed with a relay handler
    pub parent_configured: SigSet,
}

impl DispositionSets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.ignored_at_boot.clear();
        self.default_at_boot.clear();
        self.parent_configured.clear();
    }

    /// Snapshot the boot dispositions and move every catchable signal to ignore
    ///
    /// Signals the OS refuses to report (the libc-reserved real-time
    /// numbers, for one) are skipped.
    pub fn capture(&mut self) {
        self.ignored_at_boot.clear();
        self.default_at_boot.clear();

        for signo in 1..=os::highest_signal() {
            if is_never_touch(signo) {
                continue;
            }
            match current(signo) {
                Ok(Disposition::Ignore) => self.ignored_at_boot.insert(signo),
                Ok(_) => match force(signo, Disposition::Ignore) {
                    Ok(_) => self.default_at_boot.insert(signo),
                    Err(e) => log::debug!("not ignoring {}: {}", signal_name(signo), e),
                },
                Err(e) => log::trace!("skipping {}: {}", signal_name(signo), e),
            }
        }

        log::debug!(
            "boot dispositions: {} ignored, {} defaulted to ignore",
            self.ignored_at_boot.len(),
            self.default_at_boot.len()
        );
    }

    /// Put every tracked signal back to its boot disposition
    ///
    /// Run right before exec so the new program inherits the same signal
    /// environment this process did. Idempotent.
    pub fn restore_boot(&self) {
        for signo in self.ignored_at_boot.iter() {
            if let Err(e) = force(signo, Disposition::Ignore) {
                log::debug!("restore {} to ignore: {}", signal_name(signo), e);
            }
        }
        for signo in self.default_at_boot.iter() {
            if let Err(e) = force(signo, Disposition::Default) {
                log::debug!("restore {} to default: {}", signal_name(signo), e);
            }
        }
    }

    /// Ignore every signal the parent armed (post-fork reset)
    pub fn ignore_parent_configured(&self) {
        for signo in self.parent_configured.iter() {
            if let Err(e) = force(signo, Disposition::Ignore) {
                log::debug!("child ignore {}: {}", signal_name(signo), e);
            }
        }
    }
}
