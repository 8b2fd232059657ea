//! Thin wrappers over the libc signal calls
//!
//! `nix::sys::signal::Signal` cannot name real-time signals and
//! `nix::sys::signal::sigaction` cannot query without installing, so the
//! disposition and mask calls go straight to libc.

use crate::constants::MAX_SIGNAL;
use sigrelay_core::{SignalError, SignalResult, Signo};
use std::mem::MaybeUninit;

/// Pointer to the calling thread's `errno`
#[inline]
pub(crate) fn errno_location() -> *mut libc::c_int {
    cfg_if::cfg_if! {
        if #[cfg(any(target_os = "linux", target_os = "android", target_os = "emscripten"))] {
            unsafe { libc::__errno_location() }
        } else if #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))] {
            unsafe { libc::__error() }
        } else {
            unsafe { libc::__errno() }
        }
    }
}

/// Last OS error code on this thread
#[inline]
pub(crate) fn last_errno() -> i32 {
    unsafe { *errno_location() }
}

/// Highest signal number the OS accepts, clamped to `MAX_SIGNAL`
pub fn highest_signal() -> Signo {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "linux")] {
            libc::SIGRTMAX().min(MAX_SIGNAL)
        } else {
            MAX_SIGNAL
        }
    }
}

/// Read the current `sigaction` for `signo` without changing it
pub(crate) fn query(signo: Signo) -> SignalResult<libc::sigaction> {
    let mut old = MaybeUninit::<libc::sigaction>::zeroed();
    let ret = unsafe { libc::sigaction(signo, std::ptr::null(), old.as_mut_ptr()) };
    if ret < 0 {
        return Err(SignalError::Os { signo, errno: last_errno() });
    }
    Ok(unsafe { old.assume_init() })
}

/// Install `handler` (a function address, `SIG_IGN` or `SIG_DFL`) for `signo`
///
/// Returns the action that was in place before.
pub(crate) fn install(
    signo: Signo,
    handler: libc::sighandler_t,
    flags: libc::c_int,
) -> SignalResult<libc::sigaction> {
    let mut act: libc::sigaction = unsafe { std::mem::zeroed() };
    act.sa_sigaction = handler;
    act.sa_flags = flags;
    unsafe { libc::sigemptyset(&mut act.sa_mask) };

    let mut old = MaybeUninit::<libc::sigaction>::zeroed();
    let ret = unsafe { libc::sigaction(signo, &act, old.as_mut_ptr()) };
    if ret < 0 {
        return Err(SignalError::Os { signo, errno: last_errno() });
    }
    Ok(unsafe { old.assume_init() })
}

fn change_mask(how: libc::c_int, signo: Signo) -> SignalResult<()> {
    let mut set = MaybeUninit::<libc::sigset_t>::zeroed();
    let ret = unsafe {
        libc::sigemptyset(set.as_mut_ptr());
        libc::sigaddset(set.as_mut_ptr(), signo);
        libc::pthread_sigmask(how, set.as_ptr(), std::ptr::null_mut())
    };
    // pthread_sigmask returns the error number instead of setting errno
    if ret != 0 {
        return Err(SignalError::Os { signo, errno: ret });
    }
    Ok(())
}

/// Block delivery of `signo` to the calling thread
pub(crate) fn block(signo: Signo) -> SignalResult<()> {
    change_mask(libc::SIG_BLOCK, signo)
}

/// Unblock delivery of `signo` to the calling thread
pub(crate) fn unblock(signo: Signo) -> SignalResult<()> {
    change_mask(libc::SIG_UNBLOCK, signo)
}

/// Whether `signo` is currently blocked on the calling thread
pub fn is_blocked(signo: Signo) -> SignalResult<bool> {
    let mut set = MaybeUninit::<libc::sigset_t>::zeroed();
    let ret = unsafe {
        libc::sigemptyset(set.as_mut_ptr());
        libc::pthread_sigmask(libc::SIG_BLOCK, std::ptr::null(), set.as_mut_ptr())
    };
    if ret != 0 {
        return Err(SignalError::Os { signo, errno: ret });
    }
    Ok(unsafe { libc::sigismember(set.as_ptr(), signo) } == 1)
}
