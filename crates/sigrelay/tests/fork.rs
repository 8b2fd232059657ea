//! Post-fork re-initialization
//!
//! Kept in its own test binary: forking a test process is only safe when
//! nothing else in the binary runs concurrently.

use sigrelay::disposition::current;
use sigrelay::{Disposition, LifecycleState, RelayConfig, SignalContext, Signo};
use std::cell::Cell;
use std::rc::Rc;

const CHILD_STATE: u8 = 1 << 0;
const CHILD_PARENT_SIGNAL_IGNORED: u8 = 1 << 1;
const CHILD_UNREGISTERED_UNTOUCHED: u8 = 1 << 2;
const CHILD_NEW_DESCRIPTORS: u8 = 1 << 3;
const CHILD_TABLE_EMPTY: u8 = 1 << 4;
const CHILD_OWN_DELIVERY: u8 = 1 << 5;
const CHILD_ALL: u8 = (1 << 6) - 1;

/// Runs in the forked child; must not panic
fn child_checks(ctx: &mut SignalContext, parent_fds: (i32, i32)) -> u8 {
    let mut result = 0u8;
    if ctx.post_fork_clear().is_err() {
        return result;
    }

    if ctx.state() == LifecycleState::ChildActive {
        result |= CHILD_STATE;
    }
    // Parent armed SIGUSR1 with a handler
    if current(libc::SIGUSR1) == Ok(Disposition::Ignore) {
        result |= CHILD_PARENT_SIGNAL_IGNORED;
    }
    if current(libc::SIGWINCH) == Ok(Disposition::Default) {
        result |= CHILD_UNREGISTERED_UNTOUCHED;
    }

    let read = ctx.relay().read_fd();
    let write = ctx.relay().write_fd();
    if let (Some(read), Some(write)) = (read, write) {
        let inherited = [parent_fds.0, parent_fds.1];
        if !inherited.contains(&read) && !inherited.contains(&write) {
            result |= CHILD_NEW_DESCRIPTORS;
        }
    }
    if ctx.registry().handled().is_empty() {
        result |= CHILD_TABLE_EMPTY;
    }

    let hits = Rc::new(Cell::new(0));
    let h = hits.clone();
    if ctx.set_closure(libc::SIGUSR1, move |_: Signo| h.set(h.get() + 1)).is_ok()
        && unsafe { libc::raise(libc::SIGUSR1) } == 0
        && ctx.dispatch() == 1
        && hits.get() == 1
    {
        result |= CHILD_OWN_DELIVERY;
    }
    result
}

#[test]
fn post_fork_clear_detaches_child_from_parent() {
    let mut ctx = SignalContext::new(RelayConfig::new());
    ctx.init().unwrap();

    let parent_hits = Rc::new(Cell::new(0));
    let h = parent_hits.clone();
    ctx.set_closure(libc::SIGUSR1, move |_: Signo| h.set(h.get() + 1)).unwrap();
    // Explicit default does not mark the signal as parent-configured
    ctx.set_default(libc::SIGWINCH).unwrap();
    assert!(ctx.disposition_sets().parent_configured.contains(libc::SIGUSR1));
    assert!(!ctx.disposition_sets().parent_configured.contains(libc::SIGWINCH));

    let parent_fds = (
        ctx.relay().read_fd().unwrap(),
        ctx.relay().write_fd().unwrap(),
    );

    let mut report = [0i32; 2];
    assert_eq!(unsafe { libc::pipe(report.as_mut_ptr()) }, 0);

    let pid = unsafe { libc::fork() };
    assert!(pid >= 0);
    if pid == 0 {
        let result = child_checks(&mut ctx, parent_fds);
        unsafe {
            libc::write(report[1], &result as *const u8 as *const libc::c_void, 1);
            libc::_exit(0);
        }
    }

    unsafe { libc::close(report[1]) };
    let mut result = 0u8;
    let n = unsafe { libc::read(report[0], &mut result as *mut u8 as *mut libc::c_void, 1) };
    unsafe { libc::close(report[0]) };
    let mut status = 0;
    unsafe { libc::waitpid(pid, &mut status, 0) };

    assert_eq!(n, 1);
    assert_eq!(result, CHILD_ALL, "child checks: {:#08b}", result);

    // Parent keeps its own relay and handler
    assert_eq!(ctx.relay().read_fd(), Some(parent_fds.0));
    assert_eq!(unsafe { libc::raise(libc::SIGUSR1) }, 0);
    assert_eq!(ctx.dispatch(), 1);
    assert_eq!(parent_hits.get(), 1);

    ctx.destroy().unwrap();
}
