//! Relay Demo Supervisor
//!
//! Single-threaded poll(2) loop driven entirely by the signal relay.
//! Forks a worker that drops the supervisor's handlers and installs its
//! own, runs an external command with the signal environment this process
//! booted with, and exits once both children are gone.
//!
//! Usage:
//!     cargo build --release -p sigrelay-relay-demo
//!     SIGRELAY_LOG_LEVEL=debug ./target/release/relay-demo [command [args...]]
//!
//! While it runs (from another terminal):
//!     kill -HUP  <pid>    # RELOAD
//!     kill -USR2 <pid>    # STATS
//!     kill -TERM <pid>    # STOP

use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{execvp, fork, getpid, ForkResult, Pid};
use sigrelay::{logger, resolve, signal_name, SignalContext, SignalError, Signo};

use std::cell::{Cell, RefCell};
use std::error::Error;
use std::ffi::CString;
use std::os::unix::io::RawFd;
use std::rc::Rc;

const POLL_TIMEOUT_MS: i32 = 1000;

/// Idle poll rounds before the worker gives up waiting for STOP
const WORKER_IDLE_LIMIT: u32 = 30;

type DemoResult<T> = Result<T, Box<dyn Error>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Worker,
    Command,
}

// ── Supervisor state shared by the handlers ──
#[derive(Default)]
struct Supervisor {
    stop: Cell<bool>,
    reloads: Cell<u32>,
    children: RefCell<Vec<(Pid, Role)>>,
}

impl Supervisor {
    fn pid_of(&self, role: Role) -> Option<Pid> {
        self.children
            .borrow()
            .iter()
            .find(|(_, r)| *r == role)
            .map(|(pid, _)| *pid)
    }

    fn report(&self) {
        log::info!(
            "supervisor {}: {} reload(s), children {:?}",
            getpid(),
            self.reloads.get(),
            self.children.borrow()
        );
    }
}

fn on_reload(state: &mut Rc<Supervisor>, signo: Signo) {
    state.reloads.set(state.reloads.get() + 1);
    log::info!("{}: reload #{}", signal_name(signo), state.reloads.get());
}

/// Collect every exited child without blocking
fn reap(state: &Supervisor) {
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) | Err(_) => break,
            Ok(status) => {
                let Some(pid) = status.pid() else { continue };
                let mut children = state.children.borrow_mut();
                if let Some(idx) = children.iter().position(|(p, _)| *p == pid) {
                    let (_, role) = children.remove(idx);
                    log::info!("{:?} {} exited: {:?}", role, pid, status);
                }
            }
        }
    }
}

fn token(name: &str) -> DemoResult<Signo> {
    resolve(name).ok_or_else(|| format!("unknown signal token {:?}", name).into())
}

/// Wait up to `timeout_ms` for `fd` to turn readable
fn wait_readable(fd: RawFd, timeout_ms: i32) -> bool {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let n = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    n > 0 && pfd.revents & libc::POLLIN != 0
}

// ── Forked worker ──

fn run_worker(ctx: &mut SignalContext) -> DemoResult<()> {
    ctx.post_fork_clear()?;

    let stop = Rc::new(Cell::new(false));
    let s = stop.clone();
    ctx.set_closure(token("STOP")?, move |signo| {
        log::info!("worker {}: {}", getpid(), signal_name(signo));
        s.set(true);
    })?;

    let fd = ctx.readiness_descriptor().ok_or(SignalError::NotInitialized)?;
    let mut idle = 0;
    while !stop.get() && idle < WORKER_IDLE_LIMIT {
        if !wait_readable(fd, POLL_TIMEOUT_MS) {
            idle += 1;
        }
        ctx.dispatch();
    }

    ctx.destroy()?;
    Ok(())
}

// ── Exec'd command ──

fn exec_command(ctx: &mut SignalContext, argv: &[CString]) -> ! {
    if let Err(e) = ctx.pre_exec_restore() {
        log::error!("pre-exec restore failed: {}", e);
    }
    ctx.close_relay_above(3);

    let err = match execvp(&argv[0], argv) {
        Ok(never) => match never {},
        Err(e) => e,
    };
    log::error!("exec {:?} failed: {}", argv[0], err);
    unsafe { libc::_exit(127) }
}

fn command_line() -> DemoResult<Vec<CString>> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        args = vec!["sleep".into(), "2".into()];
    }
    args.into_iter()
        .map(|a| CString::new(a).map_err(Into::into))
        .collect()
}

fn run() -> DemoResult<()> {
    let argv = command_line()?;

    let mut ctx = SignalContext::from_env();
    ctx.init()?;

    let state = Rc::new(Supervisor::default());

    ctx.set_handler(token("RELOAD")?, on_reload, state.clone())?;

    let s = state.clone();
    ctx.set_closure(token("STOP")?, move |signo| {
        log::info!("{}: stopping", signal_name(signo));
        s.stop.set(true);
    })?;

    let s = state.clone();
    ctx.set_closure(token("STATS")?, move |_| s.report())?;

    let s = state.clone();
    ctx.set_closure(libc::SIGCHLD, move |_| reap(&s))?;

    // Children exiting before the loop starts are reaped on first dispatch
    match unsafe { fork() }? {
        ForkResult::Child => {
            let code = match run_worker(&mut ctx) {
                Ok(()) => 0,
                Err(e) => {
                    log::error!("worker: {}", e);
                    1
                }
            };
            std::process::exit(code);
        }
        ForkResult::Parent { child } => {
            state.children.borrow_mut().push((child, Role::Worker));
        }
    }

    match unsafe { fork() }? {
        ForkResult::Child => exec_command(&mut ctx, &argv),
        ForkResult::Parent { child } => {
            state.children.borrow_mut().push((child, Role::Command));
        }
    }

    let fd = ctx.readiness_descriptor().ok_or(SignalError::NotInitialized)?;
    log::info!("supervisor {} polling relay fd {}", getpid(), fd);

    let mut worker_stopped = false;
    while !state.stop.get() && !state.children.borrow().is_empty() {
        wait_readable(fd, POLL_TIMEOUT_MS);
        ctx.dispatch();

        if !worker_stopped && state.pid_of(Role::Command).is_none() {
            if let Some(worker) = state.pid_of(Role::Worker) {
                log::info!("command done, stopping worker {}", worker);
                kill(worker, Signal::SIGTERM)?;
                worker_stopped = true;
            }
        }
    }

    state.report();
    ctx.destroy()?;
    Ok(())
}

fn main() {
    logger::init();

    if let Err(e) = run() {
        log::error!("relay-demo: {}", e);
        std::process::exit(1);
    }
}
