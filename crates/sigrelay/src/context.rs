//! Signal context and lifecycle
//!
//! `SignalContext` owns everything the relay needs: the handler table, the
//! boot disposition sets and the relay pipe. Process bootstrap code creates
//! one, calls `init()`, and hands `&mut` to whoever registers handlers or
//! drives the event loop.
//!
//! ```text
//! Uninitialized --init--> Active --post_fork_clear--> ChildActive
//!                           |                             |
//!                           +--------destroy------+-------+
//!                                                 v
//!                                             Destroyed
//! ```
//!
//! Only one context may be live per process. The relay handler finds the
//! pipe through a process-wide descriptor the live context publishes.

use crate::config::RelayConfig;
use crate::disposition::{Disposition, DispositionSets};
use crate::dispatch;
use crate::names::{json_signal, signal_name};
use crate::registry::{HandlerRegistry, SignalAction, SignalHandler};
use crate::relay::RelayChannel;
use sigrelay_core::{SignalError, SignalResult, Signo};

use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};

/// Set while a context is between `init()` and `destroy()`
static CONTEXT_LIVE: AtomicBool = AtomicBool::new(false);

/// Lifecycle state of a `SignalContext`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Active,
    /// Re-initialized in a forked worker
    ChildActive,
    Destroyed,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Active => "active",
            LifecycleState::ChildActive => "child-active",
            LifecycleState::Destroyed => "destroyed",
        }
    }

    /// Whether the relay is up
    pub fn is_live(&self) -> bool {
        matches!(self, LifecycleState::Active | LifecycleState::ChildActive)
    }
}

/// Signals this process always manages, reset to ignore by `destroy()`
pub fn managed_signals() -> Vec<Signo> {
    let mut signals = vec![
        libc::SIGHUP,
        libc::SIGINT,
        libc::SIGTERM,
        libc::SIGCHLD,
        libc::SIGUSR1,
        libc::SIGUSR2,
    ];
    signals.extend(json_signal());
    signals
}

/// Process-wide signal relay state
pub struct SignalContext {
    config: RelayConfig,
    state: LifecycleState,
    registry: HandlerRegistry,
    sets: DispositionSets,
    relay: RelayChannel,
}

impl SignalContext {
    /// Create an uninitialized context; no OS state is touched
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            state: LifecycleState::Uninitialized,
            registry: HandlerRegistry::new(),
            sets: DispositionSets::new(),
            relay: RelayChannel::closed(),
        }
    }

    /// Create an uninitialized context configured from the environment
    pub fn from_env() -> Self {
        Self::new(RelayConfig::from_env())
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn disposition_sets(&self) -> &DispositionSets {
        &self.sets
    }

    pub fn relay(&self) -> &RelayChannel {
        &self.relay
    }

    fn invalid(&self, op: &'static str) -> SignalError {
        SignalError::InvalidState { op, state: self.state.as_str() }
    }

    fn open_relay(op: &str) -> SignalResult<RelayChannel> {
        RelayChannel::open().map_err(|e| {
            log::error!("BUG - relay pipe creation failed in {} ({}), cannot relay signals", op, e);
            e
        })
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Open the relay, clear the table and snapshot boot dispositions
    ///
    /// A relay creation failure is returned as `RelayCreate`; callers are
    /// expected to abort startup rather than run without signal delivery.
    pub fn init(&mut self) -> SignalResult<()> {
        if self.state != LifecycleState::Uninitialized {
            return Err(self.invalid("init"));
        }
        self.config.validate()?;

        if CONTEXT_LIVE.swap(true, Ordering::SeqCst) {
            return Err(SignalError::AlreadyInitialized);
        }

        let relay = match Self::open_relay("init") {
            Ok(relay) => relay,
            Err(e) => {
                CONTEXT_LIVE.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        relay.publish();
        self.relay = relay;

        self.registry.clear();
        self.sets.clear();
        if self.config.track_dispositions {
            self.sets.capture();
        }

        self.state = LifecycleState::Active;
        log::debug!("signal relay active, readiness fd {:?}", self.relay.read_fd());
        Ok(())
    }

    /// Detach from the parent's signal state in a freshly forked worker
    ///
    /// Every signal the parent armed goes back to ignore, the inherited pipe
    /// is closed and replaced by a new one, and the table is emptied. The
    /// worker registers its own handlers afterwards.
    pub fn post_fork_clear(&mut self) -> SignalResult<()> {
        if !self.state.is_live() {
            return Err(self.invalid("post_fork_clear"));
        }

        self.sets.ignore_parent_configured();

        let relay = Self::open_relay("post_fork_clear")?;
        relay.publish();
        let inherited = std::mem::replace(&mut self.relay, relay);
        drop(inherited);

        self.registry.clear();
        self.state = LifecycleState::ChildActive;
        log::debug!(
            "signal relay re-initialized after fork, readiness fd {:?}",
            self.relay.read_fd()
        );
        Ok(())
    }

    /// Ignore the managed signals and close the relay
    pub fn destroy(&mut self) -> SignalResult<()> {
        if !self.state.is_live() {
            return Err(self.invalid("destroy"));
        }

        for signo in managed_signals() {
            if let Err(e) = self.register(signo, SignalAction::Ignore) {
                log::debug!("destroy: ignore {}: {}", signal_name(signo), e);
            }
        }

        self.relay.close();
        self.state = LifecycleState::Destroyed;
        CONTEXT_LIVE.store(false, Ordering::SeqCst);
        log::debug!("signal relay destroyed");
        Ok(())
    }

    /// Put back the signal environment found at boot
    ///
    /// Call right before exec'ing an external program. Does not change the
    /// lifecycle state and may be called any number of times.
    pub fn pre_exec_restore(&self) -> SignalResult<()> {
        if !self.state.is_live() {
            return Err(self.invalid("pre_exec_restore"));
        }
        self.sets.restore_boot();
        Ok(())
    }

    /// Close relay descriptors numbered `>= min_fd`
    ///
    /// For descriptor cleanup before exec; lower descriptors are being
    /// remapped by the caller and are left alone.
    pub fn close_relay_above(&mut self, min_fd: RawFd) {
        self.relay.close_above(min_fd);
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Install `action` for `signo`, returning the previous OS disposition
    pub fn register(&mut self, signo: Signo, action: SignalAction) -> SignalResult<Disposition> {
        if matches!(action, SignalAction::Handler(_)) && !self.state.is_live() {
            return Err(SignalError::NotInitialized);
        }
        let flags = self.config.sa_flags();
        self.registry
            .register(signo, action, &mut self.sets.parent_configured, flags)
    }

    /// Call `callback(&mut context, signo)` on each delivery of `signo`
    pub fn set_handler<T: 'static>(
        &mut self,
        signo: Signo,
        callback: fn(&mut T, Signo),
        context: T,
    ) -> SignalResult<Disposition> {
        self.register(signo, SignalAction::with_context(callback, context))
    }

    /// Call `handler(signo)` on each delivery of `signo`
    pub fn set_closure<F>(&mut self, signo: Signo, handler: F) -> SignalResult<Disposition>
    where
        F: FnMut(Signo) + 'static,
    {
        self.register(signo, SignalAction::handler(handler))
    }

    /// Install a boxed handler
    pub fn set_boxed(
        &mut self,
        signo: Signo,
        handler: Box<dyn SignalHandler>,
    ) -> SignalResult<Disposition> {
        self.register(signo, SignalAction::Handler(handler))
    }

    /// Ignore `signo` and stop dispatching it
    pub fn ignore(&mut self, signo: Signo) -> SignalResult<Disposition> {
        self.register(signo, SignalAction::Ignore)
    }

    /// Give `signo` back its default action and stop dispatching it
    pub fn set_default(&mut self, signo: Signo) -> SignalResult<Disposition> {
        self.register(signo, SignalAction::Default)
    }

    // ========================================================================
    // Event loop integration
    // ========================================================================

    /// Descriptor the event loop polls for readability; `None` once closed
    pub fn readiness_descriptor(&self) -> Option<RawFd> {
        self.relay.read_fd()
    }

    /// Whether a relayed signal is waiting
    pub fn is_pending(&self) -> bool {
        self.relay.is_pending()
    }

    /// Drain the relay and run handlers
    ///
    /// Without a read end only lost deliveries are reported.
    pub fn dispatch(&mut self) -> usize {
        if self.relay.read_fd().is_none() {
            dispatch::report_relay_failures();
            return 0;
        }
        dispatch::dispatch(&self.relay, &mut self.registry, self.config.max_drain)
    }
}

impl Drop for SignalContext {
    fn drop(&mut self) {
        if self.state.is_live() {
            let _ = self.destroy();
        }
    }
}

impl std::fmt::Debug for SignalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalContext")
            .field("state", &self.state)
            .field("relay", &self.relay)
            .field("registry", &self.registry)
            .field("sets", &self.sets)
            .finish()
    }
}
