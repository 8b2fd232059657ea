//! Handler registry
//!
//! One slot per signal number. A slot only ever dispatches when it holds a
//! `Handler`; `Ignore` and `Default` record that the signal was explicitly
//! handed back to the OS.
//!
//! # Registration contract
//!
//! Installing a handler blocks the signal on the calling thread for the
//! duration of the update, so a delivery can never observe a half-written
//! slot. There is no lock: the event loop is the only non-signal thread
//! touching the table.

use crate::constants::MAX_SIGNAL;
use crate::disposition::Disposition;
use crate::names::signal_name;
use crate::os;
use crate::relay::relay_handler_addr;
use sigrelay_core::{SigSet, SignalError, SignalResult, Signo};
use std::fmt;

/// Callback invoked by the dispatcher, outside signal context
pub trait SignalHandler {
    fn handle(&mut self, signo: Signo);
}

impl<F> SignalHandler for F
where
    F: FnMut(Signo),
{
    fn handle(&mut self, signo: Signo) {
        self(signo)
    }
}

/// A plain function plus the opaque context it is called with
pub struct ContextHandler<T> {
    callback: fn(&mut T, Signo),
    context: T,
}

impl<T> ContextHandler<T> {
    pub fn new(callback: fn(&mut T, Signo), context: T) -> Self {
        Self { callback, context }
    }

    pub fn context(&self) -> &T {
        &self.context
    }
}

impl<T> SignalHandler for ContextHandler<T> {
    fn handle(&mut self, signo: Signo) {
        (self.callback)(&mut self.context, signo)
    }
}

/// What to do with a signal
pub enum SignalAction {
    /// Relay through the pipe and call this handler on dispatch
    Handler(Box<dyn SignalHandler>),
    /// `SIG_IGN`, no dispatch
    Ignore,
    /// `SIG_DFL`, no dispatch
    Default,
}

impl SignalAction {
    pub fn handler<H: SignalHandler + 'static>(handler: H) -> Self {
        SignalAction::Handler(Box::new(handler))
    }

    pub fn with_context<T: 'static>(callback: fn(&mut T, Signo), context: T) -> Self {
        SignalAction::Handler(Box::new(ContextHandler::new(callback, context)))
    }
}

impl fmt::Debug for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalAction::Handler(_) => write!(f, "Handler(..)"),
            SignalAction::Ignore => write!(f, "Ignore"),
            SignalAction::Default => write!(f, "Default"),
        }
    }
}

/// Per-signal table entry
#[derive(Default)]
pub enum SignalSlot {
    #[default]
    Empty,
    Ignore,
    Default,
    Handler(Box<dyn SignalHandler>),
}

impl SignalSlot {
    pub fn is_handler(&self) -> bool {
        matches!(self, SignalSlot::Handler(_))
    }
}

impl fmt::Debug for SignalSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalSlot::Empty => write!(f, "Empty"),
            SignalSlot::Ignore => write!(f, "Ignore"),
            SignalSlot::Default => write!(f, "Default"),
            SignalSlot::Handler(_) => write!(f, "Handler(..)"),
        }
    }
}

/// Slot index for `signo`, or `None` when out of `1..=MAX_SIGNAL`
#[inline]
fn slot_index(signo: Signo) -> Option<usize> {
    if (1..=MAX_SIGNAL).contains(&signo) {
        Some((signo - 1) as usize)
    } else {
        None
    }
}

/// Table from signal number to slot
pub struct HandlerRegistry {
    slots: Vec<SignalSlot>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        let slots = (0..MAX_SIGNAL).map(|_| SignalSlot::Empty).collect();
        Self { slots }
    }

    /// Slot for `signo`, `None` when out of range
    pub fn get(&self, signo: Signo) -> Option<&SignalSlot> {
        slot_index(signo).map(|idx| &self.slots[idx])
    }

    pub fn is_handled(&self, signo: Signo) -> bool {
        self.get(signo).is_some_and(SignalSlot::is_handler)
    }

    /// Signal numbers that currently dispatch
    pub fn handled(&self) -> SigSet {
        (1..=MAX_SIGNAL).filter(|&signo| self.is_handled(signo)).collect()
    }

    /// Reset every slot to `Empty`
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = SignalSlot::Empty);
    }

    /// Call the handler for `signo`; false if out of range or not a handler
    pub fn invoke(&mut self, signo: Signo) -> bool {
        let Some(idx) = slot_index(signo) else {
            return false;
        };
        match &mut self.slots[idx] {
            SignalSlot::Handler(handler) => {
                handler.handle(signo);
                true
            }
            _ => false,
        }
    }

    /// Install `action` for `signo` at the OS level and in the table
    ///
    /// Handlers are recorded in `parent_configured`; sentinels are not.
    /// Returns the disposition that was in place before.
    ///
    /// If `sigaction` fails the slot has already been written; the error
    /// is returned but the table keeps the new entry.
    pub fn register(
        &mut self,
        signo: Signo,
        action: SignalAction,
        parent_configured: &mut SigSet,
        sa_flags: libc::c_int,
    ) -> SignalResult<Disposition> {
        let Some(idx) = slot_index(signo) else {
            log::warn!(
                "invalid signal number {} passed to register, max signal is {}",
                signo,
                MAX_SIGNAL
            );
            return Err(SignalError::InvalidSignal(signo));
        };

        let (raw, slot, block) = match action {
            SignalAction::Ignore => (libc::SIG_IGN, SignalSlot::Ignore, false),
            SignalAction::Default => (libc::SIG_DFL, SignalSlot::Default, false),
            SignalAction::Handler(handler) => {
                (relay_handler_addr(), SignalSlot::Handler(handler), true)
            }
        };

        if block {
            os::block(signo)?;
            parent_configured.insert(signo);
        }

        let installed = os::install(signo, raw, sa_flags);
        self.slots[idx] = slot;

        if block {
            if let Err(e) = os::unblock(signo) {
                log::error!("unblock {} after register: {}", signal_name(signo), e);
            }
        }

        let old = installed?;
        log::trace!("{} -> {:?}", signal_name(signo), self.slots[idx]);
        Ok(Disposition::from_raw(old.sa_sigaction))
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handled", &self.handled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        id: u32,
        calls: Rc<RefCell<Vec<(u32, Signo)>>>,
    }

    fn record(ctx: &mut Recorder, signo: Signo) {
        ctx.calls.borrow_mut().push((ctx.id, signo));
    }

    #[test]
    fn test_new_registry_is_empty() {
        let registry = HandlerRegistry::new();
        assert!(registry.handled().is_empty());
        assert!(matches!(registry.get(1), Some(SignalSlot::Empty)));
        assert!(matches!(registry.get(MAX_SIGNAL), Some(SignalSlot::Empty)));
        assert!(registry.get(0).is_none());
        assert!(registry.get(MAX_SIGNAL + 1).is_none());
    }

    #[test]
    fn test_register_out_of_range_mutates_nothing() {
        let mut registry = HandlerRegistry::new();
        let mut parent = SigSet::new();

        for signo in [0, -1, MAX_SIGNAL + 1, Signo::MAX] {
            let action = SignalAction::handler(|_: Signo| {});
            let err = registry
                .register(signo, action, &mut parent, libc::SA_RESTART)
                .unwrap_err();
            assert_eq!(err, SignalError::InvalidSignal(signo));
        }
        assert!(parent.is_empty());
        assert!(registry.handled().is_empty());
    }

    #[test]
    fn test_invoke_passes_context_and_signo() {
        let mut registry = HandlerRegistry::new();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let idx = slot_index(libc::SIGUSR1).unwrap();
        let recorder = Recorder {
            id: 7,
            calls: calls.clone(),
        };
        registry.slots[idx] = SignalSlot::Handler(Box::new(ContextHandler::new(record, recorder)));

        assert!(registry.invoke(libc::SIGUSR1));
        assert!(!registry.invoke(libc::SIGUSR2));
        assert!(!registry.invoke(0));
        assert_eq!(*calls.borrow(), vec![(7, libc::SIGUSR1)]);
    }

    #[test]
    fn test_sentinel_slots_never_dispatch() {
        let mut registry = HandlerRegistry::new();
        registry.slots[0] = SignalSlot::Ignore;
        registry.slots[1] = SignalSlot::Default;
        assert!(!registry.invoke(1));
        assert!(!registry.invoke(2));
        assert!(registry.handled().is_empty());
    }

    #[test]
    fn test_clear_drops_handlers() {
        let mut registry = HandlerRegistry::new();
        let hits = Rc::new(RefCell::new(0));
        let h = hits.clone();
        registry.slots[0] = SignalSlot::Handler(Box::new(move |_: Signo| *h.borrow_mut() += 1));
        assert!(registry.is_handled(1));

        registry.clear();
        assert!(!registry.invoke(1));
        assert_eq!(*hits.borrow(), 0);
    }

    #[test]
    fn test_action_debug() {
        assert_eq!(format!("{:?}", SignalAction::Ignore), "Ignore");
        assert_eq!(format!("{:?}", SignalAction::handler(|_: Signo| {})), "Handler(..)");
    }
}
