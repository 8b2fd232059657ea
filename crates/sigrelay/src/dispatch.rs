//! Callback dispatcher
//!
//! Runs on the event loop thread whenever the relay read end polls
//! readable. Never blocks: the read end is non-blocking and draining stops
//! at the first incomplete record.

use crate::names::signal_name;
use crate::registry::HandlerRegistry;
use crate::relay::{take_write_failures, RelayChannel};

/// Drain the relay and invoke registered handlers in arrival order
///
/// `max_drain` bounds the records consumed (0 = until empty). Returns the
/// number of handlers invoked.
pub fn dispatch(relay: &RelayChannel, registry: &mut HandlerRegistry, max_drain: usize) -> usize {
    report_relay_failures();

    let mut drained = 0usize;
    let mut invoked = 0usize;
    while max_drain == 0 || drained < max_drain {
        let Some(signo) = relay.read_record() else {
            break;
        };
        drained += 1;
        if registry.invoke(signo) {
            invoked += 1;
        } else {
            log::trace!("no handler for relayed {}", signal_name(signo));
        }
    }
    invoked
}

/// Log deliveries the signal handler could not write to the pipe
pub(crate) fn report_relay_failures() {
    let (lost, errno) = take_write_failures();
    if lost == 0 {
        return;
    }
    if errno == 0 {
        log::error!("BUG - {} short write(s) to relay pipe - please report", lost);
    } else {
        log::error!(
            "BUG - {} write(s) to relay pipe failed: {} - please report",
            lost,
            std::io::Error::from_raw_os_error(errno)
        );
    }
}
