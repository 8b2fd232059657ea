//! Error types for the signal relay

use crate::Signo;
use thiserror::Error;

/// Result type for signal relay operations
pub type SignalResult<T> = Result<T, SignalError>;

/// Errors that can occur in signal relay operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    /// Signal number outside `1..=MAX_SIGNAL`
    #[error("invalid signal number {0}")]
    InvalidSignal(Signo),

    /// `sigaction` or `pthread_sigmask` refused the request
    #[error("signal {signo}: {}", os_message(.errno))]
    Os { signo: Signo, errno: i32 },

    /// The relay pipe could not be created
    #[error("relay channel creation failed: {}", os_message(.0))]
    RelayCreate(i32),

    /// Operation needs a live relay channel
    #[error("signal context not initialized")]
    NotInitialized,

    /// Another signal context already owns the process signal state
    #[error("signal context already initialized")]
    AlreadyInitialized,

    /// Lifecycle operation called from the wrong state
    #[error("{op} not allowed in state {state}")]
    InvalidState {
        op: &'static str,
        state: &'static str,
    },

    /// Configuration failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

impl SignalError {
    /// Raw OS error code, if this error came from a syscall
    pub fn errno(&self) -> Option<i32> {
        match self {
            SignalError::Os { errno, .. } => Some(*errno),
            SignalError::RelayCreate(errno) => Some(*errno),
            _ => None,
        }
    }
}

fn os_message(errno: &i32) -> String {
    std::io::Error::from_raw_os_error(*errno).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = SignalError::InvalidSignal(99);
        assert_eq!(format!("{}", e), "invalid signal number 99");

        let e = SignalError::InvalidState { op: "post_fork_clear", state: "destroyed" };
        assert_eq!(format!("{}", e), "post_fork_clear not allowed in state destroyed");
    }

    #[test]
    fn test_errno_accessor() {
        assert_eq!(SignalError::Os { signo: 1, errno: 22 }.errno(), Some(22));
        assert_eq!(SignalError::RelayCreate(24).errno(), Some(24));
        assert_eq!(SignalError::NotInitialized.errno(), None);
    }

    #[test]
    fn test_os_display_mentions_signal() {
        let e = SignalError::Os { signo: 15, errno: 22 };
        assert!(format!("{}", e).starts_with("signal 15: "));
    }
}
