//! Signal handling for graceful shutdown (SIGINT/SIGTERM)
//!
//! On the first signal the shared [`CancellationToken`] is tripped: the
//! monitor loop finishes its current pass and `run_all` stops waiting.
//! A second signal exits immediately; the queue file is never left
//! half-written since every store write is an atomic rename.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Exit code for interrupted commands
pub const EXIT_CODE_CANCELLED: i32 = 130;

/// Signal handler state
#[derive(Debug, Default)]
pub struct SignalState {
    /// Signals received so far
    signal_count: AtomicU8,
    /// Tripped on the first signal
    token: CancellationToken,
}

/// Action to take after receiving a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// First signal: cancel long-running loops
    InitiateCancellation,
    /// Second signal: exit immediately
    ImmediateExit,
    /// Third+ signal: ignore
    Ignore,
}

impl SignalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token tripped by the first signal
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Check if cancellation has been requested
    pub fn is_cancel_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Get the number of signals received
    pub fn signal_count(&self) -> u8 {
        self.signal_count.load(Ordering::SeqCst)
    }

    /// Handle a signal (SIGINT/SIGTERM)
    pub fn handle_signal(&self) -> SignalAction {
        let count = self.signal_count.fetch_add(1, Ordering::SeqCst);

        match count {
            0 => {
                self.token.cancel();
                SignalAction::InitiateCancellation
            }
            1 => SignalAction::ImmediateExit,
            _ => SignalAction::Ignore,
        }
    }
}

/// Installs the process signal handler over a shared [`SignalState`]
pub struct SignalHandler {
    state: Arc<SignalState>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self {
            state: Arc::new(SignalState::new()),
        }
    }

    /// Get a reference to the signal state
    pub fn state(&self) -> Arc<SignalState> {
        Arc::clone(&self.state)
    }

    /// Token tripped by the first signal
    pub fn token(&self) -> CancellationToken {
        self.state.token()
    }

    /// Install the signal handlers.
    ///
    /// Must be called once at program startup.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let state = Arc::clone(&self.state);
        ctrlc::set_handler(move || match state.handle_signal() {
            SignalAction::InitiateCancellation => {
                eprintln!("\nReceived interrupt signal, finishing current pass...");
            }
            SignalAction::ImmediateExit => {
                eprintln!("\nReceived second interrupt, exiting immediately...");
                std::process::exit(EXIT_CODE_CANCELLED);
            }
            SignalAction::Ignore => {}
        })
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}
