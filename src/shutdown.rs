// System
use std::{os::raw::c_int, thread};

// Third Party
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
    low_level::signal_name,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

// Local
use crate::error::Error;

/// Signals that request a graceful shutdown. Fault signals (SIGSEGV, SIGILL, SIGFPE, SIGABRT) keep
/// their default disposition and terminate the process immediately.
pub const SHUTDOWN_SIGNALS: &[c_int] = &[SIGINT, SIGTERM];

/// Converts the first shutdown signal delivered to the process into a cancellation of a single
/// shared `CancellationToken`.
pub struct ShutdownSignal;

impl ShutdownSignal {
    /// Starts listening for `SHUTDOWN_SIGNALS` and returns a token that is cancelled when the
    /// first one arrives.
    pub fn listen() -> Result<CancellationToken, Error> {
        Self::listen_on(SHUTDOWN_SIGNALS)
    }

    pub fn listen_on(signals: &[c_int]) -> Result<CancellationToken, Error> {
        let mut signals = Signals::new(signals).map_err(Error::Signals)?;
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();

        // The listener keeps draining after the first signal so that repeated signals are
        // swallowed instead of falling back to the default action.
        thread::Builder::new()
            .name("signal-listener".to_string())
            .spawn(move || {
                for signal in signals.forever() {
                    trigger_shutdown(&trigger, signal);
                }
            })
            .map_err(Error::Signals)?;

        Ok(shutdown)
    }
}

/// Cancels `shutdown` on behalf of `signal`. Returns whether this call was the one that fired.
fn trigger_shutdown(shutdown: &CancellationToken, signal: c_int) -> bool {
    let name = signal_name(signal).unwrap_or("unknown");
    if shutdown.is_cancelled() {
        debug!("Signal ({}) ignored, already shutting down", name);
        return false;
    }
    warn!("Signal ({}) detected, shutting down", name);
    shutdown.cancel();
    true
}
