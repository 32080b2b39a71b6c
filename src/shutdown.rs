//! Signal handling for workflow runs.
//!
//! The first SIGINT/SIGTERM asks the executor to stop: nothing new is
//! scheduled and running tools are killed when their tasks are aborted. A
//! second signal while the run is winding down exits the process at once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Notify;
use tracing::{info, warn};

/// Exit status used when a second signal forces the process down.
pub const FORCED_EXIT_CODE: i32 = 130;

/// Shared cancellation flag between the signal handler and the executor.
///
/// # Example
///
/// ```rust
/// use intraop::shutdown::ShutdownCoordinator;
///
/// async fn example() {
///     let coordinator = ShutdownCoordinator::new();
///
///     if coordinator.is_shutdown_requested() {
///         return;
///     }
///
///     coordinator.wait_for_shutdown().await;
/// }
/// ```
#[derive(Clone, Default)]
pub struct ShutdownCoordinator {
    requests: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a shutdown request and return how many have been made so far.
    /// Waiters are woken on the first one only.
    pub fn request_shutdown(&self) -> usize {
        let count = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        if count == 1 {
            info!("Shutdown requested, cancelling running workflows");
            self.notify.notify_waiters();
        }
        count
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.requests.load(Ordering::SeqCst) > 0
    }

    /// Resolve once shutdown has been requested (immediately if it already was).
    pub async fn wait_for_shutdown(&self) {
        let notified = self.notify.notified();
        if self.is_shutdown_requested() {
            return;
        }
        notified.await;
    }

    /// Spawn the signal listener: SIGTERM and SIGINT on Unix, Ctrl-C
    /// elsewhere. Must be called from within a tokio runtime.
    pub fn start_signal_listener(&self) {
        let coordinator = self.clone();

        tokio::spawn(async move {
            loop {
                let Some(name) = next_signal().await else {
                    return;
                };
                if coordinator.request_shutdown() > 1 {
                    warn!("Received {} again, exiting immediately", name);
                    std::process::exit(FORCED_EXIT_CODE);
                }
                info!("Received {}, press Ctrl-C again to exit immediately", name);
            }
        });
    }
}

/// Wait for the next termination signal and return its name, or `None` if
/// no handler could be installed.
#[cfg(unix)]
async fn next_signal() -> Option<&'static str> {
    use signal::unix::{signal as unix_signal, SignalKind};

    let mut sigterm = match unix_signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to create SIGTERM handler: {}", e);
            return signal::ctrl_c().await.ok().map(|_| "Ctrl-C");
        }
    };
    let mut sigint = match unix_signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to create SIGINT handler: {}", e);
            return sigterm.recv().await.map(|_| "SIGTERM");
        }
    };

    tokio::select! {
        s = sigterm.recv() => s.map(|_| "SIGTERM"),
        s = sigint.recv() => s.map(|_| "SIGINT"),
    }
}

#[cfg(not(unix))]
async fn next_signal() -> Option<&'static str> {
    match signal::ctrl_c().await {
        Ok(()) => Some("Ctrl-C"),
        Err(e) => {
            warn!("Failed to listen for Ctrl-C: {}", e);
            None
        }
    }
}
