//! Termination signals.

use std::future::Future;

/// Resolve with the signal name on SIGINT or SIGTERM.
///
/// Handlers are installed when this is called, not when the future is first
/// polled, so a signal arriving in between is not lost. If a handler cannot be
/// installed a warning is logged and that signal is never reported.
pub fn shutdown_signal() -> impl Future<Output = &'static str> + Send + 'static {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())
            .map_err(|err| tracing::warn!(error = %err, "failed to install SIGINT handler"))
            .ok();
        let mut terminate = signal(SignalKind::terminate())
            .map_err(|err| tracing::warn!(error = %err, "failed to install SIGTERM handler"))
            .ok();

        async move {
            let interrupted = async {
                match interrupt.as_mut() {
                    Some(stream) => stream.recv().await,
                    None => std::future::pending().await,
                }
            };
            let terminated = async {
                match terminate.as_mut() {
                    Some(stream) => stream.recv().await,
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                _ = interrupted => "SIGINT",
                _ = terminated => "SIGTERM",
            }
        }
    }

    #[cfg(not(unix))]
    {
        async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => "SIGINT",
                Err(err) => {
                    tracing::warn!(error = %err, "failed to listen for ctrl-c");
                    std::future::pending().await
                }
            }
        }
    }
}
