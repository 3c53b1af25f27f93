//! Interrupt handling for SIGTERM and SIGINT.
//!
//! A run is not cancelled cooperatively: when a signal arrives the run
//! future is dropped at its current await point and the process exits with
//! status 130. A set cut off mid-upload is repaired by the next run.

use std::future::Future;
use tokio::signal;
use tracing::{error, warn};

/// Signal that ended the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Interrupt,
    Terminate,
}

impl Interrupt {
    pub fn signal_name(self) -> &'static str {
        match self {
            Interrupt::Interrupt => "SIGINT",
            Interrupt::Terminate => "SIGTERM",
        }
    }
}

/// How [`run_interruptible`] ended
#[derive(Debug)]
pub enum RunEnd<T> {
    Finished(T),
    Interrupted(Interrupt),
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
///
/// If a handler cannot be installed that signal is never reported.
pub async fn wait_for_interrupt() -> Interrupt {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let interrupt = tokio::select! {
        _ = ctrl_c => Interrupt::Interrupt,
        _ = terminate => Interrupt::Terminate,
    };
    warn!("Received {}, backup interrupted", interrupt.signal_name());
    interrupt
}

/// Drive `run` on a fresh runtime until it completes or `interrupt` fires.
///
/// The runtime is shut down without waiting for blocking workers, so an
/// FTP call stuck in a socket read cannot hold the process open.
pub fn run_interruptible<F, I>(run: F, interrupt: I) -> std::io::Result<RunEnd<F::Output>>
where
    F: Future,
    I: Future<Output = Interrupt>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let end = runtime.block_on(async {
        tokio::select! {
            output = run => RunEnd::Finished(output),
            interrupt = interrupt => RunEnd::Interrupted(interrupt),
        }
    });

    runtime.shutdown_background();
    Ok(end)
}
