//! A tokio based CLI runner.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Entrypoint for running commands.

use std::{future::Future, io, pin::pin, sync::mpsc, time::Duration};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

/// Executes CLI commands.
///
/// Provides utilities for running a cli command to completion.
#[derive(Debug)]
#[non_exhaustive]
pub struct CliRunner {
    tokio_runtime: Runtime,
}

impl CliRunner {
    /// Attempts to create a new [`CliRunner`] using the default tokio
    /// [`Runtime`].
    ///
    /// The default tokio runtime is multi-threaded, with both I/O and time drivers enabled.
    pub fn try_default_runtime() -> Result<Self, io::Error> {
        Ok(Self { tokio_runtime: tokio_runtime()? })
    }
}

// === impl CliRunner ===

impl CliRunner {
    /// Executes the given _async_ command on the tokio runtime until it resolves.
    ///
    /// When the process receives `SIGINT` or `SIGTERM`, the [`CliContext::cancel`] token is
    /// cancelled and the command keeps running so it can report what was interrupted. A second
    /// signal drops the command immediately and fails with [`io::ErrorKind::Interrupted`].
    pub fn run_command_until_exit<F, E>(
        self,
        command: impl FnOnce(CliContext) -> F,
    ) -> Result<(), E>
    where
        F: Future<Output = Result<(), E>>,
        E: Send + Sync + From<io::Error> + 'static,
    {
        let Self { tokio_runtime } = self;
        let cancel = CancellationToken::new();
        let context = CliContext { cancel: cancel.clone() };

        let command_res =
            tokio_runtime.block_on(run_until_cancelled(command(context), cancel, shutdown_signal));

        if command_res.is_err() {
            error!(target: "rangefetch::cli", "shutting down due to error");
        } else {
            debug!(target: "rangefetch::cli", "shutting down gracefully");
        }

        // `drop(tokio_runtime)` would block the current thread until its pools
        // (including blocking pool) are shutdown. Since we want to exit as soon as possible, drop
        // it on a separate thread and wait for up to 5 seconds for this operation to
        // complete.
        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("tokio-runtime-shutdown".to_string())
            .spawn(move || {
                drop(tokio_runtime);
                let _ = tx.send(());
            })?;

        let _ = rx.recv_timeout(Duration::from_secs(5)).inspect_err(|err| {
            debug!(target: "rangefetch::cli", %err, "tokio runtime shutdown timed out");
        });

        command_res
    }
}

/// Additional context provided by the [`CliRunner`] when executing commands
#[derive(Debug, Clone)]
pub struct CliContext {
    /// Cancelled once the process is asked to shut down.
    pub cancel: CancellationToken,
}

/// Creates a new default tokio multi-thread [Runtime] with all features
/// enabled
pub fn tokio_runtime() -> Result<Runtime, io::Error> {
    tokio::runtime::Builder::new_multi_thread().enable_all().build()
}

/// Drives `fut` to completion, cancelling `cancel` on the first shutdown signal and giving up on
/// `fut` on the second.
async fn run_until_cancelled<F, E, S, SF>(
    fut: F,
    cancel: CancellationToken,
    mut shutdown: S,
) -> Result<(), E>
where
    F: Future<Output = Result<(), E>>,
    E: Send + Sync + 'static + From<io::Error>,
    S: FnMut() -> SF,
    SF: Future<Output = Result<(), io::Error>>,
{
    let mut fut = pin!(fut);

    tokio::select! {
        signal = shutdown() => {
            signal?;
            info!(target: "rangefetch::cli", "Shutdown requested, cancelling in-flight work");
            cancel.cancel();
        },
        res = &mut fut => return res,
    }

    tokio::select! {
        signal = shutdown() => {
            signal?;
            info!(target: "rangefetch::cli", "Second shutdown request, exiting immediately");
            Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted by second shutdown signal")
                .into())
        },
        res = fut => res,
    }
}

/// Resolves once `ctrl-c` or, on unix, `SIGTERM` is received.
async fn shutdown_signal() -> Result<(), io::Error> {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut stream = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        let sigterm = stream.recv();
        let sigterm = pin!(sigterm);
        let ctrl_c = pin!(ctrl_c);

        tokio::select! {
            res = ctrl_c => {
                trace!(target: "rangefetch::cli", "Received ctrl-c");
                res
            },
            _ = sigterm => {
                trace!(target: "rangefetch::cli", "Received SIGTERM");
                Ok(())
            },
        }
    }

    #[cfg(not(unix))]
    {
        let res = ctrl_c.await;
        trace!(target: "rangefetch::cli", "Received ctrl-c");
        res
    }
}
