use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::process::ExitCode;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Time in-flight work gets to finish once shutdown starts.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

type TaskResult = (&'static str, Result<anyhow::Result<()>, Box<dyn Any + Send>>);

/// Cloneable handle that resolves once shutdown has started.
#[derive(Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    pub async fn wait(mut self) {
        // A dropped sender also means shutdown.
        let _ = self.0.wait_for(|stopping| *stopping).await;
    }
}

/// How the supervised process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Stopped on request (signal or every task finished).
    Stopped,
    /// A task failed or panicked.
    Faulted,
}

impl Outcome {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Outcome::Stopped => ExitCode::SUCCESS,
            Outcome::Faulted => ExitCode::FAILURE,
        }
    }
}

/// Owns the long-running tasks of the process.
///
/// The first task error or panic, or the stop future resolving, starts an
/// orderly shutdown: every task is told to stop through its
/// [`ShutdownSignal`] and gets the drain timeout to finish before being
/// aborted.
pub struct Supervisor {
    tasks: JoinSet<TaskResult>,
    shutdown: watch::Sender<bool>,
    drain_timeout: Duration,
}

impl Supervisor {
    pub fn new(drain_timeout: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            tasks: JoinSet::new(),
            shutdown,
            drain_timeout,
        }
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal(self.shutdown.subscribe())
    }

    /// Spawn a named task. Its error or panic faults the whole process.
    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.tasks.spawn(async move {
            let result = AssertUnwindSafe(task).catch_unwind().await;
            (name, result)
        });
        tracing::debug!(task = name, "Supervised task started");
    }

    /// Wait for `stop` or the first faulty task, then shut everything down.
    pub async fn run(mut self, stop: impl Future<Output = ()>) -> Outcome {
        tokio::pin!(stop);

        let outcome = loop {
            tokio::select! {
                _ = &mut stop => {
                    tracing::info!("Shutdown requested");
                    break Outcome::Stopped;
                }
                joined = self.tasks.join_next() => match joined {
                    None => break Outcome::Stopped,
                    Some(joined) => {
                        if let Some(outcome) = inspect(joined) {
                            break outcome;
                        }
                    }
                }
            }
        };

        self.drain().await;
        outcome
    }

    async fn drain(&mut self) {
        let _ = self.shutdown.send(true);

        let drained = tokio::time::timeout(self.drain_timeout, async {
            while let Some(joined) = self.tasks.join_next().await {
                inspect(joined);
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                timeout_secs = self.drain_timeout.as_secs(),
                remaining = self.tasks.len(),
                "Drain timeout elapsed, aborting remaining tasks"
            );
            self.tasks.abort_all();
        }
    }
}

/// Log how a task ended. Returns `Faulted` for errors and panics.
fn inspect(joined: Result<TaskResult, tokio::task::JoinError>) -> Option<Outcome> {
    match joined {
        Ok((name, Ok(Ok(())))) => {
            tracing::info!(task = name, "Supervised task finished");
            None
        }
        Ok((name, Ok(Err(error)))) => {
            tracing::error!(task = name, error = %format!("{error:#}"), "Supervised task failed");
            Some(Outcome::Faulted)
        }
        Ok((name, Err(_))) => {
            tracing::error!(task = name, "Supervised task panicked");
            Some(Outcome::Faulted)
        }
        Err(error) if error.is_cancelled() => None,
        Err(error) => {
            tracing::error!(error = %error, "Supervised task could not be joined");
            Some(Outcome::Faulted)
        }
    }
}

/// Route panics through tracing so they end up in the same log as
/// everything else.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let payload = info.payload();
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            message.to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic payload".to_string()
        };
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        tracing::error!(panic = %message, location = %location, "Panic");
    }));
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn worker(signal: ShutdownSignal, stopped: Arc<AtomicBool>) -> impl Future<Output = anyhow::Result<()>> {
        async move {
            signal.wait().await;
            stopped.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stop_drains_tasks() {
        let mut supervisor = Supervisor::new(Duration::from_secs(1));
        let stopped = Arc::new(AtomicBool::new(false));
        supervisor.spawn("worker", worker(supervisor.shutdown_signal(), stopped.clone()));

        let outcome = supervisor.run(async {}).await;

        assert_eq!(outcome, Outcome::Stopped);
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_task_error_faults_and_stops_others() {
        let mut supervisor = Supervisor::new(Duration::from_secs(1));
        let stopped = Arc::new(AtomicBool::new(false));
        supervisor.spawn("worker", worker(supervisor.shutdown_signal(), stopped.clone()));
        supervisor.spawn("listener", async { Err(anyhow::anyhow!("address in use")) });

        let outcome = supervisor.run(std::future::pending()).await;

        assert_eq!(outcome, Outcome::Faulted);
        assert_eq!(outcome.exit_code(), ExitCode::FAILURE);
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_task_panic_faults() {
        let mut supervisor = Supervisor::new(Duration::from_secs(1));
        supervisor.spawn("listener", async {
            if true {
                panic!("listener exploded");
            }
            Ok(())
        });

        let outcome = supervisor.run(std::future::pending()).await;
        assert_eq!(outcome, Outcome::Faulted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_task_is_aborted_after_drain_timeout() {
        let mut supervisor = Supervisor::new(Duration::from_secs(5));
        supervisor.spawn("stuck", async {
            std::future::pending::<()>().await;
            Ok(())
        });

        let outcome = supervisor.run(async {}).await;
        assert_eq!(outcome, Outcome::Stopped);
    }

    #[tokio::test]
    async fn test_all_tasks_done_is_a_clean_stop() {
        let mut supervisor = Supervisor::new(Duration::from_secs(1));
        supervisor.spawn("oneshot", async { Ok(()) });

        let outcome = supervisor.run(std::future::pending()).await;
        assert_eq!(outcome, Outcome::Stopped);
    }
}
