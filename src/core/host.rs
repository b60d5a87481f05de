use std::{sync::Arc, time::Duration};

use eyre::Result;
use tokio::task::JoinHandle;

use crate::{
    ports::worker::Worker,
    utils::graceful_shutdown::{GracefulShutdown, ShutdownReason},
};

const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs an ordered list of hosted workers until shutdown.
///
/// Workers start in registration order and are awaited in reverse order once
/// shutdown has been signalled. A worker still running after the stop timeout
/// is aborted.
pub struct Host {
    workers: Vec<Arc<dyn Worker>>,
    shutdown: Arc<GracefulShutdown>,
    stop_timeout: Duration,
}

impl Host {
    pub fn new() -> Self {
        Self::with_stop_timeout(DEFAULT_STOP_TIMEOUT)
    }

    pub fn with_stop_timeout(stop_timeout: Duration) -> Self {
        Self {
            workers: Vec::new(),
            shutdown: Arc::new(GracefulShutdown::new()),
            stop_timeout,
        }
    }

    pub fn add_worker(&mut self, worker: Arc<dyn Worker>) {
        self.workers.push(worker);
    }

    pub fn worker_names(&self) -> Vec<&str> {
        self.workers.iter().map(|w| w.name()).collect()
    }

    /// Handle that can trigger shutdown from outside the host
    pub fn shutdown_handle(&self) -> Arc<GracefulShutdown> {
        self.shutdown.clone()
    }

    /// Start every worker and block until shutdown completes
    pub async fn run(self) -> Result<ShutdownReason> {
        // Subscribe before anything can trigger shutdown so the signal is never missed
        let mut token = self.shutdown.shutdown_token();

        let signal_shutdown = self.shutdown.clone();
        let signal_task = tokio::spawn(async move {
            signal_shutdown.run_signal_handler().await;
        });

        tracing::info!(
            "Starting {} hosted worker(s): {}",
            self.workers.len(),
            self.worker_names().join(", ")
        );
        let mut handles: Vec<(String, JoinHandle<()>)> = Vec::with_capacity(self.workers.len());
        for worker in &self.workers {
            let name = worker.name().to_string();
            tracing::info!(worker = %name, "Starting hosted worker");

            let worker = worker.clone();
            let worker_token = self.shutdown.shutdown_token();
            let shutdown = self.shutdown.clone();
            let task_name = name.clone();
            let handle = tokio::spawn(async move {
                match worker.run(worker_token).await {
                    Ok(()) => tracing::info!(worker = %task_name, "Hosted worker stopped"),
                    Err(e) => {
                        tracing::error!(worker = %task_name, "Hosted worker failed: {:?}", e);
                        shutdown.trigger_shutdown(ShutdownReason::WorkerFailed(task_name.clone()));
                    }
                }
            });
            handles.push((name, handle));
        }

        tracing::info!("Host started with {} worker(s)", handles.len());

        let reason = token.wait_for_shutdown().await;
        tracing::info!("Host stopping: {:?}", reason);
        signal_task.abort();

        for (name, mut handle) in handles.into_iter().rev() {
            match tokio::time::timeout(self.stop_timeout, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(worker = %name, "Hosted worker panicked: {}", e),
                Err(_) => {
                    tracing::warn!(
                        worker = %name,
                        "Hosted worker did not stop within {:?}, aborting",
                        self.stop_timeout
                    );
                    handle.abort();
                }
            }
        }

        tracing::info!("Host stopped");
        Ok(reason)
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use eyre::eyre;

    use super::*;
    use crate::utils::graceful_shutdown::ShutdownToken;

    struct RecordingWorker {
        name: String,
        events: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl Worker for RecordingWorker {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
            self.events.lock().unwrap().push(format!("start {}", self.name));
            if self.fail {
                return Err(eyre!("{} failed", self.name));
            }
            shutdown.wait_for_shutdown().await;
            self.events.lock().unwrap().push(format!("stop {}", self.name));
            Ok(())
        }
    }

    struct StubbornWorker;

    #[async_trait]
    impl Worker for StubbornWorker {
        fn name(&self) -> &str {
            "stubborn"
        }

        async fn run(&self, _shutdown: ShutdownToken) -> Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn recording(name: &str, events: &Arc<Mutex<Vec<String>>>, fail: bool) -> Arc<dyn Worker> {
        Arc::new(RecordingWorker {
            name: name.to_string(),
            events: events.clone(),
            fail,
        })
    }

    #[tokio::test]
    async fn test_host_runs_workers_until_shutdown() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut host = Host::new();
        host.add_worker(recording("first", &events, false));
        host.add_worker(recording("second", &events, false));
        assert_eq!(host.worker_names(), vec!["first", "second"]);

        let shutdown = host.shutdown_handle();
        let run = tokio::spawn(host.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger_shutdown(ShutdownReason::Graceful);

        let reason = run.await.unwrap().unwrap();
        assert_eq!(reason, ShutdownReason::Graceful);

        let events = events.lock().unwrap();
        assert!(events.contains(&"start first".to_string()));
        assert!(events.contains(&"stop second".to_string()));
        assert_eq!(events.len(), 4);
    }

    #[tokio::test]
    async fn test_failing_worker_stops_host() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut host = Host::new();
        host.add_worker(recording("healthy", &events, false));
        host.add_worker(recording("broken", &events, true));

        let reason = tokio::time::timeout(Duration::from_secs(5), host.run())
            .await
            .expect("host did not stop")
            .unwrap();

        assert_eq!(reason, ShutdownReason::WorkerFailed("broken".to_string()));
        assert!(events.lock().unwrap().contains(&"stop healthy".to_string()));
    }

    #[tokio::test]
    async fn test_stuck_worker_is_aborted_after_timeout() {
        let mut host = Host::with_stop_timeout(Duration::from_millis(50));
        host.add_worker(Arc::new(StubbornWorker));

        let shutdown = host.shutdown_handle();
        shutdown.trigger_shutdown(ShutdownReason::Graceful);

        let reason = tokio::time::timeout(Duration::from_secs(5), host.run())
            .await
            .expect("host did not stop")
            .unwrap();
        assert_eq!(reason, ShutdownReason::Graceful);
    }
}
