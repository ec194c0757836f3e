//! Background execution of analyses
//!
//! Analyses are CPU-bound, so [`AnalysisRunner`] moves them onto tokio's
//! blocking pool. Only the most recently submitted run counts: submitting a
//! new request cancels the previous one, and a superseded run's result is
//! discarded even if it finished.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle};

use crate::config::EngineConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::request::{execute, AnalysisOutput, AnalysisRequest, AnalysisResponse};

/// Runs one analysis at a time in the background
pub struct AnalysisRunner {
    config: Arc<EngineConfig>,
    latest: Arc<AtomicU64>,
    current_cancel: Mutex<Option<Arc<AtomicBool>>>,
}

impl AnalysisRunner {
    /// Create a runner; the configuration is validated once here
    pub fn new(config: EngineConfig) -> AnalysisResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            latest: Arc::new(AtomicU64::new(0)),
            current_cancel: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start `request`, superseding whatever run is in flight
    pub async fn submit(&self, request: AnalysisRequest) -> RunHandle {
        let cancel = Arc::new(AtomicBool::new(false));

        let generation = {
            let mut current = self.current_cancel.lock().await;
            if let Some(previous) = current.replace(Arc::clone(&cancel)) {
                previous.store(true, Ordering::Relaxed);
            }
            self.latest.fetch_add(1, Ordering::SeqCst) + 1
        };
        if generation > 1 {
            tracing::debug!("Run {} supersedes run {}", generation, generation - 1);
        }

        let config = Arc::clone(&self.config);
        RunHandle::spawn(generation, Arc::clone(&self.latest), move || {
            execute(&config, &request, &cancel)
        })
    }

    /// Submit and wait for the response
    pub async fn run(&self, request: AnalysisRequest) -> AnalysisResponse {
        self.submit(request).await.response().await
    }

    /// Cancel the run in flight, if any
    pub async fn cancel(&self) {
        if let Some(current) = self.current_cancel.lock().await.take() {
            current.store(true, Ordering::Relaxed);
            self.latest.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// A submitted run
pub struct RunHandle {
    generation: u64,
    latest: Arc<AtomicU64>,
    task: JoinHandle<AnalysisResult<AnalysisOutput>>,
}

impl RunHandle {
    fn spawn<F>(generation: u64, latest: Arc<AtomicU64>, work: F) -> Self
    where
        F: FnOnce() -> AnalysisResult<AnalysisOutput> + Send + 'static,
    {
        Self {
            generation,
            latest,
            task: tokio::task::spawn_blocking(work),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True once a newer run was submitted or the run was cancelled
    pub fn is_superseded(&self) -> bool {
        self.latest.load(Ordering::SeqCst) != self.generation
    }

    /// Wait for the run. Superseded runs yield [`AnalysisError::Cancelled`],
    /// a run whose worker panicked yields [`AnalysisError::Internal`].
    pub async fn result(self) -> AnalysisResult<AnalysisOutput> {
        let generation = self.generation;
        let latest = self.latest;
        let outcome = self
            .task
            .await
            .map_err(|e| join_error(generation, e))?;

        if latest.load(Ordering::SeqCst) != generation {
            tracing::warn!("Discarding result of superseded run {}", generation);
            return Err(AnalysisError::Cancelled);
        }
        outcome
    }

    pub async fn response(self) -> AnalysisResponse {
        self.result().await.into()
    }
}

fn join_error(generation: u64, error: JoinError) -> AnalysisError {
    if error.is_panic() {
        let message = panic_message(&*error.into_panic());
        tracing::error!("Analysis run {} panicked: {}", generation, message);
        AnalysisError::Internal(message)
    } else {
        tracing::warn!("Analysis run {} did not complete: {}", generation, error);
        AnalysisError::Cancelled
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
