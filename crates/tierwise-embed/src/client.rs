//! Timeout and retry wrapper around an embedding provider

use crate::config::EmbeddingConfig;
use crate::error::EmbedError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tierwise_vector::normalize;
use tracing::{debug, warn};

const MAX_BACKOFF_MS: u64 = 5_000;

/// Provider calls allowed to run at once, counting timed-out calls that are
/// still finishing in the background
pub const DEFAULT_MAX_IN_FLIGHT: usize = 32;

/// Holds one in-flight slot until dropped
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Text to vector provider. Must fail rather than return a malformed vector.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

/// Bounds each provider call by `timeout_ms`, retries with exponential
/// backoff, and returns only unit vectors of the expected dimension.
#[derive(Clone)]
pub struct EmbeddingClient {
    inner: Arc<dyn Embedder>,
    config: EmbeddingConfig,
    vector_dim: usize,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: usize,
}

impl EmbeddingClient {
    pub fn new(inner: Arc<dyn Embedder>, config: EmbeddingConfig, vector_dim: usize) -> Self {
        Self {
            inner,
            config,
            vector_dim,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    /// Limit concurrent provider calls; clones share the limit
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    pub fn vector_dim(&self) -> usize {
        self.vector_dim
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let attempts = self.config.max_retries.saturating_add(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                thread::sleep(self.backoff(attempt));
            }
            match self.attempt(text) {
                Ok(vector) => return Ok(vector),
                Err(e) => {
                    debug!(attempt = attempt + 1, error = %e, "embedding attempt failed");
                    last_error = e.to_string();
                }
            }
        }

        warn!(attempts, error = %last_error, "embedding unavailable");
        Err(EmbedError::Unavailable {
            attempts,
            last: last_error,
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << (attempt - 1).min(16);
        let ms = self
            .config
            .retry_backoff_ms
            .saturating_mul(factor)
            .min(MAX_BACKOFF_MS);
        Duration::from_millis(ms)
    }

    fn acquire(&self) -> Result<InFlight, EmbedError> {
        let previous = self.in_flight.fetch_add(1, Ordering::AcqRel);
        let slot = InFlight(Arc::clone(&self.in_flight));
        if previous >= self.max_in_flight {
            return Err(EmbedError::Provider(format!(
                "{} embedding calls already in flight",
                previous
            )));
        }
        Ok(slot)
    }

    fn attempt(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let timeout_ms = self.config.timeout_ms.max(1);
        let slot = self.acquire()?;
        let (tx, rx) = mpsc::sync_channel(1);
        let inner = Arc::clone(&self.inner);
        let text = text.to_string();

        // A timed-out worker finishes in the background and its result is dropped.
        thread::Builder::new()
            .name("tierwise-embed".to_string())
            .spawn(move || {
                let _slot = slot;
                let _ = tx.send(inner.embed(&text));
            })
            .map_err(|e| EmbedError::Provider(format!("cannot spawn embedding worker: {}", e)))?;

        match rx.recv_timeout(Duration::from_millis(timeout_ms)) {
            Ok(result) => result.and_then(|vector| self.validate(vector)),
            Err(RecvTimeoutError::Timeout) => Err(EmbedError::Timeout { timeout_ms }),
            Err(RecvTimeoutError::Disconnected) => {
                Err(EmbedError::Provider("embedding worker exited".to_string()))
            }
        }
    }

    fn validate(&self, mut vector: Vec<f32>) -> Result<Vec<f32>, EmbedError> {
        if vector.len() != self.vector_dim {
            return Err(EmbedError::Malformed(format!(
                "expected {} dimensions, got {}",
                self.vector_dim,
                vector.len()
            )));
        }
        if !normalize(&mut vector) {
            return Err(EmbedError::Malformed(
                "vector is zero or not finite".to_string(),
            ));
        }
        Ok(vector)
    }
}
