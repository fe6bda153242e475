//! Mock embedding backend for deterministic testing.
//!
//! Generates reproducible vectors from the input text and records every
//! call, so tests can assert on exactly what was sent for embedding.
//!
//! ## Usage
//!
//! ```rust
//! use versebank_inference::mock::MockEmbeddingBackend;
//! use versebank_core::EmbeddingBackend;
//!
//! # tokio_test_block(async {
//! let backend = MockEmbeddingBackend::new().with_dimension(8);
//! let vectors = backend.embed_texts(&["a verse".to_string()]).await.unwrap();
//! assert_eq!(vectors[0].as_slice().len(), 8);
//! assert_eq!(backend.embed_call_count(), 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use versebank_core::{EmbeddingBackend, Error, Result, Vector};

/// Mock embedding backend for testing.
#[derive(Clone)]
pub struct MockEmbeddingBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
    failures_remaining: Arc<AtomicUsize>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    dimension: usize,
    model: String,
    latency_ms: u64,
    always_fail: bool,
    drop_last: bool,
    wrong_dimension: bool,
}

/// One recorded `embed_texts` call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub texts: Vec<String>,
    pub timestamp: std::time::Instant,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            dimension: 8,
            model: "mock-embed".to_string(),
            latency_ms: 0,
            always_fail: false,
            drop_last: false,
            wrong_dimension: false,
        }
    }
}

impl MockEmbeddingBackend {
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
            failures_remaining: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn map_config(mut self, f: impl FnOnce(&mut MockConfig)) -> Self {
        f(Arc::make_mut(&mut self.config));
        self
    }

    pub fn with_dimension(self, dimension: usize) -> Self {
        self.map_config(|c| c.dimension = dimension)
    }

    pub fn with_model(self, model: &str) -> Self {
        self.map_config(|c| c.model = model.to_string())
    }

    /// Sleep this long before answering each call.
    pub fn with_latency_ms(self, latency_ms: u64) -> Self {
        self.map_config(|c| c.latency_ms = latency_ms)
    }

    /// Every call fails with `Error::Embedding`.
    pub fn failing(self) -> Self {
        self.map_config(|c| c.always_fail = true)
    }

    /// Return one vector fewer than the number of inputs.
    pub fn with_short_response(self) -> Self {
        self.map_config(|c| c.drop_last = true)
    }

    /// Return vectors one element longer than `dimension()` reports.
    pub fn with_wrong_dimension(self) -> Self {
        self.map_config(|c| c.wrong_dimension = true)
    }

    /// Fail the next `count` calls, then behave normally.
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    pub fn embed_call_count(&self) -> usize {
        self.calls().len()
    }

    /// Every text sent across all calls, in order.
    pub fn embedded_texts(&self) -> Vec<String> {
        self.calls().into_iter().flat_map(|c| c.texts).collect()
    }

    /// Deterministic unit vector for `text`.
    pub fn vector_for(text: &str, dimension: usize) -> Vec<f32> {
        let mut vec = vec![0.0f32; dimension.max(1)];
        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % vec.len();
            vec[idx] += 0.1;
        }
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in vec.iter_mut() {
                *x /= norm;
            }
        }
        vec.truncate(dimension);
        vec
    }

    fn take_failure(&self) -> bool {
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MockEmbeddingBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbeddingBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if let Ok(mut log) = self.call_log.lock() {
            log.push(MockCall {
                texts: texts.to_vec(),
                timestamp: std::time::Instant::now(),
            });
        }

        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        if self.config.always_fail || self.take_failure() {
            return Err(Error::Embedding("Mock embedding failure".to_string()));
        }

        let dimension = if self.config.wrong_dimension {
            self.config.dimension + 1
        } else {
            self.config.dimension
        };

        let mut vectors: Vec<Vector> = texts
            .iter()
            .map(|t| Vector::from(Self::vector_for(t, dimension)))
            .collect();
        if self.config.drop_last {
            vectors.pop();
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
