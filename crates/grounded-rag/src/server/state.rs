//! Shared state handed to every request handler

use std::sync::Arc;
use std::time::Instant;

use crate::pipeline::RagPipeline;

/// Application state; cheap to clone
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pipeline: Arc<RagPipeline>,
    started_at: Instant,
}

impl AppState {
    pub fn new(pipeline: Arc<RagPipeline>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                pipeline,
                started_at: Instant::now(),
            }),
        }
    }

    pub fn pipeline(&self) -> &RagPipeline {
        &self.inner.pipeline
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }
}
