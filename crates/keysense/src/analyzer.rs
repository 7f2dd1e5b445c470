use std::str::FromStr;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chroma::{Frame, FrameChroma};
use crate::error::AnalysisError;

/// Per-frame work handed to an executor.
pub type FrameWork<'w, 'a> = dyn Fn(&Frame<'a>) -> Option<FrameChroma> + Sync + 'w;

/// Strategy for running per-frame chroma work.
///
/// Chosen once when the engine is built. Implementations must return one
/// result per input frame, in input order, so aggregation downstream is
/// identical whichever strategy ran.
pub trait FrameExecutor: Send + Sync {
    fn name(&self) -> &'static str;

    fn map_frames<'a>(
        &self,
        frames: &[Frame<'a>],
        work: &FrameWork<'_, 'a>,
    ) -> Vec<Option<FrameChroma>>;
}

/// Runs every frame inline on the calling thread.
pub struct SequentialExecutor;

impl FrameExecutor for SequentialExecutor {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn map_frames<'a>(
        &self,
        frames: &[Frame<'a>],
        work: &FrameWork<'_, 'a>,
    ) -> Vec<Option<FrameChroma>> {
        frames.iter().map(work).collect()
    }
}

/// Fans frames out over a fixed-size rayon pool owned by the executor.
pub struct ParallelExecutor {
    pool: rayon::ThreadPool,
}

impl ParallelExecutor {
    /// `workers == 0` lets rayon pick the thread count.
    pub fn new(workers: usize) -> Result<Self, AnalysisError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("keysense-frame-{}", i))
            .build()
            .map_err(|e| AnalysisError::WorkerPool(e.to_string()))?;

        debug!(threads = pool.current_num_threads(), "frame worker pool ready");
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl FrameExecutor for ParallelExecutor {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn map_frames<'a>(
        &self,
        frames: &[Frame<'a>],
        work: &FrameWork<'_, 'a>,
    ) -> Vec<Option<FrameChroma>> {
        // par_iter().collect() keeps input order.
        self.pool
            .install(|| frames.par_iter().map(|frame| work(frame)).collect())
    }
}

/// Which executor to build at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    Sequential,
    #[default]
    Parallel,
}

impl FromStr for ExecutorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" | "inline" => Ok(ExecutorKind::Sequential),
            "parallel" | "pool" => Ok(ExecutorKind::Parallel),
            other => Err(format!("unknown executor '{}'", other)),
        }
    }
}

impl std::fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutorKind::Sequential => write!(f, "sequential"),
            ExecutorKind::Parallel => write!(f, "parallel"),
        }
    }
}

/// Build the executor for `kind`.
pub fn build_executor(
    kind: ExecutorKind,
    workers: usize,
) -> Result<Arc<dyn FrameExecutor>, AnalysisError> {
    match kind {
        ExecutorKind::Sequential => Ok(Arc::new(SequentialExecutor)),
        ExecutorKind::Parallel => Ok(Arc::new(ParallelExecutor::new(workers)?)),
    }
}
