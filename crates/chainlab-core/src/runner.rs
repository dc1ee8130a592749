//! Ordered task runner used for per-validator fan-out.
//!
//! Both modes are fail-fast and report the error of the lowest-index failing
//! task. `Sequential` additionally guarantees that no task starts after an
//! earlier one failed.

use std::future::Future;

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::config::{RunnerConfig, RunnerMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskRunner {
    #[default]
    Sequential,
    /// Up to `max_concurrent` tasks in flight; in-flight tasks are dropped
    /// once an earlier-index task fails.
    FanOut { max_concurrent: usize },
}

impl TaskRunner {
    pub fn from_config(config: &RunnerConfig) -> Self {
        match config.mode {
            RunnerMode::Sequential => TaskRunner::Sequential,
            RunnerMode::FanOut => TaskRunner::FanOut {
                max_concurrent: config.max_concurrent.max(1),
            },
        }
    }

    /// Run `task` over `items` and return results in item order.
    pub async fn run_ordered<T, R, E, F, Fut>(&self, items: Vec<T>, task: F) -> Result<Vec<R>, E>
    where
        F: Fn(usize, T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        match *self {
            TaskRunner::Sequential => {
                let mut results = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    results.push(task(index, item).await?);
                }
                Ok(results)
            }
            TaskRunner::FanOut { max_concurrent } => {
                stream::iter(items.into_iter().enumerate())
                    .map(|(index, item)| task(index, item))
                    .buffered(max_concurrent.max(1))
                    .try_collect()
                    .await
            }
        }
    }
}
