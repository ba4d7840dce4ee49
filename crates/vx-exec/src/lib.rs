//! Task-executor boundary for the pipeline stages.
//!
//! Stages submit N independent, strongly-typed task payloads and receive N
//! results (or per-task failure markers) with no ordering guarantee among
//! tasks and no shared mutable state outside the filesystem. Tasks are
//! blocking, synchronous functions; waiting happens only at the collection
//! barrier between stages.

use core::fmt;

use rayon::prelude::*;

use vx_core::Error;

/// Failure marker for one task in a batch. Sibling tasks are unaffected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task_index: usize,
    pub message: String,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task {} failed: {}", self.task_index, self.message)
    }
}

impl std::error::Error for TaskFailure {}

pub type TaskResult<R> = Result<R, TaskFailure>;

/// Executes a batch of independent task payloads.
///
/// The result vector is index-aligned with the payload vector; a failed
/// task yields a [`TaskFailure`] in its slot instead of aborting the batch.
pub trait TaskExecutor {
    fn execute<P, R, F>(&self, payloads: Vec<P>, task: F) -> Vec<TaskResult<R>>
    where
        P: Send,
        R: Send,
        F: Fn(P) -> Result<R, Error> + Sync;
}

/// Runs every task on the calling thread, in payload order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialExecutor;

impl TaskExecutor for SerialExecutor {
    fn execute<P, R, F>(&self, payloads: Vec<P>, task: F) -> Vec<TaskResult<R>>
    where
        P: Send,
        R: Send,
        F: Fn(P) -> Result<R, Error> + Sync,
    {
        payloads
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                task(p).map_err(|e| TaskFailure {
                    task_index: i,
                    message: e.to_string(),
                })
            })
            .collect()
    }
}

/// Runs tasks on the rayon thread pool, one payload per task.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolExecutor;

impl TaskExecutor for PoolExecutor {
    fn execute<P, R, F>(&self, payloads: Vec<P>, task: F) -> Vec<TaskResult<R>>
    where
        P: Send,
        R: Send,
        F: Fn(P) -> Result<R, Error> + Sync,
    {
        payloads
            .into_par_iter()
            .enumerate()
            .map(|(i, p)| {
                task(p).map_err(|e| TaskFailure {
                    task_index: i,
                    message: e.to_string(),
                })
            })
            .collect()
    }
}

/// Splits `items` into at most `n_batches` contiguous batches of nearly
/// equal size. Empty input yields no batches.
pub fn chunkify<T: Clone>(items: &[T], n_batches: usize) -> Vec<Vec<T>> {
    if items.is_empty() || n_batches == 0 {
        return Vec::new();
    }

    let n = n_batches.min(items.len());
    let base = items.len() / n;
    let extra = items.len() % n;

    let mut out = Vec::with_capacity(n);
    let mut start = 0;
    for i in 0..n {
        let len = base + usize::from(i < extra);
        out.push(items[start..start + len].to_vec());
        start += len;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{chunkify, PoolExecutor, SerialExecutor, TaskExecutor};
    use vx_core::Error;

    #[test]
    fn serial_executor_captures_per_task_failures() {
        let results = SerialExecutor.execute(vec![1u32, 0, 3], |v| {
            if v == 0 {
                Err(Error::Consistency("zero payload".to_owned()))
            } else {
                Ok(v * 2)
            }
        });

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), &2);
        assert_eq!(results[1].as_ref().unwrap_err().task_index, 1);
        assert_eq!(results[2].as_ref().unwrap(), &6);
    }

    #[test]
    fn pool_executor_preserves_payload_alignment() {
        let payloads: Vec<u64> = (0..64).collect();
        let results = PoolExecutor.execute(payloads, |v| Ok(v + 1));

        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.as_ref().unwrap(), &(i as u64 + 1));
        }
    }

    #[test]
    fn chunkify_splits_evenly() {
        let items: Vec<u32> = (0..10).collect();
        let batches = chunkify(&items, 3);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0], vec![0, 1, 2, 3]);
        assert_eq!(batches[1], vec![4, 5, 6]);
        assert_eq!(batches[2], vec![7, 8, 9]);

        let total: usize = batches.iter().map(Vec::len).sum();
        assert_eq!(total, items.len());
    }

    #[test]
    fn chunkify_handles_more_batches_than_items() {
        let batches = chunkify(&[1, 2], 5);
        assert_eq!(batches, vec![vec![1], vec![2]]);
        assert!(chunkify::<u8>(&[], 4).is_empty());
    }
}
