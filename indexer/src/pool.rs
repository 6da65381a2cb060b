//! Bounded fan-out over tokio tasks
//!
//! [`run_bounded`] is the one parallelism primitive of the indexer: inputs,
//! outputs and per-name claim reconciliation all go through it.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Outcome of a fan-out. Entries are in input order.
#[derive(Debug)]
pub struct PoolReport<R, E> {
    pub results: Vec<(usize, R)>,
    pub errors: Vec<(usize, E)>,
}

impl<R, E> PoolReport<R, E> {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// All results, or the first error in input order
    pub fn into_result(self) -> Result<Vec<R>, E> {
        match self.errors.into_iter().next() {
            Some((_, e)) => Err(e),
            None => Ok(self.results.into_iter().map(|(_, r)| r).collect()),
        }
    }

    /// Like [`into_result`](Self::into_result) but an error matching
    /// `prefer` wins over earlier ones
    pub fn into_result_preferring(self, prefer: impl Fn(&E) -> bool) -> Result<Vec<R>, E> {
        if self.errors.is_empty() {
            return Ok(self.results.into_iter().map(|(_, r)| r).collect());
        }
        let mut errors = self.errors;
        let index = errors.iter().position(|(_, e)| prefer(e)).unwrap_or(0);
        Err(errors.swap_remove(index).1)
    }
}

/// Worker count for `items` jobs given a configured ceiling (0 = one per CPU)
pub fn pool_size(items: usize, workers: usize) -> usize {
    let ceiling = if workers == 0 { num_cpus::get() } else { workers };
    items.min(ceiling).max(1)
}

/// Run `f` over `items` on at most `workers` tasks pulling from a shared
/// queue, and wait for every task before returning.
///
/// A panicking worker re-raises its panic in the caller.
pub async fn run_bounded<T, R, E, F, Fut>(items: Vec<T>, workers: usize, f: F) -> PoolReport<R, E>
where
    T: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    let total = items.len();
    if total == 0 {
        return PoolReport { results: Vec::new(), errors: Vec::new() };
    }

    let queue: Arc<Mutex<VecDeque<(usize, T)>>> = Arc::new(Mutex::new(items.into_iter().enumerate().collect()));
    let f = Arc::new(f);
    let (tx, mut rx) = mpsc::unbounded_channel::<(usize, Result<R, E>)>();

    let mut handles = Vec::new();
    for _ in 0..pool_size(total, workers) {
        let queue = queue.clone();
        let f = f.clone();
        let tx = tx.clone();
        handles.push(tokio::spawn(async move {
            loop {
                let next = queue.lock().pop_front();
                let Some((index, item)) = next else { break };
                let outcome = f(item).await;
                if tx.send((index, outcome)).is_err() {
                    break;
                }
            }
        }));
    }
    drop(tx);

    let mut results = Vec::with_capacity(total);
    let mut errors = Vec::new();
    while let Some((index, outcome)) = rx.recv().await {
        match outcome {
            Ok(r) => results.push((index, r)),
            Err(e) => errors.push((index, e)),
        }
    }

    for handle in handles {
        if let Err(e) = handle.await {
            if e.is_panic() {
                std::panic::resume_unwind(e.into_panic());
            }
        }
    }

    results.sort_by_key(|(i, _)| *i);
    errors.sort_by_key(|(i, _)| *i);
    PoolReport { results, errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_results_keep_input_order() {
        let report = run_bounded((0..20u64).collect(), 4, |n| async move {
            tokio::time::sleep(Duration::from_millis(20 - n)).await;
            Ok::<_, String>(n * 2)
        })
        .await;
        assert!(report.is_success());
        assert_eq!(report.into_result().unwrap(), (0..20u64).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (r, p) = (running.clone(), peak.clone());
        run_bounded((0..32).collect::<Vec<u32>>(), 3, move |_| {
            let (running, peak) = (r.clone(), p.clone());
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, ()>(())
            }
        })
        .await;
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_errors_are_collected() {
        let report = run_bounded(vec![1, 2, 3, 4], 2, |n| async move {
            if n % 2 == 0 {
                Err(format!("even {}", n))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(report.results, vec![(0, 1), (2, 3)]);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.into_result_preferring(|e| e.ends_with('4')).unwrap_err(), "even 4");
    }

    #[test]
    fn test_pool_size() {
        assert_eq!(pool_size(2, 8), 2);
        assert_eq!(pool_size(100, 8), 8);
        assert_eq!(pool_size(0, 8), 1);
        assert!(pool_size(1000, 0) >= 1);
    }
}
