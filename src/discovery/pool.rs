// Bounded worker pool shared by every network phase.

use std::future::Future;
use std::sync::Arc;

use log::warn;
use tokio::task::JoinSet;
use tokio::time::Instant;

pub struct PoolOutput<I, T> {
    /// Completed probes in input order.
    pub results: Vec<(I, T)>,
    /// The deadline passed before every item finished; the rest were abandoned.
    pub expired: bool,
    pub failed: usize,
}

/// Run `probe` over `items` with at most `workers` in flight.
///
/// Results are gathered here, on the caller's task, so the caller can write
/// them to the store sequentially. Workers still running at `deadline` are
/// aborted.
pub async fn run_bounded<I, T, F, Fut>(
    items: Vec<I>,
    workers: usize,
    deadline: Instant,
    probe: F,
) -> PoolOutput<I, T>
where
    I: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    let probe = Arc::new(probe);
    let mut queue = items.into_iter().enumerate();
    let mut set = JoinSet::new();
    let mut finished = Vec::new();
    let mut expired = false;
    let mut failed = 0;

    loop {
        while set.len() < workers.max(1) {
            let (index, item) = match queue.next() {
                Some(next) => next,
                None => break,
            };
            let work = (*probe)(item.clone());
            set.spawn(async move { (index, item, work.await) });
        }
        if set.is_empty() {
            break;
        }
        match tokio::time::timeout_at(deadline, set.join_next()).await {
            Ok(Some(Ok(done))) => finished.push(done),
            Ok(Some(Err(e))) => {
                warn!("probe worker failed: {}", e);
                failed += 1;
            }
            Ok(None) => break,
            Err(_) => {
                expired = true;
                set.abort_all();
                break;
            }
        }
    }

    finished.sort_by_key(|(index, _, _)| *index);
    PoolOutput {
        results: finished
            .into_iter()
            .map(|(_, item, result)| (item, result))
            .collect(),
        expired,
        failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_worker_count() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (in_flight_probe, peak_probe) = (in_flight.clone(), peak.clone());

        let output = run_bounded(
            (0..20).collect::<Vec<u32>>(),
            3,
            Instant::now() + Duration::from_secs(10),
            move |n| {
                let in_flight = in_flight_probe.clone();
                let peak = peak_probe.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    n * 2
                }
            },
        )
        .await;

        assert!(!output.expired);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        // Input order is preserved regardless of completion order.
        assert_eq!(output.results[5], (5, 10));
        assert_eq!(output.results.len(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_abandons_stragglers() {
        let output = run_bounded(
            vec![1u64, 100, 2],
            3,
            Instant::now() + Duration::from_secs(10),
            |secs| async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                secs
            },
        )
        .await;
        assert!(output.expired);
        assert_eq!(output.results, vec![(1, 1), (2, 2)]);
    }
}
