//! Single-flight Module
//!
//! Coalesces concurrent calls for the same key into one shared computation.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{CacheError, Result};

type Flight<T> = Shared<BoxFuture<'static, Result<T>>>;

// == Single Flight ==
/// Per-key in-flight registry.
///
/// The first caller for a key starts the work; callers arriving while it is
/// still running await the same shared future and receive a clone of its
/// outcome, error included. The work runs on its own task, so it completes
/// and releases its slot even when every waiter has gone away; later calls
/// then start a new flight.
pub struct SingleFlight<T> {
    flights: Arc<Mutex<HashMap<String, Flight<T>>>>,
    coalesced: AtomicU64,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
            coalesced: AtomicU64::new(0),
        }
    }

    // == Run ==
    /// Runs `work` for `key` unless a flight for `key` is already running, in
    /// which case its outcome is awaited instead and `work` is never called.
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        // The map lock is held while the task is spawned, so the task cannot
        // remove its slot before it has been inserted.
        let flight = {
            let mut flights = self.flights.lock().await;
            match flights.get(key) {
                Some(existing) => {
                    self.coalesced.fetch_add(1, Ordering::Relaxed);
                    debug!(key, "joining in-flight fetch");
                    existing.clone()
                }
                None => {
                    let registry = Arc::clone(&self.flights);
                    let owned_key = key.to_string();
                    let work = work();
                    let task = tokio::spawn(async move {
                        let outcome = AssertUnwindSafe(work)
                            .catch_unwind()
                            .await
                            .unwrap_or_else(|_| {
                                warn!(key = %owned_key, "in-flight work panicked");
                                Err(CacheError::producer(anyhow::anyhow!(
                                    "in-flight work panicked"
                                )))
                            });
                        registry.lock().await.remove(&owned_key);
                        outcome
                    });
                    let flight = async move {
                        task.await.unwrap_or_else(|err| {
                            Err(CacheError::producer(anyhow::anyhow!(
                                "in-flight work aborted: {}",
                                err
                            )))
                        })
                    }
                    .boxed()
                    .shared();
                    flights.insert(key.to_string(), flight.clone());
                    flight
                }
            }
        };

        flight.await
    }

    /// Number of calls that joined an existing flight instead of starting one.
    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }

    /// Number of keys with work currently in flight.
    pub async fn in_flight(&self) -> usize {
        self.flights.lock().await.len()
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_calls_share_one_execution() {
        let flights = Arc::new(SingleFlight::<u32>::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flights = Arc::clone(&flights);
            let runs = Arc::clone(&runs);
            handles.push(tokio::spawn(async move {
                flights
                    .run("k", move || async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(42)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 42);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(flights.coalesced(), 7);
        assert_eq!(flights.in_flight().await, 0);
    }

    #[tokio::test]
    async fn test_error_is_shared_by_all_waiters() {
        let flights = Arc::new(SingleFlight::<u32>::new());

        let slow_failure = || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Err(CacheError::producer(anyhow::anyhow!("upstream down")))
        };

        let (a, b) = tokio::join!(flights.run("k", slow_failure), flights.run("k", slow_failure));

        match (a, b) {
            (Err(CacheError::Producer(a)), Err(CacheError::Producer(b))) => {
                assert!(Arc::ptr_eq(&a, &b), "both callers see the same error");
            }
            other => panic!("expected shared producer error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sequential_calls_start_new_flights() {
        let flights = SingleFlight::<u32>::new();

        assert_eq!(flights.run("k", || async { Ok(1) }).await.unwrap(), 1);
        assert_eq!(flights.run("k", || async { Ok(2) }).await.unwrap(), 2);
        assert_eq!(flights.coalesced(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_flight_finishes_and_frees_its_slot() {
        let flights = SingleFlight::<u32>::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let leader_runs = Arc::clone(&runs);
        let leader = flights.run("k", move || async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            leader_runs.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        });
        assert!(tokio::time::timeout(Duration::from_millis(20), leader)
            .await
            .is_err());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight().await, 0);

        let later_runs = Arc::clone(&runs);
        let value = flights
            .run("k", move || async move {
                later_runs.fetch_add(1, Ordering::SeqCst);
                Ok(2)
            })
            .await
            .unwrap();

        assert_eq!(value, 2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(flights.coalesced(), 0);
    }

    #[tokio::test]
    async fn test_panicking_work_releases_slot() {
        let flights = SingleFlight::<u32>::new();

        let result = flights
            .run("k", || async {
                if true {
                    panic!("boom");
                }
                Ok(0)
            })
            .await;

        assert!(matches!(result, Err(CacheError::Producer(_))));
        assert_eq!(flights.in_flight().await, 0);
        assert_eq!(flights.run("k", || async { Ok(3) }).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_coalesce() {
        let flights = SingleFlight::<&'static str>::new();

        let (a, b) = tokio::join!(
            flights.run("a", || async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok("a")
            }),
            flights.run("b", || async { Ok("b") }),
        );

        assert_eq!(a.unwrap(), "a");
        assert_eq!(b.unwrap(), "b");
        assert_eq!(flights.coalesced(), 0);
    }
}
