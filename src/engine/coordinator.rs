//! Per-project mutual exclusion.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::{ProjectError, Result};

const CLEANUP_INTERVAL: usize = 64;
const CLEANUP_THRESHOLD: usize = 128;

/// Serializes mutations against the same project id.
///
/// Each id maps to its own async mutex, so calls for different ids never
/// contend. Waiters park on the mutex instead of polling and are woken in
/// arrival order. Entries are held as `Weak` and pruned once no guard is
/// alive, so the map only grows with the number of projects in flight.
///
/// The lock is local to this process. Two service instances sharing one
/// store do not exclude each other.
pub struct MutationCoordinator {
    locks: Mutex<HashMap<Uuid, Weak<AsyncMutex<()>>>>,
    acquire_counter: AtomicUsize,
    acquire_timeout: Duration,
}

impl MutationCoordinator {
    pub fn new(acquire_timeout: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            acquire_counter: AtomicUsize::new(0),
            acquire_timeout,
        }
    }

    /// Runs `f` while holding the lock for `id`.
    ///
    /// The guard lives on this stack frame, so the lock is released however
    /// `f` finishes: success, error, panic, or the caller dropping the future.
    pub async fn with_lock<F, Fut, T>(&self, id: Uuid, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _guard = self.acquire(id).await?;
        f().await
    }

    /// Waits up to the configured timeout for the lock on `id`.
    pub async fn acquire(&self, id: Uuid) -> Result<ProjectGuard> {
        let mutex = self.entry(id);
        match tokio::time::timeout(self.acquire_timeout, mutex.lock_owned()).await {
            Ok(guard) => {
                tracing::debug!(project_id = %id, "acquired project lock");
                Ok(ProjectGuard { id, _guard: guard })
            }
            Err(_) => {
                tracing::warn!(
                    project_id = %id,
                    waited_ms = self.acquire_timeout.as_millis() as u64,
                    "timed out waiting for project lock"
                );
                Err(ProjectError::ConcurrencyTimeout {
                    id,
                    waited: self.acquire_timeout,
                })
            }
        }
    }

    fn entry(&self, id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);

        let mutex = map.get(&id).and_then(Weak::upgrade).unwrap_or_else(|| {
            let fresh = Arc::new(AsyncMutex::new(()));
            map.insert(id, Arc::downgrade(&fresh));
            fresh
        });

        let tick = self.acquire_counter.fetch_add(1, Ordering::Relaxed);
        if map.len() > CLEANUP_THRESHOLD && tick % CLEANUP_INTERVAL == 0 {
            map.retain(|_, weak| weak.strong_count() > 0);
        }

        mutex
    }

    #[cfg(test)]
    fn is_busy(&self, id: Uuid) -> bool {
        let map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        map.get(&id).is_some_and(|weak| weak.strong_count() > 0)
    }

    #[cfg(test)]
    fn entry_count(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Holds the lock for one project until dropped.
pub struct ProjectGuard {
    id: Uuid,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for ProjectGuard {
    fn drop(&mut self) {
        tracing::debug!(project_id = %self.id, "released project lock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator(timeout_ms: u64) -> Arc<MutationCoordinator> {
        Arc::new(MutationCoordinator::new(Duration::from_millis(timeout_ms)))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_id_never_runs_concurrently() {
        let locks = coordinator(5_000);
        let id = Uuid::new_v4();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                locks
                    .with_lock(id, || async {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn different_ids_run_in_parallel() {
        let locks = coordinator(5_000);
        // Both closures must be inside their critical sections at once to pass
        // the barrier; serialized execution would hang until the timeout.
        let barrier = Arc::new(tokio::sync::Barrier::new(2));

        let run = |id: Uuid| {
            let locks = Arc::clone(&locks);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                locks
                    .with_lock(id, || async {
                        barrier.wait().await;
                        Ok(())
                    })
                    .await
            })
        };
        let a = run(Uuid::new_v4());
        let b = run(Uuid::new_v4());

        let joined = tokio::time::timeout(Duration::from_secs(2), async {
            a.await.unwrap().unwrap();
            b.await.unwrap().unwrap();
        })
        .await;
        assert!(joined.is_ok());
    }

    #[tokio::test]
    async fn times_out_while_another_caller_holds_the_lock() {
        let locks = coordinator(20);
        let id = Uuid::new_v4();
        let _held = locks.acquire(id).await.unwrap();

        let err = locks
            .with_lock(id, || async { Ok(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, ProjectError::ConcurrencyTimeout { id: got, .. } if got == id));
    }

    #[tokio::test]
    async fn releases_after_error() {
        let locks = coordinator(20);
        let id = Uuid::new_v4();

        let result: Result<()> = locks
            .with_lock(id, || async { Err(ProjectError::validation("nope")) })
            .await;
        assert!(result.is_err());
        assert!(!locks.is_busy(id));

        locks.with_lock(id, || async { Ok(()) }).await.unwrap();
    }

    #[tokio::test]
    async fn releases_after_panic() {
        let locks = coordinator(50);
        let id = Uuid::new_v4();

        let task = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                locks
                    .with_lock(id, || async {
                        if id != Uuid::nil() {
                            panic!("mutation blew up");
                        }
                        Ok(())
                    })
                    .await
            })
        };
        assert!(task.await.unwrap_err().is_panic());

        locks.with_lock(id, || async { Ok(()) }).await.unwrap();
    }

    #[tokio::test]
    async fn idle_entries_are_pruned() {
        let locks = coordinator(20);
        for _ in 0..(CLEANUP_THRESHOLD + CLEANUP_INTERVAL + 1) {
            locks.with_lock(Uuid::new_v4(), || async { Ok(()) }).await.unwrap();
        }
        assert!(locks.entry_count() <= CLEANUP_THRESHOLD + CLEANUP_INTERVAL);
    }
}
