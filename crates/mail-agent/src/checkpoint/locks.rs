use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// One async mutex per thread id.
///
/// Holding the guard for a whole turn makes a second turn on the same thread
/// wait until the first has committed. Different threads never contend.
/// An entry lives only while some turn holds or waits for it.
#[derive(Debug, Default)]
pub struct ThreadLocks {
    locks: Arc<LockMap>,
}

/// Held for the duration of a turn; releasing it drops the map entry once idle
#[derive(Debug)]
pub struct ThreadGuard {
    guard: Option<OwnedMutexGuard<()>>,
    thread_id: String,
    locks: Arc<LockMap>,
}

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Waiters hold a clone of the Arc, so a count of one means only the map is left
        self.locks
            .remove_if(&self.thread_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl ThreadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, thread_id: &str) -> ThreadGuard {
        // The map reference must be dropped before awaiting
        let lock = self
            .locks
            .entry(thread_id.to_string())
            .or_default()
            .value()
            .clone();
        let guard = lock.lock_owned().await;

        ThreadGuard {
            guard: Some(guard),
            thread_id: thread_id.to_string(),
            locks: self.locks.clone(),
        }
    }

    /// Whether a turn currently holds the lock for `thread_id`
    pub fn is_busy(&self, thread_id: &str) -> bool {
        self.locks
            .get(thread_id)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_thread_waits() {
        let locks = Arc::new(ThreadLocks::new());
        let guard = locks.acquire("t1").await;
        assert!(locks.is_busy("t1"));

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("t1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("second turn should get the lock")
            .unwrap();
        assert!(!locks.is_busy("t1"));
    }

    #[tokio::test]
    async fn test_different_threads_do_not_contend() {
        let locks = ThreadLocks::new();
        let _a = locks.acquire("a").await;
        let _b = tokio::time::timeout(Duration::from_secs(1), locks.acquire("b"))
            .await
            .expect("independent threads must not block each other");
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_entries_are_dropped_when_idle() {
        let locks = Arc::new(ThreadLocks::new());
        let held = locks.acquire("held").await;
        drop(locks.acquire("idle").await);

        assert_eq!(locks.len(), 1);
        assert!(locks.is_busy("held"));

        // a waiter keeps the entry alive after the holder lets go
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let guard = locks.acquire("held").await;
                tokio::time::sleep(Duration::from_millis(20)).await;
                drop(guard);
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);
        assert_eq!(locks.len(), 1);

        waiter.await.unwrap();
        assert!(locks.is_empty());
    }
}
