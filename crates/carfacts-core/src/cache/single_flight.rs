use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-key async locks. Entries live only while someone holds or awaits them.
#[derive(Default)]
pub(crate) struct SingleFlight {
    locks: Mutex<HashMap<String, Slot>>,
}

struct Slot {
    lock: Arc<AsyncMutex<()>>,
    users: usize,
}

pub(crate) struct FlightGuard<'a> {
    _guard: OwnedMutexGuard<()>,
    _release: Release<'a>,
}

/// Counts one holder or waiter; dropping it (even mid-wait) gives the slot back.
struct Release<'a> {
    owner: &'a SingleFlight,
    key: String,
}

impl SingleFlight {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn acquire(&self, key: &str) -> FlightGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            let slot = locks.entry(key.to_string()).or_insert_with(|| Slot {
                lock: Arc::new(AsyncMutex::new(())),
                users: 0,
            });
            slot.users += 1;
            slot.lock.clone()
        };
        let release = Release {
            owner: self,
            key: key.to_string(),
        };
        let guard = lock.lock_owned().await;
        FlightGuard {
            _guard: guard,
            _release: release,
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_keys(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Drop for Release<'_> {
    fn drop(&mut self) {
        let mut locks = self.owner.locks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = locks.get_mut(&self.key) {
            slot.users -= 1;
            if slot.users == 0 {
                locks.remove(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_removed_after_release() {
        let flights = SingleFlight::new();
        {
            let _g = flights.acquire("vehicle:a").await;
            assert_eq!(flights.tracked_keys(), 1);
        }
        assert_eq!(flights.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let flights = Arc::new(SingleFlight::new());
        let g = flights.acquire("vehicle:a").await;

        let f2 = flights.clone();
        let waiter = tokio::spawn(async move {
            let _g = f2.acquire("vehicle:a").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(g);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should acquire after release")
            .unwrap();
        assert_eq!(flights.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_after_release_leaves_no_entry() {
        let flights = Arc::new(SingleFlight::new());
        let g = flights.acquire("vehicle:a").await;

        let f2 = flights.clone();
        let waiter = tokio::spawn(async move {
            let _g = f2.acquire("vehicle:a").await;
            std::future::pending::<()>().await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(g);
        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());
        assert_eq!(flights.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_while_held_keeps_entry_for_holder() {
        let flights = Arc::new(SingleFlight::new());
        let g = flights.acquire("vehicle:a").await;

        let f2 = flights.clone();
        let waiter = tokio::spawn(async move {
            let _g = f2.acquire("vehicle:a").await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        waiter.abort();
        let _ = waiter.await;

        assert_eq!(flights.tracked_keys(), 1);
        drop(g);
        assert_eq!(flights.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let flights = SingleFlight::new();
        let _a = flights.acquire("vehicle:a").await;
        let b = tokio::time::timeout(Duration::from_millis(200), flights.acquire("vehicle:b")).await;
        assert!(b.is_ok());
    }
}
