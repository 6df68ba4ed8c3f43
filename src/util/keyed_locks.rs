/*!
# Keyed locks
An arena of mutexes addressed by string keys.
Callers that share a key are serialized against each other, callers with different keys never contend beyond the brief arena lookup.

## Example usage
```rust
use allele_beacon::util::keyed_locks::KeyedLocks;

let locks = KeyedLocks::default();
let value = locks.with_lock("variant-a", || 1 + 1);
assert_eq!(value, 2);
assert_eq!(locks.len(), 0);
```
*/

use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct KeyedLocks {
    /// key -> shared lock handle; entries are dropped once nobody holds them
    arena: Mutex<FxHashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    /// Runs `f` while holding the lock for `key`.
    /// A poisoned lock is taken over; the protected state lives in the store, not in the mutex.
    /// # Arguments
    /// * `key` - the identity to serialize on
    /// * `f` - the critical section
    pub fn with_lock<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let handle = self.handle(key);
        let result = {
            let _guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        drop(handle);
        self.release(key);
        result
    }

    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        self.arena.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn handle(&self, key: &str) -> Arc<Mutex<()>> {
        let mut arena = self.arena.lock().unwrap_or_else(PoisonError::into_inner);
        arena.entry(key.to_string()).or_default().clone()
    }

    // only the arena itself still references the lock once every caller is done
    fn release(&self, key: &str) {
        let mut arena = self.arena.lock().unwrap_or_else(PoisonError::into_inner);
        if arena.get(key).is_some_and(|h| Arc::strong_count(h) == 1) {
            arena.remove(key);
        }
    }
}

/// The two critical sections the engine needs
#[derive(Debug, Default)]
pub struct EngineLocks {
    /// Serializes lookup-then-write per variant id
    pub variants: KeyedLocks,
    /// Serializes rollup recomputation per dataset id
    pub datasets: KeyedLocks,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_serializes_same_key() {
        let locks = Arc::new(KeyedLocks::default());
        let counter = Arc::new(AtomicU64::new(0));
        let handles: Vec<_> = (0..8).map(|_| {
            let locks = locks.clone();
            let counter = counter.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    locks.with_lock("shared", || {
                        // non-atomic read-modify-write, only safe under the lock
                        let v = counter.load(Ordering::SeqCst);
                        std::thread::yield_now();
                        counter.store(v + 1, Ordering::SeqCst);
                    });
                }
            })
        }).collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 800);
        assert!(locks.is_empty());
    }

    #[test]
    fn test_nested_distinct_keys() {
        let locks = KeyedLocks::default();
        let v = locks.with_lock("a", || {
            locks.with_lock("b", || {
                assert_eq!(locks.len(), 2);
                7
            })
        });
        assert_eq!(v, 7);
        assert!(locks.is_empty());
    }
}
