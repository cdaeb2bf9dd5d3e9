use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One mutex per key, created on first use.
///
/// Used to serialize the read-modify-write cycle of a single status list
/// while leaving different lists free to proceed in parallel. Guards are
/// scoped, so the lock is released on every exit path, including errors and
/// panics.
///
/// Entries are never evicted: the map holds one mutex for every distinct key
/// ever locked, so its size is bounded by the number of list names a process
/// touches.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex for `key`. Callers lock it for the duration of their
    /// critical section.
    pub fn handle(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock poisoned");
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    /// Number of keys that have been locked at least once.
    pub fn len(&self) -> usize {
        self.locks.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_same_mutex() {
        let locks = KeyedLocks::new();
        let a = locks.handle("main");
        let b = locks.handle("main");
        let c = locks.handle("other");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn different_keys_do_not_contend() {
        let locks = KeyedLocks::new();
        let a = locks.handle("a");
        let _held = a.lock().unwrap();
        let b = locks.handle("b");
        assert!(b.try_lock().is_ok());
        assert!(a.try_lock().is_err());
    }

    #[test]
    fn entries_outlive_their_guards() {
        let locks = KeyedLocks::new();
        for _ in 0..100 {
            let handle = locks.handle("main");
            drop(handle.lock().unwrap());
        }
        assert_eq!(locks.len(), 1);
        for i in 0..10 {
            locks.handle(&format!("list-{i}"));
        }
        assert_eq!(locks.len(), 11);
    }
}
