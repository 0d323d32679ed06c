//! Abortable operation registry
//!
//! Long-running editor flows (loading the graph, saving connections) register
//! under a string key. Starting a new operation with a key that is already
//! running aborts the old one. Cancellation is cooperative: the operation
//! polls its [`AbortSignal`] at checkpoints.
//!
//! The registry's owner holds it mutably while an operation runs, so code
//! called back from inside that operation (store listeners, bus observers)
//! aborts through a cloned [`AbortHandle`] instead.

use crate::error::{Error, Result};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type Running = Rc<RefCell<HashMap<String, AbortSignal>>>;

/// Shared abort flag handed to a running operation
#[derive(Debug, Clone)]
pub struct AbortSignal {
    key: String,
    flag: Arc<AtomicBool>,
}

impl AbortSignal {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(Error::Aborted)` once the operation has been superseded
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_aborted() {
            Err(Error::Aborted(self.key.clone()))
        } else {
            Ok(())
        }
    }

    fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    fn same_as(&self, other: &AbortSignal) -> bool {
        Arc::ptr_eq(&self.flag, &other.flag)
    }
}

/// Cloneable view of a registry that can only abort
#[derive(Debug, Clone)]
pub struct AbortHandle {
    running: Running,
}

impl AbortHandle {
    /// Abort the operation running under `key`, if any
    pub fn abort(&self, key: &str) -> bool {
        let removed = self.running.borrow_mut().remove(key);
        match removed {
            Some(signal) => {
                tracing::debug!(operation = key, "aborted through handle");
                signal.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.running.borrow().contains_key(key)
    }
}

#[derive(Debug, Default)]
pub struct OperationRegistry {
    running: Running,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> AbortHandle {
        AbortHandle {
            running: Rc::clone(&self.running),
        }
    }

    /// Register an operation, aborting any prior one under the same key
    pub fn begin(&mut self, key: &str) -> AbortSignal {
        let signal = AbortSignal::new(key);
        let previous = self.running.borrow_mut().insert(key.to_string(), signal.clone());
        if let Some(previous) = previous {
            tracing::debug!(operation = key, "superseding running operation");
            previous.abort();
        }
        signal
    }

    /// Deregister, but only if `signal` still owns the key
    pub fn finish(&mut self, key: &str, signal: &AbortSignal) {
        let mut running = self.running.borrow_mut();
        if running.get(key).is_some_and(|s| s.same_as(signal)) {
            running.remove(key);
        }
    }

    pub fn abort(&mut self, key: &str) -> bool {
        self.handle().abort(key)
    }

    pub fn abort_all(&mut self) {
        for (key, signal) in self.running.borrow_mut().drain() {
            tracing::debug!(operation = %key, "aborting");
            signal.abort();
        }
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.running.borrow().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.running.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_supersedes_same_key() {
        let mut ops = OperationRegistry::new();
        let first = ops.begin("load-graph");
        let other = ops.begin("save-connections");
        let second = ops.begin("load-graph");

        assert!(first.is_aborted());
        assert!(matches!(first.checkpoint(), Err(Error::Aborted(k)) if k == "load-graph"));
        assert!(!second.is_aborted());
        assert!(!other.is_aborted());
        assert_eq!(ops.len(), 2);
    }

    #[test]
    fn test_finish_ignores_stale_signal() {
        let mut ops = OperationRegistry::new();
        let first = ops.begin("load-graph");
        let second = ops.begin("load-graph");

        ops.finish("load-graph", &first);
        assert!(ops.is_running("load-graph"));

        ops.finish("load-graph", &second);
        assert!(ops.is_empty());
    }

    #[test]
    fn test_abort_all() {
        let mut ops = OperationRegistry::new();
        let a = ops.begin("a");
        let b = ops.begin("b");
        ops.abort_all();
        assert!(a.is_aborted() && b.is_aborted());
        assert!(ops.is_empty());
        assert!(!ops.abort("a"));
    }

    #[test]
    fn test_handle_aborts_running_operation() {
        let mut ops = OperationRegistry::new();
        let handle = ops.handle();
        let save = ops.begin("save-connections");

        assert!(handle.is_running("save-connections"));
        assert!(handle.abort("save-connections"));
        assert!(save.is_aborted());
        assert!(!ops.is_running("save-connections"));
        assert!(!handle.abort("save-connections"));
    }
}
