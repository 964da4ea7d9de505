//! Early-init dependency stack.
//!
//! Keys being early-initialized are pushed onto a stack; finding a key already
//! on the stack means the init call chain came back to it. The stack lives
//! behind one re-entrant mutex: the thread driving an early-init chain can
//! recurse through nested `early_init` calls, every other thread waits until
//! the outermost call returns.

use std::cell::RefCell;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::error::{BrokerError, BrokerResult};

#[derive(Debug, Default)]
pub(crate) struct DependencyStack {
    keys: ReentrantMutex<RefCell<Vec<String>>>,
}

impl DependencyStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Enters the broker-wide early-init region.
    pub(crate) fn lock(&self) -> StackLock<'_> {
        StackLock {
            guard: self.keys.lock(),
        }
    }
}

/// Held for the whole extent of one early-init call.
pub(crate) struct StackLock<'a> {
    guard: ReentrantMutexGuard<'a, RefCell<Vec<String>>>,
}

impl StackLock<'_> {
    /// Pushes `key`, failing if it is already on the stack.
    ///
    /// The returned frame pops the key when dropped, on success and failure
    /// paths alike.
    pub(crate) fn push(&self, key: &str) -> BrokerResult<StackFrame<'_>> {
        let keys: &RefCell<Vec<String>> = &self.guard;
        let mut stack = keys.borrow_mut();
        if let Some(first) = stack.iter().position(|entry| entry == key) {
            let mut chain = stack[first..].to_vec();
            chain.push(key.to_string());
            return Err(BrokerError::circular(key, chain));
        }
        stack.push(key.to_string());
        Ok(StackFrame { keys })
    }

    /// Keys currently on the stack, outermost first.
    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> Vec<String> {
        self.guard.borrow().clone()
    }
}

pub(crate) struct StackFrame<'a> {
    keys: &'a RefCell<Vec<String>>,
}

impl Drop for StackFrame<'_> {
    fn drop(&mut self) {
        self.keys.borrow_mut().pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_and_cycle() {
        let stack = DependencyStack::new();
        let lock = stack.lock();
        {
            let _a = lock.push("A").unwrap();
            let _b = lock.push("B").unwrap();
            let _c = lock.push("C").unwrap();

            let err = match lock.push("B") {
                Err(err) => err,
                Ok(_) => panic!("cycle not detected"),
            };
            assert_eq!(err.chain().unwrap(), ["B", "C", "B"]);
            assert_eq!(lock.snapshot(), ["A", "B", "C"]);
        }
        assert!(lock.snapshot().is_empty());
    }

    #[test]
    fn test_lock_is_reentrant() {
        let stack = DependencyStack::new();
        let outer = stack.lock();
        let _frame = outer.push("outer").unwrap();
        let inner = stack.lock();
        assert_eq!(inner.snapshot(), ["outer"]);
    }
}
