//! The registry of attached mutator threads.
//!
//! The registry is how the safepoint machinery reaches the deferred card mark of every thread.
//! It is only locked when a thread attaches or detaches, and at safepoints. The store barrier
//! never touches it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::plan::barriers::Barrier;
use crate::plan::mutator_context::DeferredCardMark;
use crate::util::VMMutatorThread;

#[derive(Default)]
pub struct ThreadRegistry {
    threads: Mutex<HashMap<VMMutatorThread, Arc<DeferredCardMark>>>,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<VMMutatorThread, Arc<DeferredCardMark>>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.threads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create the deferred card mark state of a newly attached thread.
    /// Attaching a thread twice is fatal.
    pub(crate) fn register(&self, tls: VMMutatorThread) -> Arc<DeferredCardMark> {
        let deferred = Arc::new(DeferredCardMark::new());
        let previous = self.lock().insert(tls, deferred.clone());
        assert!(previous.is_none(), "Thread {:?} is already attached", tls);
        deferred
    }

    /// Remove a detaching thread. Its deferred card mark must have been discharged.
    /// Detaching a thread that is not attached is fatal.
    pub(crate) fn unregister(&self, tls: VMMutatorThread) {
        let deferred = self.lock().remove(&tls);
        match deferred {
            Some(deferred) => {
                assert!(
                    deferred.pending().is_none(),
                    "Thread {:?} detached with an undischarged card mark",
                    tls
                );
                deferred.detach();
            }
            None => panic!("Thread {:?} is not attached", tls),
        }
    }

    /// The deferred card mark state of an attached thread. Fatal if the thread is not attached.
    pub fn get(&self, tls: VMMutatorThread) -> Arc<DeferredCardMark> {
        match self.lock().get(&tls) {
            Some(deferred) => deferred.clone(),
            None => panic!("Thread {:?} is not attached", tls),
        }
    }

    pub fn is_registered(&self, tls: VMMutatorThread) -> bool {
        self.lock().contains_key(&tls)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Discharge the deferred card mark of every attached thread, one after another.
    ///
    /// Only call this while all mutators are stopped at a safepoint. Returns the number of
    /// threads that had an outstanding obligation.
    pub fn flush_all(&self, barrier: &dyn Barrier) -> usize {
        let threads = self.lock();
        let mut discharged = 0;
        for deferred in threads.values() {
            if deferred.pending().is_some() {
                discharged += 1;
            }
            deferred.flush(barrier);
        }
        discharged
    }
}
