//! Per-thread mutator context, and the deferred initial card mark it may carry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use atomic_refcell::AtomicRefCell;

use crate::barrier_set::CardBarrierSet;
use crate::plan::barriers::{Barrier, CardMarkPolicy};
use crate::util::{MemRegion, VMMutatorThread};

/// The deferred card mark of one thread.
///
/// It holds at most one obligation: the extent of the most recently allocated object whose
/// initializing store barriers were elided. Only the owning thread touches it, except during a
/// safepoint when the owner is stopped. Any other overlapping access is a bug in the runtime and
/// panics (the cell is borrowed mutably for the whole of every update).
pub struct DeferredCardMark {
    pending: AtomicRefCell<Option<MemRegion>>,
    attached: AtomicBool,
}

impl DeferredCardMark {
    pub(crate) fn new() -> Self {
        DeferredCardMark {
            pending: AtomicRefCell::new(None),
            attached: AtomicBool::new(true),
        }
    }

    /// The outstanding obligation, if any.
    pub fn pending(&self) -> Option<MemRegion> {
        *self.pending.borrow()
    }

    /// Is the owning thread still attached?
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Relaxed)
    }

    pub(crate) fn detach(&self) {
        self.attached.store(false, Ordering::Relaxed);
    }

    /// Record a new obligation. The previous one must have been discharged.
    fn record(&self, object: MemRegion) {
        let mut pending = self.pending.borrow_mut();
        debug_assert!(pending.is_none(), "{:?} was not discharged", *pending);
        *pending = Some(object);
    }

    /// Discharge the obligation: dirty the cards of the recorded object and go back to idle.
    ///
    /// Discharging a thread that was never attached, or has already detached, is fatal.
    pub(crate) fn flush(&self, barrier: &dyn Barrier) {
        assert!(
            self.is_attached(),
            "Discharging the deferred card mark of a thread that is not attached"
        );
        let mut pending = self.pending.borrow_mut();
        if let Some(object) = pending.take() {
            trace!("Discharge deferred card mark for {}", object);
            barrier.write_region(object);
        }
    }
}

/// A mutator is the per-thread context of the barrier. It is created when a thread attaches
/// (see [`crate::memory_manager::bind_mutator`]) and is owned by that thread.
///
/// Dropping a mutator is the thread detach: the deferred card mark is discharged and the
/// thread is removed from the registry. This happens whether or not the runtime flushed the
/// mutator first.
pub struct Mutator {
    tls: VMMutatorThread,
    deferred: Arc<DeferredCardMark>,
    barrier_set: &'static CardBarrierSet,
}

impl Mutator {
    pub(crate) fn new(
        tls: VMMutatorThread,
        deferred: Arc<DeferredCardMark>,
        barrier_set: &'static CardBarrierSet,
    ) -> Self {
        Mutator {
            tls,
            deferred,
            barrier_set,
        }
    }

    pub fn get_tls(&self) -> VMMutatorThread {
        self.tls
    }

    pub fn barrier(&self) -> &dyn Barrier {
        self.barrier_set.barrier()
    }

    pub fn deferred_card_mark(&self) -> &DeferredCardMark {
        &self.deferred
    }

    pub fn has_pending_card_mark(&self) -> bool {
        self.deferred.pending().is_some()
    }

    /// The extent of the object whose card marks this thread still owes, if any.
    pub fn pending_card_mark(&self) -> Option<MemRegion> {
        self.deferred.pending()
    }

    /// Called when an allocation of `object` took the slow path. The allocation may not carry the
    /// elision guarantee of the fast path, so under the deferred policy the object's cards become
    /// this thread's obligation. Under the immediate policy this is a no-op.
    pub fn on_slowpath_allocation_exit(&mut self, object: MemRegion) {
        self.defer_initial_card_mark(object);
    }

    /// Called by the allocator when a fast-path allocation of `object` had its initializing
    /// store barriers elided.
    pub fn record_fast_path_allocation(&mut self, object: MemRegion) {
        self.defer_initial_card_mark(object);
    }

    fn defer_initial_card_mark(&mut self, object: MemRegion) {
        if self.barrier().card_mark_policy() == CardMarkPolicy::Immediate {
            return;
        }
        // An object outside the covered range is fatal here, with the slot untouched.
        self.barrier_set.card_table().check_region(object);
        // At most one obligation per thread. The previous object is marked before the new one
        // takes its place, so superseding never loses a mark.
        self.flush();
        self.deferred.record(object);
    }

    /// Discharge the deferred card mark. Must be called before the thread crosses a safepoint.
    pub fn flush(&mut self) {
        self.deferred.flush(self.barrier_set.barrier());
    }

    /// Make this thread's card state consistent with the object graph, e.g. before a heap walk.
    pub fn make_parsable(&mut self) {
        self.flush();
    }
}

impl Drop for Mutator {
    fn drop(&mut self) {
        debug!("Detach mutator {:?}", self.tls);
        self.flush();
        self.barrier_set.registry().unregister(self.tls);
    }
}
