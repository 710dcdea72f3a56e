//! Runtime-to-barrier interface: safe Rust APIs.
//!
//! This module provides the in-process API that a runtime (its allocator, interpreter, code
//! generator and thread management) calls into. We expect the runtime to wrap these functions
//! and, if necessary, expose them to native code, managing the unsafety of doing so.
//!
//! The store barriers ([`object_reference_write_post`], [`array_reference_write_post`] and
//! [`memory_region_copy_post`]) are generic over the barrier type. A runtime should look up the
//! concrete barrier once with [`CardBarrierSet::barrier_as`] and call them with it, so that each
//! call site is resolved at compile time. A code generator that emits its own fast path only
//! needs the queries [`can_elide_fast_path_store_barriers`] and [`requires_strict_store_ordering`].

use crate::barrier_set::{CardBarrierSet, CardBarrierSetBuilder};
use crate::plan::access::{self, ArrayElement, BulkRegion, FieldWrite, PlainField};
use crate::plan::{Barrier, Mutator};
use crate::util::{Address, MemRegion, VMMutatorThread};

/// Initialize a barrier set whose card table covers `covered`. A runtime should call this once,
/// at collector initialization, after setting options on the builder.
///
/// Note that this method will attempt to initialize a logger. If the runtime would like to use its
/// own logger, it should initialize the logger before calling this method.
///
/// Mutators keep a static reference to the barrier set, so a runtime usually leaks the returned
/// box (`Box::leak()`) or stores it in a lazily initialized static.
///
/// Arguments:
/// * `builder`: The builder with the options for the barrier set.
/// * `covered`: The heap range the card table covers.
pub fn cardmark_init(builder: &CardBarrierSetBuilder, covered: MemRegion) -> Box<CardBarrierSet> {
    match crate::util::logger::try_init() {
        Ok(_) => debug!("Card marking barrier initialized the logger."),
        Err(_) => debug!(
            "Card marking barrier failed to initialize the logger. Possibly a logger has been initialized by user."
        ),
    }
    Box::new(builder.build(covered))
}

/// Create the mutator context for a thread that attaches to the runtime. A runtime should store
/// the returned mutator in thread local storage that can be accessed efficiently.
///
/// Attaching a thread that is already attached is fatal.
///
/// Arguments:
/// * `barrier_set`: A reference to the barrier set.
/// * `tls`: The thread that will be associated with the mutator.
pub fn bind_mutator(barrier_set: &'static CardBarrierSet, tls: VMMutatorThread) -> Box<Mutator> {
    let deferred = barrier_set.registry().register(tls);
    debug!("Attach mutator {:?}", tls);
    Box::new(Mutator::new(tls, deferred, barrier_set))
}

/// Reclaim the mutator of a detaching thread. Its deferred card mark is discharged first,
/// whether or not the runtime flushed the mutator before.
///
/// Arguments:
/// * `mutator`: The mutator to be destroyed.
pub fn destroy_mutator(mutator: Box<Mutator>) {
    drop(mutator);
}

/// Alias of [`destroy_mutator`], named after the lifecycle event.
pub fn on_thread_detach(mutator: Box<Mutator>) {
    destroy_mutator(mutator)
}

/// Discharge the mutator's deferred card mark. A runtime must call this before the thread
/// crosses a safepoint, unless the safepoint calls [`prepare_for_safepoint`] instead.
///
/// Arguments:
/// * `mutator`: A reference to the mutator.
pub fn flush_mutator(mutator: &mut Mutator) {
    mutator.flush()
}

/// Make the card state of this thread consistent with the object graph, e.g. before a
/// collector-driven heap walk.
///
/// Arguments:
/// * `mutator`: A reference to the mutator.
pub fn make_parsable(mutator: &mut Mutator) {
    mutator.make_parsable()
}

/// Discharge the deferred card marks of all attached threads. Only call this while all mutators
/// are stopped at a safepoint.
///
/// Arguments:
/// * `barrier_set`: A reference to the barrier set.
pub fn prepare_for_safepoint(barrier_set: &CardBarrierSet) {
    barrier_set.prepare_for_safepoint()
}

/// Inform the barrier that an allocation took the slow path, before the new object is
/// initialized. Under the deferred policy, the object's cards become the thread's obligation.
///
/// Arguments:
/// * `mutator`: The mutator that allocated the object.
/// * `object`: The extent of the new object.
pub fn on_slowpath_allocation_exit(mutator: &mut Mutator, object: MemRegion) {
    mutator.on_slowpath_allocation_exit(object)
}

/// Inform the barrier that a fast-path allocation had its initializing store barriers elided.
///
/// Arguments:
/// * `mutator`: The mutator that allocated the object.
/// * `object`: The extent of the new object.
pub fn record_fast_path_allocation(mutator: &mut Mutator, object: MemRegion) {
    mutator.record_fast_path_allocation(object)
}

/// The post-write barrier for a reference field of a non-array object. A runtime should call
/// this *after* every such store, including stores of null.
///
/// Arguments:
/// * `barrier`: The concrete barrier.
/// * `object`: The start of the modified object.
/// * `slot`: The address of the modified field.
#[inline(always)]
pub fn object_reference_write_post<B: Barrier>(barrier: &B, object: Address, slot: Address) {
    access::post_write::<PlainField, B>(barrier, FieldWrite { object, slot })
}

/// The post-write barrier for reference array elements. A runtime should call this *after*
/// any store into a reference array, with exactly the modified elements.
///
/// Arguments:
/// * `barrier`: The concrete barrier.
/// * `elements`: The byte range of the modified elements.
#[inline(always)]
pub fn array_reference_write_post<B: Barrier>(barrier: &B, elements: MemRegion) {
    access::post_write::<ArrayElement, B>(barrier, elements)
}

/// The post-write barrier for a bulk copy into a reference array. Only the destination range is
/// dirtied.
///
/// Arguments:
/// * `barrier`: The concrete barrier.
/// * `dst`: The byte range written by the copy.
#[inline(always)]
pub fn memory_region_copy_post<B: Barrier>(barrier: &B, dst: MemRegion) {
    access::post_write::<ArrayElement, B>(barrier, dst)
}

/// Dirty every card overlapping `region`. Used by collector code that writes references outside
/// the normal store path, e.g. when relocating an object.
///
/// Arguments:
/// * `barrier_set`: A reference to the barrier set.
/// * `region`: The region to invalidate.
pub fn invalidate(barrier_set: &CardBarrierSet, region: MemRegion) {
    access::post_write::<BulkRegion, dyn Barrier>(barrier_set.barrier(), region)
}

/// Can the code generator elide the initializing store barriers of fast-path allocated objects?
pub fn can_elide_fast_path_store_barriers(barrier_set: &CardBarrierSet) -> bool {
    barrier_set.barrier().can_elide_fast_path_store_barriers()
}

/// Must the code generator emit a fence between a reference store and its card mark?
pub fn requires_strict_store_ordering(barrier_set: &CardBarrierSet) -> bool {
    barrier_set.barrier().requires_strict_store_ordering()
}
