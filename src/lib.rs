#![cfg_attr(feature = "nightly", feature(core_intrinsics))]

//! Cardmark is the write-barrier layer of a generational garbage collector. It records which
//! cards of the heap were modified since the collector last examined them, so a partial
//! collection only rescans those cards.
//!
//! Reference stores into plain objects dirty the card of the object's start (imprecise);
//! reference array stores dirty exactly the cards of the modified elements (precise). A fast
//! allocation path may elide the barriers of an object's initializing stores: the object's cards
//! are then recorded as the thread's *deferred card mark*, which is discharged before the thread
//! crosses a safepoint, detaches, or is asked to become parsable.
//!
//! A runtime integrates the barrier as follows:
//! 1. Create a [`CardBarrierSetBuilder`] and set options.
//! 2. Call [`memory_manager::cardmark_init`] with the heap range to cover, and keep the barrier set
//!    for the life of the heap.
//! 3. On thread attach, [`memory_manager::bind_mutator`]; on detach, [`memory_manager::destroy_mutator`].
//! 4. After reference stores, call the `*_write_post` functions in [`memory_manager`] with the
//!    concrete barrier returned by [`CardBarrierSet::barrier_as`].
//! 5. At safepoints, [`memory_manager::prepare_for_safepoint`] before the collector scans cards.

#[cfg(test)]
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

mod barrier_set;
pub use barrier_set::{CardBarrierSet, CardBarrierSetBuilder};

pub mod memory_manager;
pub mod plan;
pub mod util;
