#![allow(dead_code)]

use cardmark::memory_manager;
use cardmark::util::{Address, MemRegion};
use cardmark::{CardBarrierSet, CardBarrierSetBuilder};

/// Tracker base address used by the scenarios.
pub const HEAP_BASE: usize = 0x1000;
/// 64 KB of covered heap.
pub const HEAP_EXTENT: usize = 0x10000;

pub fn addr(raw: usize) -> Address {
    unsafe { Address::from_usize(raw) }
}

pub fn heap() -> MemRegion {
    MemRegion::with_size(addr(HEAP_BASE), HEAP_EXTENT)
}

/// Build and leak a barrier set over [`heap`]. Environment variables are ignored.
pub fn barrier_set(options: &[(&str, &str)]) -> &'static CardBarrierSet {
    let mut builder = CardBarrierSetBuilder::new_no_env_vars();
    for (name, value) in options {
        assert!(builder.set_option(name, value), "{}={}", name, value);
    }
    Box::leak(memory_manager::cardmark_init(&builder, heap()))
}

pub fn dirty_cards(barrier_set: &CardBarrierSet) -> Vec<usize> {
    barrier_set.card_table().dirty_cards().collect()
}
