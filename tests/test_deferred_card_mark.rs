mod common;

use std::collections::BTreeSet;

use cardmark::memory_manager;
use cardmark::plan::{CardMarkPolicy, CardTableBarrier, Mutator};
use cardmark::util::constants::BYTES_IN_WORD;
use cardmark::util::{CardRangeTracker, MemRegion, VMMutatorThread};
use cardmark::CardBarrierSet;
use common::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn tls(id: usize) -> VMMutatorThread {
    VMMutatorThread::from_raw(id)
}

fn cards_of(barrier_set: &CardBarrierSet, region: MemRegion) -> Vec<usize> {
    barrier_set.card_table().card_range(region).collect()
}

#[test]
fn deferred_discharge_before_safepoint() {
    let barrier_set = barrier_set(&[]);
    assert_eq!(barrier_set.card_mark_policy(), CardMarkPolicy::Deferred);
    assert!(memory_manager::can_elide_fast_path_store_barriers(barrier_set));
    let mut mutator = memory_manager::bind_mutator(barrier_set, tls(1));

    // Object A is allocated on the fast path and its initializing stores are not barriered.
    let a = MemRegion::with_size(addr(0x3000), 0x800);
    memory_manager::record_fast_path_allocation(&mut mutator, a);
    assert!(dirty_cards(barrier_set).is_empty());

    // The thread reaches a safepoint.
    memory_manager::flush_mutator(&mut mutator);
    assert_eq!(dirty_cards(barrier_set), cards_of(barrier_set, a));
    assert!(!mutator.has_pending_card_mark());
    memory_manager::destroy_mutator(mutator);
}

#[test]
fn detach_discharges_without_flush() {
    let barrier_set = barrier_set(&[]);
    let mut mutator = memory_manager::bind_mutator(barrier_set, tls(1));
    let b = MemRegion::with_size(addr(0x5000), 96);
    memory_manager::on_slowpath_allocation_exit(&mut mutator, b);
    assert!(mutator.has_pending_card_mark());

    memory_manager::on_thread_detach(mutator);
    assert_eq!(dirty_cards(barrier_set), cards_of(barrier_set, b));
    assert_eq!(barrier_set.num_mutators(), 0);
}

#[test]
fn make_parsable_discharges() {
    let barrier_set = barrier_set(&[]);
    let mut mutator = memory_manager::bind_mutator(barrier_set, tls(1));
    let object = MemRegion::with_size(addr(0x2000), 64);
    memory_manager::on_slowpath_allocation_exit(&mut mutator, object);
    memory_manager::make_parsable(&mut mutator);
    assert_eq!(dirty_cards(barrier_set), vec![8]);
}

#[test]
fn safepoint_discharges_all_threads() {
    let barrier_set = barrier_set(&[]);
    let mut mutators: Vec<Box<Mutator>> = (1..=4)
        .map(|id| memory_manager::bind_mutator(barrier_set, tls(id)))
        .collect();
    let mut expected = BTreeSet::new();
    for (i, mutator) in mutators.iter_mut().enumerate() {
        let object = MemRegion::with_size(addr(0x2000 + i * 0x1000), 0x300);
        memory_manager::record_fast_path_allocation(mutator, object);
        expected.extend(cards_of(barrier_set, object));
    }
    memory_manager::prepare_for_safepoint(barrier_set);
    assert!(mutators.iter().all(|m| !m.has_pending_card_mark()));
    assert_eq!(dirty_cards(barrier_set), expected.into_iter().collect::<Vec<_>>());
}

#[test]
fn immediate_policy_never_defers() {
    let barrier_set = barrier_set(&[("reduce_initial_card_marks", "false")]);
    assert_eq!(barrier_set.card_mark_policy(), CardMarkPolicy::Immediate);
    // Nothing would dirty the cards of an object whose initializing barriers were elided.
    assert!(!memory_manager::can_elide_fast_path_store_barriers(barrier_set));
    let barrier = barrier_set.barrier_as::<CardTableBarrier>().unwrap();
    let mut mutator = memory_manager::bind_mutator(barrier_set, tls(1));

    // Without elision every initializing store is barriered as it happens.
    let object = MemRegion::with_size(addr(0x2000), 64);
    memory_manager::on_slowpath_allocation_exit(&mut mutator, object);
    assert!(!mutator.has_pending_card_mark());
    memory_manager::object_reference_write_post(barrier, object.start(), object.start() + 16usize);
    assert_eq!(dirty_cards(barrier_set), vec![8]);
}

/// Whenever the barrier allows elision, an allocation that elided its barriers has its cards
/// dirty by the next safepoint.
#[test]
fn elision_is_always_covered_by_a_deferred_mark() {
    for reduce in ["true", "false"] {
        let barrier_set = barrier_set(&[("reduce_initial_card_marks", reduce)]);
        let mut mutator = memory_manager::bind_mutator(barrier_set, tls(1));
        let object = MemRegion::with_size(addr(0x2000), 64);
        if memory_manager::can_elide_fast_path_store_barriers(barrier_set) {
            memory_manager::record_fast_path_allocation(&mut mutator, object);
        } else {
            memory_manager::on_slowpath_allocation_exit(&mut mutator, object);
            memory_manager::object_reference_write_post(
                barrier_set.barrier_as::<CardTableBarrier>().unwrap(),
                object.start(),
                object.start() + 8usize,
            );
        }
        memory_manager::prepare_for_safepoint(barrier_set);
        assert_eq!(dirty_cards(barrier_set), vec![8], "reduce_initial_card_marks={}", reduce);
    }
}

#[test]
#[should_panic(expected = "outside the range")]
fn out_of_range_allocation_is_fatal_when_recorded() {
    let barrier_set = barrier_set(&[]);
    let mut mutator = memory_manager::bind_mutator(barrier_set, tls(1));
    let object = MemRegion::with_size(addr(HEAP_BASE + HEAP_EXTENT + 0x1000), 64);
    memory_manager::on_slowpath_allocation_exit(&mut mutator, object);
}

#[test]
fn out_of_range_allocation_leaves_thread_state_intact() {
    let barrier_set = barrier_set(&[]);
    let mut mutator = memory_manager::bind_mutator(barrier_set, tls(1));
    let object = MemRegion::with_size(addr(HEAP_BASE + HEAP_EXTENT + 0x1000), 64);
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        memory_manager::on_slowpath_allocation_exit(&mut mutator, object);
    }));
    assert!(result.is_err());
    assert!(!mutator.has_pending_card_mark());

    // The thread can still detach and attach again.
    memory_manager::destroy_mutator(mutator);
    assert_eq!(barrier_set.num_mutators(), 0);
    let mutator = memory_manager::bind_mutator(barrier_set, tls(1));
    memory_manager::destroy_mutator(mutator);
}

#[test]
#[should_panic(expected = "already attached")]
fn attaching_twice_is_fatal() {
    let barrier_set = barrier_set(&[]);
    let _first = memory_manager::bind_mutator(barrier_set, tls(1));
    let _second = memory_manager::bind_mutator(barrier_set, tls(1));
}

/// One simulated mutator thread.
struct Thread {
    id: usize,
    mutator: Option<Box<Mutator>>,
}

/// Every card overlapping a modification must be dirty by the next safepoint, whatever the
/// interleaving of stores, fast and slow allocations, flushes and detaches.
#[test]
fn soundness_under_random_interleavings() {
    let barrier_set = barrier_set(&[]);
    let barrier = barrier_set.barrier_as::<CardTableBarrier>().unwrap();
    let table = barrier_set.card_table();
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let mut threads: Vec<Thread> = (1..=3)
        .map(|id| Thread {
            id,
            mutator: Some(memory_manager::bind_mutator(barrier_set, tls(id))),
        })
        .collect();
    let mut next_id = 4;
    // Cards that hold a modification since the last safepoint.
    let mut modified: BTreeSet<usize> = BTreeSet::new();

    let random_object = |rng: &mut ChaCha8Rng| {
        let words = rng.random_range(2..256usize);
        let start = HEAP_BASE + rng.random_range(0..(HEAP_EXTENT - words * BYTES_IN_WORD) / 8) * 8;
        MemRegion::with_size(addr(start), words * BYTES_IN_WORD)
    };

    for step in 0..5000 {
        let thread = &mut threads[rng.random_range(0..3)];
        let mutator = thread.mutator.as_mut().unwrap();
        match rng.random_range(0..7) {
            0 => {
                // Barriered store into a plain object.
                let object = random_object(&mut rng);
                let slot = object.start() + rng.random_range(0..object.byte_size() / 8) * 8;
                memory_manager::object_reference_write_post(barrier, object.start(), slot);
                modified.insert(table.index_of(object.start()));
            }
            1 => {
                // Barriered store into array elements.
                let array = random_object(&mut rng);
                let first = rng.random_range(0..array.byte_size() / 8);
                let count = rng.random_range(1..=array.byte_size() / 8 - first);
                let elements = MemRegion::with_size(array.start() + first * 8, count * 8);
                memory_manager::array_reference_write_post(barrier, elements);
                modified.extend(table.card_range(elements));
            }
            2 | 3 => {
                // Allocation whose initializing stores are not barriered.
                let object = random_object(&mut rng);
                if rng.random_bool(0.5) {
                    memory_manager::record_fast_path_allocation(mutator, object);
                } else {
                    memory_manager::on_slowpath_allocation_exit(mutator, object);
                }
                for offset in (0..object.byte_size()).step_by(BYTES_IN_WORD) {
                    if rng.random_bool(0.3) {
                        let slot = MemRegion::with_size(object.start() + offset, BYTES_IN_WORD);
                        modified.extend(table.card_range(slot));
                    }
                }
            }
            4 => {
                // The thread detaches without flushing, and a new thread takes its place.
                drop(thread.mutator.take());
                thread.id = next_id;
                next_id += 1;
                thread.mutator = Some(memory_manager::bind_mutator(barrier_set, tls(thread.id)));
            }
            5 => {
                memory_manager::flush_mutator(mutator);
            }
            _ => {
                // Safepoint: discharge everyone, then check, then let the collector clear.
                memory_manager::prepare_for_safepoint(barrier_set);
                for card in &modified {
                    assert!(table.is_dirty(*card), "card {} is clean at step {}", card, step);
                }
                table.clear_all();
                modified.clear();
            }
        }
    }

    assert_eq!(barrier_set.num_mutators(), 3);
    for thread in threads {
        memory_manager::destroy_mutator(thread.mutator.unwrap());
    }
    assert_eq!(barrier_set.num_mutators(), 0);
}
