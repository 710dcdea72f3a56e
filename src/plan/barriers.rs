//! Modification barriers.
//!
//! The card-table barrier is *imprecise* for plain object fields: when a reference field of an
//! object is modified, the card containing the start of the object is dirtied, not necessarily
//! the card containing the field. For reference arrays the barrier *is* precise: only the cards
//! overlapping the modified elements are dirtied. Code that scans dirty cards must handle both.

use std::fmt;
use std::sync::Arc;

use downcast_rs::{impl_downcast, Downcast};
use strum_macros::{Display, EnumString};

use crate::util::card_table::{CardRangeTracker, CardTable};
use crate::util::{Address, MemRegion};

/// BarrierSelector describes which barrier to use.
///
/// This is a closed set. The selected barrier is built once, when the barrier set is built.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumString, Display)]
pub enum BarrierSelector {
    /// No barrier. Nothing is ever dirtied.
    NoBarrier,
    /// Card-marking barrier over a byte-mapped card table.
    CardTableBarrier,
}

/// How the initial card marks of newly allocated objects are handled.
///
/// The policy is decided once when the barrier is created and never changes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum CardMarkPolicy {
    /// Every store is barriered as it happens. Threads never carry a deferred card mark.
    Immediate,
    /// The code generator may elide the initializing store barriers of a newly allocated object.
    /// The object's cards are dirtied later, at the latest before the thread reaches a safepoint
    /// or detaches.
    Deferred,
}

/// A modification barrier.
///
/// The per-store methods are meant to be called through a concrete barrier type, so the call is
/// resolved at compile time (see [`crate::plan::access`]). Calling through `dyn Barrier` is fine
/// for the coarse operations: construction-time queries, bulk invalidation and diagnostics.
pub trait Barrier: 'static + Send + Sync + Downcast + fmt::Display {
    fn selector(&self) -> BarrierSelector;

    /// Record a store into a reference field of a non-array object starting at `object_start`.
    /// `slot` is the address of the field.
    fn mark_plain_field_write(&self, object_start: Address, slot: Address);

    /// Record a store into the elements of a reference array. `region` is exactly the range of
    /// modified elements.
    fn mark_array_element_write(&self, region: MemRegion);

    /// Dirty every card overlapping `region`, without any policy.
    fn invalidate(&self, region: MemRegion);

    /// Same as [`Barrier::invalidate`].
    fn mark_region(&self, region: MemRegion) {
        self.invalidate(region)
    }

    /// Record that every reference in `region` may have been written. Used for discharging the
    /// initial card marks of an allocation.
    fn write_region(&self, region: MemRegion) {
        self.invalidate(region)
    }

    /// Can a code generator initialize a new object without store barriers, from its fast-path
    /// allocation up to the next point the object becomes otherwise visible?
    fn can_elide_fast_path_store_barriers(&self) -> bool;

    /// Must the code generator emit a fence so that a card mark is strictly ordered after the
    /// store it records?
    fn requires_strict_store_ordering(&self) -> bool {
        false
    }

    fn card_mark_policy(&self) -> CardMarkPolicy;
}

impl_downcast!(Barrier);

/// A barrier that does nothing.
pub struct NoBarrier;

impl Barrier for NoBarrier {
    fn selector(&self) -> BarrierSelector {
        BarrierSelector::NoBarrier
    }

    #[inline(always)]
    fn mark_plain_field_write(&self, _object_start: Address, _slot: Address) {}

    #[inline(always)]
    fn mark_array_element_write(&self, _region: MemRegion) {}

    fn invalidate(&self, _region: MemRegion) {}

    fn can_elide_fast_path_store_barriers(&self) -> bool {
        false
    }

    fn card_mark_policy(&self) -> CardMarkPolicy {
        CardMarkPolicy::Immediate
    }
}

impl fmt::Display for NoBarrier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", BarrierSelector::NoBarrier)
    }
}

/// The card-marking barrier.
///
/// The card table is shared with the heap. The barrier only ever dirties cards.
pub struct CardTableBarrier<T: CardRangeTracker = CardTable> {
    card_table: Arc<T>,
    defer_initial_card_mark: bool,
}

impl<T: CardRangeTracker> CardTableBarrier<T> {
    /// Create a card-table barrier. Initial card marks are deferred if `reduce_initial_card_marks`
    /// is set. Only then may the fast path elide the initializing store barriers, because the
    /// deferred card mark is what later dirties the elided cards.
    pub fn new(card_table: Arc<T>, reduce_initial_card_marks: bool) -> Self {
        CardTableBarrier {
            card_table,
            defer_initial_card_mark: reduce_initial_card_marks,
        }
    }

    pub fn card_table(&self) -> &T {
        &self.card_table
    }
}

impl<T: CardRangeTracker> Barrier for CardTableBarrier<T> {
    fn selector(&self) -> BarrierSelector {
        BarrierSelector::CardTableBarrier
    }

    #[inline(always)]
    fn mark_plain_field_write(&self, object_start: Address, _slot: Address) {
        // Stores of null are marked too. We never look at the stored value.
        let index = self.card_table.index_of(object_start);
        self.card_table.mark_dirty(index);
    }

    #[inline(always)]
    fn mark_array_element_write(&self, region: MemRegion) {
        self.card_table.mark_dirty_range(region);
    }

    #[inline(always)]
    fn invalidate(&self, region: MemRegion) {
        self.card_table.mark_dirty_range(region);
    }

    fn can_elide_fast_path_store_barriers(&self) -> bool {
        self.defer_initial_card_mark
    }

    fn requires_strict_store_ordering(&self) -> bool {
        self.card_table.scanned_concurrently()
    }

    fn card_mark_policy(&self) -> CardMarkPolicy {
        if self.defer_initial_card_mark {
            CardMarkPolicy::Deferred
        } else {
            CardMarkPolicy::Immediate
        }
    }
}

impl<T: CardRangeTracker> fmt::Display for CardTableBarrier<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}: {} bytes per card, covering {}, {} initial card marks",
            BarrierSelector::CardTableBarrier,
            1usize << self.card_table.log_bytes_in_card(),
            self.card_table.covered(),
            self.card_mark_policy()
        )
    }
}
