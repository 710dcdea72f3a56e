//! Byte-mapped card table.
//!
//! The covered heap range is partitioned into cards of `1 << log_bytes_in_card` bytes.
//! Each card has one status byte, either [`CLEAN_CARD`] or [`DIRTY_CARD`].
//!
//! Mutators dirty cards with plain single-byte stores. There is no read-modify-write,
//! so concurrent marking of the same card from several threads cannot lose an update,
//! and marking an already dirty card changes nothing. Clearing is the collector's job
//! and must only happen while mutators are stopped.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use static_assertions::assert_eq_size;

use crate::util::constants::{CLEAN_CARD, DIRTY_CARD};
use crate::util::conversions;
use crate::util::rust_util::unlikely;
use crate::util::{Address, MemRegion};

assert_eq_size!(AtomicU8, u8);

/// The contract the modification barrier needs from a card table.
///
/// Implementations must tolerate unsynchronized concurrent calls to the `mark_*` methods
/// from any number of mutator threads. An address or region outside the covered range
/// is a bug in the caller and must be treated as fatal.
pub trait CardRangeTracker: 'static + Send + Sync {
    /// The heap range covered by this table.
    fn covered(&self) -> MemRegion;
    /// log2 of the card size in bytes.
    fn log_bytes_in_card(&self) -> u8;
    /// The index of the card containing `addr`.
    fn index_of(&self, addr: Address) -> usize;
    /// Unconditionally dirty one card.
    fn mark_dirty(&self, index: usize);
    /// Unconditionally dirty every card overlapping `region`. An empty region dirties nothing.
    fn mark_dirty_range(&self, region: MemRegion);
    /// Is the card dirty?
    fn is_dirty(&self, index: usize) -> bool;
    /// Can the collector scan this table while mutators are still dirtying cards?
    /// If so, a card mark must be strictly ordered after the store it records.
    fn scanned_concurrently(&self) -> bool {
        false
    }
}

pub struct CardTable {
    cards: Box<[AtomicU8]>,
    covered: MemRegion,
    log_bytes_in_card: u8,
    scanned_concurrently: bool,
}

impl CardTable {
    /// Create a card table covering `covered`. The start of the covered range must be
    /// aligned to the card size. All cards start clean.
    pub fn new(covered: MemRegion, log_bytes_in_card: u8, scanned_concurrently: bool) -> Self {
        let bytes_in_card = 1usize << log_bytes_in_card;
        assert!(
            covered.start().is_aligned_to(bytes_in_card),
            "Card table start {} is not aligned to the card size {}",
            covered.start(),
            bytes_in_card
        );
        let num_cards = conversions::bytes_to_cards_up(covered.byte_size(), log_bytes_in_card);
        let cards: Vec<AtomicU8> = (0..num_cards).map(|_| AtomicU8::new(CLEAN_CARD)).collect();
        CardTable {
            cards: cards.into_boxed_slice(),
            covered,
            log_bytes_in_card,
            scanned_concurrently,
        }
    }

    pub fn num_cards(&self) -> usize {
        self.cards.len()
    }

    pub fn bytes_in_card(&self) -> usize {
        1 << self.log_bytes_in_card
    }

    pub fn is_covered(&self, addr: Address) -> bool {
        self.covered.contains(addr)
    }

    /// The start address of the card at `index`.
    pub fn card_start(&self, index: usize) -> Address {
        self.check_index(index);
        conversions::card_index_to_address(self.covered.start(), index, self.log_bytes_in_card)
    }

    /// The heap range covered by the card at `index`.
    pub fn card_region(&self, index: usize) -> MemRegion {
        MemRegion::with_size(self.card_start(index), self.bytes_in_card())
    }

    /// The inclusive range of card indices overlapping a non-empty `region`.
    pub fn card_range(&self, region: MemRegion) -> std::ops::RangeInclusive<usize> {
        debug_assert!(!region.is_empty());
        self.index_of(region.start())..=self.index_of(region.last())
    }

    /// Clean every card overlapping `region`.
    ///
    /// This is the collector's clearing pass. It must not run concurrently with mutators.
    pub fn clear_range(&self, region: MemRegion) {
        self.check_region(region);
        if region.is_empty() {
            return;
        }
        for index in self.card_range(region) {
            self.cards[index].store(CLEAN_CARD, Ordering::Relaxed);
        }
    }

    /// Clean the whole table. Same restriction as [`CardTable::clear_range`].
    pub fn clear_all(&self) {
        for card in self.cards.iter() {
            card.store(CLEAN_CARD, Ordering::Relaxed);
        }
    }

    /// Iterate over the indices of dirty cards in ascending order.
    pub fn dirty_cards(&self) -> impl Iterator<Item = usize> + '_ {
        self.cards
            .iter()
            .enumerate()
            .filter(|(_, card)| card.load(Ordering::Relaxed) == DIRTY_CARD)
            .map(|(index, _)| index)
    }

    pub fn dirty_card_count(&self) -> usize {
        self.dirty_cards().count()
    }

    fn check_index(&self, index: usize) {
        if unlikely(index >= self.cards.len()) {
            card_index_out_of_range(index, self.cards.len());
        }
    }

    /// Fatal unless `region` lies inside the covered range. An empty region must start inside
    /// the covered range or at its end.
    pub fn check_region(&self, region: MemRegion) {
        if unlikely(!self.covered.contains_region(&region)) {
            region_out_of_range(region, self.covered);
        }
    }
}

impl CardRangeTracker for CardTable {
    fn covered(&self) -> MemRegion {
        self.covered
    }

    fn log_bytes_in_card(&self) -> u8 {
        self.log_bytes_in_card
    }

    #[inline(always)]
    fn index_of(&self, addr: Address) -> usize {
        if unlikely(!self.is_covered(addr)) {
            address_out_of_range(addr, self.covered);
        }
        conversions::address_to_card_index(self.covered.start(), addr, self.log_bytes_in_card)
    }

    #[inline(always)]
    fn mark_dirty(&self, index: usize) {
        self.check_index(index);
        self.cards[index].store(DIRTY_CARD, Ordering::Relaxed);
    }

    #[inline(always)]
    fn mark_dirty_range(&self, region: MemRegion) {
        self.check_region(region);
        if region.is_empty() {
            return;
        }
        for index in self.card_range(region) {
            self.cards[index].store(DIRTY_CARD, Ordering::Relaxed);
        }
    }

    #[inline(always)]
    fn is_dirty(&self, index: usize) -> bool {
        self.check_index(index);
        self.cards[index].load(Ordering::Relaxed) == DIRTY_CARD
    }

    fn scanned_concurrently(&self) -> bool {
        self.scanned_concurrently
    }
}

impl fmt::Display for CardTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "CardTable {} ({} cards of {} bytes, {} dirty)",
            self.covered,
            self.num_cards(),
            self.bytes_in_card(),
            self.dirty_card_count()
        )
    }
}

#[cold]
fn address_out_of_range(addr: Address, covered: MemRegion) -> ! {
    panic!(
        "Address {} is outside the range {} covered by the card table",
        addr, covered
    )
}

#[cold]
fn region_out_of_range(region: MemRegion, covered: MemRegion) -> ! {
    panic!(
        "Region {} is outside the range {} covered by the card table",
        region, covered
    )
}

#[cold]
fn card_index_out_of_range(index: usize, num_cards: usize) -> ! {
    panic!(
        "Card index {} is out of range (the table has {} cards)",
        index, num_cards
    )
}
