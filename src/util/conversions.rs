use crate::util::Address;

/* Alignment */

pub const fn raw_align_up(val: usize, align: usize) -> usize {
    // See https://github.com/rust-lang/rust/blob/e620d0f337d0643c757bab791fc7d88d63217704/src/libcore/alloc.rs#L192
    val.wrapping_add(align).wrapping_sub(1) & !align.wrapping_sub(1)
}

pub const fn raw_align_down(val: usize, align: usize) -> usize {
    val & !align.wrapping_sub(1)
}

pub const fn raw_is_aligned(val: usize, align: usize) -> bool {
    val & align.wrapping_sub(1) == 0
}

/* Conversion */

/// The number of cards of `1 << log_bytes_in_card` bytes needed to cover `bytes` bytes.
pub const fn bytes_to_cards_up(bytes: usize, log_bytes_in_card: u8) -> usize {
    raw_align_up(bytes, 1 << log_bytes_in_card) >> log_bytes_in_card
}

/// The card index of `addr` in a table whose first card starts at `base`.
pub fn address_to_card_index(base: Address, addr: Address, log_bytes_in_card: u8) -> usize {
    (addr - base) >> log_bytes_in_card
}

/// The start address of card `index` in a table whose first card starts at `base`.
pub fn card_index_to_address(base: Address, index: usize, log_bytes_in_card: u8) -> Address {
    base + (index << log_bytes_in_card)
}
