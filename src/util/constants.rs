#[cfg(target_pointer_width = "32")]
/// log2 of the number of bytes in an address
pub const LOG_BYTES_IN_ADDRESS: u8 = 2;
#[cfg(target_pointer_width = "64")]
/// log2 of the number of bytes in an address
pub const LOG_BYTES_IN_ADDRESS: u8 = 3;
/// The number of bytes in an address
pub const BYTES_IN_ADDRESS: usize = 1 << LOG_BYTES_IN_ADDRESS;

/// log2 of the number of bytes in a word
pub const LOG_BYTES_IN_WORD: u8 = LOG_BYTES_IN_ADDRESS;
/// The number of bytes in a word
pub const BYTES_IN_WORD: usize = 1 << LOG_BYTES_IN_WORD;

/// log2 of the default card size. 512-byte cards.
pub const DEFAULT_LOG_BYTES_IN_CARD: u8 = 9;

/// The smallest card size we accept from the options (128 bytes).
pub const MIN_LOG_BYTES_IN_CARD: u8 = 7;
/// The largest card size we accept from the options (4 KB).
pub const MAX_LOG_BYTES_IN_CARD: u8 = 12;

/// The byte value of a clean card.
pub const CLEAN_CARD: u8 = 0xff;
/// The byte value of a dirty card.
pub const DIRTY_CARD: u8 = 0;
