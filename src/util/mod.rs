//! Utilities shared by the barrier: address arithmetic, the card table, options and logging.

pub mod address;
pub mod card_table;
pub mod constants;
pub mod conversions;
pub mod logger;
pub mod opaque_pointer;
pub mod options;
pub mod rust_util;

#[cfg(test)]
pub(crate) mod test_util;

pub use self::address::Address;
pub use self::address::ByteSize;
pub use self::address::MemRegion;
pub use self::card_table::{CardRangeTracker, CardTable};
pub use self::opaque_pointer::*;
