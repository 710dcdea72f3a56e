use std::fmt;
use std::ops::*;

/// size in bytes
pub type ByteSize = usize;

/// Address represents an arbitrary address in the covered heap. It is zero overhead
/// (memory wise and time wise), and the barrier never dereferences it. It is only
/// mapped to cards.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, Hash, PartialOrd, Ord, PartialEq)]
pub struct Address(usize);

/// Address + ByteSize (positive)
impl Add<ByteSize> for Address {
    type Output = Address;
    fn add(self, offset: ByteSize) -> Address {
        Address(self.0 + offset)
    }
}

/// Address - ByteSize (positive)
impl Sub<ByteSize> for Address {
    type Output = Address;
    fn sub(self, offset: ByteSize) -> Address {
        Address(self.0 - offset)
    }
}

/// Address - Address (the first address must be higher)
impl Sub<Address> for Address {
    type Output = ByteSize;
    fn sub(self, other: Address) -> ByteSize {
        debug_assert!(
            self.0 >= other.0,
            "for (addr_a - addr_b), a({}) needs to be larger than b({})",
            self,
            other
        );
        self.0 - other.0
    }
}

impl Address {
    /// creates Address from a pointer
    pub fn from_ptr<T>(ptr: *const T) -> Address {
        Address(ptr as usize)
    }

    /// creates an arbitrary Address
    /// # Safety
    /// The caller must make sure the address is meaningful to the card table it is used with,
    /// e.g. a hard-coded heap boundary or an address computed by the runtime's allocator.
    pub const unsafe fn from_usize(raw: usize) -> Address {
        Address(raw)
    }

    /// aligns down the address to the given alignment
    pub const fn align_down(self, align: ByteSize) -> Address {
        use crate::util::conversions;
        Address(conversions::raw_align_down(self.0, align))
    }

    /// is this address aligned to the given alignment
    pub const fn is_aligned_to(self, align: usize) -> bool {
        use crate::util::conversions;
        conversions::raw_is_aligned(self.0, align)
    }

    /// converts the Address to a pointer-sized integer
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

/// Addresses display as lower-case hex with a 0x prefix.
impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A half-open byte range `[start, end)` of the heap.
///
/// A region does not need to be card-aligned. The barrier computes the cards
/// that cover it. An empty region (`start == end`) covers no card.
#[derive(Copy, Clone, Eq, Hash, PartialEq)]
pub struct MemRegion {
    start: Address,
    end: Address,
}

impl MemRegion {
    /// Create a region from its bounds. `start` must not be above `end`.
    pub fn new(start: Address, end: Address) -> Self {
        assert!(
            start <= end,
            "Invalid region: start {} is above end {}",
            start,
            end
        );
        MemRegion { start, end }
    }

    /// Create a region of `bytes` bytes starting at `start`.
    pub fn with_size(start: Address, bytes: ByteSize) -> Self {
        MemRegion {
            start,
            end: start + bytes,
        }
    }

    pub const fn start(&self) -> Address {
        self.start
    }

    pub const fn end(&self) -> Address {
        self.end
    }

    /// The last byte inside the region. Only meaningful for a non-empty region.
    pub fn last(&self) -> Address {
        debug_assert!(!self.is_empty());
        self.end - 1usize
    }

    pub fn byte_size(&self) -> ByteSize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.start <= addr && addr < self.end
    }

    /// Is `other` entirely inside this region? An empty region is contained in
    /// any region whose bounds enclose its start.
    pub fn contains_region(&self, other: &MemRegion) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Debug for MemRegion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

impl fmt::Display for MemRegion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
