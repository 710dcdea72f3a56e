//! Access-kind dispatch for post-write barriers.
//!
//! A call site names its access kind with one of the tag types [`PlainField`], [`ArrayElement`]
//! or [`BulkRegion`] and calls [`post_write`]. With a concrete barrier type the whole call is
//! resolved at compile time and inlined, so the store path has no branch on the kind and no
//! indirect call.
//!
//! ```ignore
//! let barrier = barrier_set.barrier_as::<CardTableBarrier>().unwrap();
//! post_write::<PlainField, _>(barrier, FieldWrite { object, slot });
//! post_write::<ArrayElement, _>(barrier, MemRegion::with_size(elem, BYTES_IN_WORD));
//! ```
//!
//! Interpreters and diagnostics that only know the kind at run time use [`WriteTarget`] instead.

use strum_macros::Display;

use crate::plan::barriers::Barrier;
use crate::util::{Address, MemRegion};

mod private {
    pub trait Sealed {}
}

/// The closed set of access kinds, as a run-time value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum AccessTag {
    PlainField,
    ArrayElement,
    BulkRegion,
}

/// A store into a reference field of a non-array object.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FieldWrite {
    /// Start of the object that owns the field.
    pub object: Address,
    /// Address of the field.
    pub slot: Address,
}

/// An access kind, chosen at compile time.
pub trait AccessKind: private::Sealed + 'static {
    const TAG: AccessTag;
    /// What the call site knows about the write.
    type Target: Copy;

    fn post_write<B: Barrier + ?Sized>(barrier: &B, target: Self::Target);
}

/// A plain (non-array) reference field. Imprecise: the object's first card is dirtied.
pub struct PlainField;
/// Reference array elements. Precise: exactly the modified elements' cards are dirtied.
pub struct ArrayElement;
/// An arbitrary region, such as the destination of a bulk copy or a relocated object.
pub struct BulkRegion;

impl private::Sealed for PlainField {}
impl private::Sealed for ArrayElement {}
impl private::Sealed for BulkRegion {}

impl AccessKind for PlainField {
    const TAG: AccessTag = AccessTag::PlainField;
    type Target = FieldWrite;

    #[inline(always)]
    fn post_write<B: Barrier + ?Sized>(barrier: &B, target: FieldWrite) {
        barrier.mark_plain_field_write(target.object, target.slot);
    }
}

impl AccessKind for ArrayElement {
    const TAG: AccessTag = AccessTag::ArrayElement;
    type Target = MemRegion;

    #[inline(always)]
    fn post_write<B: Barrier + ?Sized>(barrier: &B, target: MemRegion) {
        barrier.mark_array_element_write(target);
    }
}

impl AccessKind for BulkRegion {
    const TAG: AccessTag = AccessTag::BulkRegion;
    type Target = MemRegion;

    #[inline(always)]
    fn post_write<B: Barrier + ?Sized>(barrier: &B, target: MemRegion) {
        barrier.invalidate(target);
    }
}

/// Apply the post-write barrier for access kind `K`.
#[inline(always)]
pub fn post_write<K: AccessKind, B: Barrier + ?Sized>(barrier: &B, target: K::Target) {
    K::post_write(barrier, target)
}

/// A write whose access kind is only known at run time.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WriteTarget {
    Field(FieldWrite),
    Elements(MemRegion),
    Region(MemRegion),
}

impl WriteTarget {
    pub fn tag(&self) -> AccessTag {
        match self {
            WriteTarget::Field(_) => PlainField::TAG,
            WriteTarget::Elements(_) => ArrayElement::TAG,
            WriteTarget::Region(_) => BulkRegion::TAG,
        }
    }
}

/// Apply the post-write barrier for a write described at run time.
pub fn post_write_target<B: Barrier + ?Sized>(barrier: &B, target: WriteTarget) {
    match target {
        WriteTarget::Field(field) => post_write::<PlainField, B>(barrier, field),
        WriteTarget::Elements(region) => post_write::<ArrayElement, B>(barrier, region),
        WriteTarget::Region(region) => post_write::<BulkRegion, B>(barrier, region),
    }
}
