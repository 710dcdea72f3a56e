//! The modification barrier and its per-thread side.
//!
//! This module consists of:
//! * [`barriers`]: the [`Barrier`] capability and its variants. The card-table barrier decides,
//!   per write event, which cards become dirty.
//! * [`mutator_context`] and [`thread_registry`]: the per-thread [`Mutator`] context, which carries
//!   at most one deferred initial card mark, and the registry the safepoint machinery uses to reach
//!   every thread.
//! * [`access`]: compile-time selection of the barrier path for a call site.

pub mod access;
pub mod barriers;
pub mod mutator_context;
pub mod thread_registry;

pub use self::access::{AccessKind, AccessTag, ArrayElement, BulkRegion, FieldWrite, PlainField};
pub use self::barriers::{Barrier, BarrierSelector, CardMarkPolicy, CardTableBarrier, NoBarrier};
pub use self::mutator_context::{DeferredCardMark, Mutator};
pub use self::thread_registry::ThreadRegistry;
