use crate::barrier_set::{CardBarrierSet, CardBarrierSetBuilder};
use crate::util::address::{Address, ByteSize};
use crate::util::MemRegion;
use std::panic;
use std::sync::Mutex;

// Card tables in unit tests never touch memory, so any address range works. This one keeps the
// numbers small enough to read in assertion messages.
pub(crate) const TEST_HEAP_START: Address = unsafe { Address::from_usize(0x1000) };
pub(crate) const TEST_HEAP_EXTENT: ByteSize = 0x10000;

pub(crate) fn addr(raw: usize) -> Address {
    unsafe { Address::from_usize(raw) }
}

pub(crate) fn test_heap() -> MemRegion {
    MemRegion::with_size(TEST_HEAP_START, TEST_HEAP_EXTENT)
}

/// Build a barrier set over the test heap with the given options (environment variables are
/// ignored, as option tests set them concurrently), and leak it so mutators can
/// hold a static reference to it.
pub(crate) fn leaked_barrier_set(options: &[(&str, &str)]) -> &'static CardBarrierSet {
    let mut builder = CardBarrierSetBuilder::new_no_env_vars();
    for (name, value) in options {
        assert!(builder.set_option(name, value), "{}={}", name, value);
    }
    Box::leak(Box::new(builder.build(test_heap())))
}

lazy_static! {
    // A global lock to make tests serial.
    // If we do want more parallelism, we can allow each set of tests to have their own locks. But it seems unnecessary for now.
    static ref SERIAL_TEST_LOCK: Mutex<()> = Mutex::default();
}

// force some tests to be executed serially
pub fn serial_test<F>(f: F)
where
    F: FnOnce(),
{
    // If one test fails, the lock will become poisoned. We would want to continue for other tests anyway.
    let _guard = SERIAL_TEST_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    f();
}

// Always execute a cleanup closure no matter the test panics or not.
pub fn with_cleanup<T, C>(test: T, cleanup: C)
where
    T: FnOnce() + panic::UnwindSafe,
    C: FnOnce(),
{
    let res = panic::catch_unwind(test);
    cleanup();
    if let Err(e) = res {
        panic::resume_unwind(e);
    }
}
