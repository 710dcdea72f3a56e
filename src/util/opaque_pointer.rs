use std::fmt;

/// OpaquePointer represents pointers that the barrier needs to know about but will not dereference.
/// For example, a pointer to the thread or the thread local storage is an opaque pointer for us.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct OpaquePointer(usize);

impl fmt::Debug for OpaquePointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A VMMutatorThread identifies a runtime thread that stores references into the heap and may
/// carry a deferred card mark. A runtime may use thread pointers or thread IDs; we do not make
/// any assumption on this, and never dereference it.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct VMMutatorThread(pub OpaquePointer);

impl VMMutatorThread {
    /// Wrap a runtime-specific thread identifier.
    pub fn from_raw(id: usize) -> Self {
        VMMutatorThread(OpaquePointer(id))
    }
}
