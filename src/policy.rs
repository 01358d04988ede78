use std::cell::{Cell, UnsafeCell};
use std::fmt;
use std::ptr;

#[cfg(loom)]
use loom::sync::atomic::{AtomicBool, Ordering};
#[cfg(all(not(loom), feature = "portable_atomic"))]
use portable_atomic::{AtomicBool, Ordering};
#[cfg(all(not(loom), not(feature = "portable_atomic")))]
use std::sync::atomic::{AtomicBool, Ordering};

/// Storage strategy for a task's blocking flag.
///
/// Policies differ only in how the flag is stored and accessed, never in
/// the resume protocol itself. The strategy is selected with a type
/// parameter on [`Task`], so the unused branches compile out.
///
/// [`Task`]: crate::Task
pub trait BlockingPolicy {
    /// Storage for the blocking flag.
    type Flag: fmt::Debug;

    /// Whether `resume()` consults the flag at all.
    const USE_BLOCKING: bool;

    /// A fresh, cleared flag.
    fn new_flag() -> Self::Flag;

    /// Mark the flag set.
    fn set(flag: &Self::Flag);

    /// Mark the flag cleared.
    fn clear(flag: &Self::Flag);

    /// Read the flag.
    fn is_set(flag: &Self::Flag) -> bool;
}

/// Marker for the policies that actually carry a blocking flag.
///
/// Waiting on an event requires a flag to park behind, so event waits are
/// only offered where this marker is implemented. Selecting [`NoBlock`] and
/// waiting on an event is rejected at compile time.
pub trait Blocking: BlockingPolicy {}

/// Unsynchronized flag for single-context drivers.
///
/// The flag is an ordinary [`Cell`], so a handle to it cannot be shared
/// across threads at all; the compiler rejects the attempt.
#[derive(Debug, Clone, Copy)]
pub struct Plain;

impl BlockingPolicy for Plain {
    type Flag = Cell<bool>;

    const USE_BLOCKING: bool = true;

    fn new_flag() -> Cell<bool> {
        Cell::new(false)
    }

    fn set(flag: &Cell<bool>) {
        flag.set(true);
    }

    fn clear(flag: &Cell<bool>) {
        flag.set(false);
    }

    fn is_set(flag: &Cell<bool>) -> bool {
        flag.get()
    }
}

impl Blocking for Plain {}

/// Flag accessed with volatile loads and stores.
///
/// Keeps the flag visible between a main loop and an interrupt or signal
/// handler on the same core without paying for atomic operations. There is
/// no ordering guarantee beyond visibility, and no protection against two
/// contexts writing at once.
#[derive(Debug, Clone, Copy)]
pub struct Volatile;

/// The [`Volatile`] policy's flag storage.
pub struct VolatileBool {
    value: UnsafeCell<bool>,
}

impl VolatileBool {
    fn read(&self) -> bool {
        // SAFETY: the cell pointer is valid for the lifetime of the flag,
        // and the Volatile contract restricts writers to one context at a
        // time.
        unsafe { ptr::read_volatile(self.value.get()) }
    }

    fn write(&self, value: bool) {
        // SAFETY: as in `read`
        unsafe { ptr::write_volatile(self.value.get(), value) }
    }
}

// SAFETY: the Volatile contract is exactly that the flag may be touched
// from an interrupt or signal context while the main context polls it, with
// at most one writer at a time.
unsafe impl Send for VolatileBool {}
unsafe impl Sync for VolatileBool {}

impl fmt::Debug for VolatileBool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VolatileBool").field(&self.read()).finish()
    }
}

impl BlockingPolicy for Volatile {
    type Flag = VolatileBool;

    const USE_BLOCKING: bool = true;

    fn new_flag() -> VolatileBool {
        VolatileBool {
            value: UnsafeCell::new(false),
        }
    }

    fn set(flag: &VolatileBool) {
        flag.write(true);
    }

    fn clear(flag: &VolatileBool) {
        flag.write(false);
    }

    fn is_set(flag: &VolatileBool) -> bool {
        flag.read()
    }
}

impl Blocking for Volatile {}

/// Flag stored in an [`AtomicBool`] with relaxed ordering.
///
/// Safe under concurrent set and check from another thread or interrupt.
/// Relaxed ordering is enough because the flag carries no payload of its
/// own; the resume protocol stays strictly sequential per instance.
#[derive(Debug, Clone, Copy)]
pub struct Atomic;

impl BlockingPolicy for Atomic {
    type Flag = AtomicBool;

    const USE_BLOCKING: bool = true;

    fn new_flag() -> AtomicBool {
        AtomicBool::new(false)
    }

    fn set(flag: &AtomicBool) {
        flag.store(true, Ordering::Relaxed);
    }

    fn clear(flag: &AtomicBool) {
        flag.store(false, Ordering::Relaxed);
    }

    fn is_set(flag: &AtomicBool) -> bool {
        flag.load(Ordering::Relaxed)
    }
}

impl Blocking for Atomic {}

/// No flag at all: `resume()` always delegates to the wrapped computation.
#[derive(Debug, Clone, Copy)]
pub struct NoBlock;

impl BlockingPolicy for NoBlock {
    type Flag = ();

    const USE_BLOCKING: bool = false;

    fn new_flag() {}

    fn set(_flag: &()) {}

    fn clear(_flag: &()) {}

    fn is_set(_flag: &()) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_flag_round_trips() {
        let flag = Plain::new_flag();

        assert!(!Plain::is_set(&flag));

        Plain::set(&flag);
        assert!(Plain::is_set(&flag));

        Plain::clear(&flag);
        assert!(!Plain::is_set(&flag));
    }

    #[test]
    fn volatile_flag_round_trips() {
        let flag = Volatile::new_flag();

        assert!(!Volatile::is_set(&flag));

        Volatile::set(&flag);
        assert!(Volatile::is_set(&flag));

        Volatile::clear(&flag);
        assert!(!Volatile::is_set(&flag));
    }

    #[test]
    #[cfg(not(loom))]
    fn atomic_flag_round_trips() {
        let flag = Atomic::new_flag();

        assert!(!Atomic::is_set(&flag));

        Atomic::set(&flag);
        assert!(Atomic::is_set(&flag));

        Atomic::clear(&flag);
        assert!(!Atomic::is_set(&flag));
    }

    #[test]
    fn no_block_flag_never_reads_set() {
        let flag = NoBlock::new_flag();

        NoBlock::set(&flag);

        assert!(!NoBlock::is_set(&flag));
    }
}
