/// Invoked when a finished coroutine is resumed again.
///
/// The handler must diverge: the coroutine has no further value to produce
/// and its persistent fields are no longer meaningful. Handlers are
/// per-instance, set with [`Coroutine::set_fault_handler`].
///
/// [`Coroutine::set_fault_handler`]: crate::Coroutine::set_fault_handler
pub type FaultHandler = fn() -> !;

/// The default fault handler. Panics with a protocol-violation message,
/// which confines the fault to the offending driver thread.
pub fn panic_handler() -> ! {
    panic!("coroutine resumed after it finished");
}

/// Fault handler that halts the calling thread's progress without crashing
/// the process, for drivers that cannot tolerate unwinding.
pub fn halt_handler() -> ! {
    loop {
        std::thread::park();
    }
}
