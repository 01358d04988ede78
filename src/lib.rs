//! # Stackless Coro
//!
//! This crate provides resumable computations without a dedicated stack per
//! computation. A computation's persistent state between suspensions is its
//! own struct fields plus one small integer (the resume-point code), so the
//! per-instance overhead stays suitable for memory-constrained targets.
//! Each call to [`Coroutine::resume`] dispatches straight to the stored
//! suspension point, runs to the next suspension or to termination, and
//! hands a value back to the caller.
//!
//! Above the coroutine core sits a [`Task`] wrapper that couples a native
//! suspending computation (any [`Future`], polled cooperatively) with a
//! [`BlockingPolicy`]: a compile-time choice of how the task's "waiting for
//! an event" flag is stored. An [`EventController`] registry connects event
//! sources to waiting tasks through one-shot continuations.
//!
//! ## Features
//! - No stack switching and no allocation per suspension: a coroutine is a
//!   plain value, and copying it duplicates the whole computation state.
//! - Suspension points are declared as an enum, so dispatch is an
//!   exhaustive `match` and duplicate or out-of-range resume codes are
//!   build errors, never runtime faults.
//! - Blocking storage is policy-selected ([`Plain`], [`Volatile`],
//!   [`Atomic`], [`NoBlock`]) with the unused machinery compiled out.
//!
//! ## Example
//!
//! ```rust
//! use stackless_coro::{suspend_points, Coroutine, CoroutineBody, Entry, Step};
//!
//! suspend_points! {
//!     enum RangePoint {
//!         AfterYield,
//!     }
//! }
//!
//! /// Yields `current..last`, then finishes with `last` itself.
//! struct Range {
//!     current: u32,
//!     last: u32,
//! }
//!
//! impl CoroutineBody for Range {
//!     type Point = RangePoint;
//!     type Resume = ();
//!     type Output = u32;
//!
//!     fn advance(&mut self, entry: Entry<RangePoint>, _arg: ()) -> Step<RangePoint, u32> {
//!         if let Entry::After(RangePoint::AfterYield) = entry {
//!             self.current += 1;
//!         }
//!
//!         if self.current < self.last {
//!             Step::Suspend(RangePoint::AfterYield, self.current)
//!         } else {
//!             Step::Finish(self.last)
//!         }
//!     }
//! }
//!
//! let mut range = Coroutine::new(Range { current: 10, last: 13 });
//!
//! assert_eq!(range.resume(()), 10);
//! assert_eq!(range.resume(()), 11);
//! assert_eq!(range.resume(()), 12);
//! assert!(!range.is_finished());
//!
//! // the body runs out of values and finishes with the upper bound
//! assert_eq!(range.resume(()), 13);
//! assert!(range.is_finished());
//! ```
//!
//! ## Caveats
//! - Instances are strictly sequential: neither a coroutine nor a task may
//!   be resumed from two execution contexts at once. The [`Atomic`] policy
//!   only covers the blocking flag, never the body.
//! - Resuming a finished coroutine is the one protocol fault. It invokes
//!   the instance's fault handler, which panics by default; see
//!   [`halt_handler`] for drivers that cannot unwind.
//! - The event registry keeps at most one waiter per event identifier,
//!   last writer wins. Firing an event with no continuation installed does
//!   nothing.
//!
//! [`Future`]: std::future::Future
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]
#![cfg_attr(
    feature = "document-features",
    doc = document_features::document_features!()
)]

mod body;
mod event;
mod fault;
mod policy;
mod resume_state;
mod suspend_point;
mod task;

pub use body::{CoroutineBody, Entry, Step};
pub use event::{EventController, EventSet, EventWait};
pub use fault::{halt_handler, panic_handler, FaultHandler};
pub use policy::{Atomic, Blocking, BlockingPolicy, NoBlock, Plain, Volatile, VolatileBool};
pub use suspend_point::SuspendPoint;
pub use task::{yield_now, yield_until, BlockSignal, Task, TaskHandle, YieldNow};

use resume_state::{ResumeState, ResumeStateTrait, FINAL_CODE, INITIAL_CODE};

/// A resumable computation: a [`CoroutineBody`] together with its resume
/// state.
///
/// The coroutine is an ordinary value. It embeds the body (whose fields
/// persist across suspensions) and the resume-point code, and cloning it
/// duplicates both, so the clone continues independently from the same
/// logical point. Nothing outside [`resume`] ever reads or writes the
/// resume state.
///
/// A freshly constructed coroutine starts from the top of its body. Each
/// [`resume`] call runs to the next suspension or to termination; once the
/// body finishes, further resume calls invoke the fault handler instead of
/// touching the body again.
///
/// [`resume`]: Coroutine::resume
#[derive(Debug, Clone, Copy)]
pub struct Coroutine<B: CoroutineBody> {
    state: ResumeState,
    on_fault: FaultHandler,
    body: B,
}

impl<B: CoroutineBody> Coroutine<B> {
    /// A coroutine that will start from the top of `body`, with the default
    /// fault handler.
    pub fn new(body: B) -> Coroutine<B> {
        Coroutine::with_fault_handler(body, fault::panic_handler)
    }

    /// A coroutine with a caller-chosen handler for resume-after-finish
    /// faults.
    pub fn with_fault_handler(body: B, on_fault: FaultHandler) -> Coroutine<B> {
        Coroutine {
            state: INITIAL_CODE,
            on_fault,
            body,
        }
    }

    /// Replace the fault handler.
    pub fn set_fault_handler(&mut self, on_fault: FaultHandler) {
        self.on_fault = on_fault;
    }

    /// Run the body from its stored resume point to the next suspension or
    /// to termination, and return the value it produced.
    ///
    /// The first call enters the body from the top. A call on a suspended
    /// coroutine continues immediately after the recorded suspension point
    /// with `arg` bound to the body's resume parameter; earlier statements
    /// are never re-executed. A call on a finished coroutine invokes the
    /// fault handler and does not run body code.
    pub fn resume(&mut self, arg: B::Resume) -> B::Output {
        let entry = if self.state.is_initial() {
            Entry::Initial
        } else if self.state.is_final() {
            (self.on_fault)()
        } else {
            match B::Point::from_code(self.state) {
                Some(point) => Entry::After(point),
                // a stored code that no longer decodes means the state was
                // corrupted outside the resume protocol
                None => (self.on_fault)(),
            }
        };

        match self.body.advance(entry, arg) {
            Step::Suspend(point, value) => {
                self.state = point.code();
                debug_assert!(self.state > INITIAL_CODE && self.state < FINAL_CODE);
                value
            }
            Step::Finish(value) => {
                self.state = FINAL_CODE;
                value
            }
        }
    }

    /// Whether the body has finished. A finished coroutine can only be
    /// revived with [`restart`].
    ///
    /// [`restart`]: Coroutine::restart
    pub fn is_finished(&self) -> bool {
        self.state.is_final()
    }

    /// Reset the resume state so the next [`resume`] enters the body from
    /// the top again.
    ///
    /// The body's fields keep whatever values they held; a coroutine that
    /// needs fully reinitialized state must be reconstructed instead.
    ///
    /// [`resume`]: Coroutine::resume
    pub fn restart(&mut self) {
        self.state = INITIAL_CODE;
    }

    /// Shared access to the body's persistent fields.
    pub fn body(&self) -> &B {
        &self.body
    }

    /// Mutable access to the body's persistent fields.
    pub fn body_mut(&mut self) -> &mut B {
        &mut self.body
    }

    /// Consume the coroutine and keep the body.
    pub fn into_body(self) -> B {
        self.body
    }
}
