use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use crate::policy::{BlockingPolicy, NoBlock};

/// Blocking-flag storage shared between a [`Task`] and its [`TaskHandle`]s.
///
/// Under [`NoBlock`] the flag is `()` and every operation is a no-op; the
/// other policies store a real flag with the access discipline they name.
pub struct BlockSignal<P: BlockingPolicy> {
    flag: P::Flag,
}

impl<P: BlockingPolicy> BlockSignal<P> {
    pub(crate) fn new() -> BlockSignal<P> {
        BlockSignal {
            flag: P::new_flag(),
        }
    }

    /// Mark the owning task as waiting for an external event.
    pub fn block(&self) {
        P::set(&self.flag);
    }

    /// Clear the wait. The next `resume()` on the owning task delegates to
    /// the wrapped computation again.
    pub fn unblock(&self) {
        P::clear(&self.flag);
    }

    /// Whether the owning task is currently waiting.
    pub fn is_blocked(&self) -> bool {
        P::is_set(&self.flag)
    }
}

impl<P: BlockingPolicy> fmt::Debug for BlockSignal<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockSignal")
            .field("flag", &self.flag)
            .finish()
    }
}

/// Cheaply cloneable handle a task body uses to reach its own blocking
/// flag.
///
/// The handle is passed into the closure that builds the task's future, so
/// the body can block itself behind an event wait and external code can
/// unblock it. The controller side never sees the handle, only an opaque
/// continuation that calls [`unblock`].
///
/// [`unblock`]: TaskHandle::unblock
pub struct TaskHandle<P: BlockingPolicy> {
    pub(crate) signal: Arc<BlockSignal<P>>,
}

impl<P: BlockingPolicy> Clone for TaskHandle<P> {
    fn clone(&self) -> TaskHandle<P> {
        TaskHandle {
            signal: Arc::clone(&self.signal),
        }
    }
}

impl<P: BlockingPolicy> TaskHandle<P> {
    /// Set the blocking flag.
    pub fn block(&self) {
        self.signal.block();
    }

    /// Clear the blocking flag.
    pub fn unblock(&self) {
        self.signal.unblock();
    }

    /// Read the blocking flag.
    pub fn is_blocked(&self) -> bool {
        self.signal.is_blocked()
    }
}

impl<P: BlockingPolicy> fmt::Debug for TaskHandle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("blocked", &self.is_blocked())
            .finish()
    }
}

/// A native suspending computation coupled with a blocking policy.
///
/// The wrapped computation is an ordinary [`Future`], polled cooperatively:
/// it only makes progress when an external driver calls [`resume`], and it
/// is polled with a no-op waker, so "blocked" means the driver should try
/// again later, not that any thread is parked.
///
/// The policy parameter selects the storage of the blocking flag and
/// defaults to [`NoBlock`], which compiles the flag out entirely.
///
/// [`resume`]: Task::resume
pub struct Task<F: Future, P: BlockingPolicy = NoBlock> {
    future: Option<Pin<Box<F>>>,
    signal: Arc<BlockSignal<P>>,
    output: Option<F::Output>,
}

impl<F: Future, P: BlockingPolicy> Task<F, P> {
    /// Wrap the future produced by `make`.
    ///
    /// `make` receives a [`TaskHandle`] sharing this task's blocking flag;
    /// move it into the future wherever the body needs to wait for an
    /// event.
    pub fn new<M>(make: M) -> Task<F, P>
    where
        M: FnOnce(TaskHandle<P>) -> F,
    {
        let signal = Arc::new(BlockSignal::new());
        let future = make(TaskHandle {
            signal: Arc::clone(&signal),
        });

        Task {
            future: Some(Box::pin(future)),
            signal,
            output: None,
        }
    }

    /// Advance the wrapped computation by at most one suspension.
    ///
    /// Returns `false` if the computation had already completed (no-op),
    /// `true` without touching the computation if the active policy carries
    /// a blocking flag and it is set, and otherwise polls exactly once:
    /// `true` if the computation is still pending afterwards, `false` if
    /// this call reached completion.
    pub fn resume(&mut self) -> bool {
        let future = match self.future.as_mut() {
            Some(future) => future,
            None => return false,
        };

        if P::USE_BLOCKING && self.signal.is_blocked() {
            // still waiting for the event
            return true;
        }

        let mut cx = Context::from_waker(Waker::noop());

        match future.as_mut().poll(&mut cx) {
            Poll::Pending => true,
            Poll::Ready(output) => {
                self.output = Some(output);
                self.future = None;
                false
            }
        }
    }

    /// Whether the wrapped computation has run to completion. A task that
    /// captured an error is done too.
    pub fn is_done(&self) -> bool {
        self.future.is_none()
    }

    /// Read the blocking flag.
    pub fn is_blocked(&self) -> bool {
        self.signal.is_blocked()
    }

    /// A fresh handle to this task's blocking flag, for wiring external
    /// unblock paths.
    pub fn handle(&self) -> TaskHandle<P> {
        TaskHandle {
            signal: Arc::clone(&self.signal),
        }
    }

    /// The captured completion value, if the task has completed.
    pub fn output(&self) -> Option<&F::Output> {
        self.output.as_ref()
    }

    /// Take the captured completion value out of the task.
    pub fn take_output(&mut self) -> Option<F::Output> {
        self.output.take()
    }
}

impl<T, E, F, P> Task<F, P>
where
    F: Future<Output = Result<T, E>>,
    P: BlockingPolicy,
{
    /// Whether the computation completed by surfacing an error.
    pub fn has_error(&self) -> bool {
        matches!(self.output, Some(Err(_)))
    }

    /// The captured error, if the computation surfaced one.
    pub fn error(&self) -> Option<&E> {
        match &self.output {
            Some(Err(error)) => Some(error),
            _ => None,
        }
    }
}

impl<F: Future, P: BlockingPolicy> fmt::Debug for Task<F, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("done", &self.is_done())
            .field("blocked", &self.signal.is_blocked())
            .finish()
    }
}

/// Suspend the surrounding task exactly once.
///
/// The task returns control to its driver and continues from here on the
/// next `resume()` call.
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

/// Future returned by [`yield_now`].
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            Poll::Pending
        }
    }
}

/// Suspend the surrounding task until `condition` holds.
///
/// Suspends at least once, and re-checks the condition each time the driver
/// resumes the task.
pub async fn yield_until<C>(mut condition: C)
where
    C: FnMut() -> bool,
{
    loop {
        yield_now().await;

        if condition() {
            break;
        }
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use crate::policy::{Atomic, Plain};
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn resume_reports_progress_then_completion() {
        let mut task = Task::<_, NoBlock>::new(|_handle| async {
            yield_now().await;
            yield_now().await;
            7
        });

        assert!(!task.is_done());
        assert!(task.resume());
        assert!(task.resume());
        assert!(!task.resume());

        assert!(task.is_done());
        assert_eq!(task.output(), Some(&7));
    }

    #[test]
    fn resume_after_completion_is_a_no_op() {
        let mut task = Task::<_, NoBlock>::new(|_handle| async { 1 });

        assert!(!task.resume());
        assert!(!task.resume());

        assert_eq!(task.take_output(), Some(1));
        assert_eq!(task.take_output(), None);
    }

    #[test]
    fn blocked_task_does_not_advance() {
        let steps = Rc::new(Cell::new(0));
        let counted = steps.clone();

        let mut task = Task::<_, Plain>::new(|_handle| async move {
            counted.set(counted.get() + 1);
            yield_now().await;
            counted.set(counted.get() + 1);
        });

        assert!(task.resume());
        assert_eq!(steps.get(), 1);

        task.handle().block();

        // still pending, and the body must not have run
        assert!(task.resume());
        assert!(task.resume());
        assert_eq!(steps.get(), 1);
        assert!(task.is_blocked());

        task.handle().unblock();

        assert!(!task.resume());
        assert_eq!(steps.get(), 2);
    }

    #[test]
    fn no_block_task_ignores_the_flag() {
        let mut task = Task::<_, NoBlock>::new(|handle| async move {
            handle.block();
            yield_now().await;
            handle.block();
            yield_now().await;
            3
        });

        // every resume delegates, whatever the body tried to set
        assert!(task.resume());
        assert!(!task.is_blocked());
        assert!(task.resume());
        assert!(!task.resume());

        assert_eq!(task.output(), Some(&3));
    }

    #[test]
    fn completion_error_is_captured_not_propagated() {
        let mut task =
            Task::<_, Atomic>::new(|_handle| async { Err::<u32, &str>("device went away") });

        assert!(!task.resume());

        assert!(task.is_done());
        assert!(task.has_error());
        assert_eq!(task.error(), Some(&"device went away"));
    }

    #[test]
    fn yield_until_rechecks_on_every_resume() {
        let ready = Rc::new(Cell::new(false));
        let watched = ready.clone();

        let mut task = Task::<_, NoBlock>::new(|_handle| async move {
            yield_until(|| watched.get()).await;
            9
        });

        assert!(task.resume());
        assert!(task.resume());

        ready.set(true);

        assert!(!task.resume());
        assert_eq!(task.output(), Some(&9));
    }
}

#[cfg(all(test, loom))]
mod loom_tests {
    use super::*;
    use crate::policy::Atomic;

    #[test]
    fn atomic_flag_is_safe_under_concurrent_unblock() {
        loom::model(|| {
            let signal = loom::sync::Arc::new(BlockSignal::<Atomic>::new());
            signal.block();

            let remote = signal.clone();
            let unblocker = loom::thread::spawn(move || {
                remote.unblock();
            });

            // racing read while the other thread clears the flag
            let _ = signal.is_blocked();

            unblocker.join().unwrap();
            assert!(!signal.is_blocked());
        });
    }
}
