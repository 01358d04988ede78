use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use crate::policy::{Blocking, BlockingPolicy};
use crate::task::{BlockSignal, TaskHandle};

/// Identifiers for the events a controller tracks.
///
/// `index` must map every identifier into `0..COUNT`. Implementations are
/// normally generated with [`event_set!`].
///
/// [`event_set!`]: crate::event_set
pub trait EventSet: Copy {
    /// Number of distinct event identifiers.
    const COUNT: usize;

    /// The slot index of this identifier.
    fn index(self) -> usize;
}

/// Declare the set of event identifiers an application's controller tracks.
///
/// Expands to an enum with one variant per event and an [`EventSet`]
/// implementation indexing the variants in declaration order.
///
/// ```rust
/// use stackless_coro::event_set;
///
/// event_set! {
///     enum Peripheral {
///         Timer1,
///         UartRx,
///         GpioPin0,
///     }
/// }
/// ```
#[macro_export]
macro_rules! event_set {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant,
            )+
        }

        impl $crate::EventSet for $name {
            const COUNT: usize = {
                let mut count: usize = 0;
                $(
                    let _ = stringify!($variant);
                    count += 1;
                )+
                count
            };

            fn index(self) -> usize {
                self as usize
            }
        }
    };
}

type Continuation = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct EventSlot {
    continuation: Option<Continuation>,
    pending: bool,
}

/// Registry connecting event occurrences to one-shot continuations.
///
/// Each event identifier owns one slot: an optional continuation installed
/// with [`subscribe`] and consumed by [`fire`], plus a pending flag event
/// sources maintain with [`set_pending`] / [`clear_pending`] so waiters can
/// skip suspending when the condition already holds.
///
/// The controller knows nothing about tasks; continuations are opaque. By
/// convention the continuation a waiting task installs calls its
/// [`TaskHandle::unblock`], and that callback is the only coupling between
/// the two sides.
///
/// There is no queue of waiters: subscribing to an identifier that already
/// has a continuation silently replaces it, last writer wins. Callers that
/// need several waiters per event must layer that themselves. The slot
/// table lock only guards the table's memory; it does not sequence a
/// subscribe racing a fire on the same identifier.
///
/// Own one controller per application and pass it by reference to whatever
/// subscribes or fires; a `static` cell at the application level reproduces
/// a process-wide registry where that is wanted.
///
/// [`subscribe`]: EventController::subscribe
/// [`fire`]: EventController::fire
/// [`set_pending`]: EventController::set_pending
/// [`clear_pending`]: EventController::clear_pending
pub struct EventController<E: EventSet> {
    slots: Mutex<Box<[EventSlot]>>,
    _events: PhantomData<fn(E)>,
}

impl<E: EventSet> EventController<E> {
    /// A controller with every slot empty and no event pending.
    pub fn new() -> EventController<E> {
        let slots = (0..E::COUNT).map(|_| EventSlot::default()).collect();

        EventController {
            slots: Mutex::new(slots),
            _events: PhantomData,
        }
    }

    /// Install `continuation` to run on the next [`fire`] of `event`,
    /// replacing any continuation already installed for it.
    ///
    /// [`fire`]: EventController::fire
    pub fn subscribe<C>(&self, event: E, continuation: C)
    where
        C: FnOnce() + Send + 'static,
    {
        self.lock()[event.index()].continuation = Some(Box::new(continuation));
    }

    /// Drop any continuation installed for `event` without running it.
    pub fn clear_subscription(&self, event: E) {
        self.lock()[event.index()].continuation = None;
    }

    /// Run and clear the continuation installed for `event`, if any.
    ///
    /// One-shot: the slot is emptied before the continuation runs, so a
    /// second fire is a no-op until somebody subscribes again. The
    /// continuation runs synchronously on the caller's context, outside the
    /// table lock, and may itself re-subscribe.
    pub fn fire(&self, event: E) {
        let continuation = self.lock()[event.index()].continuation.take();

        if let Some(continuation) = continuation {
            continuation();
        }
    }

    /// Whether `event` is flagged as already satisfied. Independent of
    /// whether a continuation is installed.
    pub fn is_pending(&self, event: E) -> bool {
        self.lock()[event.index()].pending
    }

    /// Flag `event` as already satisfied.
    pub fn set_pending(&self, event: E) {
        self.lock()[event.index()].pending = true;
    }

    /// Clear the satisfied flag for `event`.
    pub fn clear_pending(&self, event: E) {
        self.lock()[event.index()].pending = false;
    }

    fn lock(&self) -> MutexGuard<'_, Box<[EventSlot]>> {
        self.slots.lock().expect("Failed to get event table lock")
    }
}

impl<E: EventSet> Default for EventController<E> {
    fn default() -> EventController<E> {
        EventController::new()
    }
}

impl<E: EventSet> fmt::Debug for EventController<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventController")
            .field("events", &E::COUNT)
            .finish()
    }
}

impl<P: BlockingPolicy> TaskHandle<P> {
    /// Wait until `event` fires.
    ///
    /// If the event is already flagged pending, the wait completes without
    /// suspending. Otherwise the task's blocking flag is set and a
    /// continuation clearing it is installed, so `resume()` reports "still
    /// pending" without touching the body until the event fires.
    ///
    /// Only offered for policies that carry a blocking flag; a [`NoBlock`]
    /// task has nothing to park behind.
    ///
    /// [`NoBlock`]: crate::NoBlock
    pub fn wait_for<'c, E>(&self, events: &'c EventController<E>, event: E) -> EventWait<'c, P, E>
    where
        P: Blocking,
        E: EventSet,
    {
        EventWait {
            events,
            event,
            signal: Arc::clone(&self.signal),
            registered: false,
        }
    }
}

/// Future returned by [`TaskHandle::wait_for`].
#[must_use = "futures do nothing unless polled"]
pub struct EventWait<'c, P: BlockingPolicy, E: EventSet> {
    events: &'c EventController<E>,
    event: E,
    signal: Arc<BlockSignal<P>>,
    registered: bool,
}

impl<P, E> Future for EventWait<'_, P, E>
where
    P: Blocking + 'static,
    P::Flag: Send + Sync + 'static,
    E: EventSet + Unpin,
{
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();

        if this.registered {
            return if this.signal.is_blocked() {
                Poll::Pending
            } else {
                Poll::Ready(())
            };
        }

        // fast path: the event already happened, don't suspend
        if this.events.is_pending(this.event) {
            return Poll::Ready(());
        }

        this.signal.block();

        let signal = Arc::clone(&this.signal);
        this.events.subscribe(this.event, move || signal.unblock());
        this.registered = true;

        Poll::Pending
    }
}

impl<P: BlockingPolicy, E: EventSet> fmt::Debug for EventWait<'_, P, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventWait")
            .field("registered", &self.registered)
            .field("blocked", &self.signal.is_blocked())
            .finish()
    }
}
