// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Level-triggered and edge-triggered task synchronization.
//!
//! [`Event`] is the kernel's one condition-variable-like primitive: a
//! sticky flag with a wait list. [`PinEvent`] layers it onto a hardware
//! [`crate::platform::EdgePin`] so an interrupt can set the flag without
//! ever touching a task directly.

use crate::error::Cancelled;
use crate::platform::{EdgePin, EdgeWaker};
use crate::task::TaskRef;
use alloc::vec::Vec;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};
use spin::Mutex;

struct EventState {
    set: bool,
    waiters: Vec<TaskRef>,
}

/// A sticky, level-triggered flag with a wait list.
///
/// Mirrors the kernel this crate is modeled on's `Event`: [`Event::set`]
/// reschedules every waiter *and* unconditionally reschedules the task
/// that called `set` itself, even when the wait list was empty. That
/// second reschedule is a harmless extra pass through the ready queue,
/// kept here for fidelity rather than trimmed as dead work.
pub struct Event {
    state: Mutex<EventState>,
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl Event {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EventState {
                set: false,
                waiters: Vec::new(),
            }),
        }
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.state.lock().set
    }

    /// Sets the flag and reschedules every waiter registered so far.
    pub fn set(&self) {
        self.set_without_self_reschedule();
        crate::kernel::schedule(crate::kernel::current_task_ref());
    }

    /// The interrupt-safe half of `set`: flips the flag and reschedules
    /// waiters without touching "the current task", which does not exist
    /// when this runs from inside an edge callback.
    fn set_without_self_reschedule(&self) {
        let waiters = {
            let mut state = self.state.lock();
            state.set = true;
            core::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            crate::kernel::schedule(waiter);
        }
    }

    /// Clears the flag. Waiters already parked are left parked.
    pub fn clear(&self) {
        self.state.lock().set = false;
    }

    /// Waits for the flag to be set.
    ///
    /// Resolves immediately if it is already set; otherwise the calling
    /// task is parked on the wait list until the next [`Event::set`].
    pub fn wait(&self) -> Wait<'_> {
        Wait {
            event: self,
            registered: false,
        }
    }
}

/// A pending [`Event::wait`] call.
pub struct Wait<'a> {
    event: &'a Event,
    registered: bool,
}

impl<'a> Future for Wait<'a> {
    type Output = Result<(), Cancelled>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let current = crate::kernel::current_task_ref();
        if current.is_cancel_requested() {
            return Poll::Ready(Err(Cancelled));
        }
        if !this.registered {
            this.registered = true;
            // Even if the flag is already set, the caller still yields once
            // before observing it: reschedule immediately rather than
            // resolving on this very poll.
            if this.event.is_set() {
                crate::kernel::schedule(current);
            } else {
                this.event.state.lock().waiters.push(current);
            }
            return Poll::Pending;
        }
        if this.event.is_set() {
            Poll::Ready(Ok(()))
        } else {
            // Spurious wakeup; still parked on the wait list.
            Poll::Pending
        }
    }
}

/// An [`Event`] that is set by a hardware edge rather than by task code.
///
/// Takes ownership of an [`EdgePin`] and registers exactly one
/// [`EdgeWaker`] with it at construction time. The callback only
/// reschedules the event's waiters; it never allocates or blocks, so it is
/// safe to invoke from an interrupt handler. The pin itself is kept alive
/// for as long as the `PinEvent` is, since dropping it may disable the
/// interrupt the callback depends on.
pub struct PinEvent<P> {
    event: alloc::sync::Arc<Event>,
    _pin: P,
}

impl<P: EdgePin> PinEvent<P> {
    pub fn new(mut pin: P) -> Self {
        let event = alloc::sync::Arc::new(Event::new());
        let callback_target = event.clone();
        pin.on_edge(EdgeWaker::new(move || {
            callback_target.set_without_self_reschedule();
        }));
        Self { event, _pin: pin }
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.event.is_set()
    }

    pub fn clear(&self) {
        self.event.clear();
    }

    pub fn wait(&self) -> Wait<'_> {
        self.event.wait()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{ManualEdgePin, StdPlatform};

    #[test]
    fn wait_resolves_once_set() {
        let result = crate::kernel::run(StdPlatform::new(), async {
            let event = alloc::sync::Arc::new(Event::new());
            let waiter = {
                let event = event.clone();
                crate::spawn(async move {
                    event.wait().await?;
                    Ok::<_, Cancelled>(())
                })
                .await
            };
            event.set();
            waiter.join().await?;
            Ok::<_, Cancelled>(())
        });
        assert_eq!(result, Ok(Ok(())));
    }

    #[test]
    fn wait_on_an_already_set_event_still_yields_once_before_resolving() {
        let result = crate::kernel::run(StdPlatform::new(), async {
            let event = Event::new();
            event.set();
            // Even though the flag is already set, `wait` must not resolve
            // on its very first poll: it reschedules and yields once first.
            let mut wait = event.wait();
            let mut polls = 0;
            core::future::poll_fn(|cx| {
                polls += 1;
                Pin::new(&mut wait).poll(cx)
            })
            .await?;
            assert!(polls >= 2, "wait resolved on its first poll, expected at least two");
            Ok::<_, Cancelled>(())
        });
        assert_eq!(result, Ok(Ok(())));
    }

    #[test]
    fn pin_event_reacts_to_a_simulated_edge() {
        let pin = ManualEdgePin::new();
        let trigger = pin.trigger();
        let result = crate::kernel::run(StdPlatform::new(), async move {
            let event = alloc::sync::Arc::new(PinEvent::new(pin));
            let waiter = {
                let event = event.clone();
                crate::spawn(async move {
                    event.wait().await?;
                    Ok::<_, Cancelled>(())
                })
                .await
            };
            trigger.fire();
            waiter.join().await?;
            Ok::<_, Cancelled>(())
        });
        assert_eq!(result, Ok(Ok(())));
    }
}
