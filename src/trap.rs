// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The trap primitives: the handful of suspension points a task body can
//! await. Each is its own `Future`, whose first `poll` performs the
//! scheduler bookkeeping an interpreter-level trap would, and whose
//! eventual `Poll::Ready` is produced by the run loop re-entering it.

use crate::error::{Cancelled, KernelError, Timeout};
use crate::kernel::KernelHandle;
use crate::task::{JoinHandle, TaskId, TaskRef};
use crate::time::Seconds;
use alloc::boxed::Box;
use alloc::sync::Arc;
use core::future::Future;
use core::pin::Pin;
use core::sync::atomic::{AtomicBool, Ordering};
use core::task::{Context, Poll};

/// The identity of whichever task is currently being polled.
///
/// # Panics
///
/// Panics if called outside of a task body, i.e. outside [`crate::run`].
#[must_use]
pub fn current_task() -> TaskId {
    crate::kernel::current_task_ref().id()
}

/// Suspends the current task once, then resolves to a handle onto the
/// running kernel.
///
/// Mirrors `get_kernel`'s trap in the kernel this crate is modeled on: the
/// trap's only effect is enqueuing the caller back onto the ready queue,
/// the same single suspend-and-reschedule shape [`spawn`] uses.
#[must_use]
pub fn get_kernel() -> GetKernel {
    GetKernel { suspended: false }
}

/// A pending [`get_kernel`] call.
pub struct GetKernel {
    suspended: bool,
}

impl Future for GetKernel {
    type Output = KernelHandle;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if !this.suspended {
            this.suspended = true;
            crate::kernel::schedule(crate::kernel::current_task_ref());
            return Poll::Pending;
        }
        Poll::Ready(KernelHandle)
    }
}

/// Suspends the current task for `seconds`, which may be fractional.
///
/// # Errors
///
/// Returns [`KernelError::InvalidDelay`] synchronously, before any
/// suspension, if `seconds` is negative, `NaN`, or exceeds
/// [`crate::time::MAX_SLEEP_SECS`].
pub fn sleep(seconds: f64) -> Result<Sleep, KernelError> {
    Ok(Sleep::new(Seconds(seconds).into_millis()?))
}

/// A pending [`sleep`] call.
#[derive(Debug, PartialEq)]
pub struct Sleep {
    delay_ms: u32,
    started: bool,
}

impl Sleep {
    pub(crate) fn new(delay_ms: u32) -> Self {
        Self {
            delay_ms,
            started: false,
        }
    }
}

impl Future for Sleep {
    type Output = Result<(), Cancelled>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let current = crate::kernel::current_task_ref();
        if current.is_cancel_requested() {
            return Poll::Ready(Err(Cancelled));
        }
        if !this.started {
            this.started = true;
            let wake_at = crate::kernel::now().plus_ms(this.delay_ms);
            crate::kernel::push_wait(wake_at, current);
            return Poll::Pending;
        }
        Poll::Ready(Ok(()))
    }
}

type BoxedTask<T> = Pin<Box<dyn Future<Output = Result<T, Cancelled>> + Send>>;

enum SpawnState<T> {
    Start(BoxedTask<T>, Option<&'static str>),
    Rescheduled(JoinHandle<T>),
    Done,
}

/// A pending [`spawn`] call.
///
/// Resolves to a [`JoinHandle`] after exactly one suspension: the new task
/// is placed on the ready queue and the spawning task reschedules itself,
/// the same two-queue-insertion the `spawn` trap performs before it
/// returns control to the scheduler.
pub struct Spawn<T> {
    state: SpawnState<T>,
}

impl<T: Clone + Send + 'static> Future for Spawn<T> {
    type Output = JoinHandle<T>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        match core::mem::replace(&mut self.state, SpawnState::Done) {
            SpawnState::Start(future, name) => {
                let (_task, handle) = crate::kernel::spawn_task(name, future);
                crate::kernel::schedule(crate::kernel::current_task_ref());
                self.state = SpawnState::Rescheduled(handle);
                Poll::Pending
            }
            SpawnState::Rescheduled(handle) => Poll::Ready(handle),
            SpawnState::Done => panic!("trapkernel::spawn future polled after completion"),
        }
    }
}

/// Spawns `future` as a new, unnamed task and places it on the ready
/// queue. Awaiting the result yields a [`JoinHandle`] once the new task
/// has actually been scheduled.
pub fn spawn<F, T>(future: F) -> Spawn<T>
where
    F: Future<Output = Result<T, Cancelled>> + Send + 'static,
    T: Clone + Send + 'static,
{
    Spawn {
        state: SpawnState::Start(Box::pin(future), None),
    }
}

/// Like [`spawn`], but attaches `name` for use in diagnostics (`Debug`
/// output, log lines).
pub fn spawn_named<F, T>(name: &'static str, future: F) -> Spawn<T>
where
    F: Future<Output = Result<T, Cancelled>> + Send + 'static,
    T: Clone + Send + 'static,
{
    Spawn {
        state: SpawnState::Start(Box::pin(future), Some(name)),
    }
}

/// A pending [`JoinHandle::join`] call.
pub struct Join<'a, T> {
    handle: &'a JoinHandle<T>,
    registered: bool,
}

impl<'a, T> Join<'a, T> {
    pub(crate) fn new(handle: &'a JoinHandle<T>) -> Self {
        Self {
            handle,
            registered: false,
        }
    }
}

impl<'a, T: Clone + Send + 'static> Future for Join<'a, T> {
    type Output = Result<T, Cancelled>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let current = crate::kernel::current_task_ref();
        if current.is_cancel_requested() {
            return Poll::Ready(Err(Cancelled));
        }
        if !this.registered {
            this.registered = true;
            // Register unconditionally and yield, even if the target has
            // already finished: the caller still gets enqueued onto ready
            // rather than reading the result on this very poll.
            if !this.handle.task_ref().add_joiner(current.clone()) {
                crate::kernel::schedule(current);
            }
            return Poll::Pending;
        }
        if let Some(result) = this.handle.peek_result() {
            Poll::Ready(result)
        } else {
            // Spurious wakeup; still waiting on the target to finish.
            Poll::Pending
        }
    }
}

enum CancelState<'a, T> {
    Start,
    AlreadyTerminal,
    Requested,
    Joining(Join<'a, T>),
}

/// A pending [`JoinHandle::cancel`] call.
pub struct Cancel<'a, T> {
    handle: &'a JoinHandle<T>,
    blocking: bool,
    state: CancelState<'a, T>,
}

impl<'a, T> Cancel<'a, T> {
    pub(crate) fn new(handle: &'a JoinHandle<T>, blocking: bool) -> Self {
        Self {
            handle,
            blocking,
            state: CancelState::Start,
        }
    }
}

impl<'a, T: Clone + Send + 'static> Future for Cancel<'a, T> {
    type Output = bool;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        loop {
            match &mut self.state {
                CancelState::Start => {
                    let applied = crate::kernel::cancel_target(&self.handle.task_ref());
                    if !applied {
                        // Still yields once before reporting `false`, rather
                        // than resolving on this very poll.
                        self.state = CancelState::AlreadyTerminal;
                        crate::kernel::schedule(crate::kernel::current_task_ref());
                        return Poll::Pending;
                    }
                    if self.blocking {
                        self.state = CancelState::Joining(Join::new(self.handle));
                    } else {
                        self.state = CancelState::Requested;
                        crate::kernel::schedule(crate::kernel::current_task_ref());
                        return Poll::Pending;
                    }
                }
                CancelState::AlreadyTerminal => return Poll::Ready(false),
                CancelState::Requested => return Poll::Ready(true),
                CancelState::Joining(join) => {
                    return match Pin::new(join).poll(cx) {
                        Poll::Ready(_) => Poll::Ready(true),
                        Poll::Pending => Poll::Pending,
                    };
                }
            }
        }
    }
}

/// Runs `future` as a new task and cancels it if it has not finished
/// within `seconds`.
///
/// # Errors
///
/// Returns [`KernelError::InvalidDelay`] synchronously, before the task is
/// even spawned, for the same delay values [`sleep`] rejects.
pub fn timeout_after<F, T>(
    seconds: f64,
    future: F,
) -> Result<impl Future<Output = Result<T, Timeout>>, KernelError>
where
    F: Future<Output = Result<T, Cancelled>> + Send + 'static,
    T: Clone + Send + 'static,
{
    let delay_ms = Seconds(seconds).into_millis()?;
    Ok(timeout_after_inner(delay_ms, future))
}

async fn timeout_after_inner<F, T>(delay_ms: u32, future: F) -> Result<T, Timeout>
where
    F: Future<Output = Result<T, Cancelled>> + Send + 'static,
    T: Clone + Send + 'static,
{
    let timed_out = Arc::new(AtomicBool::new(false));
    let target = spawn(future).await;

    let canceller = {
        let target = target.clone();
        let timed_out = timed_out.clone();
        spawn(async move {
            if Sleep::new(delay_ms).await.is_ok() {
                timed_out.store(true, Ordering::Release);
                target.cancel(true).await;
            }
            Ok::<(), Cancelled>(())
        })
        .await
    };

    let result = target.join().await;
    canceller.cancel(false).await;

    // A `Cancelled` here is ambiguous: it is either the timeout firing, or
    // the calling task's own cancellation propagating through `join`.
    // `timeout_after`'s signature has no room for the latter distinction;
    // both surface as `Timeout`.
    result.map_err(|Cancelled| Timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::StdPlatform;

    #[test]
    fn get_kernel_resolves_to_a_working_handle() {
        let result = crate::kernel::run(StdPlatform::new(), async {
            sleep(0.001).unwrap().await?;
            let kernel = get_kernel().await;
            Ok::<_, Cancelled>(kernel.uptime_ms())
        });
        assert!(result.unwrap().unwrap() >= 1);
    }

    #[test]
    fn sleep_resolves_after_its_deadline() {
        let result = crate::kernel::run(StdPlatform::new(), async {
            sleep(0.001).unwrap().await?;
            Ok::<_, Cancelled>(42)
        });
        assert_eq!(result, Ok(Ok(42)));
    }

    #[test]
    fn sleep_rejects_invalid_delay() {
        assert_eq!(sleep(-1.0), Err(KernelError::InvalidDelay));
    }

    #[test]
    fn spawn_and_join_roundtrip() {
        let result = crate::kernel::run(StdPlatform::new(), async {
            let child = spawn(async { Ok::<_, Cancelled>(7) }).await;
            let value = child.join().await?;
            Ok::<_, Cancelled>(value * 2)
        });
        assert_eq!(result, Ok(Ok(14)));
    }

    #[test]
    fn cancel_stops_a_sleeping_task() {
        let result = crate::kernel::run(StdPlatform::new(), async {
            let child = spawn(async {
                sleep(1000.0).unwrap().await?;
                Ok::<_, Cancelled>(())
            })
            .await;
            let applied = child.cancel(true).await;
            assert!(applied);
            assert_eq!(child.join().await, Err(Cancelled));
            Ok::<_, Cancelled>(())
        });
        assert_eq!(result, Ok(Ok(())));
    }

    #[test]
    fn timeout_after_reports_timeout_on_a_slow_task() {
        let result = crate::kernel::run(StdPlatform::new(), async {
            let outcome = timeout_after(0.001, async {
                sleep(1000.0).unwrap().await?;
                Ok::<_, Cancelled>(())
            })
            .unwrap()
            .await;
            assert_eq!(outcome, Err(Timeout));
            Ok::<_, Cancelled>(())
        });
        assert_eq!(result, Ok(Ok(())));
    }

    #[test]
    fn timeout_after_returns_the_value_when_fast_enough() {
        let result = crate::kernel::run(StdPlatform::new(), async {
            let outcome = timeout_after(1000.0, async { Ok::<_, Cancelled>(9) })
                .unwrap()
                .await;
            assert_eq!(outcome, Ok(9));
            Ok::<_, Cancelled>(())
        });
        assert_eq!(result, Ok(Ok(())));
    }
}
