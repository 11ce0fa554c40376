// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The process-wide kernel singleton and its run loop.
//!
//! Exactly one [`Kernel`] may be alive at a time, for the duration of one
//! [`run`] call — the same lifetime the kernel this crate is modeled on
//! gives its own global `_kernel`. It is reached through two `static`s
//! guarded by [`spin::Mutex`], the same idiom `valibali-cluu` and
//! `BashfulHippo-JerichoOS` use for their own `static SCHEDULER:
//! Mutex<Option<Scheduler>>`: one for the ready queue, which must stay
//! reachable from interrupt context, and one for everything only the
//! cooperative run loop ever touches.

use crate::error::{Cancelled, KernelError};
use crate::platform::Platform;
use crate::queue::{ReadyQueue, WaitQueue};
use crate::task::{JoinHandle, TaskRef};
use crate::time::{Chronometer, Instant};
use alloc::boxed::Box;
use alloc::sync::Arc;
use core::future::Future;
use spin::Mutex;

/// Default ready-queue capacity, matching the kernel this crate is modeled
/// on (`readyq_len=16`).
pub const DEFAULT_READY_CAP: usize = 16;
/// Default wait-queue capacity (`waitq_len=16`).
pub const DEFAULT_WAIT_CAP: usize = 16;

struct KernelState {
    platform: Box<dyn Platform>,
    wait: WaitQueue<TaskRef>,
    current: Option<TaskRef>,
    time_actual: Chronometer,
    time_working: Chronometer,
}

static READY: Mutex<Option<Arc<ReadyQueue<TaskRef>>>> = Mutex::new(None);
static KERNEL: Mutex<Option<KernelState>> = Mutex::new(None);

fn with_kernel<R>(f: impl FnOnce(&mut KernelState) -> R) -> R {
    let mut guard = KERNEL.lock();
    let state = guard
        .as_mut()
        .expect("trapkernel primitive used outside of kernel::run");
    f(state)
}

fn ready_queue() -> Arc<ReadyQueue<TaskRef>> {
    READY
        .lock()
        .clone()
        .expect("trapkernel primitive used outside of kernel::run")
}

pub(crate) fn now() -> Instant {
    with_kernel(|k| Instant(k.platform.now_ms()))
}

pub(crate) fn set_current(task: Option<TaskRef>) {
    with_kernel(|k| k.current = task);
}

pub(crate) fn current_task_ref() -> TaskRef {
    with_kernel(|k| k.current.clone()).expect("no task is currently being polled")
}

/// The kernel's sole task-initiated re-entry point: put `task` back on the
/// ready queue. Safe to call from interrupt context.
///
/// # Panics
///
/// Panics if the ready queue is at capacity. A dropped wakeup here would
/// silently strand whichever task it belonged to — including a task that
/// was never scheduled at all, whose `JoinHandle` could then never
/// terminate — so this is treated the same as any other kernel
/// misconfiguration (see `with_kernel`): a fatal, synchronous panic rather
/// than a value a caller could recover from.
pub(crate) fn schedule(task: TaskRef) {
    let ready = ready_queue();
    if !ready.put(task.clone()) {
        panic!(
            "ready queue is at capacity ({} tasks) while scheduling {}; increase ready_cap",
            ready.len(),
            task.id()
        );
    }
}

/// Registers `task` to be moved to the ready queue once `at` has passed.
///
/// # Panics
///
/// Panics if the wait queue is at capacity, for the same reason
/// [`schedule`] panics on ready-queue overflow.
pub(crate) fn push_wait(at: Instant, task: TaskRef) {
    let pushed = with_kernel(|k| k.wait.push(at, task.clone()));
    if !pushed {
        panic!(
            "wait queue is at capacity while parking {}; increase wait_cap",
            task.id()
        );
    }
}

/// Requests cancellation of `target` and schedules it so it observes the
/// request at its next suspension point. Returns `false` if `target` had
/// already reached a terminal state.
pub(crate) fn cancel_target(target: &TaskRef) -> bool {
    use crate::task::TaskStatus;
    if matches!(
        target.status(),
        TaskStatus::Terminated | TaskStatus::Cancelled
    ) {
        return false;
    }
    target.request_cancel();
    schedule(target.clone());
    true
}

/// Spawns `future` as a new task and immediately places it on the ready
/// queue, returning its [`TaskRef`]/[`JoinHandle`] pair.
pub(crate) fn spawn_task<F, T>(name: Option<&'static str>, future: F) -> (TaskRef, JoinHandle<T>)
where
    F: Future<Output = Result<T, Cancelled>> + Send + 'static,
    T: Clone + Send + 'static,
{
    let (task, handle) = JoinHandle::spawn(name, future);
    schedule(task.clone());
    (task, handle)
}

/// Runs `entry` to completion on a fresh kernel with default queue
/// capacities, per [`DEFAULT_READY_CAP`]/[`DEFAULT_WAIT_CAP`].
pub fn run<F, T, P>(platform: P, entry: F) -> Result<Result<T, Cancelled>, KernelError>
where
    P: Platform,
    F: Future<Output = Result<T, Cancelled>> + Send + 'static,
    T: Clone + Send + 'static,
{
    run_with_capacity(platform, entry, DEFAULT_READY_CAP, DEFAULT_WAIT_CAP)
}

/// Runs `entry` to completion on a fresh kernel.
///
/// # Errors
///
/// Returns [`KernelError::AlreadyRunning`] if a kernel is already running
/// in this process; at most one [`run`]/[`run_with_capacity`] call may be
/// active at a time.
pub fn run_with_capacity<F, T, P>(
    platform: P,
    entry: F,
    ready_cap: usize,
    wait_cap: usize,
) -> Result<Result<T, Cancelled>, KernelError>
where
    P: Platform,
    F: Future<Output = Result<T, Cancelled>> + Send + 'static,
    T: Clone + Send + 'static,
{
    if KERNEL.lock().is_some() {
        return Err(KernelError::AlreadyRunning);
    }

    let boot = Instant(platform.now_ms());
    let ready = Arc::new(ReadyQueue::new(ready_cap));
    *READY.lock() = Some(ready.clone());
    *KERNEL.lock() = Some(KernelState {
        platform: Box::new(platform),
        wait: WaitQueue::new(wait_cap),
        current: None,
        time_actual: Chronometer::new(boot),
        time_working: Chronometer::new(boot),
    });

    tracing::debug!(ready_cap, wait_cap, "kernel starting");

    let (task, handle) = JoinHandle::spawn(Some("main"), entry);
    ready.put(task);

    run_loop(&ready);

    *KERNEL.lock() = None;
    *READY.lock() = None;
    tracing::debug!("kernel stopped");

    Ok(handle
        .peek_result()
        .expect("run loop exited before the entry task finished"))
}

/// The run loop itself: drain due timers, dispatch exactly one pass over
/// the ready queue's current length, deep-sleep if there is nothing ready
/// but something waiting, and stop once both queues are empty.
fn run_loop(ready: &Arc<ReadyQueue<TaskRef>>) {
    loop {
        let now_ts = now();
        while let Some(task) = with_kernel(|k| k.wait.pop_due(now_ts)) {
            ready.put(task);
        }

        let pass_len = ready.len();
        if pass_len == 0 {
            let Some(deadline) = with_kernel(|k| k.wait.earliest()) else {
                break;
            };
            let now_ts = now();
            let sleep_ms = deadline.duration_since(now_ts);
            with_kernel(|k| k.time_working.stop(now_ts));
            tracing::trace!(sleep_ms, "deep sleep");
            with_kernel(|k| k.platform.deep_sleep(sleep_ms));
            let woke_at = now();
            with_kernel(|k| k.time_working.resume(woke_at));
            continue;
        }

        tracing::trace!(dispatched = pass_len, "pass");
        for _ in 0..pass_len {
            let Some(task) = ready.pop() else { break };
            task.poll_once();
        }
    }
}

/// A zero-sized handle onto the running kernel's diagnostics.
///
/// Modeled on the `ThreadManager` namespacing pattern in
/// `valibali-cluu/kernel/src/scheduler/thread.rs`: no state of its own,
/// every method reaches into the process-wide singleton.
pub struct KernelHandle;

impl KernelHandle {
    /// Milliseconds since this kernel's [`run`] call began. Never paused,
    /// even across deep sleeps.
    #[must_use]
    pub fn uptime_ms(&self) -> u32 {
        with_kernel(|k| {
            let now = Instant(k.platform.now_ms());
            k.time_actual.elapsed_ms(now)
        })
    }

    /// The percentage of wall-clock time since startup the kernel has
    /// spent with at least one task runnable, rather than deep-asleep.
    /// Always in `0..=100`.
    #[must_use]
    pub fn load_average(&self) -> u8 {
        with_kernel(|k| {
            let now = Instant(k.platform.now_ms());
            let total = u64::from(k.time_actual.elapsed_ms(now));
            if total == 0 {
                return 0;
            }
            let working = u64::from(k.time_working.elapsed_ms(now));
            (working.saturating_mul(100) / total).min(100) as u8
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::StdPlatform;

    #[test]
    fn run_returns_entry_result() {
        let result = run(StdPlatform::new(), async { Ok::<_, Cancelled>(42) });
        assert_eq!(result, Ok(Ok(42)));
    }

    #[test]
    fn concurrent_run_is_rejected() {
        // `run` is synchronous and single-threaded: nesting a second call
        // from inside the first is the only way to observe `AlreadyRunning`
        // without real threads.
        let result = run(StdPlatform::new(), async {
            let nested = run(StdPlatform::new(), async { Ok::<_, Cancelled>(()) });
            assert_eq!(nested, Err(KernelError::AlreadyRunning));
            Ok::<_, Cancelled>(())
        });
        assert_eq!(result, Ok(Ok(())));
    }
}
