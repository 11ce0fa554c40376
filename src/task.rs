// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Tasks: the unit of scheduling.
//!
//! A task is an `async fn` whose suspension points are the kernel's trap
//! primitives. It is type-erased into a [`TaskRef`] (`Arc<dyn
//! ScheduledTask>`) for storage in the ready/wait queues, the same technique
//! `task::builder::TaskBuilder` in the crate this one is modeled on uses,
//! simplified here to a plain reference-counted `Arc` since this kernel has
//! no second core to race an intrusive lock-free list against.

use crate::error::Cancelled;
use alloc::boxed::Box;
use alloc::fmt;
use alloc::sync::Arc;
use alloc::task::Wake;
use alloc::vec::Vec;
use core::future::Future;
use core::pin::Pin;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use core::task::{Context, Poll, Waker};
use spin::Mutex;

/// A process-wide unique task identifier, assigned in spawn order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

impl TaskId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A task's position in its lifecycle.
///
/// The kernel this crate is modeled on has a documented bug here: its
/// `cancel` trap writes `self._status == status_cancel_pending`, an
/// equality comparison where an assignment was clearly meant, so a
/// cancelled task's status is silently left unchanged. This crate performs
/// the assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Active,
    CancelPending,
    Cancelled,
    Terminated,
}

/// The object-safe face of a task, for storage in the ready/wait queues and
/// for `request_cancel`/`add_joiner` bookkeeping that doesn't need to know
/// the task's output type.
pub(crate) trait ScheduledTask: Send + Sync {
    fn id(&self) -> TaskId;
    fn name(&self) -> Option<&'static str>;
    fn status(&self) -> TaskStatus;
    fn is_cancel_requested(&self) -> bool;

    /// Marks the task for cancellation. Idempotent; a no-op on a task that
    /// has already reached a terminal state.
    fn request_cancel(&self);

    /// Registers `joiner` to be rescheduled when this task reaches a
    /// terminal state. Returns `false` (without registering) if the task
    /// is already terminal, so the caller can reschedule itself instead.
    fn add_joiner(&self, joiner: TaskRef) -> bool;

    /// Drives the task's future exactly once.
    fn poll_once(self: Arc<Self>);
}

pub(crate) type TaskRef = Arc<dyn ScheduledTask>;

static_assertions::assert_impl_all!(TaskRef: Send, Sync);
static_assertions::assert_impl_all!(TaskId: Send, Sync, Copy);

/// The typed face of a task, kept alongside the erased [`TaskRef`] so
/// [`JoinHandle<T>`] can read a task's result without downcasting.
trait TaskResult<T>: Send + Sync {
    fn peek_result(&self) -> Option<Result<T, Cancelled>>;
}

struct TaskCell<F: Future> {
    id: TaskId,
    name: Option<&'static str>,
    status: Mutex<TaskStatus>,
    cancel_requested: AtomicBool,
    body: Mutex<Option<Pin<Box<F>>>>,
    joiners: Mutex<Vec<TaskRef>>,
    result: Mutex<Option<F::Output>>,
}

impl<F, T> ScheduledTask for TaskCell<F>
where
    F: Future<Output = Result<T, Cancelled>> + Send + 'static,
    T: Clone + Send + 'static,
{
    fn id(&self) -> TaskId {
        self.id
    }

    fn name(&self) -> Option<&'static str> {
        self.name
    }

    fn status(&self) -> TaskStatus {
        *self.status.lock()
    }

    fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }

    fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::Release);
        let mut status = self.status.lock();
        if *status == TaskStatus::Active {
            *status = TaskStatus::CancelPending;
        }
    }

    fn add_joiner(&self, joiner: TaskRef) -> bool {
        let status = self.status.lock();
        if matches!(*status, TaskStatus::Terminated | TaskStatus::Cancelled) {
            return false;
        }
        drop(status);
        self.joiners.lock().push(joiner);
        true
    }

    fn poll_once(self: Arc<Self>) {
        let mut slot = self.body.lock();
        let Some(future) = slot.as_mut() else {
            // Already completed; a stale wakeup raced the terminal poll.
            return;
        };

        let waker = Waker::from(self.clone());
        let mut cx = Context::from_waker(&waker);
        crate::kernel::set_current(Some(self.clone() as TaskRef));
        let poll = future.as_mut().poll(&mut cx);
        crate::kernel::set_current(None);

        let Poll::Ready(output) = poll else {
            return;
        };
        *slot = None;
        drop(slot);

        let cancelled = output.is_err();
        *self.result.lock() = Some(output);
        *self.status.lock() = if cancelled {
            TaskStatus::Cancelled
        } else {
            TaskStatus::Terminated
        };

        tracing::trace!(task = %self.id, cancelled, "task finished");

        for joiner in core::mem::take(&mut *self.joiners.lock()) {
            crate::kernel::schedule(joiner);
        }
    }
}

impl<F, T> TaskResult<T> for TaskCell<F>
where
    F: Future<Output = Result<T, Cancelled>> + Send + 'static,
    T: Clone + Send + 'static,
{
    fn peek_result(&self) -> Option<Result<T, Cancelled>> {
        self.result.lock().clone()
    }
}

impl<F, T> Wake for TaskCell<F>
where
    F: Future<Output = Result<T, Cancelled>> + Send + 'static,
    T: Clone + Send + 'static,
{
    fn wake(self: Arc<Self>) {
        crate::kernel::schedule(self);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        crate::kernel::schedule(self.clone());
    }
}

/// A handle to a spawned task's eventual result.
///
/// Dropping a `JoinHandle` does not cancel or detach the task; it keeps
/// running to completion regardless, exactly as [`crate::spawn`] leaves it
/// on the ready queue the moment it is created.
pub struct JoinHandle<T> {
    id: TaskId,
    task: TaskRef,
    result: Arc<dyn TaskResult<T>>,
}

impl<T> fmt::Debug for JoinHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinHandle")
            .field("id", &self.id)
            .field("status", &self.task.status())
            .finish()
    }
}

impl<T: Clone + Send + 'static> JoinHandle<T> {
    pub(crate) fn spawn<F>(name: Option<&'static str>, future: F) -> (TaskRef, Self)
    where
        F: Future<Output = Result<T, Cancelled>> + Send + 'static,
    {
        let cell = Arc::new(TaskCell {
            id: TaskId::next(),
            name,
            status: Mutex::new(TaskStatus::Active),
            cancel_requested: AtomicBool::new(false),
            body: Mutex::new(Some(Box::pin(future))),
            joiners: Mutex::new(Vec::new()),
            result: Mutex::new(None),
        });
        let id = cell.id;
        let task: TaskRef = cell.clone();
        let result: Arc<dyn TaskResult<T>> = cell;
        (
            task.clone(),
            JoinHandle { id, task, result },
        )
    }

    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> Option<&'static str> {
        self.task.name()
    }

    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.task.status()
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        matches!(
            self.status(),
            TaskStatus::Terminated | TaskStatus::Cancelled
        )
    }

    pub(crate) fn task_ref(&self) -> TaskRef {
        self.task.clone()
    }

    pub(crate) fn peek_result(&self) -> Option<Result<T, Cancelled>> {
        self.result.peek_result()
    }

    /// Waits for the task to reach a terminal state and returns its result.
    ///
    /// Resolves to `Err(Cancelled)` both when this task was cancelled and
    /// when it cancelled itself by propagating a `Cancelled` it received
    /// from one of its own suspension points.
    pub fn join(&self) -> crate::trap::Join<'_, T> {
        crate::trap::Join::new(self)
    }

    /// Requests cancellation. If `blocking`, waits for the task to actually
    /// finish unwinding before resolving; if not, returns as soon as the
    /// request has been recorded.
    ///
    /// Resolves to `false` without requesting anything if the task was
    /// already terminal.
    pub fn cancel(&self, blocking: bool) -> crate::trap::Cancel<'_, T> {
        crate::trap::Cancel::new(self, blocking)
    }
}

impl<T> Clone for JoinHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            task: self.task.clone(),
            result: self.result.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_display() {
        let id = TaskId(7);
        assert_eq!(alloc::format!("{id}"), "task-7");
    }
}
