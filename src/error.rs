// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

/// The task was cancelled before it produced a value.
///
/// Every suspension point a task passes through ([`crate::sleep`],
/// [`crate::spawn`], [`crate::task::JoinHandle::join`],
/// [`crate::sync::Event::wait`]) resolves to `Err(Cancelled)` instead of its
/// usual output the first time it is polled after cancellation has been
/// requested. `async fn` bodies propagate this with `?`; catching it without
/// re-raising is legal and simply lets the task terminate normally, exactly
/// as swallowing any other error would.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("task was cancelled")
    }
}

impl core::error::Error for Cancelled {}

/// [`crate::timeout_after`] hit its deadline before the wrapped task
/// completed.
///
/// Kept distinct from [`Cancelled`] on purpose: reusing the cancellation
/// signal for timeouts leaves a caller unable to tell a deliberate cancel
/// from a deadline apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout;

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("timed out waiting for task")
    }
}

impl core::error::Error for Timeout {}

/// Kernel misuse, raised synchronously to the caller that triggered it.
///
/// Two conditions `spec.md` also calls "kernel misuse" are deliberately not
/// represented here: using a kernel-facing API outside of [`crate::run`],
/// and a ready/wait queue at capacity. Both can only be detected deep
/// inside a [`core::task::Wake`] callback or a `Future::poll` body, neither
/// of which has any way to return a `Result` to the caller that would
/// actually observe it — so both are treated as fatal misconfiguration and
/// panic immediately (see `with_kernel` and `schedule` in `kernel.rs`)
/// rather than being represented as unreachable variants here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum KernelError {
    /// [`crate::run`] was called while a kernel was already running in this
    /// process.
    AlreadyRunning,
    /// [`crate::sleep`] was asked to wait longer than the kernel supports.
    InvalidDelay,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRunning => f.pad("kernel is already running"),
            Self::InvalidDelay => f.pad("requested delay exceeds the maximum supported"),
        }
    }
}

impl core::error::Error for KernelError {}
