// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The seam between the kernel and the hardware it runs on.
//!
//! Everything here is a trait the embedder implements: a monotonic clock,
//! a deep-sleep primitive, and edge-triggered pin input. None of it is the
//! kernel's concern; [`StdPlatform`] and [`ManualEdgePin`] exist only so the
//! kernel, its tests, and the demos can run on a development machine.

use alloc::sync::Arc;
use spin::Mutex;

/// The clock and sleep primitives a concrete target provides.
///
/// `now_ms` must be monotonic and is allowed to wrap; every consumer in this
/// crate goes through [`crate::time::Instant`], which handles wraparound.
pub trait Platform: Send + 'static {
    /// Milliseconds since an arbitrary per-process epoch.
    fn now_ms(&self) -> u32;

    /// Suspends the whole processor for approximately `ms` milliseconds.
    /// Called only when both the ready and wait queues are non-empty is
    /// false and the wait queue is non-empty — i.e. there is strictly
    /// nothing else this process could be doing.
    fn deep_sleep(&self, ms: u32);
}

/// A callback a hardware interrupt handler is allowed to invoke.
///
/// Cloning is cheap (an `Arc` bump); the kernel hands clones of this out to
/// [`EdgePin`] implementations, never the other way around, so an ISR can
/// never reach back into anything *except* this one call.
#[derive(Clone)]
pub struct EdgeWaker {
    fire: Arc<dyn Fn() + Send + Sync>,
}

impl EdgeWaker {
    #[must_use]
    pub fn new(fire: impl Fn() + Send + Sync + 'static) -> Self {
        Self { fire: Arc::new(fire) }
    }

    /// Invokes the registered callback. Safe to call from interrupt context:
    /// it only ever pushes already-parked tasks onto the ready queue.
    pub fn fire(&self) {
        (self.fire)();
    }
}

/// A GPIO pin capable of registering a single edge-triggered callback.
///
/// [`crate::sync::PinEvent`] registers exactly one [`EdgeWaker`] per pin and
/// never touches the pin again; the callback itself schedules waiting tasks
/// and does nothing else (it does not set the event's flag).
pub trait EdgePin: Send + 'static {
    fn on_edge(&mut self, wake: EdgeWaker);
}

/// A host-backed [`Platform`] for tests and the `demos/` binaries.
#[cfg(feature = "std")]
pub struct StdPlatform {
    epoch: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Platform for StdPlatform {
    fn now_ms(&self) -> u32 {
        self.epoch.elapsed().as_millis() as u32
    }

    fn deep_sleep(&self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}

/// A software-triggered [`EdgePin`] for tests and demos.
///
/// [`ManualEdgePin::trigger`] hands out a cheap, cloneable handle that can
/// be kept on the side (e.g. to simulate a button press) after the pin
/// itself has been moved into a [`crate::sync::PinEvent`].
#[derive(Clone, Default)]
pub struct ManualEdgePin {
    waker: Arc<Mutex<Option<EdgeWaker>>>,
}

impl ManualEdgePin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn trigger(&self) -> ManualEdgeTrigger {
        ManualEdgeTrigger {
            waker: self.waker.clone(),
        }
    }
}

impl EdgePin for ManualEdgePin {
    fn on_edge(&mut self, wake: EdgeWaker) {
        *self.waker.lock() = Some(wake);
    }
}

/// A handle that simulates a hardware edge on the [`ManualEdgePin`] it was
/// created from.
#[derive(Clone, Default)]
pub struct ManualEdgeTrigger {
    waker: Arc<Mutex<Option<EdgeWaker>>>,
}

impl ManualEdgeTrigger {
    /// Simulates an edge. A no-op if nothing has registered yet.
    pub fn fire(&self) {
        if let Some(waker) = self.waker.lock().as_ref() {
            waker.fire();
        }
    }
}
