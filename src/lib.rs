// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A cooperative, single-threaded task kernel for resource-constrained
//! control systems.
//!
//! A program built on this crate calls [`run`] once with a [`Platform`]
//! and an entry task; everything else — sleeping, spawning children,
//! joining and cancelling them, waiting on level- and edge-triggered
//! events — happens through `async fn`s that suspend at the kernel's trap
//! primitives. There is exactly one kernel alive per process, for the
//! duration of one `run` call: no threads, no preemption, no executor to
//! configure.
//!
//! ```
//! use trapkernel::platform::StdPlatform;
//! use trapkernel::{run, sleep, spawn, Cancelled};
//!
//! let result = run(StdPlatform::new(), async {
//!     let child = spawn(async {
//!         sleep(0.01).unwrap().await?;
//!         Ok::<_, Cancelled>("done")
//!     })
//!     .await;
//!     child.join().await
//! });
//! assert_eq!(result, Ok(Ok("done")));
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod error;
pub mod kernel;
pub mod platform;
pub mod queue;
pub mod sync;
pub mod task;
pub mod time;
pub mod trap;

pub use error::{Cancelled, KernelError, Timeout};
pub use kernel::{run, run_with_capacity, KernelHandle};
pub use task::{JoinHandle, TaskId, TaskStatus};
pub use trap::{current_task, get_kernel, sleep, spawn, spawn_named, timeout_after};
