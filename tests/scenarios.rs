// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! End-to-end scenarios exercising the kernel as a whole, the way a real
//! embedded application would: a single [`trapkernel::run`] call per test,
//! on [`StdPlatform`]. Delays are scaled down from whole seconds to a few
//! milliseconds so the suite stays fast; the orderings and outcomes they
//! check are scale-independent.

use std::sync::{Arc, Mutex};

use trapkernel::platform::{ManualEdgePin, StdPlatform};
use trapkernel::sync::{Event, PinEvent};
use trapkernel::{get_kernel, run, sleep, spawn, timeout_after, Cancelled};

/// S1 — a child plays while a countdown runs down; the child finishes
/// first and the kernel reports non-zero uptime once both are done.
#[test]
fn countdown_child_finishes_before_parent_loop_ends() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let result = run(StdPlatform::new(), {
        let log = log.clone();
        async move {
            let child = {
                let log = log.clone();
                spawn(async move {
                    log.lock().unwrap().push("playing");
                    sleep(0.005).unwrap().await?;
                    log.lock().unwrap().push("kid finished playing");
                    Ok::<_, Cancelled>(())
                })
                .await
            };

            for n in (1..=5).rev() {
                log.lock().unwrap().push(match n {
                    5 => "t-minus-5",
                    4 => "t-minus-4",
                    3 => "t-minus-3",
                    2 => "t-minus-2",
                    _ => "t-minus-1",
                });
                sleep(0.005).unwrap().await?;
            }

            child.join().await?;
            Ok::<_, Cancelled>(get_kernel().await.uptime_ms())
        }
    });

    let uptime = result.unwrap().unwrap();
    let log = log.lock().unwrap();
    assert_eq!(log[0], "playing");
    assert_eq!(log[1], "t-minus-5");
    assert!(log.contains(&"kid finished playing"));
    assert!(uptime >= 25, "expected at least five 5ms ticks, got {uptime}ms");
}

/// S2 — cancelling a task asleep for a long time returns almost
/// immediately rather than waiting out its sleep.
#[test]
fn cancel_wakes_a_long_sleeping_task_immediately() {
    let result = run(StdPlatform::new(), async {
        let child = spawn(async {
            match sleep(5.0).unwrap().await {
                Ok(()) => Ok(()),
                Err(Cancelled) => Err(Cancelled),
            }
        })
        .await;

        for _ in 0..3 {
            sleep(0.002).unwrap().await?;
        }

        let applied = child.cancel(true).await;
        assert!(applied);
        assert_eq!(child.join().await, Err(Cancelled));
        Ok::<_, Cancelled>(get_kernel().await.uptime_ms())
    });

    let uptime = result.unwrap().unwrap();
    assert!(uptime < 1000, "cancel should not have waited out the 5s sleep, took {uptime}ms");
}

/// S3 — cancelling an already-terminated task non-blockingly reports
/// `false` and changes nothing.
#[test]
fn non_blocking_cancel_on_terminated_task_returns_false() {
    let result = run(StdPlatform::new(), async {
        let child = spawn(async { Ok::<_, Cancelled>(()) }).await;
        sleep(0.001).unwrap().await?;
        assert!(child.is_terminated());
        let applied = child.cancel(false).await;
        Ok::<_, Cancelled>(applied)
    });

    assert_eq!(result, Ok(Ok(false)));
}

/// S4 — a task parked on an `Event` unblocks within the pass after
/// `set`, and re-blocks on a fresh `wait` after `clear`.
#[test]
fn event_gate_unblocks_on_set_and_reblocks_after_clear() {
    let result = run(StdPlatform::new(), async {
        let event = Arc::new(Event::new());

        let first_waiter = {
            let event = event.clone();
            spawn(async move { event.wait().await }).await
        };
        sleep(0.002).unwrap().await?;
        event.set();
        first_waiter.join().await?;

        event.clear();
        let second_waiter = {
            let event = event.clone();
            spawn(async move { event.wait().await }).await
        };
        sleep(0.001).unwrap().await?;
        assert!(!second_waiter.is_terminated());
        event.set();
        second_waiter.join().await?;
        Ok::<_, Cancelled>(())
    });

    assert_eq!(result, Ok(Ok(())));
}

/// S5 — `timeout_after` reports a timeout rather than the wrapped task's
/// value when that task runs past the deadline.
#[test]
fn timeout_after_fires_before_the_slow_task_finishes() {
    let result = run(StdPlatform::new(), async {
        let outcome = timeout_after(0.002, async {
            sleep(1.0).unwrap().await?;
            Ok::<_, Cancelled>(42)
        })
        .unwrap()
        .await;
        assert!(outcome.is_err());
        Ok::<_, Cancelled>(get_kernel().await.uptime_ms())
    });

    let uptime = result.unwrap().unwrap();
    assert!(uptime < 500, "timeout should have fired well before the 1s sleep, took {uptime}ms");
}

/// S6 — a task parked on a `PinEvent` resumes within one pass of a
/// hardware edge fired from another OS thread, the same path a real
/// interrupt handler would take.
///
/// A task parked purely on an event's wait-list sits in neither the ready
/// nor the wait queue, so — per the run loop's own "both empty, stop"
/// rule — something else must keep the kernel alive until the edge
/// fires; a real application has its own perpetual tasks for this, so
/// this test gives itself a timer comfortably longer than the simulated
/// interrupt delay.
#[test]
fn pin_event_wakes_a_parked_task_on_interrupt() {
    let pin = ManualEdgePin::new();
    let trigger = pin.trigger();

    std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(20));
        trigger.fire();
    });

    let result = run(StdPlatform::new(), async move {
        let event = Arc::new(PinEvent::new(pin));
        let waiter = {
            let event = event.clone();
            spawn(async move { event.wait().await }).await
        };
        sleep(0.05).unwrap().await?;
        waiter.join().await?;
        Ok::<_, Cancelled>(())
    });

    assert_eq!(result, Ok(Ok(())));
}
