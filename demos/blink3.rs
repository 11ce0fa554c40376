// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Three blinkers run until a button press cancels all of them. There is
//! no real GPIO on a development machine, so the button press is a
//! background OS thread firing the pin's simulated edge after a couple of
//! seconds — exercising exactly the interrupt-safe path a real
//! [`trapkernel::platform::EdgePin`] would use.

use std::thread;
use std::time::Duration;

use trapkernel::platform::{ManualEdgePin, StdPlatform};
use trapkernel::sync::PinEvent;
use trapkernel::{get_kernel, run, sleep, spawn, Cancelled};

async fn blink(color: &'static str, period: f64) -> Result<(), Cancelled> {
    loop {
        if let Err(Cancelled) = sleep(period / 2.0).unwrap().await {
            println!("{color} cancelled");
            return Err(Cancelled);
        }
    }
}

async fn main_task(button: PinEvent<ManualEdgePin>) -> Result<(), Cancelled> {
    let r = spawn(blink("red  ", 0.7)).await;
    let g = spawn(blink("green", 0.3)).await;
    let b = spawn(blink("blue ", 0.5)).await;
    println!("All LEDs blinking ...");
    button.wait().await?;
    println!("Button pressed! Cancelling blinkers ...");
    r.cancel(true).await;
    g.cancel(true).await;
    b.cancel(true).await;
    let kernel = get_kernel().await;
    println!(
        "Program ran for {}ms with {}% CPU utilization",
        kernel.uptime_ms(),
        kernel.load_average()
    );
    Ok(())
}

fn main() {
    tracing_subscriber::fmt::init();

    let pin = ManualEdgePin::new();
    let trigger = pin.trigger();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(2));
        trigger.fire();
    });

    run(StdPlatform::new(), main_task(PinEvent::new(pin)))
        .unwrap()
        .unwrap();
}
