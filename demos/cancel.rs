// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The same child-plays-while-counting-down scene as `countdown`, except
//! the parent cancels the child once the countdown finishes.

use trapkernel::platform::StdPlatform;
use trapkernel::{get_kernel, run, sleep, spawn, Cancelled};

async fn kid() -> Result<(), Cancelled> {
    println!("Playing");
    if let Err(Cancelled) = sleep(5.0).unwrap().await {
        println!("saving my work");
        return Err(Cancelled);
    }
    println!("kid finished playing");
    Ok(())
}

async fn countdown(mut n: u32) -> Result<(), Cancelled> {
    let child = spawn(kid()).await;
    while n > 0 {
        println!("T-minus {n}");
        sleep(0.5).unwrap().await?;
        n -= 1;
    }
    println!("cancel kid: {}", child.cancel(true).await);
    let kernel = get_kernel().await;
    println!(
        "Took {}ms, {}% CPU utilization",
        kernel.uptime_ms(),
        kernel.load_average()
    );
    Ok(())
}

fn main() {
    tracing_subscriber::fmt::init();
    run(StdPlatform::new(), countdown(3)).unwrap().unwrap();
}
