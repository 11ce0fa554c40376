// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A kid waits on a level-triggered event before spawning a few friends,
//! all eventually cancelled by an impatient parent.

use std::sync::Arc;

use trapkernel::platform::StdPlatform;
use trapkernel::sync::Event;
use trapkernel::{run, sleep, spawn, Cancelled};

async fn countdown(mut n: u32) -> Result<(), Cancelled> {
    while n > 0 {
        println!("T-minus {n}");
        sleep(0.5).unwrap().await?;
        n -= 1;
    }
    Ok(())
}

async fn friend(name: &'static str) -> Result<(), Cancelled> {
    println!("Hi, my name is {name}");
    println!("Playing Minecraft");
    match sleep(10.0).unwrap().await {
        Ok(()) => {
            println!("{name} done playing");
            Ok(())
        }
        Err(Cancelled) => {
            println!("{name} going home");
            Err(Cancelled)
        }
    }
}

async fn kid(start: Arc<Event>) -> Result<(), Cancelled> {
    println!("Can I play?");
    start.wait().await?;

    println!("Building the Millenium Falcon in Minecraft");

    let paul = spawn(friend("Paul")).await;
    let anna = spawn(friend("Anna")).await;
    let tom = spawn(friend("Tom")).await;
    match sleep(10.0).unwrap().await {
        Ok(()) => Ok(()),
        Err(Cancelled) => {
            paul.cancel(true).await;
            anna.cancel(true).await;
            tom.cancel(true).await;
            println!("Fine. Saving my work.");
            Err(Cancelled)
        }
    }
}

async fn parent() -> Result<(), Cancelled> {
    let start = Arc::new(Event::new());
    let kid_task = spawn(kid(start.clone())).await;
    sleep(1.0).unwrap().await?;

    println!("Yes, go play");
    start.set();
    sleep(4.0).unwrap().await?;

    println!("Let's go");
    let count_task = spawn(countdown(4)).await;
    println!("count_task.join");
    count_task.join().await?;
    println!("count_task joined");

    println!("We're leaving!");
    println!("I warned you!");
    println!("cancel kid: {}", kid_task.cancel(true).await);
    println!("Leaving!");
    Ok(())
}

fn main() {
    tracing_subscriber::fmt::init();
    run(StdPlatform::new(), parent()).unwrap().unwrap();
}
