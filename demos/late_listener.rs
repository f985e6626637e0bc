//! # Example: Late Listener
//!
//! A service publishes its lifecycle before anyone listens. Listeners that
//! register later still learn the current state through replay.
//!
//! The replay form of a lifecycle event is marked as `replayed`, so a
//! listener can tell "this happened before I joined" from "this just happened".
//!
//! ## Run
//! ```bash
//! cargo run --example late_listener
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use replaybus::{Dispatcher, EventPolicy, ListenerError};

#[derive(Clone, Debug)]
struct Lifecycle {
    service: &'static str,
    state: &'static str,
    replayed: bool,
}

type Printer = Arc<dyn Fn(&Lifecycle) + Send + Sync>;

struct Services;

#[async_trait]
impl EventPolicy for Services {
    type Event = Lifecycle;
    type EventKey = &'static str;
    type Listener = Printer;
    type ListenerKey = &'static str;

    fn event_key(&self, event: &Lifecycle) -> &'static str {
        event.service
    }

    fn create_replay_event(&self, original: &Lifecycle) -> Option<Lifecycle> {
        Some(Lifecycle {
            replayed: true,
            ..original.clone()
        })
    }

    async fn invoke_listener(&self, print: &Printer, event: &Lifecycle) -> Result<(), ListenerError> {
        print(event);
        Ok(())
    }
}

fn printer(name: &'static str) -> Printer {
    Arc::new(move |ev: &Lifecycle| {
        let tag = if ev.replayed { "replay" } else { "live" };
        println!("[{name}] {:<8} {:<8} ({tag})", ev.service, ev.state);
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let bus = Dispatcher::builder(Services).build()?;

    let up = |service, state| Lifecycle {
        service,
        state,
        replayed: false,
    };

    bus.dispatch_event(up("db", "starting")).await?;
    bus.dispatch_event(up("cache", "running")).await?;
    bus.dispatch_event(up("db", "running")).await?;

    println!("registering monitor after three events");
    bus.add_listener("monitor", printer("monitor")).await?;

    bus.dispatch_event(up("web", "running")).await?;
    bus.dispatch_and_remove_event(up("cache", "stopped")).await?;

    println!("registering audit after cache went away");
    bus.add_listener("audit", printer("audit")).await?;

    println!();
    println!("Stored:");
    for key in bus.stored_event_keys().await {
        println!(" ├─► {key}");
    }

    bus.shutdown().await;
    Ok(())
}
