//! # Example: Slow Listener
//!
//! One listener takes longer than the configured call timeout. The timeout
//! monitor blacklists it; the other listener keeps receiving events.
//!
//! ## Run
//! ```bash
//! RUST_LOG=replaybus=debug cargo run --example slow_listener
//! ```

use std::time::Duration;

use async_trait::async_trait;
use replaybus::{Dispatcher, EventPolicy, ListenerError};
use tracing_subscriber::EnvFilter;

/// Listener that needs `delay` per event.
struct Worker {
    name: &'static str,
    delay: Duration,
}

struct Ticks;

#[async_trait]
impl EventPolicy for Ticks {
    type Event = u32;
    type EventKey = ();
    type Listener = Worker;
    type ListenerKey = &'static str;

    fn event_key(&self, _event: &u32) {}

    fn create_replay_event(&self, original: &u32) -> Option<u32> {
        Some(*original)
    }

    async fn invoke_listener(&self, worker: &Worker, tick: &u32) -> Result<(), ListenerError> {
        tokio::time::sleep(worker.delay).await;
        println!("[{}] tick {tick}", worker.name);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let bus = Dispatcher::builder(Ticks)
        .with_listener_call_timeout(Duration::from_millis(100))
        .build()?;

    bus.add_listener(
        "fast",
        Worker {
            name: "fast",
            delay: Duration::from_millis(10),
        },
    )
    .await?;
    bus.add_listener(
        "slow",
        Worker {
            name: "slow",
            delay: Duration::from_millis(300),
        },
    )
    .await?;

    for tick in 1..=3 {
        bus.dispatch_event(tick).await?;
        for key in bus.listener_keys().await {
            let reason = bus.listener_blacklist_reason(&key).await;
            println!("   {key:<5} blacklisted: {reason:?}");
        }
    }

    bus.shutdown().await;
    Ok(())
}
