#![allow(dead_code)]

use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use replaybus::{Dispatcher, EventPolicy, ExceptionHandler, ListenerError};

/// Shared delivery log: `(listener name, event)` in delivery order.
pub type Log = Arc<Mutex<Vec<(&'static str, i64)>>>;

pub fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events_of(log: &Log, name: &str) -> Vec<i64> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|(n, _)| *n == name)
        .map(|(_, e)| *e)
        .collect()
}

pub fn all_events(log: &Log) -> Vec<i64> {
    log.lock().unwrap().iter().map(|(_, e)| *e).collect()
}

/// What a recorder does after recording an event.
#[derive(Clone, Copy, Debug)]
pub enum Behavior {
    Record,
    FailOn(i64),
    PanicOn(i64),
    SleepOn(i64, Duration),
    SleepAlways(Duration),
    /// Blocks the executor thread instead of yielding.
    BlockOn(i64, Duration),
    /// Dispatches `next` from inside the callback for `on`.
    Redispatch { on: i64, next: i64 },
}

/// Test listener: records every event, then misbehaves as configured.
#[derive(Clone, Debug)]
pub struct Recorder {
    name: &'static str,
    log: Log,
    behavior: Behavior,
    bus: Arc<OnceLock<Weak<Dispatcher<Negate>>>>,
}

impl Recorder {
    pub fn new(name: &'static str, log: &Log) -> Self {
        Self::with(name, log, Behavior::Record)
    }

    pub fn with(name: &'static str, log: &Log, behavior: Behavior) -> Self {
        Self {
            name,
            log: Arc::clone(log),
            behavior,
            bus: Arc::default(),
        }
    }

    /// Lets this recorder (and its clones) dispatch through `bus`.
    pub fn attach(&self, bus: &Arc<Dispatcher<Negate>>) {
        let _ = self.bus.set(Arc::downgrade(bus));
    }

    async fn receive(&self, event: i64) -> Result<(), ListenerError> {
        self.log.lock().unwrap().push((self.name, event));
        match self.behavior {
            Behavior::Record => Ok(()),
            Behavior::FailOn(e) if e == event => Err(ListenerError::fail(format!("dropped {event}"))),
            Behavior::PanicOn(e) if e == event => panic!("boom on {event}"),
            Behavior::SleepOn(e, d) if e == event => {
                tokio::time::sleep(d).await;
                Ok(())
            }
            Behavior::SleepAlways(d) => {
                tokio::time::sleep(d).await;
                Ok(())
            }
            Behavior::BlockOn(e, d) if e == event => {
                std::thread::sleep(d);
                Ok(())
            }
            Behavior::Redispatch { on, next } if on == event => {
                let Some(bus) = self.bus.get().and_then(Weak::upgrade) else {
                    return Err(ListenerError::fail("not attached"));
                };
                bus.dispatch_event(next)
                    .await
                    .map_err(|e| ListenerError::fail(e.to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// Integer events keyed by absolute value; the replay form is the negation.
#[derive(Default)]
pub struct Negate {
    /// Event key for which no replay form exists.
    pub unreplayable: Option<i64>,
}

#[async_trait]
impl EventPolicy for Negate {
    type Event = i64;
    type EventKey = i64;
    type Listener = Recorder;
    type ListenerKey = &'static str;

    fn event_key(&self, event: &i64) -> i64 {
        event.abs()
    }

    fn create_replay_event(&self, original: &i64) -> Option<i64> {
        match self.unreplayable {
            Some(k) if k == original.abs() => None,
            _ => Some(-original),
        }
    }

    async fn invoke_listener(&self, listener: &Recorder, event: &i64) -> Result<(), ListenerError> {
        listener.receive(*event).await
    }
}

/// Records every handled failure as `(listener, event, label)`.
#[derive(Default)]
pub struct Collect {
    pub seen: Mutex<Vec<(&'static str, i64, &'static str, String)>>,
    pub fail: bool,
}

impl Collect {
    pub fn failing() -> Self {
        Self {
            seen: Mutex::default(),
            fail: true,
        }
    }

    pub fn seen(&self) -> Vec<(&'static str, i64, &'static str, String)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExceptionHandler<&'static str, i64> for Collect {
    async fn handle(
        &self,
        listener_key: &&'static str,
        event: &i64,
        error: &ListenerError,
    ) -> Result<(), ListenerError> {
        self.seen
            .lock()
            .unwrap()
            .push((*listener_key, *event, error.as_label(), error.to_string()));
        if self.fail {
            return Err(ListenerError::fail("dropped from exception handler"));
        }
        Ok(())
    }
}
