mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Behavior, Negate, Recorder, all_events, events_of, log};
use replaybus::{DispatchError, Dispatcher};

#[tokio::test]
async fn test_late_listener_gets_replay_then_live() {
    let bus = Dispatcher::builder(Negate::default()).build().unwrap();
    let log = log();

    bus.dispatch_event(1).await.unwrap();
    bus.dispatch_event(2).await.unwrap();
    bus.dispatch_event(3).await.unwrap();
    assert!(bus.remove_event(&2).await);

    bus.add_listener("l1", Recorder::new("l1", &log)).await.unwrap();
    bus.dispatch_event(4).await.unwrap();

    assert_eq!(events_of(&log, "l1"), vec![-1, -3, 4]);
    bus.shutdown().await;
}

#[tokio::test]
async fn test_same_key_replaces_and_moves_to_end() {
    let bus = Dispatcher::builder(Negate::default()).build().unwrap();
    let log = log();

    bus.dispatch_event(1).await.unwrap();
    bus.dispatch_event(2).await.unwrap();
    bus.dispatch_event(-1).await.unwrap();
    assert_eq!(bus.stored_event_keys().await, vec![2, 1]);

    bus.add_listener("l", Recorder::new("l", &log)).await.unwrap();
    assert_eq!(events_of(&log, "l"), vec![-2, 1]);
}

#[tokio::test]
async fn test_dispatch_and_remove_is_not_replayed() {
    let bus = Dispatcher::builder(Negate::default()).build().unwrap();
    let log = log();

    bus.add_listener("early", Recorder::new("early", &log)).await.unwrap();
    bus.dispatch_event(5).await.unwrap();
    bus.dispatch_and_remove_event(5).await.unwrap();
    bus.dispatch_and_remove_event(6).await.unwrap();
    assert_eq!(events_of(&log, "early"), vec![5, 5, 6]);
    assert_eq!(bus.stored_event_count().await, 0);

    bus.add_listener("late", Recorder::new("late", &log)).await.unwrap();
    assert!(events_of(&log, "late").is_empty());
}

#[tokio::test]
async fn test_duplicate_registration_keeps_first() {
    let bus = Dispatcher::builder(Negate::default()).build().unwrap();
    let log = log();

    bus.dispatch_event(7).await.unwrap();
    bus.add_listener("a", Recorder::new("first", &log)).await.unwrap();

    let err = bus
        .add_listener("a", Recorder::new("second", &log))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::ListenerAlreadyRegistered { .. }));
    assert_eq!(err.as_label(), "listener_already_registered");
    assert!(events_of(&log, "second").is_empty());

    bus.dispatch_event(8).await.unwrap();
    assert_eq!(events_of(&log, "first"), vec![-7, 8]);
    assert_eq!(bus.listener_count().await, 1);
}

#[tokio::test]
async fn test_listeners_called_in_registration_order() {
    let bus = Dispatcher::builder(Negate::default()).build().unwrap();
    let log = log();

    for name in ["c", "a", "b"] {
        bus.add_listener(name, Recorder::new(name, &log)).await.unwrap();
    }
    assert_eq!(bus.listener_keys().await, vec!["c", "a", "b"]);

    bus.dispatch_event(1).await.unwrap();
    let order: Vec<_> = log.lock().unwrap().iter().map(|(n, _)| *n).collect();
    assert_eq!(order, vec!["c", "a", "b"]);
}

#[tokio::test]
async fn test_removed_listener_no_longer_receives() {
    let bus = Dispatcher::builder(Negate::default()).build().unwrap();
    let log = log();

    bus.add_listener("a", Recorder::new("a", &log)).await.unwrap();
    bus.add_listener("b", Recorder::new("b", &log)).await.unwrap();
    assert!(bus.remove_listener(&"a").await);
    assert!(!bus.remove_listener(&"a").await);

    bus.dispatch_event(9).await.unwrap();
    assert_eq!(all_events(&log), vec![9]);
    assert_eq!(events_of(&log, "b"), vec![9]);
}

#[tokio::test]
async fn test_missing_replay_form_registers_nothing() {
    let policy = Negate {
        unreplayable: Some(3),
    };
    let bus = Dispatcher::builder(policy).build().unwrap();
    let log = log();

    bus.dispatch_event(1).await.unwrap();
    bus.dispatch_event(3).await.unwrap();

    let err = bus.add_listener("l", Recorder::new("l", &log)).await.unwrap_err();
    assert!(matches!(err, DispatchError::MissingReplayEvent { ref event_key } if event_key == "3"));
    assert_eq!(bus.listener_count().await, 0);
    assert!(all_events(&log).is_empty());

    assert!(bus.remove_event(&3).await);
    bus.add_listener("l", Recorder::new("l", &log)).await.unwrap();
    assert_eq!(events_of(&log, "l"), vec![-1]);
}

#[tokio::test(start_paused = true)]
async fn test_live_event_queues_behind_replay() {
    let bus = Dispatcher::builder(Negate::default())
        .with_listener_call_timeout(Duration::ZERO)
        .build()
        .unwrap();
    let log = log();

    bus.dispatch_event(1).await.unwrap();

    let registering = {
        let bus = Arc::clone(&bus);
        let recorder = Recorder::with("l", &log, Behavior::SleepOn(-1, Duration::from_millis(50)));
        tokio::spawn(async move { bus.add_listener("l", recorder).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(events_of(&log, "l"), vec![-1]);

    bus.dispatch_event(2).await.unwrap();
    registering.await.unwrap().unwrap();

    assert_eq!(events_of(&log, "l"), vec![-1, 2]);
}

#[tokio::test]
async fn test_listener_can_dispatch_from_its_callback() {
    let bus = Dispatcher::builder(Negate::default())
        .with_listener_call_timeout(Duration::ZERO)
        .build()
        .unwrap();
    let log = log();

    let echo = Recorder::with("echo", &log, Behavior::Redispatch { on: 1, next: 2 });
    echo.attach(&bus);
    bus.add_listener("echo", echo).await.unwrap();
    bus.add_listener("tail", Recorder::new("tail", &log)).await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), bus.dispatch_event(1))
        .await
        .expect("nested dispatch must not wait on the outer call")
        .unwrap();

    assert_eq!(events_of(&log, "echo"), vec![1, 2]);
    assert_eq!(events_of(&log, "tail"), vec![2, 1]);
    assert_eq!(bus.stored_event_keys().await, vec![1, 2]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_nested_dispatch_with_monitor_running() {
    let bus = Dispatcher::builder(Negate::default()).build().unwrap();
    let log = log();

    let echo = Recorder::with("echo", &log, Behavior::Redispatch { on: 3, next: 4 });
    echo.attach(&bus);
    bus.dispatch_event(3).await.unwrap();
    bus.add_listener("echo", echo).await.unwrap();
    assert_eq!(events_of(&log, "echo"), vec![-3]);

    tokio::time::timeout(Duration::from_secs(2), bus.dispatch_event(3))
        .await
        .expect("nested dispatch must not wait on the outer call")
        .unwrap();

    assert_eq!(events_of(&log, "echo"), vec![-3, 3, 4]);
    assert!(!bus.is_listener_blacklisted(&"echo").await);
    bus.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_sees_each_event_once() {
    const EVENTS: i64 = 200;
    const LISTENERS: usize = 8;
    const NAMES: [&str; LISTENERS] = ["l0", "l1", "l2", "l3", "l4", "l5", "l6", "l7"];

    let bus = Dispatcher::builder(Negate::default()).build().unwrap();
    let log = log();

    let dispatcher = {
        let bus = Arc::clone(&bus);
        tokio::spawn(async move {
            for ev in 1..=EVENTS {
                bus.dispatch_event(ev).await.unwrap();
                if ev % 16 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    };
    let registrants: Vec<_> = NAMES
        .iter()
        .map(|&name| {
            let bus = Arc::clone(&bus);
            let recorder = Recorder::new(name, &log);
            tokio::spawn(async move { bus.add_listener(name, recorder).await })
        })
        .collect();

    dispatcher.await.unwrap();
    for r in registrants {
        r.await.unwrap().unwrap();
    }

    for name in NAMES {
        let seen = events_of(&log, name);
        let mut keys: Vec<i64> = seen.iter().map(|e| e.abs()).collect();
        keys.sort_unstable();
        assert_eq!(keys, (1..=EVENTS).collect::<Vec<_>>(), "listener {name}");

        let first_live = seen.iter().position(|e| *e > 0).unwrap_or(seen.len());
        assert!(seen[first_live..].iter().all(|e| *e > 0), "replay after live for {name}");
    }
    bus.shutdown().await;
}

#[tokio::test]
async fn test_full_lifecycle_sequence() {
    let bus = Dispatcher::builder(Negate::default()).build().unwrap();
    let log = log();

    bus.dispatch_event(1).await.unwrap();
    bus.dispatch_event(2).await.unwrap();
    bus.dispatch_event(3).await.unwrap();
    bus.remove_event(&2).await;
    bus.add_listener("l1", Recorder::new("l1", &log)).await.unwrap();
    bus.dispatch_event(4).await.unwrap();
    assert_eq!(all_events(&log), vec![-1, -3, 4]);

    bus.dispatch_and_remove_event(1).await.unwrap();
    assert_eq!(all_events(&log)[3], 1);

    bus.add_listener("l2", Recorder::new("l2", &log)).await.unwrap();
    assert_eq!(&all_events(&log)[4..], &[-3, -4]);

    bus.dispatch_event(5).await.unwrap();
    assert_eq!(&log.lock().unwrap()[6..], &[("l1", 5), ("l2", 5)]);

    log.lock().unwrap().clear();
    bus.dispatch_event(1).await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec![("l1", 1), ("l2", 1)]);

    log.lock().unwrap().clear();
    bus.remove_listener(&"l1").await;
    bus.dispatch_event(8).await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec![("l2", 8)]);

    assert!(bus.remove_event(&8).await);
    assert!(!bus.remove_event(&8).await);

    bus.remove_event(&3).await;
    bus.remove_event(&1).await;
    bus.remove_event(&4).await;
    assert_eq!(bus.stored_event_keys().await, vec![5]);

    assert!(bus.remove_listener(&"l2").await);
    assert!(!bus.remove_listener(&"l2").await);
    assert_eq!(bus.listener_count().await, 0);

    bus.shutdown().await;
}
