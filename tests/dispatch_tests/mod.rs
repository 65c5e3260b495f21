
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use mockall::{mock, Sequence};
use pretty_assertions::assert_eq;
use relay_bus::{Accept, EventBus, EventError, Labeled, Listener, ListenerResult};

use crate::{recording_bus, CallLog};

mock! {
    pub Picker {}
    impl Listener<u32, String> for Picker {
        fn on_event(&self, payload: &u32) -> ListenerResult<String>;
    }
}

#[test]
fn test_dispatch_preserves_registration_order() {
    let log = CallLog::default();
    let bus = recording_bus(5, &[4], &log);

    let result = bus.dispatch(&(), 0, |r| *r != 0).unwrap();

    assert_eq!(result, 4);
    assert_eq!(log.calls(), vec![1, 2, 3, 4]);
}

#[test]
fn test_short_circuit_skips_later_listeners() {
    let bus: EventBus<u32, String> = EventBus::new();
    let mut seq = Sequence::new();

    let mut first = MockPicker::new();
    first
        .expect_on_event()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(String::new()));
    let mut second = MockPicker::new();
    second
        .expect_on_event()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|n| Ok(format!("picked {}", n)));
    let mut third = MockPicker::new();
    third.expect_on_event().never();

    bus.register(first).unwrap();
    bus.register(second).unwrap();
    bus.register(third).unwrap();

    let result = bus.dispatch(&7, String::new(), |r| !r.is_empty()).unwrap();
    assert_eq!(result, "picked 7");
}

#[test]
fn test_first_listener_accepting_is_the_only_call() {
    let log = CallLog::default();
    let bus = recording_bus(3, &[1, 2, 3], &log);

    assert_eq!(bus.dispatch(&(), 0, |r| *r != 0).unwrap(), 1);
    assert_eq!(log.calls(), vec![1]);
}

#[test]
fn test_default_when_no_listeners() {
    let bus: EventBus<(), String> = EventBus::new();
    let result = bus
        .dispatch(&(), "EMPTY".to_string(), |r| r != "EMPTY")
        .unwrap();
    assert_eq!(result, "EMPTY");
}

#[test]
fn test_default_when_nobody_accepts() {
    let log = CallLog::default();
    let bus = recording_bus(3, &[], &log);

    assert_eq!(bus.dispatch(&(), 99, |r| *r != 0).unwrap(), 99);
    assert_eq!(log.calls(), vec![1, 2, 3]);
}

#[test]
fn test_default_factory_is_lazy() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    let bus: EventBus<u32, u32> = EventBus::create(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        0
    });
    assert_eq!(built.load(Ordering::SeqCst), 0);

    bus.register(|n: &u32| -> ListenerResult<u32> { Ok(*n) }).unwrap();
    // explicit default and predicate: the factory is never needed
    assert_eq!(bus.dispatch(&5, 9, |r| *r > 10).unwrap(), 9);
    assert_eq!(built.load(Ordering::SeqCst), 0);

    // first invoke takes the sentinel once
    assert_eq!(bus.invoke(&5).unwrap(), 5);
    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(bus.invoke(&6).unwrap(), 6);
    assert_eq!(built.load(Ordering::SeqCst), 1);

    // fallback builds a fresh default
    assert_eq!(bus.invoke(&0).unwrap(), 0);
    assert_eq!(built.load(Ordering::SeqCst), 2);
}

#[test]
fn test_builder_default_predicate_is_lazy() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    let bus: EventBus<u32, u32> = EventBus::builder()
        .default_result(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            0
        })
        .label("lazy")
        .build()
        .unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 0);

    // empty bus: no listener result to compare, only the fallback is built
    assert_eq!(bus.invoke(&3).unwrap(), 0);
    assert_eq!(built.load(Ordering::SeqCst), 1);
}

#[test]
fn test_dispatch_is_deterministic() {
    let log = CallLog::default();
    let bus = recording_bus(4, &[3], &log);

    let first = bus.dispatch(&(), 0, |r| *r != 0).unwrap();
    let first_calls = log.calls();
    log.clear();
    let second = bus.dispatch(&(), 0, |r| *r != 0).unwrap();

    assert_eq!(first, second);
    assert_eq!(first_calls, log.calls());
}

#[test]
fn test_register_after_dispatch_is_seen() {
    let log = CallLog::default();
    let bus: EventBus<(), &'static str> = EventBus::new();

    let a_log = log.clone();
    bus.register(move |_: &()| -> ListenerResult<&'static str> {
        a_log.record(1);
        Ok("")
    })
    .unwrap();
    assert_eq!(bus.invoke(&()).unwrap(), "");
    assert_eq!(log.calls(), vec![1]);

    log.clear();
    let b_log = log.clone();
    bus.register(move |_: &()| -> ListenerResult<&'static str> {
        b_log.record(2);
        Ok("b")
    })
    .unwrap();
    assert_eq!(bus.invoke(&()).unwrap(), "b");
    assert_eq!(log.calls(), vec![1, 2]);
}

#[test]
fn test_listener_failure_aborts_dispatch() {
    let log = CallLog::default();
    let bus: EventBus<(), u32> = EventBus::new();

    let first = log.clone();
    bus.register(move |_: &()| -> ListenerResult<u32> {
        first.record(1);
        Ok(0)
    })
    .unwrap();
    let second = log.clone();
    bus.register(move |_: &()| -> ListenerResult<u32> {
        second.record(2);
        Err("block lookup failed".into())
    })
    .unwrap();
    let third = log.clone();
    bus.register(move |_: &()| -> ListenerResult<u32> {
        third.record(3);
        Ok(3)
    })
    .unwrap();

    let err = bus.dispatch(&(), 0, |r| *r != 0).unwrap_err();
    match &err {
        EventError::ListenerFailure {
            position, source, ..
        } => {
            assert_eq!(*position, 2);
            assert_eq!(source.to_string(), "block lookup failed");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(log.calls(), vec![1, 2]);
}

#[test]
fn test_failure_reports_listener_label() {
    let bus: EventBus<(), u32> = EventBus::builder()
        .label("pick_block")
        .build_default();
    bus.register(Labeled::new(
        "broken_mod",
        |_: &()| -> ListenerResult<u32> { Err("nope".into()) },
    ))
    .unwrap();

    let err = bus.invoke(&()).unwrap_err();
    assert_eq!(err.to_string(), "Listener 1 (broken_mod) failed: nope");
}

#[test]
fn test_custom_accept_ignores_bus_sentinel() {
    let bus: EventBus<i32, i32> = EventBus::builder()
        .default_result(|| 0)
        .accept(Accept::new(|r: &i32| *r < 0))
        .build()
        .unwrap();
    bus.register(|n: &i32| -> ListenerResult<i32> { Ok(*n) }).unwrap();

    assert_eq!(bus.invoke(&-3).unwrap(), -3);
    assert_eq!(bus.invoke(&3).unwrap(), 0);
    // per-call predicate takes precedence over the bus-level one
    assert_eq!(bus.dispatch_with(&3, |r| *r > 0).unwrap(), 3);
}
