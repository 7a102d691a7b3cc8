mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::{capture_logs, count, counter_module, int_field, json};
use statetree_store::{CommitOptions, Error, ModuleDef, Store, SubscribeOptions, Value, WatchOptions};

#[test]
fn commit_runs_mutation() {
    let store = Store::new(counter_module()).unwrap();
    store.commit("increment", ());
    store.commit("add", 4);
    assert_eq!(count(&store), 5);
}

#[test]
fn commit_object_uses_object_as_payload() {
    let store = Store::new(
        ModuleDef::new()
            .state(json(serde_json::json!({"last": null})))
            .mutation("record", |state, payload| {
                if let Some(last) = state.field_mut("last") {
                    *last = payload.clone();
                }
            }),
    )
    .unwrap();

    let object = json(serde_json::json!({"type": "record", "amount": 3}));
    store
        .commit_object(object.clone(), CommitOptions::default())
        .unwrap();
    assert_eq!(store.state().field("last"), Some(&object));
}

#[test]
fn commit_object_without_type_is_rejected() {
    let store = Store::new(counter_module()).unwrap();
    let err = store
        .commit_object(json(serde_json::json!({"amount": 3})), CommitOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::ContractViolation { .. }));
    assert_eq!(count(&store), 0);
}

#[test]
fn unknown_mutation_is_reported_and_ignored() {
    let store = Store::new(counter_module()).unwrap();
    let before = store.state();
    let (logs, _guard) = capture_logs();

    store.commit("nope", ());

    assert!(logs.contains("unknown mutation type: nope"));
    assert!(Rc::ptr_eq(&before, &store.state()));
}

#[test]
fn silent_option_is_reported_as_removed() {
    let store = Store::new(counter_module()).unwrap();
    let (logs, _guard) = capture_logs();
    store.commit_with(
        "increment",
        (),
        CommitOptions {
            silent: true,
            ..CommitOptions::default()
        },
    );
    assert_eq!(count(&store), 1);
    assert!(logs.contains("Silent option has been removed"));
}

#[test]
fn state_snapshots_are_unaffected_by_later_commits() {
    let store = Store::new(counter_module()).unwrap();
    let snapshot = store.state();
    store.commit("increment", ());
    assert_eq!(int_field(&snapshot, "count"), 0);
    assert_eq!(count(&store), 1);
}

#[test]
fn set_state_points_to_replace_state() {
    let store = Store::new(counter_module()).unwrap();
    let err = store.set_state(Value::map()).unwrap_err();
    assert!(matches!(err, Error::ContractViolation { .. }));
    assert!(err.to_string().contains("replace_state"));
}

#[test]
fn replace_state_twice_is_idempotent() {
    let store = Store::new(counter_module()).unwrap();
    let next = json(serde_json::json!({"count": 42}));

    store.replace_state(next.clone());
    let first = store.state();
    store.replace_state(next.clone());

    assert_eq!(*first, *store.state());
    assert_eq!(count(&store), 42);
    assert_eq!(store.getters().get("double"), Some(Value::from(84)));
}

#[test]
fn replacing_state_with_itself_changes_nothing() {
    let store = Store::new(counter_module()).unwrap();
    store.commit("add", 3);
    let before = store.state();

    store.replace_state(store.state());

    let after = store.state();
    assert!(Rc::ptr_eq(&before, &after));
    assert_eq!(*before, *after);
    assert_eq!(count(&store), 3);
    assert_eq!(store.getters().get("double"), Some(Value::from(6)));
}

#[test]
fn getters_are_cached_until_state_changes() {
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let store = Store::new(counter_module().getter("tracked", move |state, _, _, _| {
        counter.set(counter.get() + 1);
        Value::from(int_field(state, "count"))
    }))
    .unwrap();

    assert_eq!(store.getters().get("tracked"), Some(Value::from(0)));
    assert_eq!(store.getters().get("tracked"), Some(Value::from(0)));
    assert_eq!(calls.get(), 1);

    store.commit("increment", ());
    assert_eq!(store.getters().get("tracked"), Some(Value::from(1)));
    assert_eq!(calls.get(), 2);
}

#[test]
fn getters_can_read_other_getters() {
    let store = Store::new(
        counter_module().getter("quadruple", |_, getters, _, _| {
            let double = getters.get_as::<i64>("double").unwrap_or(0);
            Value::from(double * 2)
        }),
    )
    .unwrap();

    store.commit("add", 3);
    assert_eq!(store.getters().get_as::<i64>("quadruple"), Some(12));
    assert!(store.getters().contains("double"));
    assert_eq!(
        store.getters().names(),
        vec!["double".to_string(), "quadruple".to_string()]
    );
    assert_eq!(store.getters().get("missing"), None);
}

#[test]
fn subscribers_see_post_commit_state() {
    let store = Store::new(counter_module()).unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    let _sub = store.subscribe(
        move |mutation, state| {
            log.borrow_mut()
                .push((mutation.kind.clone(), mutation.payload.clone(), int_field(state, "count")));
        },
        SubscribeOptions::default(),
    );

    store.commit("add", 2);
    store.commit("increment", ());

    assert_eq!(
        *seen.borrow(),
        vec![
            ("add".to_string(), Value::from(2), 2),
            ("increment".to_string(), Value::Null, 3),
        ]
    );
}

#[test]
fn prepended_subscribers_run_first() {
    let store = Store::new(counter_module()).unwrap();
    let order = Rc::new(RefCell::new(Vec::new()));

    let log = order.clone();
    store.subscribe(move |_, _| log.borrow_mut().push("first"), SubscribeOptions::default());
    let log = order.clone();
    store.subscribe(move |_, _| log.borrow_mut().push("prepended"), SubscribeOptions::prepend());

    store.commit("increment", ());
    assert_eq!(*order.borrow(), vec!["prepended", "first"]);
}

#[test]
fn unsubscribe_during_notification_does_not_skip_others() {
    let store = Store::new(counter_module()).unwrap();
    let calls = Rc::new(RefCell::new(Vec::new()));

    let handle = Rc::new(RefCell::new(None));
    let own = handle.clone();
    let log = calls.clone();
    let first = store.subscribe(
        move |_, _| {
            log.borrow_mut().push("a");
            if let Some(sub) = own.borrow_mut().as_mut() {
                statetree_store::Subscription::unsubscribe(sub);
            }
        },
        SubscribeOptions::default(),
    );
    *handle.borrow_mut() = Some(first);

    let log = calls.clone();
    store.subscribe(move |_, _| log.borrow_mut().push("b"), SubscribeOptions::default());

    store.commit("increment", ());
    store.commit("increment", ());

    assert_eq!(*calls.borrow(), vec!["a", "b", "b"]);
}

#[test]
fn unsubscribe_is_idempotent() {
    let store = Store::new(counter_module()).unwrap();
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let mut sub = store.subscribe(
        move |_, _| counter.set(counter.get() + 1),
        SubscribeOptions::default(),
    );

    store.commit("increment", ());
    sub.unsubscribe();
    sub.unsubscribe();
    store.commit("increment", ());

    assert_eq!(calls.get(), 1);
}

#[test]
fn watch_fires_on_change_after_flush() {
    let store = Store::new(counter_module()).unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();

    let mut unwatch = store.watch(
        |_, getters| getters.get("double").unwrap_or_default(),
        move |new, old| log.borrow_mut().push((new.clone(), old.clone())),
        WatchOptions::default(),
    );

    store.commit("increment", ());
    assert_eq!(*seen.borrow(), vec![(Value::from(2), Value::from(0))]);

    unwatch.unwatch();
    store.commit("increment", ());
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn watch_immediate_reports_initial_value() {
    let store = Store::new(counter_module()).unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();

    let _unwatch = store.watch(
        |state, _| state.field("count").cloned().unwrap_or_default(),
        move |new, _| log.borrow_mut().push(new.clone()),
        WatchOptions::default().immediate(),
    );

    assert_eq!(*seen.borrow(), vec![Value::from(0)]);
}

#[test]
fn mutation_handlers_see_only_their_own_state() {
    let store = Store::new(
        ModuleDef::new()
            .state(json(serde_json::json!({"flag": false})))
            .module(
                "counter",
                counter_module().mutation("inspect", |state, _| {
                    assert!(state.field("flag").is_none());
                    assert!(state.field("count").is_some());
                }),
            ),
    )
    .unwrap();

    store.commit("inspect", ());
    store.commit("increment", ());
    assert_eq!(
        store.state().get(&statetree_store::Path::parse("counter/count").unwrap()),
        Some(&Value::from(1))
    );
}
