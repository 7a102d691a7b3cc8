mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{bump, capture_logs, count, counter_module, int_field, json};
use statetree_store::{ModuleDef, Store, Value, WatchOptions};

fn app() -> ModuleDef {
    counter_module().module(
        "stats",
        ModuleDef::new()
            .namespaced(true)
            .state(json(serde_json::json!({"visits": 0})))
            .mutation("visit", |state, _| bump(state, "visits", 1))
            .getter("visits", |state, _, _, _| {
                Value::from(int_field(state, "visits"))
            }),
    )
}

#[test]
fn hot_update_swaps_mutations_and_keeps_state() {
    let store = Store::new(app()).unwrap();
    store.commit("increment", ());

    store
        .hot_update(ModuleDef::new().mutation("increment", |state, _| bump(state, "count", 10)))
        .unwrap();
    store.commit("increment", ());

    assert_eq!(count(&store), 11);
}

#[test]
fn omitted_maps_are_left_unchanged() {
    let store = Store::new(app()).unwrap();

    store
        .hot_update(ModuleDef::new().getter("double", |state, _, _, _| {
            Value::from(int_field(state, "count") * 3)
        }))
        .unwrap();

    store.commit("add", 2);
    assert_eq!(count(&store), 2);
    assert_eq!(store.getters().get("double"), Some(Value::from(6)));
    assert_eq!(store.getters().get("stats/visits"), Some(Value::from(0)));
}

#[test]
fn empty_maps_clear_handlers() {
    let store = Store::new(app()).unwrap();
    store.hot_update(ModuleDef::new().no_mutations()).unwrap();

    let (logs, _guard) = capture_logs();
    store.commit("increment", ());
    assert!(logs.contains("unknown mutation type: increment"));
    assert_eq!(count(&store), 0);
}

#[test]
fn nested_modules_update_in_place() {
    let store = Store::new(app()).unwrap();
    store.commit("stats/visit", ());

    store
        .hot_update(
            ModuleDef::new().module(
                "stats",
                ModuleDef::new()
                    .namespaced(true)
                    .mutation("visit", |state, _| bump(state, "visits", 5)),
            ),
        )
        .unwrap();
    store.commit("stats/visit", ());

    assert_eq!(store.getters().get("stats/visits"), Some(Value::from(6)));
}

#[test]
fn new_modules_are_not_added() {
    let store = Store::new(app()).unwrap();
    let (logs, _guard) = capture_logs();

    store
        .hot_update(ModuleDef::new().module("fresh", counter_module()))
        .unwrap();

    assert!(!store.has_module("fresh"));
    assert!(logs.contains("trying to add a new module 'fresh' on hot reloading"));
}

#[test]
fn unknown_module_stops_the_update_of_later_siblings() {
    let store = Store::new(app()).unwrap();
    let (logs, _guard) = capture_logs();

    store
        .hot_update(
            ModuleDef::new()
                .module("added", counter_module())
                .module(
                    "stats",
                    ModuleDef::new()
                        .namespaced(true)
                        .mutation("visit", |state, _| bump(state, "visits", 5)),
                ),
        )
        .unwrap();
    store.commit("stats/visit", ());

    assert!(logs.contains("trying to add a new module 'added' on hot reloading"));
    assert!(!store.has_module("added"));
    assert_eq!(store.getters().get("stats/visits"), Some(Value::from(1)));
}

#[test]
fn watchers_reevaluate_against_new_getters() {
    let store = Store::new(app()).unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();
    let _unwatch = store.watch(
        |_, getters| getters.get("double").unwrap_or_default(),
        move |new, _| log.borrow_mut().push(new.clone()),
        WatchOptions::default(),
    );

    store.commit("add", 2);
    store
        .hot_update(ModuleDef::new().getter("double", |state, _, _, _| {
            Value::from(int_field(state, "count") * 100)
        }))
        .unwrap();

    assert_eq!(*seen.borrow(), vec![Value::from(4), Value::from(200)]);
}

#[test]
fn state_survives_unrelated_rebuilds() {
    let store = Store::new(app()).unwrap();
    store.commit("add", 5);
    store.commit("stats/visit", ());
    let before = store.state();

    store.hot_update(ModuleDef::new()).unwrap();

    assert_eq!(*before, *store.state());
}
