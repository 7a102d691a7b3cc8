mod common;

use common::{count, counter_module, json};
use statetree_store::{ModuleDef, RegisterOptions, Store, StoreConfig, StoreOptions, Value};

fn strict_store() -> Store {
    Store::new(StoreOptions::new(counter_module()).strict(true)).unwrap()
}

#[test]
fn strict_mode_allows_sanctioned_changes() {
    let store = strict_store();
    assert!(store.config().strict);

    store.commit("increment", ());
    store.replace_state(json(serde_json::json!({"count": 10})));
    store
        .register_module(
            "extra",
            ModuleDef::new().state(json(serde_json::json!({"on": true}))),
            RegisterOptions::default(),
        )
        .unwrap();
    store.unregister_module("extra").unwrap();
    store
        .hot_update(counter_module().mutation("increment", |state, _| {
            common::bump(state, "count", 100)
        }))
        .unwrap();
    store.commit("increment", ());

    assert_eq!(count(&store), 110);
    assert!(!store.is_committing());
}

#[test]
#[should_panic(expected = "do not mutate store state outside mutation handlers")]
fn strict_mode_panics_on_direct_write() {
    let store = strict_store();
    store.raw_state().update(&mut |root| {
        if let Some(count) = root.field_mut("count") {
            *count = Value::from(99);
        }
    });
}

#[test]
fn direct_write_is_tolerated_without_strict_mode() {
    let store = Store::new(counter_module()).unwrap();
    store.raw_state().update(&mut |root| {
        if let Some(count) = root.field_mut("count") {
            *count = Value::from(99);
        }
    });
    assert_eq!(count(&store), 99);
    assert_eq!(store.getters().get("double"), Some(Value::from(198)));
}

#[test]
fn strict_mode_loads_from_config() {
    let config = StoreConfig::from_json(r#"{"strict": true}"#).unwrap();
    let store = Store::new(StoreOptions::new(counter_module()).config(config)).unwrap();
    assert!(store.config().strict);
    assert!(!store.config().devtools);
}
