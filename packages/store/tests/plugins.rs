mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{capture_logs, counter_module, int_field};
use statetree_store::{
    ReactiveHost, SignalHost, Store, StoreOptions, SubscribeOptions, Value,
};

#[test]
fn plugins_run_in_order_after_getters_are_ready() {
    let calls = Rc::new(RefCell::new(Vec::new()));

    let first = calls.clone();
    let second = calls.clone();
    let store = Store::new(
        StoreOptions::new(counter_module())
            .plugin(move |store| {
                let double = store.getters().get("double");
                first.borrow_mut().push(format!("first {:?}", double));
            })
            .plugin(move |_| second.borrow_mut().push("second".to_string())),
    )
    .unwrap();

    assert_eq!(
        *calls.borrow(),
        vec!["first Some(Integer(0))".to_string(), "second".to_string()]
    );
    drop(store);
}

#[test]
fn plugin_can_subscribe_and_commit() {
    let history = Rc::new(RefCell::new(Vec::new()));
    let log = history.clone();

    let store = Store::new(StoreOptions::new(counter_module()).plugin(move |store| {
        let log = log.clone();
        store.subscribe(
            move |mutation, state| {
                log.borrow_mut()
                    .push((mutation.kind.clone(), int_field(state, "count")));
            },
            SubscribeOptions::default(),
        );
        store.commit("add", 5);
    }))
    .unwrap();

    store.commit("increment", ());
    assert_eq!(
        *history.borrow(),
        vec![("add".to_string(), 5), ("increment".to_string(), 6)]
    );
}

#[tokio::test]
async fn devtools_logs_mutations_and_actions() {
    let (logs, _guard) = capture_logs();
    let store = Store::new(
        StoreOptions::new(counter_module().action_sync("noop", |_, _| Ok(Value::Null)))
            .devtools(true),
    )
    .unwrap();

    store.commit("increment", ());
    store.dispatch("noop", ()).await.unwrap();

    let output = logs.contents();
    assert!(output.contains("statetree::devtools"));
    assert!(output.contains("store initialized"));
    assert!(output.contains("kind=increment"));
    assert!(output.contains("kind=noop"));
    assert!(output.contains("action resolved"));
}

#[test]
fn custom_host_is_used() {
    let host = SignalHost::new();
    let store = Store::new(
        StoreOptions::new(counter_module())
            .strict(true)
            .host(Rc::new(host.clone()) as Rc<dyn ReactiveHost>),
    )
    .unwrap();

    assert_eq!(host.watcher_count(), 1);
    store.commit("increment", ());
    assert_eq!(host.pending_ticks(), 0);
}
