//! The built-in tracing plugin installed by `StoreConfig::devtools`.

use tracing::debug;

use crate::options::SubscribeOptions;
use crate::store::Store;
use crate::subscription::ActionSubscriber;

pub(crate) const TARGET: &str = "statetree::devtools";

pub(crate) fn install(store: &Store) {
    debug!(target: TARGET, state = ?store.state(), "store initialized");

    store.subscribe(
        |mutation, state| {
            debug!(
                target: TARGET,
                kind = %mutation.kind,
                payload = ?mutation.payload,
                state = ?state,
                "mutation"
            );
        },
        SubscribeOptions::prepend(),
    );

    store.subscribe_action(
        ActionSubscriber::new()
            .before(|action, _| {
                debug!(target: TARGET, kind = %action.kind, payload = ?action.payload, "action");
                Ok(())
            })
            .after(|action, _| {
                debug!(target: TARGET, kind = %action.kind, "action resolved");
                Ok(())
            })
            .error(|action, _, error| {
                debug!(target: TARGET, kind = %action.kind, %error, "action failed");
                Ok(())
            }),
        SubscribeOptions::prepend(),
    );
}
