//! A hierarchical, module-based application state container.
//!
//! All application state lives in one tree owned by a [`Store`]. The tree is
//! partitioned into modules, each contributing a subtree of state plus:
//!
//! - **mutations**: synchronous handlers, the only sanctioned way to change
//!   state (`commit`)
//! - **actions**: asynchronous handlers that commit mutations or dispatch
//!   other actions (`dispatch`)
//! - **getters**: derived values, cached until the state they read changes
//!
//! A namespaced module prefixes its handler names with its key, so
//! `cart/checkout` names the `checkout` action of the namespaced `cart`
//! module. Handlers see the store through a [`LocalContext`] scoped to
//! their module.
//!
//! ```rust
//! use statetree_store::{ModuleDef, RegisterOptions, Store};
//! use statetree_value::Value;
//!
//! let store = Store::new(ModuleDef::new()).unwrap();
//! store
//!     .register_module(
//!         "cart",
//!         ModuleDef::new()
//!             .namespaced(true)
//!             .state(Value::from(serde_json::json!({"items": []})))
//!             .mutation("add", |state, item| {
//!                 if let Some(items) = state.field_mut("items").and_then(Value::as_array_mut) {
//!                     items.push(item.clone());
//!                 }
//!             })
//!             .getter("count", |state, _, _, _| {
//!                 Value::from(state.field("items").and_then(Value::as_array).map_or(0, Vec::len) as i64)
//!             }),
//!         RegisterOptions::default(),
//!     )
//!     .unwrap();
//!
//! store.commit("cart/add", "apple");
//! assert_eq!(store.getters().get("cart/count"), Some(Value::from(1)));
//! ```
//!
//! State changes and structural conflicts that are not outright errors
//! (unknown types, duplicate getters, overridden state fields) are reported
//! through `tracing`.

pub mod context;
mod devtools;
mod dispatch;
pub mod error;
pub mod module;
pub mod options;
pub mod store;
pub mod subscription;
mod task;

pub use context::{ActionContext, Getters, LocalContext, StateRef};
pub use error::{Error, Result};
pub use module::{ActionFuture, ModuleDef, ModuleNode, ModuleTree, StateDef};
pub use options::{
    CommitOptions, DispatchOptions, IntoModulePath, Plugin, RegisterOptions, StoreConfig,
    StoreOptions, SubscribeOptions,
};
pub use store::Store;
pub use subscription::{ActionRecord, ActionSubscriber, MutationRecord, Subscription};

pub use statetree_reactive::{ReactiveHost, SignalHost, Unwatch, WatchOptions};
pub use statetree_value::{Path, Value};
