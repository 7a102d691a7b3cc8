//! Reactivity for statetree.
//!
//! The store never talks to a concrete reactive engine. It consumes the
//! small capability interface in [`host`]: observable roots, cached computed
//! values, watchers, and a deferred task queue. [`SignalHost`] is the
//! default implementation; any engine that satisfies [`ReactiveHost`] can
//! be plugged in instead.
//!
//! ```rust
//! use statetree_reactive::{ReactiveHost, SignalHost};
//! use statetree_value::Value;
//!
//! let host = SignalHost::new();
//! let root = host.wrap_observable(Value::from(1));
//! let source = root.clone();
//! let doubled = host.define_computed(Box::new(move || {
//!     Value::from(source.get().as_i64().unwrap_or(0) * 2)
//! }));
//! assert_eq!(doubled.get(), Value::from(2));
//! root.replace(Value::from(5).into());
//! assert_eq!(doubled.get(), Value::from(10));
//! ```

pub mod error;
pub mod host;
pub mod signal;

pub use error::{ReactiveError, Result};
pub use host::{
    CachedValue, ComputeFn, Observable, ReactiveHost, Unwatch, WatchCallback, WatchOptions,
};
pub use signal::SignalHost;
