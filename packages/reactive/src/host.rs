//! The capability interface the store consumes from a reactivity host.
//!
//! A store needs exactly three things from its host:
//! - an observable root that tracks reads and notifies on writes
//! - lazily evaluated, cached computed values
//! - watchers that run a callback when a tracked source changes
//!
//! plus a deferred task queue (`next_tick`) drained by `flush`.

use std::fmt;
use std::rc::Rc;

use statetree_value::Value;

use crate::error::Result;

/// A function evaluated under dependency tracking.
pub type ComputeFn = Box<dyn Fn() -> Value>;

/// Called with `(new, old)` when a watched source changes.
pub type WatchCallback = Box<dyn FnMut(&Value, &Value)>;

/// An observable value. Reads are tracked by whatever evaluation is in
/// progress, writes notify every dependant.
pub trait Observable {
    /// Snapshot of the current value, recorded as a dependency.
    fn get(&self) -> Rc<Value>;

    /// Snapshot of the current value without recording a dependency.
    fn peek(&self) -> Rc<Value>;

    /// Mutate the value in place and notify.
    ///
    /// Snapshots handed out earlier are not affected: the value is cloned
    /// first if a snapshot is still alive.
    fn update(&self, f: &mut dyn FnMut(&mut Value));

    /// Swap in a new value and notify.
    fn replace(&self, value: Rc<Value>);

    /// Notify dependants without changing the value.
    fn touch(&self);

    /// Number of notifications so far.
    fn version(&self) -> u64;
}

/// A lazily evaluated value, cached until one of its dependencies changes.
pub trait CachedValue {
    /// Current value, re-evaluating only if a dependency changed.
    fn try_get(&self) -> Result<Value>;

    /// True when the next read would re-evaluate.
    fn is_stale(&self) -> bool;

    /// Like `try_get`, but logs the failure and yields `Null`.
    fn get(&self) -> Value {
        self.try_get().unwrap_or_else(|e| {
            tracing::error!("failed to evaluate computed value: {}", e);
            Value::Null
        })
    }
}

/// Options for [`ReactiveHost::watch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Invoke the callback once right away with `Null` as the old value.
    pub immediate: bool,
    /// Fire on every dependency change, even if the source value is equal.
    pub deep: bool,
    /// Fire inside the notifying write instead of on the next flush.
    pub sync: bool,
}

impl WatchOptions {
    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    pub fn deep(mut self) -> Self {
        self.deep = true;
        self
    }

    pub fn sync(mut self) -> Self {
        self.sync = true;
        self
    }
}

/// Handle that stops a watcher.
///
/// Dropping the handle leaves the watcher running; call [`Unwatch::unwatch`].
pub struct Unwatch {
    stop: Option<Box<dyn FnOnce()>>,
}

impl Unwatch {
    pub fn new(stop: impl FnOnce() + 'static) -> Self {
        Self {
            stop: Some(Box::new(stop)),
        }
    }

    /// A handle that stops nothing.
    pub fn noop() -> Self {
        Self { stop: None }
    }

    /// Stop the watcher. Calling this more than once is harmless.
    pub fn unwatch(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
        }
    }
}

impl fmt::Debug for Unwatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unwatch")
            .field("active", &self.stop.is_some())
            .finish()
    }
}

/// A reactivity host.
///
/// Implementations are single-threaded. None of the methods may hold an
/// internal borrow while running user code, since callbacks routinely call
/// back into the host.
pub trait ReactiveHost {
    fn wrap_observable(&self, value: Value) -> Rc<dyn Observable>;

    fn define_computed(&self, compute: ComputeFn) -> Rc<dyn CachedValue>;

    fn watch(&self, source: ComputeFn, callback: WatchCallback, options: WatchOptions) -> Unwatch;

    /// Queue a task for the next [`ReactiveHost::flush`].
    fn next_tick(&self, task: Box<dyn FnOnce()>);

    /// Run queued watchers and ticks until none are left.
    fn flush(&self);
}
