//! `SignalHost`: a version-tracked, single-threaded reactive host.
//!
//! Every observable carries a version counter. An evaluation (computed value
//! or watcher source) runs inside a tracking frame that records the
//! `(signal, version)` pairs it read. A cached result stays valid while all
//! recorded versions are current. Computed values read inside another
//! evaluation forward their own dependencies to the outer frame, so derived
//! values of derived values invalidate correctly.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::{Rc, Weak};

use statetree_value::Value;

use crate::error::{ReactiveError, Result};
use crate::host::{
    CachedValue, ComputeFn, Observable, ReactiveHost, Unwatch, WatchCallback, WatchOptions,
};

/// Default [`ReactiveHost`] implementation.
#[derive(Clone, Default)]
pub struct SignalHost {
    inner: Rc<HostInner>,
}

impl SignalHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live watchers.
    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.borrow().len()
    }

    /// Number of tasks waiting for the next flush.
    pub fn pending_ticks(&self) -> usize {
        self.inner.ticks.borrow().len()
    }
}

#[derive(Default)]
struct HostInner {
    next_id: Cell<u64>,
    tracking: RefCell<Vec<Vec<Dependency>>>,
    watchers: RefCell<BTreeMap<u64, Rc<WatcherCore>>>,
    queued: RefCell<VecDeque<u64>>,
    ticks: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    flushing: Cell<bool>,
}

#[derive(Clone)]
struct Dependency {
    id: u64,
    signal: Weak<SignalCore>,
    version: u64,
}

impl Dependency {
    fn is_current(&self) -> bool {
        self.signal
            .upgrade()
            .is_some_and(|s| s.version.get() == self.version)
    }
}

impl HostInner {
    fn allocate_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn track(&self, dep: Dependency) {
        if let Some(frame) = self.tracking.borrow_mut().last_mut() {
            if !frame.iter().any(|d| d.id == dep.id) {
                frame.push(dep);
            }
        }
    }

    fn track_all(&self, deps: &[Dependency]) {
        for dep in deps {
            self.track(dep.clone());
        }
    }

    /// Run `f` inside a fresh tracking frame, returning what it read.
    fn tracked<R>(&self, f: impl FnOnce() -> R) -> (R, Vec<Dependency>) {
        self.tracking.borrow_mut().push(Vec::new());
        let frame = TrackingFrame { host: self };
        let result = f();
        let deps = frame.finish();
        (result, deps)
    }

    fn notify(&self, watcher_ids: Vec<u64>) {
        for id in watcher_ids {
            let watcher = self.watchers.borrow().get(&id).cloned();
            let Some(watcher) = watcher else {
                continue;
            };
            if watcher.options.sync {
                watcher.run(self);
            } else {
                let mut queued = self.queued.borrow_mut();
                if !queued.contains(&id) {
                    queued.push_back(id);
                }
            }
        }
    }

    fn flush(&self) {
        if self.flushing.replace(true) {
            return;
        }
        let _guard = FlushGuard { host: self };

        loop {
            let next = self.queued.borrow_mut().pop_front();
            if let Some(id) = next {
                let watcher = self.watchers.borrow().get(&id).cloned();
                if let Some(watcher) = watcher {
                    watcher.run(self);
                }
                continue;
            }

            let task = self.ticks.borrow_mut().pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }
}

/// Pops the tracking frame even if the evaluation unwinds.
struct TrackingFrame<'a> {
    host: &'a HostInner,
}

impl TrackingFrame<'_> {
    fn finish(self) -> Vec<Dependency> {
        let deps = self.host.tracking.borrow_mut().pop().unwrap_or_default();
        std::mem::forget(self);
        deps
    }
}

impl Drop for TrackingFrame<'_> {
    fn drop(&mut self) {
        self.host.tracking.borrow_mut().pop();
    }
}

struct FlushGuard<'a> {
    host: &'a HostInner,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.host.flushing.set(false);
    }
}

// === Observable ===

struct SignalCore {
    id: u64,
    host: Weak<HostInner>,
    value: RefCell<Rc<Value>>,
    version: Cell<u64>,
    watchers: RefCell<BTreeSet<u64>>,
}

struct Signal(Rc<SignalCore>);

impl Signal {
    fn changed(&self) {
        let core = &self.0;
        core.version.set(core.version.get() + 1);

        let Some(host) = core.host.upgrade() else {
            return;
        };
        let ids: Vec<u64> = {
            let live = host.watchers.borrow();
            let mut watchers = core.watchers.borrow_mut();
            watchers.retain(|id| live.contains_key(id));
            watchers.iter().copied().collect()
        };
        host.notify(ids);
    }
}

impl Observable for Signal {
    fn get(&self) -> Rc<Value> {
        if let Some(host) = self.0.host.upgrade() {
            host.track(Dependency {
                id: self.0.id,
                signal: Rc::downgrade(&self.0),
                version: self.0.version.get(),
            });
        }
        self.peek()
    }

    fn peek(&self) -> Rc<Value> {
        self.0.value.borrow().clone()
    }

    fn update(&self, f: &mut dyn FnMut(&mut Value)) {
        {
            let mut slot = self.0.value.borrow_mut();
            f(Rc::make_mut(&mut slot));
        }
        self.changed();
    }

    fn replace(&self, value: Rc<Value>) {
        *self.0.value.borrow_mut() = value;
        self.changed();
    }

    fn touch(&self) {
        self.changed();
    }

    fn version(&self) -> u64 {
        self.0.version.get()
    }
}

// === Computed ===

struct Computed {
    host: Weak<HostInner>,
    compute: ComputeFn,
    cache: RefCell<Option<(Value, Vec<Dependency>)>>,
    evaluating: Cell<bool>,
}

impl CachedValue for Computed {
    fn try_get(&self) -> Result<Value> {
        let host = self.host.upgrade().ok_or(ReactiveError::HostDropped)?;

        if let Some((value, deps)) = &*self.cache.borrow() {
            if deps.iter().all(Dependency::is_current) {
                host.track_all(deps);
                return Ok(value.clone());
            }
        }

        if self.evaluating.replace(true) {
            return Err(ReactiveError::Cycle);
        }
        let (value, deps) = host.tracked(|| (self.compute)());
        self.evaluating.set(false);

        host.track_all(&deps);
        *self.cache.borrow_mut() = Some((value.clone(), deps));
        Ok(value)
    }

    fn is_stale(&self) -> bool {
        match &*self.cache.borrow() {
            Some((_, deps)) => !deps.iter().all(Dependency::is_current),
            None => true,
        }
    }
}

// === Watchers ===

struct WatcherCore {
    id: u64,
    source: ComputeFn,
    callback: RefCell<WatchCallback>,
    last: RefCell<Value>,
    options: WatchOptions,
    active: Cell<bool>,
}

impl WatcherCore {
    /// Re-evaluate the source and subscribe to whatever it read.
    fn evaluate(&self, host: &HostInner) -> Value {
        let (value, deps) = host.tracked(|| (self.source)());
        for dep in &deps {
            if let Some(signal) = dep.signal.upgrade() {
                signal.watchers.borrow_mut().insert(self.id);
            }
        }
        value
    }

    fn run(&self, host: &HostInner) {
        if !self.active.get() {
            return;
        }
        let new = self.evaluate(host);
        let old = self.last.replace(new.clone());
        if !self.options.deep && new == old {
            return;
        }
        match self.callback.try_borrow_mut() {
            Ok(mut callback) => (*callback)(&new, &old),
            Err(_) => tracing::debug!(watcher = self.id, "skipping re-entrant watcher callback"),
        }
    }
}

impl ReactiveHost for SignalHost {
    fn wrap_observable(&self, value: Value) -> Rc<dyn Observable> {
        Rc::new(Signal(Rc::new(SignalCore {
            id: self.inner.allocate_id(),
            host: Rc::downgrade(&self.inner),
            value: RefCell::new(Rc::new(value)),
            version: Cell::new(0),
            watchers: RefCell::new(BTreeSet::new()),
        })))
    }

    fn define_computed(&self, compute: ComputeFn) -> Rc<dyn CachedValue> {
        Rc::new(Computed {
            host: Rc::downgrade(&self.inner),
            compute,
            cache: RefCell::new(None),
            evaluating: Cell::new(false),
        })
    }

    fn watch(&self, source: ComputeFn, callback: WatchCallback, options: WatchOptions) -> Unwatch {
        let id = self.inner.allocate_id();
        let watcher = Rc::new(WatcherCore {
            id,
            source,
            callback: RefCell::new(callback),
            last: RefCell::new(Value::Null),
            options,
            active: Cell::new(true),
        });
        self.inner.watchers.borrow_mut().insert(id, watcher.clone());

        let initial = watcher.evaluate(&self.inner);
        *watcher.last.borrow_mut() = initial.clone();
        if options.immediate {
            let mut callback = watcher.callback.borrow_mut();
            (*callback)(&initial, &Value::Null);
        }

        let host = Rc::downgrade(&self.inner);
        let weak = Rc::downgrade(&watcher);
        Unwatch::new(move || {
            if let Some(watcher) = weak.upgrade() {
                watcher.active.set(false);
            }
            if let Some(host) = host.upgrade() {
                host.watchers.borrow_mut().remove(&id);
            }
        })
    }

    fn next_tick(&self, task: Box<dyn FnOnce()>) {
        self.inner.ticks.borrow_mut().push_back(task);
    }

    fn flush(&self) {
        self.inner.flush();
    }
}
