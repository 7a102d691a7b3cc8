//! The store: a module tree, its dispatch tables and a reactive projection of
//! its getters, all kept in step.
//!
//! Every structural change (construction, module registration, hot update)
//! goes through the same two steps:
//!
//! - *install*: walk the module tree, give every node a [`LocalContext`],
//!   splice its initial state into the root state and index its handlers
//! - *project*: build one cached computed value per getter, optionally arm
//!   strict mode, and retire the previous projection on the next tick

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

use futures::future::{self, join_all, FutureExt};
use statetree_reactive::{
    CachedValue, Observable, ReactiveHost, SignalHost, Unwatch, WatchOptions,
};
use statetree_value::{Path, Value};
use tracing::{debug, error, warn};

use crate::context::{Getters, LocalContext};
use crate::devtools;
use crate::dispatch::{
    unify_object_style, DispatchTable, WrappedAction, WrappedGetter, WrappedMutation,
};
use crate::error::{Error, Result};
use crate::module::{
    ActionDef, ActionFuture, GetterHandler, ModuleDef, ModuleNode, ModuleTree, MutationHandler,
};
use crate::options::{
    CommitOptions, IntoModulePath, RegisterOptions, StoreConfig, StoreOptions,
    SubscribeOptions,
};
use crate::subscription::{
    ActionRecord, ActionSubscriber, MutationRecord, MutationSubscriber, SubscriberList,
    Subscription,
};
use crate::task::{ActionTask, Outcome, TaskSet};

const STRICT_VIOLATION: &str = "do not mutate store state outside mutation handlers";

/// A hierarchical state container.
///
/// `Store` is a handle: clones share the same state. All access is
/// single-threaded.
///
/// ```rust
/// use statetree_store::{ModuleDef, Store};
/// use statetree_value::Value;
///
/// let store = Store::new(
///     ModuleDef::new()
///         .state(Value::from(serde_json::json!({"count": 0})))
///         .mutation("increment", |state, _| {
///             if let Some(Value::Integer(n)) = state.field_mut("count") {
///                 *n += 1;
///             }
///         })
///         .getter("double", |state, _, _, _| {
///             Value::from(state.field("count").and_then(Value::as_i64).unwrap_or(0) * 2)
///         }),
/// )
/// .unwrap();
///
/// store.commit("increment", ());
/// assert_eq!(store.state().field("count"), Some(&Value::from(1)));
/// assert_eq!(store.getters().get("double"), Some(Value::from(2)));
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

pub(crate) struct StoreInner {
    host: Rc<dyn ReactiveHost>,
    state: Rc<dyn Observable>,
    modules: RefCell<ModuleTree>,
    table: RefCell<DispatchTable>,
    projection: RefCell<Projection>,
    local_getters: RefCell<HashMap<String, Rc<BTreeMap<String, String>>>>,
    committing: Cell<bool>,
    subscribers: RefCell<SubscriberList<MutationSubscriber>>,
    action_subscribers: RefCell<SubscriberList<ActionSubscriber>>,
    tasks: TaskSet,
    config: StoreConfig,
}

/// A non-owning handle, held by contexts and projections.
#[derive(Clone)]
pub(crate) struct WeakStore(Weak<StoreInner>);

impl WeakStore {
    pub fn upgrade(&self) -> Option<Store> {
        self.0.upgrade().map(|inner| Store { inner })
    }

    #[cfg(test)]
    pub fn detached() -> Self {
        WeakStore(Weak::new())
    }
}

/// The computed getters of one build, plus the strict-mode watcher armed
/// alongside them.
#[derive(Default)]
struct Projection {
    getters: BTreeMap<String, Rc<dyn CachedValue>>,
    strict_watch: Option<Unwatch>,
}

impl Drop for Projection {
    fn drop(&mut self) {
        if let Some(mut watch) = self.strict_watch.take() {
            watch.unwatch();
        }
    }
}

/// What an install pass does for each module it visits.
#[derive(Debug, Clone, Copy)]
struct InstallMode {
    splice_state: bool,
    index: bool,
}

/// One module's share of an install pass, collected before any state is
/// touched.
struct Installation {
    path: Path,
    namespace: String,
    namespaced: bool,
    state: Value,
    context: LocalContext,
    mutations: Vec<(String, MutationHandler)>,
    actions: Vec<(String, ActionDef)>,
    getters: Vec<(String, GetterHandler)>,
}

struct CommitGuard<'a> {
    flag: &'a Cell<bool>,
    previous: bool,
}

impl Drop for CommitGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}

impl Store {
    /// Build a store from a root module, or from full [`StoreOptions`].
    ///
    /// Plugins run once, in order, after the first projection is built.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidModule`] if any module definition is invalid.
    pub fn new(options: impl Into<StoreOptions>) -> Result<Self> {
        let StoreOptions {
            module,
            config,
            plugins,
            host,
        } = options.into();

        let host: Rc<dyn ReactiveHost> = match host {
            Some(host) => host,
            None => Rc::new(SignalHost::new()),
        };
        let modules = ModuleTree::new(module)?;
        let state = host.wrap_observable(modules.root().state().clone());

        let store = Store {
            inner: Rc::new(StoreInner {
                host,
                state,
                modules: RefCell::new(modules),
                table: RefCell::new(DispatchTable::default()),
                projection: RefCell::new(Projection::default()),
                local_getters: RefCell::new(HashMap::new()),
                committing: Cell::new(false),
                subscribers: RefCell::new(SubscriberList::new()),
                action_subscribers: RefCell::new(SubscriberList::new()),
                tasks: TaskSet::default(),
                config,
            }),
        };

        store.install_module(&Path::root(), false);
        store.reset_projection(false);

        for plugin in &plugins {
            plugin(&store);
        }
        if config.devtools {
            devtools::install(&store);
        }

        debug!(
            strict = config.strict,
            devtools = config.devtools,
            plugins = plugins.len(),
            "store created"
        );
        store.flush();
        Ok(store)
    }

    pub fn config(&self) -> StoreConfig {
        self.inner.config
    }

    /// The current root state. Reading it inside a getter or a watch source
    /// records a dependency.
    pub fn state(&self) -> Rc<Value> {
        self.inner.state.get()
    }

    /// Always fails: the root can only be swapped with
    /// [`Store::replace_state`].
    ///
    /// # Errors
    ///
    /// Always [`Error::ContractViolation`].
    pub fn set_state(&self, _state: Value) -> Result<()> {
        Err(Error::contract(
            "use store.replace_state() to explicitly replace store state",
        ))
    }

    /// Swap the whole root state. Getters and watchers see the new root;
    /// nothing is validated against the module tree.
    pub fn replace_state(&self, state: impl Into<Rc<Value>>) {
        let state = state.into();
        self.with_commit(|| self.inner.state.replace(state));
        self.flush_host();
    }

    /// The observable root itself.
    ///
    /// Writing through it skips every mutation handler and subscriber. In
    /// strict mode such a write panics.
    pub fn raw_state(&self) -> Rc<dyn Observable> {
        self.inner.state.clone()
    }

    /// True while a mutation (or another sanctioned state change) is running.
    pub fn is_committing(&self) -> bool {
        self.inner.committing.get()
    }

    pub fn getters(&self) -> Getters {
        Getters::root(self.downgrade())
    }

    pub fn commit(&self, kind: &str, payload: impl Into<Value>) {
        self.commit_with(kind, payload, CommitOptions::default());
    }

    /// Run every mutation handler registered under `kind`, in registration
    /// order, as one change; then notify subscribers with the new state.
    ///
    /// An unknown type is reported and ignored.
    pub fn commit_with(&self, kind: &str, payload: impl Into<Value>, options: CommitOptions) {
        let payload = payload.into();
        let handlers = self.inner.table.borrow().mutations.get(kind).cloned();
        let Some(handlers) = handlers else {
            error!("unknown mutation type: {}", kind);
            return;
        };

        self.with_commit(|| {
            self.inner.state.update(&mut |root| {
                for handler in &handlers {
                    handler.apply(kind, root, &payload);
                }
            });
        });

        let record = MutationRecord {
            kind: kind.to_string(),
            payload,
        };
        let state = self.inner.state.peek();
        let subscribers = self.inner.subscribers.borrow().snapshot();
        for subscriber in subscribers {
            subscriber(&record, &state);
        }

        if options.silent {
            warn!(
                "mutation type: {}. Silent option has been removed. \
                 Use the filter functionality in the devtools",
                kind
            );
        }
        self.flush_host();
    }

    /// Object-style commit: the object's `type` field names the mutation and
    /// the whole object is the payload.
    ///
    /// # Errors
    ///
    /// [`Error::ContractViolation`] if `type` is missing or not a string.
    pub fn commit_object(&self, object: Value, options: CommitOptions) -> Result<()> {
        let (kind, payload) = unify_object_style(object)?;
        self.commit_with(&kind, payload, options);
        Ok(())
    }

    /// Start every action handler registered under `kind`.
    ///
    /// "before" subscribers run first, then every handler runs up to its
    /// first suspension point before this returns. The action keeps going
    /// whether or not the returned future is awaited: awaiting it drives the
    /// action, and so does [`Store::flush`].
    ///
    /// Once every handler has settled the "after" or "error" subscribers
    /// run. With one handler the result is its own, with several it is an
    /// array of results, and the first failure in handler order wins.
    ///
    /// An unknown type is reported and resolves to `Null`.
    pub fn dispatch(&self, kind: &str, payload: impl Into<Value>) -> ActionFuture {
        let payload = payload.into();
        let handlers = self.inner.table.borrow().actions.get(kind).cloned();
        let Some(handlers) = handlers else {
            error!("unknown action type: {}", kind);
            return future::ready(Ok(Value::Null)).boxed_local();
        };

        let record = ActionRecord {
            kind: kind.to_string(),
            payload: payload.clone(),
        };
        self.notify_before(&record);

        let pending: Vec<ActionFuture> = handlers
            .iter()
            .map(|handler| handler.invoke(payload.clone()))
            .collect();

        let store = self.downgrade();
        let (task, result) = ActionTask::start(move |outcome: Outcome| async move {
            let settled = merge_results(join_all(pending).await);
            if let Some(store) = store.upgrade() {
                store.notify_settled(&record, &settled);
                store.flush_host();
            }
            let _ = outcome.send(settled);
        });
        self.inner.tasks.push(task);
        result
    }

    /// Object-style dispatch, see [`Store::commit_object`].
    pub fn dispatch_object(&self, object: Value) -> ActionFuture {
        match unify_object_style(object) {
            Ok((kind, payload)) => self.dispatch(&kind, payload),
            Err(e) => future::ready(Err(e)).boxed_local(),
        }
    }

    fn notify_before(&self, record: &ActionRecord) {
        let state = self.inner.state.peek();
        let subscribers = self.inner.action_subscribers.borrow().snapshot();
        for subscriber in subscribers {
            if let Some(before) = &subscriber.before {
                if let Err(e) = before(record, &state) {
                    warn!("error in before action subscribers: {}", e);
                }
            }
        }
    }

    fn notify_settled(&self, record: &ActionRecord, outcome: &Result<Value>) {
        let state = self.inner.state.peek();
        let subscribers = self.inner.action_subscribers.borrow().snapshot();
        for subscriber in subscribers {
            match outcome {
                Ok(_) => {
                    if let Some(after) = &subscriber.after {
                        if let Err(e) = after(record, &state) {
                            warn!("error in after action subscribers: {}", e);
                        }
                    }
                }
                Err(failure) => {
                    if let Some(on_error) = &subscriber.error {
                        if let Err(e) = on_error(record, &state, failure) {
                            warn!("error in error action subscribers: {}", e);
                        }
                    }
                }
            }
        }
    }

    /// Call `subscriber` after every commit with the mutation and the
    /// post-commit state.
    pub fn subscribe(
        &self,
        subscriber: impl Fn(&MutationRecord, &Value) + 'static,
        options: SubscribeOptions,
    ) -> Subscription {
        let id = self
            .inner
            .subscribers
            .borrow_mut()
            .add(Rc::new(subscriber), options.prepend);
        let store = self.downgrade();
        Subscription::new(move || {
            if let Some(store) = store.upgrade() {
                store.inner.subscribers.borrow_mut().remove(id);
            }
        })
    }

    pub fn subscribe_action(
        &self,
        subscriber: impl Into<ActionSubscriber>,
        options: SubscribeOptions,
    ) -> Subscription {
        let id = self
            .inner
            .action_subscribers
            .borrow_mut()
            .add(subscriber.into(), options.prepend);
        let store = self.downgrade();
        Subscription::new(move || {
            if let Some(store) = store.upgrade() {
                store.inner.action_subscribers.borrow_mut().remove(id);
            }
        })
    }

    /// Watch a value derived from `(state, getters)` and call `callback`
    /// with `(new, old)` when it changes.
    pub fn watch<G, C>(&self, getter: G, callback: C, options: WatchOptions) -> Unwatch
    where
        G: Fn(&Value, &Getters) -> Value + 'static,
        C: FnMut(&Value, &Value) + 'static,
    {
        let store = self.downgrade();
        self.inner.host.watch(
            Box::new(move || match store.upgrade() {
                Some(store) => {
                    let state = store.state();
                    getter(&*state, &store.getters())
                }
                None => Value::Null,
            }),
            Box::new(callback),
            options,
        )
    }

    /// Add a module at `path` after construction.
    ///
    /// The module's state is spliced into its parent's state unless
    /// `preserve_state` is set, in which case whatever is already at `path`
    /// is kept.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidModulePath`] for the root path,
    /// [`Error::ModuleNotFound`] if the parent module doesn't exist,
    /// [`Error::InvalidModule`] for an invalid definition.
    pub fn register_module(
        &self,
        path: impl IntoModulePath,
        module: ModuleDef,
        options: RegisterOptions,
    ) -> Result<()> {
        let path = path.into_module_path()?;
        if path.is_empty() {
            return Err(Error::invalid_module_path(
                "cannot register the root module by using register_module",
            ));
        }

        let replacing = self.inner.modules.borrow().is_registered(&path);
        self.inner
            .modules
            .borrow_mut()
            .register(&path, &module, true)?;
        debug!(path = %path, replacing, "registered module");

        if replacing {
            self.install(
                &path,
                InstallMode {
                    splice_state: !options.preserve_state,
                    index: false,
                },
            );
            self.reset_store(false);
        } else {
            self.install_module(&path, options.preserve_state);
            self.reset_projection(false);
        }
        self.flush_host();
        Ok(())
    }

    /// Remove a module added with [`Store::register_module`], along with its
    /// state. Modules declared at construction are left in place.
    ///
    /// # Errors
    ///
    /// [`Error::Path`] if `path` can't be parsed.
    pub fn unregister_module(&self, path: impl IntoModulePath) -> Result<()> {
        let path = path.into_module_path()?;
        let removed = self.inner.modules.borrow_mut().unregister(&path);
        if removed {
            self.with_commit(|| {
                self.inner.state.update(&mut |root| {
                    root.remove(&path);
                });
            });
            debug!(path = %path, "unregistered module");
        }
        self.reset_store(false);
        self.flush_host();
        Ok(())
    }

    /// Whether a module is registered at `path`. False for the root and for
    /// paths that can't be parsed.
    pub fn has_module(&self, path: impl IntoModulePath) -> bool {
        match path.into_module_path() {
            Ok(path) => self.inner.modules.borrow().is_registered(&path),
            Err(_) => false,
        }
    }

    /// Swap in new handlers for existing modules without touching state.
    ///
    /// Handler maps the new definition omits are left unchanged. Nested
    /// modules that don't exist yet are not added.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidModule`] for an invalid definition.
    pub fn hot_update(&self, module: ModuleDef) -> Result<()> {
        self.inner.modules.borrow_mut().update(&module)?;
        self.reset_store(true);
        self.flush_host();
        Ok(())
    }

    /// The context of the namespaced module registered under `namespace`
    /// (e.g. `"cart/"`).
    pub fn module_context(&self, namespace: &str) -> Option<LocalContext> {
        let path = self.inner.table.borrow().namespaces.get(namespace).cloned();
        let Some(path) = path else {
            error!("module namespace not found: {}", namespace);
            return None;
        };
        let context = self
            .inner
            .modules
            .borrow()
            .get(&path)
            .and_then(ModuleNode::context)
            .cloned();
        context
    }

    /// Run deferred watcher callbacks and queued tasks, then give every
    /// unsettled action a chance to make progress.
    pub fn flush(&self) {
        self.flush_host();
        self.inner.tasks.drive();
        self.flush_host();
    }

    fn flush_host(&self) {
        self.inner.host.flush();
    }

    pub(crate) fn downgrade(&self) -> WeakStore {
        WeakStore(Rc::downgrade(&self.inner))
    }

    pub(crate) fn has_mutation(&self, kind: &str) -> bool {
        self.inner.table.borrow().has_mutation(kind)
    }

    pub(crate) fn has_action(&self, kind: &str) -> bool {
        self.inner.table.borrow().has_action(kind)
    }

    pub(crate) fn has_getter(&self, name: &str) -> bool {
        self.inner.projection.borrow().getters.contains_key(name)
    }

    pub(crate) fn getter_names(&self) -> Vec<String> {
        self.inner.projection.borrow().getters.keys().cloned().collect()
    }

    pub(crate) fn getter_value(&self, name: &str) -> Option<Value> {
        let cached = self.inner.projection.borrow().getters.get(name).cloned();
        cached.map(|getter| getter.get())
    }

    /// Local getter name to global getter name, for every getter under
    /// `namespace`. Built once per projection.
    pub(crate) fn local_getter_keys(&self, namespace: &str) -> Rc<BTreeMap<String, String>> {
        if let Some(keys) = self.inner.local_getters.borrow().get(namespace) {
            return keys.clone();
        }
        let keys: BTreeMap<String, String> = self
            .inner
            .projection
            .borrow()
            .getters
            .keys()
            .filter_map(|global| {
                global
                    .strip_prefix(namespace)
                    .map(|local| (local.to_string(), global.clone()))
            })
            .collect();
        let keys = Rc::new(keys);
        self.inner
            .local_getters
            .borrow_mut()
            .insert(namespace.to_string(), keys.clone());
        keys
    }

    fn with_commit<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = CommitGuard {
            flag: &self.inner.committing,
            previous: self.inner.committing.replace(true),
        };
        f()
    }

    fn install_module(&self, path: &Path, hot: bool) {
        self.install(
            path,
            InstallMode {
                splice_state: !hot,
                index: true,
            },
        );
    }

    /// Install the module at `path` and every module below it, parents
    /// before children.
    fn install(&self, path: &Path, mode: InstallMode) {
        for entry in self.plan_installation(path) {
            if mode.index && entry.namespaced {
                self.inner
                    .table
                    .borrow_mut()
                    .register_namespace(&entry.namespace, &entry.path);
            }

            if mode.splice_state && !entry.path.is_empty() {
                self.splice_state(&entry.path, &entry.state);
            }

            if mode.index {
                let mut table = self.inner.table.borrow_mut();
                for (key, handler) in entry.mutations {
                    table.register_mutation(
                        format!("{}{}", entry.namespace, key),
                        WrappedMutation::new(entry.path.clone(), handler),
                    );
                }
                for (key, action) in entry.actions {
                    let kind = if action.root {
                        key
                    } else {
                        format!("{}{}", entry.namespace, key)
                    };
                    table.register_action(
                        kind,
                        WrappedAction::new(entry.context.clone(), action.handler),
                    );
                }
                for (key, getter) in entry.getters {
                    table.register_getter(
                        format!("{}{}", entry.namespace, key),
                        WrappedGetter::new(entry.context.clone(), getter),
                    );
                }
            }
        }
    }

    /// Snapshot what `install` needs from the tree and hand every node its
    /// context. No user code runs while the tree is borrowed.
    fn plan_installation(&self, path: &Path) -> Vec<Installation> {
        let mut modules = self.inner.modules.borrow_mut();
        let mut paths = Vec::new();
        match modules.get(path) {
            Some(node) => collect_paths(node, path.clone(), &mut paths),
            None => {
                error!("cannot install missing module '{}'", path.dotted());
                return Vec::new();
            }
        }

        let mut plan = Vec::with_capacity(paths.len());
        for path in paths {
            let namespace = modules.get_namespace(&path);
            let context = LocalContext::new(self.downgrade(), namespace.clone(), path.clone());
            let Some(node) = modules.get_mut(&path) else {
                continue;
            };
            node.set_context(context.clone());
            plan.push(Installation {
                namespaced: node.namespaced(),
                state: node.state().clone(),
                mutations: node
                    .mutations()
                    .map(|(k, h)| (k.clone(), h.clone()))
                    .collect(),
                actions: node.actions().map(|(k, a)| (k.clone(), a.clone())).collect(),
                getters: node.getters().map(|(k, g)| (k.clone(), g.clone())).collect(),
                path,
                namespace,
                context,
            });
        }
        plan
    }

    /// Set the module's initial state as a field of its parent's state.
    fn splice_state(&self, path: &Path, state: &Value) {
        let Some(key) = path.last() else {
            return;
        };
        self.with_commit(|| {
            self.inner.state.update(&mut |root| {
                if root.get(path).is_some() {
                    warn!(
                        "state field \"{}\" was overridden by a module with the same name at \"{}\"",
                        key,
                        path.dotted()
                    );
                }
                if let Err(e) = root.set(path, state.clone()) {
                    error!("cannot install state of module '{}': {}", path.dotted(), e);
                }
            });
        });
    }

    /// Rebuild every index from the tree, then the projection. State is left
    /// alone.
    fn reset_store(&self, hot: bool) {
        *self.inner.table.borrow_mut() = DispatchTable::default();
        self.install(
            &Path::root(),
            InstallMode {
                splice_state: false,
                index: true,
            },
        );
        self.reset_projection(hot);
        debug!(hot, "store indexes rebuilt");
    }

    /// Build a fresh computed value per getter and retire the old ones on
    /// the next tick.
    fn reset_projection(&self, hot: bool) {
        self.inner.local_getters.borrow_mut().clear();

        let wrapped: Vec<(String, WrappedGetter)> = self
            .inner
            .table
            .borrow()
            .getters
            .iter()
            .map(|(k, g)| (k.clone(), g.clone()))
            .collect();

        let mut getters = BTreeMap::new();
        for (key, getter) in wrapped {
            let store = self.downgrade();
            let computed = self.inner.host.define_computed(Box::new(move || {
                match store.upgrade() {
                    Some(store) => getter.evaluate(&store),
                    None => Value::Null,
                }
            }));
            getters.insert(key, computed);
        }

        let strict_watch = self.inner.config.strict.then(|| self.enable_strict_mode());
        let previous = self.inner.projection.replace(Projection {
            getters,
            strict_watch,
        });

        if hot {
            self.with_commit(|| self.inner.state.touch());
        }
        self.inner.host.next_tick(Box::new(move || drop(previous)));
    }

    /// A synchronous deep watch on the root that panics on any change made
    /// outside a commit.
    fn enable_strict_mode(&self) -> Unwatch {
        let root = self.inner.state.clone();
        let store = self.downgrade();
        self.inner.host.watch(
            Box::new(move || {
                root.get();
                Value::Null
            }),
            Box::new(move |_: &Value, _: &Value| {
                if let Some(store) = store.upgrade() {
                    assert!(store.is_committing(), "{}", STRICT_VIOLATION);
                }
            }),
            WatchOptions::default().deep().sync(),
        )
    }
}

/// One handler's result as is, several as an array. The first failure in
/// handler order wins.
fn merge_results(mut results: Vec<Result<Value>>) -> Result<Value> {
    if results.len() == 1 {
        return results.pop().unwrap_or(Ok(Value::Null));
    }
    results
        .into_iter()
        .collect::<Result<Vec<_>>>()
        .map(Value::Array)
}

fn collect_paths(node: &ModuleNode, path: Path, out: &mut Vec<Path>) {
    out.push(path.clone());
    for (key, child) in node.children() {
        collect_paths(child, path.child(key), out);
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.inner.state.peek())
            .field("config", &self.inner.config)
            .field("getters", &self.getter_names())
            .finish()
    }
}
