//! Module-local views of the store.
//!
//! Handlers never see the store directly. A [`LocalContext`] scopes commit,
//! dispatch, state and getters to one module: inside a namespaced module
//! `commit("add", ..)` means `commit("cart/add", ..)`, and `state()` is the
//! module's own slice of the root state.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use futures::future::{self, FutureExt};
use serde::de::DeserializeOwned;
use statetree_value::{from_value, Path, Value, NULL};
use tracing::error;

use crate::dispatch::unify_object_style;
use crate::error::{Error, Result};
use crate::module::ActionFuture;
use crate::options::{CommitOptions, DispatchOptions};
use crate::store::{Store, WeakStore};

/// A read of the current root state, narrowed to one module's slice.
///
/// Dereferences to `Null` if the module has no state at its path.
pub struct StateRef {
    root: Rc<Value>,
    path: Path,
}

impl StateRef {
    pub(crate) fn new(root: Rc<Value>, path: Path) -> Self {
        Self { root, path }
    }

    /// The root snapshot this slice was taken from.
    pub fn root(&self) -> &Rc<Value> {
        &self.root
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Deref for StateRef {
    type Target = Value;

    fn deref(&self) -> &Value {
        self.root.get(&self.path).unwrap_or(&NULL)
    }
}

impl fmt::Debug for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

#[derive(Clone)]
enum Scope {
    Root,
    /// Local name to fully-qualified name.
    Local(Rc<BTreeMap<String, String>>),
}

/// Read-only access to getter values.
///
/// Root getters are keyed by fully-qualified name. The getters of a
/// namespaced module's context are keyed by local name.
#[derive(Clone)]
pub struct Getters {
    store: WeakStore,
    scope: Scope,
}

impl Getters {
    pub(crate) fn root(store: WeakStore) -> Self {
        Self {
            store,
            scope: Scope::Root,
        }
    }

    pub(crate) fn local(store: WeakStore, keys: Rc<BTreeMap<String, String>>) -> Self {
        Self {
            store,
            scope: Scope::Local(keys),
        }
    }

    /// Current value of a getter, recomputed only if its inputs changed.
    pub fn get(&self, name: &str) -> Option<Value> {
        let store = self.store.upgrade()?;
        match &self.scope {
            Scope::Root => store.getter_value(name),
            Scope::Local(keys) => store.getter_value(keys.get(name)?),
        }
    }

    /// Like [`Getters::get`], decoded into a Rust type.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        from_value(&self.get(name)?).ok()
    }

    pub fn contains(&self, name: &str) -> bool {
        match &self.scope {
            Scope::Root => self
                .store
                .upgrade()
                .is_some_and(|store| store.has_getter(name)),
            Scope::Local(keys) => keys.contains_key(name),
        }
    }

    pub fn names(&self) -> Vec<String> {
        match &self.scope {
            Scope::Root => self
                .store
                .upgrade()
                .map(|store| store.getter_names())
                .unwrap_or_default(),
            Scope::Local(keys) => keys.keys().cloned().collect(),
        }
    }
}

impl fmt::Debug for Getters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// Commit, dispatch, state and getters as seen from one module.
#[derive(Clone)]
pub struct LocalContext {
    store: WeakStore,
    namespace: String,
    path: Path,
}

impl LocalContext {
    pub(crate) fn new(store: WeakStore, namespace: String, path: Path) -> Self {
        Self {
            store,
            namespace,
            path,
        }
    }

    /// The namespace prefix, `""` for modules outside any namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The module's location in the tree and in the state.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The module's state, looked up in the current root on every call.
    pub fn state(&self) -> StateRef {
        let root = match self.store.upgrade() {
            Some(store) => store.state(),
            None => Rc::new(Value::Null),
        };
        StateRef::new(root, self.path.clone())
    }

    pub fn getters(&self) -> Getters {
        match self.store.upgrade() {
            Some(store) if !self.namespace.is_empty() => {
                Getters::local(self.store.clone(), store.local_getter_keys(&self.namespace))
            }
            _ => Getters::root(self.store.clone()),
        }
    }

    pub fn commit(&self, kind: &str, payload: impl Into<Value>) {
        self.commit_with(kind, payload, CommitOptions::default());
    }

    pub fn commit_with(&self, kind: &str, payload: impl Into<Value>, options: CommitOptions) {
        let Some(store) = self.store.upgrade() else {
            error!("commit of {} after the store was dropped", kind);
            return;
        };
        if self.namespace.is_empty() || options.root {
            store.commit_with(kind, payload, options);
            return;
        }
        let qualified = format!("{}{}", self.namespace, kind);
        if !store.has_mutation(&qualified) {
            error!(
                "unknown local mutation type: {}, global type: {}",
                kind, qualified
            );
            return;
        }
        store.commit_with(&qualified, payload, options);
    }

    /// Object-style commit: the object's `type` field names the mutation.
    ///
    /// # Errors
    ///
    /// [`Error::ContractViolation`] if `type` is missing or not a string.
    pub fn commit_object(&self, object: Value, options: CommitOptions) -> Result<()> {
        let (kind, payload) = unify_object_style(object)?;
        self.commit_with(&kind, payload, options);
        Ok(())
    }

    pub fn dispatch(&self, kind: &str, payload: impl Into<Value>) -> ActionFuture {
        self.dispatch_with(kind, payload, DispatchOptions::default())
    }

    pub fn dispatch_with(
        &self,
        kind: &str,
        payload: impl Into<Value>,
        options: DispatchOptions,
    ) -> ActionFuture {
        let Some(store) = self.store.upgrade() else {
            return future::ready(Err(Error::StoreDropped)).boxed_local();
        };
        if self.namespace.is_empty() || options.root {
            return store.dispatch(kind, payload);
        }
        let qualified = format!("{}{}", self.namespace, kind);
        if !store.has_action(&qualified) {
            error!(
                "unknown local action type: {}, global type: {}",
                kind, qualified
            );
            return future::ready(Ok(Value::Null)).boxed_local();
        }
        store.dispatch(&qualified, payload)
    }

    /// Object-style dispatch: the object's `type` field names the action.
    pub fn dispatch_object(&self, object: Value, options: DispatchOptions) -> ActionFuture {
        match unify_object_style(object) {
            Ok((kind, payload)) => self.dispatch_with(&kind, payload, options),
            Err(e) => future::ready(Err(e)).boxed_local(),
        }
    }

    pub(crate) fn action_context(&self) -> ActionContext {
        ActionContext {
            local: self.clone(),
        }
    }
}

impl fmt::Debug for LocalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalContext")
            .field("namespace", &self.namespace)
            .field("path", &self.path)
            .finish()
    }
}

/// What an action handler receives: its module's local context plus the
/// root state and root getters.
///
/// State and getters are read when asked for, so an action sees the effect
/// of its own commits.
#[derive(Clone, Debug)]
pub struct ActionContext {
    local: LocalContext,
}

impl ActionContext {
    pub fn commit(&self, kind: &str, payload: impl Into<Value>) {
        self.local.commit(kind, payload);
    }

    pub fn commit_with(&self, kind: &str, payload: impl Into<Value>, options: CommitOptions) {
        self.local.commit_with(kind, payload, options);
    }

    pub fn commit_object(&self, object: Value, options: CommitOptions) -> Result<()> {
        self.local.commit_object(object, options)
    }

    pub fn dispatch(&self, kind: &str, payload: impl Into<Value>) -> ActionFuture {
        self.local.dispatch(kind, payload)
    }

    pub fn dispatch_with(
        &self,
        kind: &str,
        payload: impl Into<Value>,
        options: DispatchOptions,
    ) -> ActionFuture {
        self.local.dispatch_with(kind, payload, options)
    }

    pub fn dispatch_object(&self, object: Value, options: DispatchOptions) -> ActionFuture {
        self.local.dispatch_object(object, options)
    }

    pub fn state(&self) -> StateRef {
        self.local.state()
    }

    pub fn getters(&self) -> Getters {
        self.local.getters()
    }

    pub fn root_state(&self) -> Rc<Value> {
        self.local
            .store
            .upgrade()
            .map_or_else(|| Rc::new(Value::Null), |store| store.state())
    }

    pub fn root_getters(&self) -> Getters {
        Getters::root(self.local.store.clone())
    }

    /// The underlying module context.
    pub fn context(&self) -> &LocalContext {
        &self.local
    }

    /// The store itself, if it is still alive.
    pub fn store(&self) -> Option<Store> {
        self.local.store.upgrade()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statetree_value::path;

    #[test]
    fn state_ref_narrows_to_path() {
        let root = Rc::new(Value::from(serde_json::json!({"cart": {"items": [1, 2]}})));
        let slice = StateRef::new(root.clone(), path!("cart"));
        assert_eq!(
            slice.field("items").and_then(Value::as_array).map(Vec::len),
            Some(2)
        );
        assert!(Rc::ptr_eq(slice.root(), &root));
    }

    #[test]
    fn state_ref_missing_path_is_null() {
        let slice = StateRef::new(Rc::new(Value::map()), path!("gone"));
        assert!(slice.is_null());
        assert_eq!(format!("{:?}", slice), "Null");
    }

    #[test]
    fn detached_context_is_inert() {
        let context = LocalContext::new(WeakStore::detached(), "cart/".into(), path!("cart"));
        assert!(context.state().is_null());
        assert!(context.getters().names().is_empty());
        assert!(context.getters().get("total").is_none());
        context.commit("add", 1);
    }
}
