//! The flat lookup tables built from the module tree.

use std::collections::{BTreeMap, HashMap};

use statetree_value::{Path, Value};
use tracing::error;

use crate::context::LocalContext;
use crate::error::{kind_of, Error, Result};
use crate::module::{ActionFuture, ActionHandler, GetterHandler, MutationHandler};
use crate::store::Store;

/// A mutation handler bound to the state path of its module.
#[derive(Clone)]
pub(crate) struct WrappedMutation {
    path: Path,
    handler: MutationHandler,
}

impl WrappedMutation {
    pub fn new(path: Path, handler: MutationHandler) -> Self {
        Self { path, handler }
    }

    /// Run the handler against the module's slice of `root`.
    pub fn apply(&self, kind: &str, root: &mut Value, payload: &Value) {
        match root.get_mut(&self.path) {
            Some(local) => (self.handler)(local, payload),
            None => error!(
                "skipping mutation {}: no state at module path '{}'",
                kind,
                self.path.dotted()
            ),
        }
    }
}

/// An action handler bound to its module's context.
#[derive(Clone)]
pub(crate) struct WrappedAction {
    context: LocalContext,
    handler: ActionHandler,
}

impl WrappedAction {
    pub fn new(context: LocalContext, handler: ActionHandler) -> Self {
        Self { context, handler }
    }

    pub fn invoke(&self, payload: Value) -> ActionFuture {
        (self.handler)(self.context.action_context(), payload)
    }
}

/// A getter bound to its module's context.
#[derive(Clone)]
pub(crate) struct WrappedGetter {
    context: LocalContext,
    getter: GetterHandler,
}

impl WrappedGetter {
    pub fn new(context: LocalContext, getter: GetterHandler) -> Self {
        Self { context, getter }
    }

    pub fn evaluate(&self, store: &Store) -> Value {
        let root_state = store.state();
        let local_state = self.context.state();
        let local_getters = self.context.getters();
        let root_getters = store.getters();
        (self.getter)(&*local_state, &local_getters, &*root_state, &root_getters)
    }
}

/// Handlers indexed by fully-qualified type.
#[derive(Default)]
pub(crate) struct DispatchTable {
    pub mutations: HashMap<String, Vec<WrappedMutation>>,
    pub actions: HashMap<String, Vec<WrappedAction>>,
    pub getters: BTreeMap<String, WrappedGetter>,
    pub namespaces: HashMap<String, Path>,
}

impl DispatchTable {
    pub fn register_namespace(&mut self, namespace: &str, path: &Path) {
        if let Some(existing) = self.namespaces.get(namespace) {
            error!(
                "duplicate namespace {} for the namespaced module {} (already used by {})",
                namespace,
                path.dotted(),
                existing.dotted()
            );
            return;
        }
        self.namespaces.insert(namespace.to_string(), path.clone());
    }

    pub fn register_mutation(&mut self, kind: String, mutation: WrappedMutation) {
        self.mutations.entry(kind).or_default().push(mutation);
    }

    pub fn register_action(&mut self, kind: String, action: WrappedAction) {
        self.actions.entry(kind).or_default().push(action);
    }

    /// The first getter registered under a name wins.
    pub fn register_getter(&mut self, kind: String, getter: WrappedGetter) {
        if self.getters.contains_key(&kind) {
            error!("duplicate getter key: {}", kind);
            return;
        }
        self.getters.insert(kind, getter);
    }

    pub fn has_mutation(&self, kind: &str) -> bool {
        self.mutations.contains_key(kind)
    }

    pub fn has_action(&self, kind: &str) -> bool {
        self.actions.contains_key(kind)
    }
}

/// Split an object-style call (`{"type": "increment", "amount": 1}`) into
/// its type and payload. The whole object is the payload.
///
/// # Errors
///
/// [`Error::ContractViolation`] when `type` is missing or not a string.
pub(crate) fn unify_object_style(object: Value) -> Result<(String, Value)> {
    match object.field("type") {
        Some(Value::String(kind)) => Ok((kind.clone(), object)),
        Some(other) => Err(Error::contract(format!(
            "expects string as the type, but found {}",
            kind_of(other)
        ))),
        None => Err(Error::contract(format!(
            "expects string as the type, but found {}",
            kind_of(&Value::Null)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statetree_value::path;
    use std::rc::Rc;

    #[test]
    fn object_style_keeps_whole_object_as_payload() {
        let object = Value::from(serde_json::json!({"type": "add", "amount": 2}));
        let (kind, payload) = unify_object_style(object.clone()).unwrap();
        assert_eq!(kind, "add");
        assert_eq!(payload, object);
    }

    #[test]
    fn object_style_requires_string_type() {
        let err = unify_object_style(Value::from(serde_json::json!({"type": 3}))).unwrap_err();
        assert_eq!(err.to_string(), "expects string as the type, but found number");

        let err = unify_object_style(Value::map()).unwrap_err();
        assert!(matches!(err, Error::ContractViolation { .. }));
    }

    #[test]
    fn mutation_applies_to_local_slice() {
        let handler: MutationHandler = Rc::new(|state, payload| {
            *state = payload.clone();
        });
        let mutation = WrappedMutation::new(path!("cart/total"), handler);
        let mut root = Value::from(serde_json::json!({"cart": {"total": 1}}));
        mutation.apply("cart/set", &mut root, &Value::from(7));
        assert_eq!(root.get(&path!("cart/total")), Some(&Value::from(7)));
    }

    #[test]
    fn mutation_skips_missing_slice() {
        let handler: MutationHandler = Rc::new(|state, _| *state = Value::from(1));
        let mutation = WrappedMutation::new(path!("gone"), handler);
        let mut root = Value::map();
        mutation.apply("gone/set", &mut root, &Value::Null);
        assert_eq!(root, Value::map());
    }

    #[test]
    fn duplicate_namespace_keeps_first() {
        let mut table = DispatchTable::default();
        table.register_namespace("cart/", &path!("cart"));
        table.register_namespace("cart/", &path!("other"));
        assert_eq!(table.namespaces.get("cart/"), Some(&path!("cart")));
    }

    #[test]
    fn mutations_accumulate_per_type() {
        let mut table = DispatchTable::default();
        let noop: MutationHandler = Rc::new(|_, _| {});
        table.register_mutation("inc".into(), WrappedMutation::new(Path::root(), noop.clone()));
        table.register_mutation("inc".into(), WrappedMutation::new(path!("a"), noop));
        assert_eq!(table.mutations.get("inc").map(Vec::len), Some(2));
        assert!(table.has_mutation("inc"));
        assert!(!table.has_action("inc"));
    }
}
