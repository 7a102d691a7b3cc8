//! Raw module definitions, as supplied by the user.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture};
use statetree_value::{validate_component, Path, Value};

use crate::context::{ActionContext, Getters};
use crate::error::{Error, Result};

/// A mutation handler: receives the module's local state and the payload.
pub type MutationHandler = Rc<dyn Fn(&mut Value, &Value)>;

/// The future returned by an action.
pub type ActionFuture = LocalBoxFuture<'static, Result<Value>>;

/// An action handler.
pub type ActionHandler = Rc<dyn Fn(ActionContext, Value) -> ActionFuture>;

/// A getter: `(local_state, local_getters, root_state, root_getters)`.
pub type GetterHandler = Rc<dyn Fn(&Value, &Getters, &Value, &Getters) -> Value>;

/// Initial state of a module.
#[derive(Clone)]
pub enum StateDef {
    Value(Value),
    /// Called once per instantiation, so reused definitions don't share state.
    Factory(Rc<dyn Fn() -> Value>),
}

impl StateDef {
    pub(crate) fn produce(&self) -> Value {
        match self {
            StateDef::Value(value) => value.clone(),
            StateDef::Factory(factory) => factory(),
        }
    }
}

impl fmt::Debug for StateDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateDef::Value(value) => f.debug_tuple("Value").field(value).finish(),
            StateDef::Factory(_) => f.write_str("Factory"),
        }
    }
}

/// An action handler plus its registration flag.
#[derive(Clone)]
pub struct ActionDef {
    pub(crate) handler: ActionHandler,
    /// Register under the bare key even inside a namespaced module.
    pub(crate) root: bool,
}

/// A module definition.
///
/// Every map is optional. An omitted map is distinct from an empty one: on
/// [`Store::hot_update`](crate::Store::hot_update) an omitted map leaves the
/// live module's handlers untouched, an empty one clears them.
///
/// ```rust
/// use statetree_store::ModuleDef;
/// use statetree_value::Value;
///
/// let counter = ModuleDef::new()
///     .state(Value::from(serde_json::json!({"count": 0})))
///     .mutation("increment", |state, _| {
///         if let Some(Value::Integer(n)) = state.field_mut("count") {
///             *n += 1;
///         }
///     });
/// assert!(counter.validate(&Default::default()).is_ok());
/// ```
#[derive(Clone, Default)]
pub struct ModuleDef {
    pub(crate) state: Option<StateDef>,
    pub(crate) namespaced: bool,
    pub(crate) mutations: Option<BTreeMap<String, MutationHandler>>,
    pub(crate) actions: Option<BTreeMap<String, ActionDef>>,
    pub(crate) getters: Option<BTreeMap<String, GetterHandler>>,
    pub(crate) modules: Option<BTreeMap<String, ModuleDef>>,
}

impl ModuleDef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial state, cloned for each instantiation.
    pub fn state(mut self, state: impl Into<Value>) -> Self {
        self.state = Some(StateDef::Value(state.into()));
        self
    }

    /// Initial state produced by a factory.
    pub fn state_fn(mut self, factory: impl Fn() -> Value + 'static) -> Self {
        self.state = Some(StateDef::Factory(Rc::new(factory)));
        self
    }

    pub fn namespaced(mut self, namespaced: bool) -> Self {
        self.namespaced = namespaced;
        self
    }

    pub fn mutation<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Value, &Value) + 'static,
    {
        self.mutations
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), Rc::new(handler));
        self
    }

    pub fn action<F, Fut>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ActionContext, Value) -> Fut + 'static,
        Fut: Future<Output = Result<Value>> + 'static,
    {
        self.insert_action(name.into(), boxed(handler), false)
    }

    /// An action registered under its bare key, even in a namespaced module.
    pub fn root_action<F, Fut>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ActionContext, Value) -> Fut + 'static,
        Fut: Future<Output = Result<Value>> + 'static,
    {
        self.insert_action(name.into(), boxed(handler), true)
    }

    /// An action that completes synchronously. Its result is still delivered
    /// through the future returned by `dispatch`.
    pub fn action_sync<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ActionContext, Value) -> Result<Value> + 'static,
    {
        let handler: ActionHandler =
            Rc::new(move |ctx, payload| future::ready(handler(ctx, payload)).boxed_local());
        self.insert_action(name.into(), handler, false)
    }

    pub fn getter<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&Value, &Getters, &Value, &Getters) -> Value + 'static,
    {
        self.getters
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), Rc::new(getter));
        self
    }

    /// A nested module under `key`.
    ///
    /// Nested modules are registered and installed in key order, not in the
    /// order they are declared. When siblings handle the same mutation or
    /// action type, their handlers run in that key order.
    pub fn module(mut self, key: impl Into<String>, module: ModuleDef) -> Self {
        self.modules
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), module);
        self
    }

    /// Declare an empty mutation map. Only meaningful for hot updates.
    pub fn no_mutations(mut self) -> Self {
        self.mutations = Some(BTreeMap::new());
        self
    }

    /// Declare an empty action map. Only meaningful for hot updates.
    pub fn no_actions(mut self) -> Self {
        self.actions = Some(BTreeMap::new());
        self
    }

    /// Declare an empty getter map. Only meaningful for hot updates.
    pub fn no_getters(mut self) -> Self {
        self.getters = Some(BTreeMap::new());
        self
    }

    fn insert_action(mut self, name: String, handler: ActionHandler, root: bool) -> Self {
        self.actions
            .get_or_insert_with(BTreeMap::new)
            .insert(name, ActionDef { handler, root });
        self
    }

    pub fn is_namespaced(&self) -> bool {
        self.namespaced
    }

    /// Check every handler key and child key of this definition (not its
    /// children's contents).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidModule`] naming the first offending entry.
    pub fn validate(&self, path: &Path) -> Result<()> {
        let keys = [
            ("getters", self.getters.as_ref().map(key_list)),
            ("mutations", self.mutations.as_ref().map(key_list)),
            ("actions", self.actions.as_ref().map(key_list)),
        ];
        for (field, names) in keys {
            for key in names.into_iter().flatten() {
                if let Some(expected) = check_type_name(key) {
                    return Err(Error::InvalidModule {
                        path: path.clone(),
                        field,
                        key: key.to_string(),
                        expected,
                    });
                }
            }
        }

        if let Some(modules) = &self.modules {
            for key in modules.keys() {
                if validate_component(key, path.len()).is_err() {
                    return Err(Error::InvalidModule {
                        path: path.clone(),
                        field: "modules",
                        key: key.clone(),
                        expected: "an identifier",
                    });
                }
            }
        }

        Ok(())
    }

    /// This definition without its nested modules.
    pub(crate) fn shallow(&self) -> ModuleDef {
        ModuleDef {
            modules: None,
            ..self.clone()
        }
    }
}

impl fmt::Debug for ModuleDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDef")
            .field("state", &self.state)
            .field("namespaced", &self.namespaced)
            .field("mutations", &self.mutations.as_ref().map(key_list))
            .field("actions", &self.actions.as_ref().map(key_list))
            .field("getters", &self.getters.as_ref().map(key_list))
            .field("modules", &self.modules)
            .finish()
    }
}

fn boxed<F, Fut>(handler: F) -> ActionHandler
where
    F: Fn(ActionContext, Value) -> Fut + 'static,
    Fut: Future<Output = Result<Value>> + 'static,
{
    Rc::new(move |ctx, payload| handler(ctx, payload).boxed_local())
}

fn key_list<V>(map: &BTreeMap<String, V>) -> Vec<&str> {
    map.keys().map(String::as_str).collect()
}

fn check_type_name(key: &str) -> Option<&'static str> {
    if key.is_empty() {
        Some("a non-empty type name")
    } else if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        Some("a type name without whitespace")
    } else if key.starts_with('/') || key.ends_with('/') {
        Some("a type name without leading or trailing '/'")
    } else {
        None
    }
}
