//! Store construction and per-call options.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use statetree_reactive::ReactiveHost;
use statetree_value::Path;

use crate::error::{Error, Result};
use crate::module::ModuleDef;
use crate::store::Store;

/// Serializable store settings.
///
/// ```rust
/// use statetree_store::StoreConfig;
///
/// let config = StoreConfig::from_json(r#"{"strict": true}"#).unwrap();
/// assert!(config.strict);
/// assert!(!config.devtools);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Panic when state changes outside a mutation handler.
    pub strict: bool,
    /// Log every mutation and action at debug level under the
    /// `statetree::devtools` target.
    pub devtools: bool,
}

impl StoreConfig {
    /// # Errors
    ///
    /// [`Error::Config`] if the JSON is malformed or has a field of the
    /// wrong type.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config {
            message: e.to_string(),
        })
    }
}

/// A plugin, called once with the store at the end of construction.
pub type Plugin = Rc<dyn Fn(&Store)>;

/// Everything needed to build a [`Store`].
pub struct StoreOptions {
    pub module: ModuleDef,
    pub config: StoreConfig,
    pub plugins: Vec<Plugin>,
    /// Reactivity host. Defaults to a fresh `SignalHost`.
    pub host: Option<Rc<dyn ReactiveHost>>,
}

impl StoreOptions {
    pub fn new(module: ModuleDef) -> Self {
        Self {
            module,
            config: StoreConfig::default(),
            plugins: Vec::new(),
            host: None,
        }
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.config.strict = strict;
        self
    }

    pub fn devtools(mut self, devtools: bool) -> Self {
        self.config.devtools = devtools;
        self
    }

    pub fn plugin(mut self, plugin: impl Fn(&Store) + 'static) -> Self {
        self.plugins.push(Rc::new(plugin));
        self
    }

    pub fn host(mut self, host: Rc<dyn ReactiveHost>) -> Self {
        self.host = Some(host);
        self
    }
}

impl From<ModuleDef> for StoreOptions {
    fn from(module: ModuleDef) -> Self {
        Self::new(module)
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("module", &self.module)
            .field("config", &self.config)
            .field("plugins", &self.plugins.len())
            .field("host", &self.host.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// From a module context: use the type as given, without the namespace.
    pub root: bool,
    /// No longer has any effect; reported as deprecated.
    pub silent: bool,
}

impl CommitOptions {
    pub fn root() -> Self {
        Self {
            root: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// From a module context: use the type as given, without the namespace.
    pub root: bool,
}

impl DispatchOptions {
    pub fn root() -> Self {
        Self { root: true }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterOptions {
    /// Keep the state already present at the module's path instead of
    /// installing the module's initial state.
    pub preserve_state: bool,
}

impl RegisterOptions {
    pub fn preserve_state() -> Self {
        Self {
            preserve_state: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Run before the subscribers already registered.
    pub prepend: bool,
}

impl SubscribeOptions {
    pub fn prepend() -> Self {
        Self { prepend: true }
    }
}

/// Things that name a module location: `"cart/items"`, `["cart", "items"]`,
/// or a [`Path`].
pub trait IntoModulePath {
    fn into_module_path(self) -> Result<Path>;
}

impl IntoModulePath for Path {
    fn into_module_path(self) -> Result<Path> {
        Ok(self)
    }
}

impl IntoModulePath for &Path {
    fn into_module_path(self) -> Result<Path> {
        Ok(self.clone())
    }
}

impl IntoModulePath for &str {
    fn into_module_path(self) -> Result<Path> {
        Ok(Path::parse(self)?)
    }
}

impl IntoModulePath for String {
    fn into_module_path(self) -> Result<Path> {
        self.as_str().into_module_path()
    }
}

impl IntoModulePath for Vec<&str> {
    fn into_module_path(self) -> Result<Path> {
        Ok(Path::try_from_components(self)?)
    }
}

impl IntoModulePath for &[&str] {
    fn into_module_path(self) -> Result<Path> {
        Ok(Path::try_from_components(self.iter().copied())?)
    }
}

impl<const N: usize> IntoModulePath for [&str; N] {
    fn into_module_path(self) -> Result<Path> {
        Ok(Path::try_from_components(self)?)
    }
}
