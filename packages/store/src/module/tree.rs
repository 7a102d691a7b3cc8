//! The module tree: definitions arranged by path.
//!
//! Navigation mirrors a prefix trie keyed by path components, with one
//! [`ModuleNode`] per registered module.

use statetree_value::Path;
use tracing::warn;

use super::def::ModuleDef;
use super::node::ModuleNode;
use crate::error::{Error, Result};

/// The tree of installed modules, rooted at the store's root module.
///
/// ```rust
/// use statetree_store::{ModuleDef, ModuleTree};
/// use statetree_value::path;
///
/// let tree = ModuleTree::new(
///     ModuleDef::new().module(
///         "account",
///         ModuleDef::new()
///             .namespaced(true)
///             .module("profile", ModuleDef::new().namespaced(true)),
///     ),
/// )
/// .unwrap();
///
/// assert_eq!(tree.get_namespace(&path!("account/profile")), "account/profile/");
/// assert!(tree.get(&path!("account")).is_some());
/// ```
pub struct ModuleTree {
    root: ModuleNode,
}

impl ModuleTree {
    /// Build a tree from the root definition and all of its nested modules.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidModule`] if any definition fails validation.
    pub fn new(raw_root: ModuleDef) -> Result<Self> {
        let mut tree = Self {
            root: ModuleNode::new(&ModuleDef::new(), false),
        };
        tree.register(&Path::root(), &raw_root, false)?;
        Ok(tree)
    }

    pub fn root(&self) -> &ModuleNode {
        &self.root
    }

    /// The node at `path`, if every step exists.
    pub fn get(&self, path: &Path) -> Option<&ModuleNode> {
        let mut current = &self.root;
        for key in path.iter() {
            current = current.child(key)?;
        }
        Some(current)
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut ModuleNode> {
        let mut current = &mut self.root;
        for key in path.iter() {
            current = current.child_mut(key)?;
        }
        Some(current)
    }

    /// The namespace prefix of the module at `path`: the keys of every
    /// namespaced module from the root down, each followed by `/`.
    ///
    /// Stops at the first key that doesn't exist.
    pub fn get_namespace(&self, path: &Path) -> String {
        let mut namespace = String::new();
        let mut current = &self.root;
        for key in path.iter() {
            let Some(child) = current.child(key) else {
                break;
            };
            if child.namespaced() {
                namespace.push_str(key);
                namespace.push('/');
            }
            current = child;
        }
        namespace
    }

    /// Validate and register `raw` at `path`, then its nested modules in key
    /// order. A module already at `path` is replaced.
    ///
    /// Registration is not rolled back: if a nested definition is invalid,
    /// the modules registered before it stay in the tree.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidModule`] for a bad definition, or
    /// [`Error::ModuleNotFound`] when the parent of `path` is not registered.
    pub fn register(&mut self, path: &Path, raw: &ModuleDef, runtime: bool) -> Result<()> {
        raw.validate(path)?;
        let node = ModuleNode::new(raw, runtime);

        match path.last() {
            None => self.root = node,
            Some(key) => {
                let parent_path = path.parent();
                let parent = self
                    .get_mut(&parent_path)
                    .ok_or(Error::ModuleNotFound { path: parent_path })?;
                parent.add_child(key, node);
            }
        }

        if let Some(modules) = &raw.modules {
            for (key, child) in modules {
                self.register(&path.child(key), child, runtime)?;
            }
        }
        Ok(())
    }

    /// Remove the runtime module at `path`. Returns whether a module was
    /// removed.
    ///
    /// Modules declared at construction are never removed.
    pub fn unregister(&mut self, path: &Path) -> bool {
        let Some(key) = path.last() else {
            warn!("cannot unregister the root module");
            return false;
        };
        let Some(parent) = self.get_mut(&path.parent()) else {
            warn!(
                "trying to unregister module '{}', which is not registered",
                path.dotted()
            );
            return false;
        };
        match parent.child(key).map(ModuleNode::is_runtime) {
            None => {
                warn!(
                    "trying to unregister module '{}', which is not registered",
                    path.dotted()
                );
                false
            }
            Some(false) => false,
            Some(true) => parent.remove_child(key).is_some(),
        }
    }

    /// Whether a module is registered at `path`. The root is never reported
    /// as registered.
    pub fn is_registered(&self, path: &Path) -> bool {
        match path.last() {
            None => false,
            Some(key) => self
                .get(&path.parent())
                .is_some_and(|parent| parent.has_child(key)),
        }
    }

    /// Apply a new definition to the existing tree, recursing into nested
    /// modules that already exist.
    ///
    /// A nested definition with no live counterpart is reported and ends
    /// the update of its siblings: hot updates can't add modules.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidModule`] for a bad definition. Updates applied before
    /// the failure stay applied.
    pub fn update(&mut self, raw: &ModuleDef) -> Result<()> {
        update_node(&Path::root(), &mut self.root, raw)
    }
}

fn update_node(path: &Path, node: &mut ModuleNode, raw: &ModuleDef) -> Result<()> {
    raw.validate(path)?;
    node.update(raw);

    if let Some(modules) = &raw.modules {
        for (key, child_raw) in modules {
            let Some(child) = node.child_mut(key) else {
                warn!(
                    "trying to add a new module '{}' on hot reloading, manual reload is needed",
                    key
                );
                return Ok(());
            };
            update_node(&path.child(key), child, child_raw)?;
        }
    }
    Ok(())
}
