use std::collections::BTreeMap;

use statetree_value::Value;

use super::def::{ActionDef, GetterHandler, ModuleDef, MutationHandler};
use crate::context::LocalContext;

/// One installed module: its handlers, initial state and children.
pub struct ModuleNode {
    raw: ModuleDef,
    state: Value,
    children: BTreeMap<String, ModuleNode>,
    runtime: bool,
    context: Option<LocalContext>,
}

impl ModuleNode {
    /// Build a node from a definition. Nested modules are ignored here; the
    /// tree registers them as separate nodes.
    pub fn new(raw: &ModuleDef, runtime: bool) -> Self {
        let state = raw
            .state
            .as_ref()
            .map_or_else(Value::map, |state| state.produce());
        Self {
            raw: raw.shallow(),
            state,
            children: BTreeMap::new(),
            runtime,
            context: None,
        }
    }

    pub fn namespaced(&self) -> bool {
        self.raw.namespaced
    }

    /// True when the node was added by `register_module` after construction.
    pub fn is_runtime(&self) -> bool {
        self.runtime
    }

    /// The state this module contributed at instantiation.
    pub fn state(&self) -> &Value {
        &self.state
    }

    pub fn child(&self, key: &str) -> Option<&ModuleNode> {
        self.children.get(key)
    }

    pub fn child_mut(&mut self, key: &str) -> Option<&mut ModuleNode> {
        self.children.get_mut(key)
    }

    pub fn has_child(&self, key: &str) -> bool {
        self.children.contains_key(key)
    }

    pub fn add_child(&mut self, key: impl Into<String>, child: ModuleNode) {
        self.children.insert(key.into(), child);
    }

    pub fn remove_child(&mut self, key: &str) -> Option<ModuleNode> {
        self.children.remove(key)
    }

    /// Children in key order.
    pub fn children(&self) -> impl Iterator<Item = (&String, &ModuleNode)> {
        self.children.iter()
    }

    /// Swap in the handler maps a definition supplies. Maps it omits stay as
    /// they are; `namespaced` is always taken from the new definition.
    pub fn update(&mut self, raw: &ModuleDef) {
        self.raw.namespaced = raw.namespaced;
        if let Some(mutations) = &raw.mutations {
            self.raw.mutations = Some(mutations.clone());
        }
        if let Some(actions) = &raw.actions {
            self.raw.actions = Some(actions.clone());
        }
        if let Some(getters) = &raw.getters {
            self.raw.getters = Some(getters.clone());
        }
    }

    pub fn mutations(&self) -> impl Iterator<Item = (&String, &MutationHandler)> {
        self.raw.mutations.iter().flatten()
    }

    pub fn actions(&self) -> impl Iterator<Item = (&String, &ActionDef)> {
        self.raw.actions.iter().flatten()
    }

    pub fn getters(&self) -> impl Iterator<Item = (&String, &GetterHandler)> {
        self.raw.getters.iter().flatten()
    }

    /// The local context assigned at the last install.
    pub fn context(&self) -> Option<&LocalContext> {
        self.context.as_ref()
    }

    pub(crate) fn set_context(&mut self, context: LocalContext) {
        self.context = Some(context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_state_defaults_to_empty_map() {
        let node = ModuleNode::new(&ModuleDef::new(), false);
        assert_eq!(node.state(), &Value::map());
        assert!(!node.is_runtime());
    }

    #[test]
    fn update_keeps_omitted_maps() {
        let mut node = ModuleNode::new(
            &ModuleDef::new()
                .mutation("a", |_, _| {})
                .getter("g", |_, _, _, _| Value::Null),
            true,
        );
        node.update(&ModuleDef::new().mutation("b", |_, _| {}));

        let mutations: Vec<_> = node.mutations().map(|(k, _)| k.as_str()).collect();
        assert_eq!(mutations, vec!["b"]);
        assert_eq!(node.getters().count(), 1);
    }

    #[test]
    fn update_with_empty_map_clears() {
        let mut node = ModuleNode::new(&ModuleDef::new().mutation("a", |_, _| {}), false);
        node.update(&ModuleDef::new().no_mutations());
        assert_eq!(node.mutations().count(), 0);
    }

    #[test]
    fn children_are_sorted() {
        let mut node = ModuleNode::new(&ModuleDef::new(), false);
        node.add_child("b", ModuleNode::new(&ModuleDef::new(), false));
        node.add_child("a", ModuleNode::new(&ModuleDef::new(), false));
        let keys: Vec<_> = node.children().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert!(node.remove_child("a").is_some());
        assert!(!node.has_child("a"));
    }
}
