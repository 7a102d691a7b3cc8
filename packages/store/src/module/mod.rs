//! Module definitions and the tree they are installed into.

mod def;
mod node;
mod tree;

pub use def::{
    ActionDef, ActionFuture, ActionHandler, GetterHandler, ModuleDef, MutationHandler, StateDef,
};
pub use node::ModuleNode;
pub use tree::ModuleTree;
