//! Mutation and action subscribers.

use std::fmt;
use std::rc::Rc;

use statetree_value::Value;

use crate::error::{Error, Result};

/// A committed mutation, as seen by subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord {
    /// Fully-qualified mutation type.
    pub kind: String,
    pub payload: Value,
}

/// A dispatched action, as seen by action subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRecord {
    /// Fully-qualified action type.
    pub kind: String,
    pub payload: Value,
}

/// Called after every commit with the record and the post-commit state.
pub type MutationSubscriber = Rc<dyn Fn(&MutationRecord, &Value)>;

/// Called around an action with the record and the current state.
pub type ActionHook = Rc<dyn Fn(&ActionRecord, &Value) -> Result<()>>;

/// Called when an action fails, with the error it failed with.
pub type ActionErrorHook = Rc<dyn Fn(&ActionRecord, &Value, &Error) -> Result<()>>;

/// Hooks into the action lifecycle.
///
/// An error returned from any hook is logged and otherwise ignored: it never
/// changes the outcome of the action or stops the remaining subscribers.
#[derive(Clone, Default)]
pub struct ActionSubscriber {
    pub(crate) before: Option<ActionHook>,
    pub(crate) after: Option<ActionHook>,
    pub(crate) error: Option<ActionErrorHook>,
}

impl ActionSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// The plain-function form: a subscriber with only a `before` hook.
    pub fn from_fn(hook: impl Fn(&ActionRecord, &Value) -> Result<()> + 'static) -> Self {
        Self::new().before(hook)
    }

    /// Runs when the action is dispatched, before its handlers.
    pub fn before(mut self, hook: impl Fn(&ActionRecord, &Value) -> Result<()> + 'static) -> Self {
        self.before = Some(Rc::new(hook));
        self
    }

    /// Runs once every handler has completed successfully.
    pub fn after(mut self, hook: impl Fn(&ActionRecord, &Value) -> Result<()> + 'static) -> Self {
        self.after = Some(Rc::new(hook));
        self
    }

    /// Runs when a handler fails.
    pub fn error(
        mut self,
        hook: impl Fn(&ActionRecord, &Value, &Error) -> Result<()> + 'static,
    ) -> Self {
        self.error = Some(Rc::new(hook));
        self
    }
}

impl fmt::Debug for ActionSubscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSubscriber")
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}

/// Ordered subscriber list with stable ids for removal.
pub(crate) struct SubscriberList<T> {
    entries: Vec<(u64, T)>,
    next_id: u64,
}

impl<T: Clone> SubscriberList<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    pub fn add(&mut self, subscriber: T, prepend: bool) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        if prepend {
            self.entries.insert(0, (id, subscriber));
        } else {
            self.entries.push((id, subscriber));
        }
        id
    }

    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    /// A copy of the list, safe to iterate while subscribers come and go.
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.iter().map(|(_, s)| s.clone()).collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Handle returned by `subscribe`. Dropping it keeps the subscriber
/// registered.
pub struct Subscription {
    remove: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(remove: impl FnOnce() + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    /// Remove the subscriber. Calling this again does nothing.
    pub fn unsubscribe(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }

    pub fn is_active(&self) -> bool {
        self.remove.is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
