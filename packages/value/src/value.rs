//! The Value type - the dynamically shaped state tree.

use std::collections::BTreeMap;

use crate::{Error, Path};

/// A tree-shaped value. The whole application state is one `Value`, and every
/// payload passed to a mutation or action is one too.
///
/// Maps use `BTreeMap` so iteration, comparison and debug output are
/// deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

/// A shared `Null`, handed out when a lookup misses.
pub static NULL: Value = Value::Null;

impl Value {
    /// Create an empty map.
    pub fn map() -> Self {
        Value::Map(BTreeMap::new())
    }

    /// Create an empty array.
    pub fn array() -> Self {
        Value::Array(Vec::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view. Floats with no fractional part are accepted.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a direct child of a map by key.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.as_map()?.get(key)
    }

    /// Mutable direct child of a map by key.
    pub fn field_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.as_map_mut()?.get_mut(key)
    }

    /// Get a reference to a nested value by path.
    ///
    /// Returns `None` if the path doesn't exist or can't be navigated
    /// (e.g., trying to index into a string).
    pub fn get(&self, path: &Path) -> Option<&Value> {
        let mut current = self;
        for component in path.iter() {
            current = match current {
                Value::Map(map) => map.get(component)?,
                Value::Array(arr) => {
                    let index: usize = component.parse().ok()?;
                    arr.get(index)?
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// Get a mutable reference to a nested value by path.
    pub fn get_mut(&mut self, path: &Path) -> Option<&mut Value> {
        let mut current = self;
        for component in path.iter() {
            current = match current {
                Value::Map(map) => map.get_mut(component)?,
                Value::Array(arr) => {
                    let index: usize = component.parse().ok()?;
                    arr.get_mut(index)?
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// Set a value at a path, creating intermediate maps as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the path traverses a non-container value.
    pub fn set(&mut self, path: &Path, value: Value) -> Result<(), Error> {
        let Some(last) = path.last() else {
            *self = value;
            return Ok(());
        };

        let mut current = self;
        for component in path.parent().iter() {
            current = match current {
                Value::Map(map) => map
                    .entry(component.clone())
                    .or_insert_with(|| Value::Map(BTreeMap::new())),
                Value::Array(arr) => {
                    let index = parse_index(component)?;
                    arr.get_mut(index).ok_or_else(|| Error::InvalidPath {
                        message: format!("array index {} out of bounds", index),
                    })?
                }
                _ => {
                    return Err(Error::InvalidPath {
                        message: format!(
                            "cannot navigate through non-container at '{}'",
                            component
                        ),
                    });
                }
            };
        }

        match current {
            Value::Map(map) => {
                map.insert(last.to_string(), value);
                Ok(())
            }
            Value::Array(arr) => {
                let index = parse_index(last)?;
                if index < arr.len() {
                    arr[index] = value;
                } else if index == arr.len() {
                    arr.push(value);
                } else {
                    return Err(Error::InvalidPath {
                        message: format!("array index {} out of bounds", index),
                    });
                }
                Ok(())
            }
            _ => Err(Error::InvalidPath {
                message: format!("cannot set child '{}' on non-container value", last),
            }),
        }
    }

    /// Remove the value at a path, returning it if it existed.
    ///
    /// Removing the root resets this value to `Null`.
    pub fn remove(&mut self, path: &Path) -> Option<Value> {
        let Some(last) = path.last() else {
            return Some(std::mem::take(self));
        };

        match self.get_mut(&path.parent())? {
            Value::Map(map) => map.remove(last),
            Value::Array(arr) => {
                let index: usize = last.parse().ok()?;
                (index < arr.len()).then(|| arr.remove(index))
            }
            _ => None,
        }
    }
}

fn parse_index(component: &str) -> Result<usize, Error> {
    component.parse().map_err(|_| Error::InvalidPath {
        message: format!("invalid array index: {}", component),
    })
}

// Conversion from common types

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        crate::convert::json_to_value(v)
    }
}
