//! Error types for the store.

use statetree_value::{Path, PathError, Value};

/// Errors surfaced by store operations and action handlers.
///
/// Most misuse at runtime (unknown mutation types, duplicate namespaces,
/// overridden state fields) is reported through `tracing` and does not
/// produce an `Error`. The variants here cover the calls that are rejected
/// outright.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{field} entry {key:?}{} should be {expected}", in_module(.path))]
    InvalidModule {
        path: Path,
        field: &'static str,
        key: String,
        expected: &'static str,
    },

    #[error("module not found at {path:?}")]
    ModuleNotFound { path: Path },

    #[error("invalid module path: {message}")]
    InvalidModulePath { message: String },

    #[error("{message}")]
    ContractViolation { message: String },

    #[error("invalid store configuration: {message}")]
    Config { message: String },

    #[error("the store has been dropped")]
    StoreDropped,

    #[error("action failed: {message}")]
    Action { message: String },

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Value(#[from] statetree_value::Error),
}

impl Error {
    /// An error raised by an action handler.
    pub fn action(message: impl Into<String>) -> Self {
        Error::Action {
            message: message.into(),
        }
    }

    pub(crate) fn contract(message: impl Into<String>) -> Self {
        Error::ContractViolation {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_module_path(message: impl Into<String>) -> Self {
        Error::InvalidModulePath {
            message: message.into(),
        }
    }
}

fn in_module(path: &Path) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!(" in module {:?}", path.dotted())
    }
}

/// Short name of a value's shape, for diagnostics.
pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Integer(_) | Value::Float(_) => "number",
        Value::String(_) => "string",
        Value::Bytes(_) => "bytes",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use statetree_value::path;

    #[test]
    fn invalid_module_message_names_location() {
        let err = Error::InvalidModule {
            path: path!("cart/items"),
            field: "mutations",
            key: "".to_string(),
            expected: "a non-empty type name",
        };
        assert_eq!(
            err.to_string(),
            "mutations entry \"\" in module \"cart.items\" should be a non-empty type name"
        );
    }

    #[test]
    fn invalid_module_message_at_root() {
        let err = Error::InvalidModule {
            path: Path::root(),
            field: "getters",
            key: "a b".to_string(),
            expected: "a type name without whitespace",
        };
        assert_eq!(
            err.to_string(),
            "getters entry \"a b\" should be a type name without whitespace"
        );
    }

    #[test]
    fn path_errors_convert() {
        let err: Error = Path::parse("bad key").unwrap_err().into();
        assert!(matches!(err, Error::Path(_)));
    }

    #[test]
    fn kinds() {
        assert_eq!(kind_of(&Value::from(1)), "number");
        assert_eq!(kind_of(&Value::map()), "map");
    }
}
