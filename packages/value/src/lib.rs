//! Statetree values: the data layer of the state container.
//!
//! - `Path`: ordered keys addressing a module, or a field in the state tree
//! - `Value`: the dynamically shaped state tree and every payload
//! - conversions to and from `serde_json` and serde types
//!
//! # Example
//!
//! ```rust
//! use statetree_value::{path, Value};
//!
//! let mut state = Value::from(serde_json::json!({"cart": {"items": []}}));
//! state.set(&path!("cart/checkout_status"), Value::from("pending")).unwrap();
//! assert_eq!(state.get(&path!("cart/checkout_status")).and_then(Value::as_str), Some("pending"));
//! ```

mod convert;
mod error;
mod path;
mod value;

pub use convert::{from_value, json_to_value, to_value, value_to_json};
pub use error::Error;
pub use path::{validate_component, Path, PathError};
pub use value::{Value, NULL};
