//! Module and state paths.

use std::fmt;

/// Errors related to path parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// A path component is not a valid key.
    InvalidComponent {
        component: String,
        position: usize,
        message: String,
    },
    /// The path string is invalid.
    InvalidPath { message: String },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::InvalidComponent {
                component,
                position,
                message,
            } => {
                write!(
                    f,
                    "invalid path component '{}' at position {}: {}",
                    component, position, message
                )
            }
            PathError::InvalidPath { message } => {
                write!(f, "invalid path: {}", message)
            }
        }
    }
}

impl std::error::Error for PathError {}

/// An ordered sequence of keys from the root of a tree to one node.
///
/// The same type addresses modules in the module tree and fields in the
/// state tree: a module registered at `cart/items` owns the state found at
/// `cart/items` in the root state.
///
/// Components must be Unicode identifiers (per UAX#31) or numeric strings
/// (array indexes into state).
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Path {
    pub components: Vec<String>,
}

impl Path {
    /// The empty path, addressing the root.
    pub fn root() -> Self {
        Path {
            components: Vec::new(),
        }
    }

    /// Parse a `/` separated path string, validating components.
    ///
    /// Empty components are ignored, so `a//b/` and `a/b` are the same path.
    ///
    /// ```rust
    /// use statetree_value::Path;
    ///
    /// let path = Path::parse("cart/items").unwrap();
    /// assert_eq!(path.len(), 2);
    /// assert_eq!(Path::parse("cart/").unwrap(), Path::parse("cart").unwrap());
    /// ```
    pub fn parse(s: &str) -> Result<Self, PathError> {
        let components: Vec<String> = s
            .split('/')
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string())
            .collect();
        Self::try_from_components(components)
    }

    /// Try to create a path from components, validating each.
    pub fn try_from_components<I, S>(components: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let components: Vec<String> = components.into_iter().map(Into::into).collect();
        for (i, component) in components.iter().enumerate() {
            validate_component(component, i)?;
        }
        Ok(Path { components })
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.components.iter()
    }

    /// The final key, or `None` for the root.
    pub fn last(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// Everything but the final key. The parent of the root is the root.
    #[must_use]
    pub fn parent(&self) -> Path {
        let end = self.components.len().saturating_sub(1);
        Path {
            components: self.components[..end].to_vec(),
        }
    }

    /// Extend this path by one key.
    ///
    /// The key is not validated; callers pass keys taken from an already
    /// validated definition.
    #[must_use]
    pub fn child(&self, key: &str) -> Path {
        let mut components = self.components.clone();
        components.push(key.to_string());
        Path { components }
    }

    /// Render with `.` separators, the way module locations are named in
    /// diagnostics.
    pub fn dotted(&self) -> String {
        self.components.join(".")
    }
}

/// Validate a single path component.
pub fn validate_component(component: &str, position: usize) -> Result<(), PathError> {
    let mut chars = component.chars();
    let Some(first) = chars.next() else {
        return Err(PathError::InvalidComponent {
            component: component.to_string(),
            position,
            message: "empty component".to_string(),
        });
    };

    // Pure numeric strings index into arrays
    if component.chars().all(|c| c.is_ascii_digit()) {
        return Ok(());
    }

    let valid_start = unicode_ident::is_xid_start(first)
        || (first == '_'
            && chars
                .clone()
                .next()
                .is_some_and(unicode_ident::is_xid_continue));

    if !valid_start {
        return Err(PathError::InvalidComponent {
            component: component.to_string(),
            position,
            message: "must start with a letter or underscore followed by letter/digit"
                .to_string(),
        });
    }

    for c in chars {
        if !unicode_ident::is_xid_continue(c) {
            return Err(PathError::InvalidComponent {
                component: component.to_string(),
                position,
                message: format!("invalid character '{}' in identifier", c),
            });
        }
    }

    Ok(())
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.components.join("/"))
    }
}

impl std::ops::Index<usize> for Path {
    type Output = String;

    fn index(&self, i: usize) -> &Self::Output {
        &self.components[i]
    }
}

/// Build a path from a string literal, panicking on invalid input.
///
/// ```rust
/// use statetree_value::path;
///
/// let p = path!("cart/items");
/// assert_eq!(p.len(), 2);
/// ```
#[macro_export]
macro_rules! path {
    ($s:expr) => {
        $crate::Path::parse($s).expect("invalid path literal")
    };
}
