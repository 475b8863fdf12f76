//! Value types for DLIR
//!
//! Constants are the only values the engine ever stores. They are opaque
//! strings compared by value; `alice` and `"alice"` denote the same constant.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// An atomic domain value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Constant(Arc<str>);

impl Constant {
    /// Create a constant from its text
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Constant(text.into())
    }

    /// The constant's text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the constant can be written without quotes
    pub fn is_bare(&self) -> bool {
        let text = self.as_str();
        let mut chars = text.chars();
        match chars.next() {
            Some(c) if c.is_ascii_lowercase() || c == '_' => {
                text != "not"
                    && text != "_"
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            Some(c) if c.is_ascii_digit() => chars.all(|c| c.is_ascii_digit()),
            _ => false,
        }
    }
}

impl From<&str> for Constant {
    fn from(text: &str) -> Self {
        Constant::new(text)
    }
}

impl From<String> for Constant {
    fn from(text: String) -> Self {
        Constant::new(text)
    }
}

impl Borrow<str> for Constant {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bare() {
            return write!(f, "{}", self.0);
        }
        write!(f, "\"")?;
        for c in self.0.chars() {
            match c {
                '"' => write!(f, "\\\"")?,
                '\\' => write!(f, "\\\\")?,
                '\n' => write!(f, "\\n")?,
                c => write!(f, "{}", c)?,
            }
        }
        write!(f, "\"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_equality_by_value() {
        let a = Constant::new("alice");
        let b = Constant::from(String::from("alice"));
        assert_eq!(a, b);
        assert_ne!(a, Constant::new("bob"));
        assert_eq!(a.as_str(), "alice");
    }

    #[test]
    fn test_constant_display() {
        assert_eq!(Constant::new("r1").to_string(), "r1");
        assert_eq!(Constant::new("42").to_string(), "42");
        assert_eq!(Constant::new("/projects/a").to_string(), "\"/projects/a\"");
        assert_eq!(Constant::new("Alice").to_string(), "\"Alice\"");
        assert_eq!(Constant::new("not").to_string(), "\"not\"");
        assert_eq!(Constant::new("say \"hi\"").to_string(), "\"say \\\"hi\\\"\"");
    }

    #[test]
    fn test_constant_ordering() {
        let mut values = vec![Constant::new("c"), Constant::new("a"), Constant::new("b")];
        values.sort();
        assert_eq!(values, vec![Constant::new("a"), Constant::new("b"), Constant::new("c")]);
    }
}
