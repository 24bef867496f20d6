//! Free-form detail attached to marks.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Detail mapping carried by a mark.
///
/// Persistent so that one detail can be shared by several marks (a network
/// settlement and its per-phase timing marks) without copying.
pub type Detail = im::OrdMap<String, DetailValue>;

/// A single detail value.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DetailValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer count or size.
    Int(i64),
    /// Floating-point measurement (delays, periods).
    Float(f64),
    /// Text (urls, captured stacks).
    Text(String),
    /// List of strings (render component buckets).
    List(Vec<String>),
}

impl DetailValue {
    /// Returns the integer payload, if this is an `Int`.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the float payload, if this is a `Float`.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the text payload, if this is a `Text`.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the list payload, if this is a `List`.
    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for DetailValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<bool> for DetailValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for DetailValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<u32> for DetailValue {
    fn from(i: u32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for DetailValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for DetailValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for DetailValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<String>> for DetailValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}
