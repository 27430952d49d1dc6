//! Event attributes and subscription filters.

use std::fmt;

/// A single attribute value carried by an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Events that can be matched against a [`Filter`].
pub trait Attributed {
    /// Look up an attribute by name. `None` means the event does not carry it.
    fn attribute(&self, name: &str) -> Option<AttrValue>;
}

/// A set of required attribute/value pairs.
///
/// An empty filter matches every event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    required: Vec<(String, AttrValue)>,
}

impl Filter {
    /// A filter that matches all events.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Require `name` to equal `value`. A later call for the same name replaces it.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.required.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.required.push((name, value)),
        }
        self
    }

    /// Whether the filter has no requirements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }

    /// The required attributes, in insertion order.
    #[must_use]
    pub fn attributes(&self) -> &[(String, AttrValue)] {
        &self.required
    }

    /// Check whether every required attribute is present and equal on `event`.
    #[must_use]
    pub fn matches<E: Attributed + ?Sized>(&self, event: &E) -> bool {
        self.required
            .iter()
            .all(|(name, value)| event.attribute(name).as_ref() == Some(value))
    }
}
