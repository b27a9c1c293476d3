use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::FormatError;

/// A typed custom property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// `bool`
    Bool(bool),
    /// `int` and `object` (an object id)
    Int(i64),
    /// `float`
    Float(f64),
    /// `string`, `file`, `color` and `class`
    String(String),
}

/// Custom properties attached to a map, layer, tileset, tile or object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, PropertyValue>);

#[allow(missing_docs)]
impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.0.get(name)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.0.get(name)? {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.0.get(name)? {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Floats, and ints widened to `f64`.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.0.get(name)? {
            PropertyValue::Float(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.0.get(name)? {
            PropertyValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.0.iter()
    }

    /// `None` when empty, so canonical records omit the key.
    pub(crate) fn non_empty(self) -> Option<Self> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

/// Property type names as Tiled writes them.
pub(crate) enum PropertyKind {
    Bool,
    Int,
    Float,
    Text,
}

impl PropertyKind {
    pub(crate) fn parse(name: &str, kind: &str) -> Result<Self, FormatError> {
        match kind {
            "bool" => Ok(Self::Bool),
            "int" | "object" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "string" | "file" | "color" | "class" => Ok(Self::Text),
            other => Err(FormatError::UnsupportedPropertyType {
                name: name.to_owned(),
                kind: other.to_owned(),
            }),
        }
    }

    /// XML stores every value as text.
    pub(crate) fn parse_text(&self, raw: &str) -> Option<PropertyValue> {
        match self {
            Self::Bool => match raw {
                "true" | "1" => Some(PropertyValue::Bool(true)),
                "false" | "0" => Some(PropertyValue::Bool(false)),
                _ => None,
            },
            Self::Int => raw.trim().parse().ok().map(PropertyValue::Int),
            Self::Float => raw.trim().parse().ok().map(PropertyValue::Float),
            Self::Text => Some(PropertyValue::String(raw.to_owned())),
        }
    }
}
