use std::fmt;
use std::fmt::{Display, Formatter};

use crate::runner::ds::heap::{CellId, CellVisitor};
use crate::runner::ds::value::JsValue;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    Str(String),
    Int(u32),
    Sym(CellId),
}

impl PropertyKey {
    /// Canonical key for a string, so that `"1"` and `1` name the same property.
    pub fn from_string(s: &str) -> Self {
        match s.parse::<u32>() {
            Ok(i) if i != u32::MAX && i.to_string() == s => PropertyKey::Int(i),
            _ => PropertyKey::Str(s.to_string()),
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            PropertyKey::Int(i) => Some(*i as usize),
            _ => None,
        }
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, PropertyKey::Sym(_))
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        PropertyKey::from_string(s)
    }
}

impl From<u32> for PropertyKey {
    fn from(i: u32) -> Self {
        PropertyKey::Int(i)
    }
}

impl Display for PropertyKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Str(s) => write!(f, "{}", s),
            PropertyKey::Int(i) => write!(f, "{}", i),
            PropertyKey::Sym(s) => write!(f, "Symbol({:?})", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyDescriptor {
    Data {
        value: JsValue,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    },
    Accessor {
        get: Option<CellId>,
        set: Option<CellId>,
        enumerable: bool,
        configurable: bool,
    },
}

impl PropertyDescriptor {
    /// A writable, enumerable, configurable data property.
    pub fn data(value: JsValue) -> Self {
        PropertyDescriptor::Data {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// The shape used for built-in methods and `length`: writable, not enumerable.
    pub fn hidden(value: JsValue) -> Self {
        PropertyDescriptor::Data {
            value,
            writable: true,
            enumerable: false,
            configurable: true,
        }
    }

    pub fn is_enumerable(&self) -> bool {
        match self {
            PropertyDescriptor::Data { enumerable, .. } => *enumerable,
            PropertyDescriptor::Accessor { enumerable, .. } => *enumerable,
        }
    }

    pub fn is_configurable(&self) -> bool {
        match self {
            PropertyDescriptor::Data { configurable, .. } => *configurable,
            PropertyDescriptor::Accessor { configurable, .. } => *configurable,
        }
    }

    pub fn is_data_descriptor(&self) -> bool {
        matches!(self, PropertyDescriptor::Data { .. })
    }

    pub fn visit_edges(&self, visitor: &mut dyn CellVisitor) {
        match self {
            PropertyDescriptor::Data { value, .. } => visitor.visit_value(value),
            PropertyDescriptor::Accessor { get, set, .. } => {
                if let Some(g) = get {
                    visitor.visit(*g);
                }
                if let Some(s) = set {
                    visitor.visit(*s);
                }
            }
        }
    }
}
