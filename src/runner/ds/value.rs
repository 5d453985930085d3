use std::fmt;
use std::fmt::{Display, Formatter};

use crate::runner::ds::heap::CellId;
use crate::runner::ds::operations::type_conversion::{
    TYPE_STR_BOOLEAN, TYPE_STR_NULL, TYPE_STR_NUMBER, TYPE_STR_OBJECT, TYPE_STR_STRING,
    TYPE_STR_SYMBOL, TYPE_STR_UNDEFINED,
};

/// A language value. Heap-backed variants carry a handle into the engine heap,
/// so values are cheap to copy and never own what they point at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JsValue {
    Undefined,
    Null,
    Boolean(bool),
    String(CellId),
    Symbol(CellId),
    Number(JsNumberType),
    Object(CellId),
}

impl JsValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, JsValue::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, JsValue::Undefined | JsValue::Null)
    }

    pub fn as_object(&self) -> Option<CellId> {
        match self {
            JsValue::Object(o) => Some(*o),
            _ => None,
        }
    }

    /// The heap cell this value keeps alive, if any.
    pub fn as_cell(&self) -> Option<CellId> {
        match self {
            JsValue::String(c) | JsValue::Symbol(c) | JsValue::Object(c) => Some(*c),
            _ => None,
        }
    }

    pub fn from_i64(i: i64) -> Self {
        JsValue::Number(JsNumberType::Integer(i))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            JsValue::Undefined => TYPE_STR_UNDEFINED,
            JsValue::Null => TYPE_STR_NULL,
            JsValue::Boolean(_) => TYPE_STR_BOOLEAN,
            JsValue::String(_) => TYPE_STR_STRING,
            JsValue::Symbol(_) => TYPE_STR_SYMBOL,
            JsValue::Number(_) => TYPE_STR_NUMBER,
            JsValue::Object(_) => TYPE_STR_OBJECT,
        }
    }
}

impl Default for JsValue {
    fn default() -> Self {
        JsValue::Undefined
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JsNumberType {
    Integer(i64),
    Float(f64),
    NaN,
    PositiveInfinity,
    NegativeInfinity,
}

impl JsNumberType {
    pub fn from_f64(n: f64) -> Self {
        if n.is_nan() {
            JsNumberType::NaN
        } else if n == f64::INFINITY {
            JsNumberType::PositiveInfinity
        } else if n == f64::NEG_INFINITY {
            JsNumberType::NegativeInfinity
        } else if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 && !(n == 0.0 && n.is_sign_negative()) {
            JsNumberType::Integer(n as i64)
        } else {
            JsNumberType::Float(n)
        }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            JsNumberType::Integer(i) => *i as f64,
            JsNumberType::Float(f) => *f,
            JsNumberType::NaN => f64::NAN,
            JsNumberType::PositiveInfinity => f64::INFINITY,
            JsNumberType::NegativeInfinity => f64::NEG_INFINITY,
        }
    }
}

impl Display for JsNumberType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            JsNumberType::Integer(i) => write!(f, "{}", i),
            JsNumberType::Float(nf) => write!(f, "{}", nf),
            JsNumberType::NaN => write!(f, "NaN"),
            JsNumberType::PositiveInfinity => write!(f, "Infinity"),
            JsNumberType::NegativeInfinity => write!(f, "-Infinity"),
        }
    }
}
