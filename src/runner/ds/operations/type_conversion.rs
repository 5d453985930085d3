use crate::runner::ds::error::{ErrorMessage, JErrorType, ThrowCompletionOr};
use crate::runner::ds::heap::{CellId, Heap, HeapCell};
use crate::runner::ds::object::{JsObject, ObjectKind};
use crate::runner::ds::object_property::{PropertyDescriptor, PropertyKey};
use crate::runner::ds::realm::WellKnownIntrinsics;
use crate::runner::ds::value::{JsNumberType, JsValue};
use crate::runner::vm::Vm;

pub const TYPE_STR_UNDEFINED: &str = "undefined";
pub const TYPE_STR_NULL: &str = "null";
pub const TYPE_STR_BOOLEAN: &str = "boolean";
pub const TYPE_STR_STRING: &str = "string";
pub const TYPE_STR_SYMBOL: &str = "symbol";
pub const TYPE_STR_NUMBER: &str = "number";
pub const TYPE_STR_OBJECT: &str = "object";
pub const TYPE_STR_FUNCTION: &str = "function";

pub fn get_type(heap: &Heap, a: &JsValue) -> &'static str {
    match a {
        JsValue::Object(o) if heap.object(*o).is_callable() => TYPE_STR_FUNCTION,
        other => other.type_name(),
    }
}

pub fn to_boolean(heap: &Heap, v: &JsValue) -> bool {
    match v {
        JsValue::Undefined | JsValue::Null => false,
        JsValue::Boolean(b) => *b,
        JsValue::String(s) => !heap.string(*s).is_empty(),
        JsValue::Symbol(_) | JsValue::Object(_) => true,
        JsValue::Number(n) => match n {
            JsNumberType::Integer(i) => *i != 0,
            JsNumberType::Float(f) => *f != 0.0,
            JsNumberType::NaN => false,
            JsNumberType::PositiveInfinity | JsNumberType::NegativeInfinity => true,
        },
    }
}

/// Human-readable rendering used in error messages and traces.
pub fn display_value(heap: &Heap, v: &JsValue) -> String {
    match v {
        JsValue::Undefined => TYPE_STR_UNDEFINED.to_string(),
        JsValue::Null => TYPE_STR_NULL.to_string(),
        JsValue::Boolean(b) => b.to_string(),
        JsValue::String(s) => heap.string(*s).to_string(),
        JsValue::Symbol(s) => heap.symbol(*s).to_string(),
        JsValue::Number(n) => n.to_string(),
        JsValue::Object(o) => match &heap.object(*o).kind {
            ObjectKind::Function(f) => format!("function {}", f.name),
            ObjectKind::Array => "[object Array]".to_string(),
            _ => "[object Object]".to_string(),
        },
    }
}

impl Vm {
    pub fn require_object_coercible(&self, v: &JsValue) -> ThrowCompletionOr<()> {
        if v.is_nullish() {
            Err(JErrorType::TypeError(
                ErrorMessage::NotObjectCoercible.format(v.type_name()),
            ))
        } else {
            Ok(())
        }
    }

    pub fn to_object(&mut self, v: &JsValue) -> ThrowCompletionOr<CellId> {
        let proto = match v {
            JsValue::Undefined | JsValue::Null => {
                return Err(JErrorType::TypeError(
                    ErrorMessage::NotObjectCoercible.format(v.type_name()),
                ))
            }
            JsValue::Object(o) => return Ok(*o),
            JsValue::Boolean(_) => WellKnownIntrinsics::BooleanPrototype,
            JsValue::Number(_) => WellKnownIntrinsics::NumberPrototype,
            JsValue::String(_) => WellKnownIntrinsics::StringPrototype,
            JsValue::Symbol(_) => WellKnownIntrinsics::SymbolPrototype,
        };
        let proto = self.intrinsic(proto);
        let wrapper = self.heap.allocate(HeapCell::Object(JsObject::new(
            Some(proto),
            ObjectKind::PrimitiveWrapper(*v),
        )))?;
        if let JsValue::String(s) = v {
            // One property per UTF-16 code unit. Heap strings are UTF-8, so each
            // half of a surrogate pair reads as U+FFFD.
            let chars: Vec<String> = self
                .heap
                .string(*s)
                .encode_utf16()
                .map(|unit| {
                    char::decode_utf16(std::iter::once(unit))
                        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER).to_string())
                        .collect()
                })
                .collect();
            let fixed = |value| PropertyDescriptor::Data {
                value,
                writable: false,
                enumerable: true,
                configurable: false,
            };
            for (i, c) in chars.iter().enumerate() {
                let value = self.js_string(c)?;
                self.heap
                    .object_mut(wrapper)
                    .define_own_property(PropertyKey::Int(i as u32), fixed(value));
            }
            self.heap.object_mut(wrapper).define_own_property(
                PropertyKey::from("length"),
                PropertyDescriptor::Data {
                    value: JsValue::from_i64(chars.len() as i64),
                    writable: false,
                    enumerable: false,
                    configurable: false,
                },
            );
        }
        Ok(wrapper)
    }

    /// ToString, returning the string cell.
    pub fn to_js_string(&mut self, v: &JsValue) -> ThrowCompletionOr<CellId> {
        let text = match v {
            JsValue::String(s) => return Ok(*s),
            JsValue::Symbol(_) => {
                return Err(JErrorType::TypeError(
                    "Cannot convert a Symbol value to a string".to_string(),
                ))
            }
            JsValue::Object(o) => match self.heap.object(*o).kind {
                ObjectKind::PrimitiveWrapper(inner) => return self.to_js_string(&inner),
                _ => display_value(&self.heap, v),
            },
            _ => display_value(&self.heap, v),
        };
        match self.js_string(&text)? {
            JsValue::String(s) => Ok(s),
            _ => unreachable!("js_string always yields a string"),
        }
    }

    pub fn to_property_key(&mut self, v: &JsValue) -> ThrowCompletionOr<PropertyKey> {
        match v {
            JsValue::Symbol(s) => Ok(PropertyKey::Sym(*s)),
            JsValue::Number(JsNumberType::Integer(i)) if *i >= 0 && *i < u32::MAX as i64 => {
                Ok(PropertyKey::Int(*i as u32))
            }
            other => {
                let s = self.to_js_string(other)?;
                Ok(PropertyKey::from_string(self.heap.string(s)))
            }
        }
    }

    pub fn to_number(&mut self, v: &JsValue) -> ThrowCompletionOr<JsNumberType> {
        match v {
            JsValue::Undefined => Ok(JsNumberType::NaN),
            JsValue::Null => Ok(JsNumberType::Integer(0)),
            JsValue::Boolean(b) => Ok(JsNumberType::Integer(if *b { 1 } else { 0 })),
            JsValue::Number(n) => Ok(*n),
            JsValue::String(s) => {
                let text = self.heap.string(*s).trim();
                if text.is_empty() {
                    return Ok(JsNumberType::Integer(0));
                }
                Ok(match text {
                    "Infinity" | "+Infinity" => JsNumberType::PositiveInfinity,
                    "-Infinity" => JsNumberType::NegativeInfinity,
                    _ => text
                        .parse::<f64>()
                        .map(JsNumberType::from_f64)
                        .unwrap_or(JsNumberType::NaN),
                })
            }
            JsValue::Symbol(_) => Err(JErrorType::TypeError(
                "Cannot convert a Symbol value to a number".to_string(),
            )),
            JsValue::Object(o) => match self.heap.object(*o).kind {
                ObjectKind::PrimitiveWrapper(inner) => self.to_number(&inner),
                _ => Ok(JsNumberType::NaN),
            },
        }
    }

    pub fn to_length(&mut self, v: &JsValue) -> ThrowCompletionOr<u64> {
        Ok(match self.to_number(v)? {
            JsNumberType::Integer(i) => i.max(0) as u64,
            JsNumberType::Float(f) => f.max(0.0).floor() as u64,
            JsNumberType::NaN | JsNumberType::NegativeInfinity => 0,
            JsNumberType::PositiveInfinity => (1u64 << 53) - 1,
        })
    }
}
