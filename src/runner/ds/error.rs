use thiserror::Error;

use crate::runner::ds::value::JsValue;

/// Abrupt completion carried through every fallible engine operation.
#[derive(Debug, Clone, Error)]
pub enum JErrorType {
    #[error("Uncaught reference error: {0}.")]
    ReferenceError(String),
    #[error("Uncaught type error: {0}.")]
    TypeError(String),
    #[error("Uncaught range error: {0}.")]
    RangeError(String),
    #[error("Uncaught syntax error: {0}.")]
    SyntaxError(String),
    #[error("Uncaught internal error: {0}.")]
    InternalError(String),
    /// A value thrown by script code that is not one of the engine's own errors.
    #[error("Uncaught exception: {0:?}.")]
    Thrown(JsValue),
}

pub type ThrowCompletionOr<T> = Result<T, JErrorType>;

impl JErrorType {
    pub fn name(&self) -> &'static str {
        match self {
            JErrorType::ReferenceError(_) => "ReferenceError",
            JErrorType::TypeError(_) => "TypeError",
            JErrorType::RangeError(_) => "RangeError",
            JErrorType::SyntaxError(_) => "SyntaxError",
            JErrorType::InternalError(_) => "InternalError",
            JErrorType::Thrown(_) => "Error",
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            JErrorType::ReferenceError(m)
            | JErrorType::TypeError(m)
            | JErrorType::RangeError(m)
            | JErrorType::SyntaxError(m)
            | JErrorType::InternalError(m) => Some(m),
            JErrorType::Thrown(_) => None,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, JErrorType::InternalError(_))
    }
}

/// Messages the engine raises from more than one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMessage {
    OutOfMemory,
    DynamicImportsNotAllowed,
    ModuleNotFound,
    ModuleNotUtf8,
    NotObjectCoercible,
    NotAFunction,
    NotIterable,
    NotAnObject,
    NotDefined,
    NotInitialized,
    ImmutableBinding,
    NotEnoughMemoryToAllocate,
}

impl ErrorMessage {
    pub fn format(&self, arg: &str) -> String {
        match self {
            ErrorMessage::OutOfMemory => "Out of memory".to_string(),
            ErrorMessage::DynamicImportsNotAllowed => "Dynamic Imports are not allowed".to_string(),
            ErrorMessage::ModuleNotFound => format!("Cannot find/open module: {}", arg),
            ErrorMessage::ModuleNotUtf8 => format!("Module source is not valid UTF-8: {}", arg),
            ErrorMessage::NotObjectCoercible => format!("'{}' cannot be converted to object", arg),
            ErrorMessage::NotAFunction => format!("'{}' is not a function", arg),
            ErrorMessage::NotIterable => format!("'{}' is not iterable", arg),
            ErrorMessage::NotAnObject => format!("'{}' is not an object", arg),
            ErrorMessage::NotDefined => format!("'{}' is not defined", arg),
            ErrorMessage::NotInitialized => format!("'{}' is not initialized", arg),
            ErrorMessage::ImmutableBinding => format!("'{}' is set and immutable", arg),
            ErrorMessage::NotEnoughMemoryToAllocate => {
                format!("Not enough memory to allocate {} bytes", arg)
            }
        }
    }
}
