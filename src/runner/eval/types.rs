//! References produced by identifier resolution and property access, and the
//! operations that read, write and initialize through them.

use crate::runner::ds::error::{ErrorMessage, JErrorType, ThrowCompletionOr};
use crate::runner::ds::heap::CellId;
use crate::runner::ds::lex_env::EnvironmentCoordinate;
use crate::runner::ds::object_property::PropertyKey;
use crate::runner::ds::value::JsValue;
use crate::runner::vm::Vm;

/// Reference base type.
/// A reference can be based on a value, an environment, or be unresolvable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReferenceBase {
    /// Reference to a property of a value.
    Value(JsValue),
    /// Reference to a binding in an environment.
    Environment(CellId),
    /// Unresolvable reference (identifier not found).
    Unresolvable,
}

/// Reference type.
/// Used for identifier resolution and property access.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    /// The base value (value or environment).
    pub base: ReferenceBase,
    /// The referenced name (property key or identifier).
    pub referenced_name: PropertyKey,
    /// Whether this is a strict mode reference.
    pub strict: bool,
    /// The `this` value for super references.
    pub this_value: Option<JsValue>,
    /// Slot cache for environment references that resolved to a slot.
    pub environment_coordinate: Option<EnvironmentCoordinate>,
}

impl Reference {
    /// Create a new reference to a property of a value.
    pub fn property(base: JsValue, name: PropertyKey, strict: bool) -> Self {
        Reference {
            base: ReferenceBase::Value(base),
            referenced_name: name,
            strict,
            this_value: None,
            environment_coordinate: None,
        }
    }

    /// Create a new reference to an environment binding.
    pub fn environment(
        environment: CellId,
        name: &str,
        strict: bool,
        environment_coordinate: Option<EnvironmentCoordinate>,
    ) -> Self {
        Reference {
            base: ReferenceBase::Environment(environment),
            referenced_name: PropertyKey::Str(name.to_string()),
            strict,
            this_value: None,
            environment_coordinate,
        }
    }

    /// Create an unresolvable reference.
    pub fn unresolvable(name: &str, strict: bool) -> Self {
        Reference {
            base: ReferenceBase::Unresolvable,
            referenced_name: PropertyKey::Str(name.to_string()),
            strict,
            this_value: None,
            environment_coordinate: None,
        }
    }

    /// Check if this is a property reference.
    pub fn is_property_reference(&self) -> bool {
        matches!(self.base, ReferenceBase::Value(_))
    }

    /// Check if this reference is unresolvable.
    pub fn is_unresolvable(&self) -> bool {
        matches!(self.base, ReferenceBase::Unresolvable)
    }

    /// Check if this is a super reference.
    pub fn is_super_reference(&self) -> bool {
        self.this_value.is_some()
    }

    /// Identifier references always carry a string name.
    pub fn name(&self) -> String {
        self.referenced_name.to_string()
    }

    /// Get the this value for method calls.
    pub fn get_this_value(&self) -> JsValue {
        if let Some(this) = self.this_value {
            this
        } else if let ReferenceBase::Value(base) = self.base {
            base
        } else {
            JsValue::Undefined
        }
    }
}

impl Vm {
    pub fn get_value(&mut self, reference: &Reference) -> ThrowCompletionOr<JsValue> {
        match reference.base {
            ReferenceBase::Unresolvable => Err(JErrorType::ReferenceError(
                ErrorMessage::NotDefined.format(&reference.name()),
            )),
            ReferenceBase::Value(base) => {
                let object = self.to_object(&base)?;
                self.get(object, &reference.referenced_name, reference.get_this_value())
            }
            ReferenceBase::Environment(env) => match reference.environment_coordinate {
                Some(coordinate) => self.get_binding_value_at_index(env, coordinate.index as usize),
                None => self.get_binding_value(env, &reference.name(), reference.strict),
            },
        }
    }

    pub fn put_value(&mut self, reference: &Reference, value: JsValue) -> ThrowCompletionOr<()> {
        match reference.base {
            ReferenceBase::Unresolvable => {
                if reference.strict {
                    return Err(JErrorType::ReferenceError(
                        ErrorMessage::NotDefined.format(&reference.name()),
                    ));
                }
                let global = self.get_global_object();
                self.set(
                    global,
                    reference.referenced_name.clone(),
                    value,
                    JsValue::Object(global),
                    false,
                )?;
                Ok(())
            }
            ReferenceBase::Value(base) => {
                let object = self.to_object(&base)?;
                self.set(
                    object,
                    reference.referenced_name.clone(),
                    value,
                    reference.get_this_value(),
                    reference.strict,
                )?;
                Ok(())
            }
            ReferenceBase::Environment(env) => {
                self.set_mutable_binding(env, &reference.name(), value, reference.strict)
            }
        }
    }

    pub fn initialize_referenced_binding(&mut self, reference: &Reference, value: JsValue) -> ThrowCompletionOr<()> {
        match reference.base {
            ReferenceBase::Environment(env) => self.initialize_binding(env, &reference.name(), value),
            _ => Err(JErrorType::InternalError(format!(
                "cannot initialize '{}' through a non-environment reference",
                reference.name()
            ))),
        }
    }
}
