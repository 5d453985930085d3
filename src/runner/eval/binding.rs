//! Destructuring: binding a value to a name or to an object/array pattern.
//!
//! With an environment, targets are initialized in it (declarations). Without
//! one, targets are resolved from the running context and assigned to.

use crate::parser::ast::{
    BindingAlias, BindingEntry, BindingEntryName, BindingPattern, BindingPatternKind,
    BindingTarget, Expression, Node,
};
use crate::runner::ds::error::{JErrorType, ThrowCompletionOr};
use crate::runner::ds::heap::CellId;
use crate::runner::ds::iterator_object::IteratorRecord;
use crate::runner::ds::object_property::PropertyKey;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::Reference;
use crate::runner::vm::Vm;
use std::rc::Rc;

impl Vm {
    pub fn binding_initialization(
        &mut self,
        target: &BindingTarget,
        value: JsValue,
        environment: Option<CellId>,
    ) -> ThrowCompletionOr<()> {
        match target {
            BindingTarget::Identifier(name) => {
                let reference = self.resolve_binding(name, environment);
                self.bind_reference(&reference, value, environment)
            }
            BindingTarget::Pattern(pattern) => match pattern.kind {
                BindingPatternKind::Object => {
                    self.require_object_coercible(&value)?;
                    self.property_binding_initialization(pattern, value, environment)
                }
                BindingPatternKind::Array => {
                    let mut record = self.get_iterator(&value)?;
                    let result = self.iterator_binding_initialization(pattern, &mut record, environment);
                    if !record.done {
                        return self.iterator_close(&record, result);
                    }
                    result
                }
            },
        }
    }

    fn bind_reference(&mut self, reference: &Reference, value: JsValue, environment: Option<CellId>) -> ThrowCompletionOr<()> {
        if environment.is_some() {
            self.initialize_referenced_binding(reference, value)
        } else {
            self.put_value(reference, value)
        }
    }

    fn property_binding_initialization(
        &mut self,
        pattern: &BindingPattern,
        value: JsValue,
        environment: Option<CellId>,
    ) -> ThrowCompletionOr<()> {
        let object = self.to_object(&value)?;
        let mut seen_names: Vec<PropertyKey> = Vec::new();

        for entry in &pattern.entries {
            if entry.is_rest {
                let name = rest_target_name(entry)?;
                let reference = self.resolve_binding(name, environment);
                let rest_object = self.new_object()?;
                self.copy_data_properties(rest_object, &JsValue::Object(object), &seen_names)?;
                return self.bind_reference(&reference, JsValue::Object(rest_object), environment);
            }

            let key = match &entry.name {
                BindingEntryName::Identifier(name) => PropertyKey::from(name.as_str()),
                BindingEntryName::Computed(expression) => {
                    let key_value = self.execute_ast_node(&Node::Expression(expression.clone()))?;
                    self.to_property_key(&key_value)?
                }
                BindingEntryName::Empty => {
                    return Err(JErrorType::InternalError(
                        "object pattern entry without a key".to_string(),
                    ))
                }
            };
            seen_names.push(key.clone());

            if let (BindingAlias::Empty, BindingEntryName::Identifier(name)) = (&entry.alias, &entry.name) {
                let reference = self.resolve_binding(name, environment);
                let mut v = self.get(object, &key, JsValue::Object(object))?;
                if v.is_undefined() {
                    if let Some(initializer) = &entry.initializer {
                        v = self.named_evaluation_if_anonymous_function(initializer, name)?;
                    }
                }
                self.bind_reference(&reference, v, environment)?;
                continue;
            }

            let reference = match &entry.alias {
                BindingAlias::Identifier(alias) => Some(self.resolve_binding(alias, environment)),
                _ => None,
            };
            let mut v = self.get(object, &key, JsValue::Object(object))?;
            if v.is_undefined() {
                if let Some(initializer) = &entry.initializer {
                    v = self.evaluate_default(initializer, &entry.alias)?;
                }
            }
            match (&entry.alias, reference) {
                (BindingAlias::Pattern(nested), _) => {
                    self.binding_initialization(&BindingTarget::Pattern(nested.clone()), v, environment)?
                }
                (_, Some(reference)) => self.bind_reference(&reference, v, environment)?,
                (_, None) => {
                    return Err(JErrorType::InternalError(
                        "computed object pattern key without a target".to_string(),
                    ))
                }
            }
        }
        Ok(())
    }

    fn iterator_binding_initialization(
        &mut self,
        pattern: &BindingPattern,
        record: &mut IteratorRecord,
        environment: Option<CellId>,
    ) -> ThrowCompletionOr<()> {
        let last = pattern.entries.len().saturating_sub(1);
        for (i, entry) in pattern.entries.iter().enumerate() {
            let reference = match &entry.alias {
                BindingAlias::Identifier(alias) => Some(self.resolve_binding(alias, environment)),
                _ => None,
            };

            let value = if entry.is_rest {
                assert!(i == last, "rest element must be the last entry of an array pattern");
                let mut values = Vec::new();
                while !record.done {
                    match self.iterator_step_value(record)? {
                        Some(v) => values.push(v),
                        None => break,
                    }
                }
                JsValue::Object(self.create_array_from_list(&values)?)
            } else {
                let mut v = JsValue::Undefined;
                if !record.done {
                    if let Some(next) = self.iterator_step_value(record)? {
                        v = next;
                    }
                }
                if v.is_undefined() {
                    if let Some(initializer) = &entry.initializer {
                        v = self.evaluate_default(initializer, &entry.alias)?;
                    }
                }
                v
            };

            match (&entry.alias, reference) {
                (BindingAlias::Pattern(nested), _) => {
                    self.binding_initialization(&BindingTarget::Pattern(nested.clone()), value, environment)?
                }
                (BindingAlias::Identifier(_), Some(reference)) => {
                    self.bind_reference(&reference, value, environment)?
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn evaluate_default(&mut self, initializer: &Rc<Expression>, alias: &BindingAlias) -> ThrowCompletionOr<JsValue> {
        match alias {
            BindingAlias::Identifier(name) => self.named_evaluation_if_anonymous_function(initializer, name),
            _ => self.execute_ast_node(&Node::Expression(initializer.clone())),
        }
    }
}

fn rest_target_name(entry: &BindingEntry) -> ThrowCompletionOr<&str> {
    match (&entry.alias, &entry.name) {
        (BindingAlias::Identifier(name), _) | (BindingAlias::Empty, BindingEntryName::Identifier(name)) => {
            Ok(name)
        }
        _ => Err(JErrorType::SyntaxError(
            "object rest element must bind a plain identifier".to_string(),
        )),
    }
}
