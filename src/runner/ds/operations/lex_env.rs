use crate::runner::ds::env_record::{
    has_binding, BindingLookup, DeclarativeEnvironmentRecord, EnvironmentRecordType,
    FunctionEnvironmentRecord, ObjectEnvironmentRecord, ThisBindingStatus,
};
use crate::runner::ds::error::{ErrorMessage, JErrorType, ThrowCompletionOr};
use crate::runner::ds::heap::{CellId, Heap, HeapCell};
use crate::runner::ds::lex_env::{EnvironmentCoordinate, LexEnvironment};
use crate::runner::ds::object_property::{PropertyDescriptor, PropertyKey};
use crate::runner::ds::operations::object::has_property;
use crate::runner::ds::value::JsValue;
use crate::runner::eval::types::Reference;
use crate::runner::vm::Vm;

/// Walk outward from `lex` until an environment declares `name`.
///
/// `hops` counts the outer links already followed and ends up in the
/// reference's coordinate when the binding lives in a slot, so the caller can
/// cache it for the same lexical site.
pub fn get_identifier_reference(
    heap: &Heap,
    lex: Option<CellId>,
    name: &str,
    strict: bool,
    hops: u32,
) -> Reference {
    match lex {
        None => Reference::unresolvable(name, strict),
        Some(env) => match has_binding(heap, env, name) {
            BindingLookup::Present(index) => Reference::environment(
                env,
                name,
                strict,
                index.map(|i| EnvironmentCoordinate {
                    hops,
                    index: i as u32,
                }),
            ),
            BindingLookup::Absent => {
                get_identifier_reference(heap, heap.environment(env).outer, name, strict, hops + 1)
            }
        },
    }
}

pub fn new_declarative_environment(heap: &mut Heap, outer_lex: Option<CellId>) -> ThrowCompletionOr<CellId> {
    heap.allocate(HeapCell::Environment(LexEnvironment::new(
        EnvironmentRecordType::Declarative(DeclarativeEnvironmentRecord::new()),
        outer_lex,
    )))
}

pub fn new_object_environment(
    heap: &mut Heap,
    o: CellId,
    is_with_environment: bool,
    outer_lex: Option<CellId>,
) -> ThrowCompletionOr<CellId> {
    heap.allocate(HeapCell::Environment(LexEnvironment::new(
        EnvironmentRecordType::Object(ObjectEnvironmentRecord::new(o, is_with_environment)),
        outer_lex,
    )))
}

pub fn new_function_environment(
    heap: &mut Heap,
    function: CellId,
    new_target: JsValue,
    lexical_this: bool,
    outer_lex: Option<CellId>,
) -> ThrowCompletionOr<CellId> {
    heap.allocate(HeapCell::Environment(LexEnvironment::new(
        EnvironmentRecordType::Function(FunctionEnvironmentRecord {
            declarative: DeclarativeEnvironmentRecord::new(),
            this_value: None,
            this_binding_status: if lexical_this {
                ThisBindingStatus::Lexical
            } else {
                ThisBindingStatus::Uninitialized
            },
            function_object: function,
            new_target,
        }),
        outer_lex,
    )))
}

pub fn new_module_environment(heap: &mut Heap, outer_lex: Option<CellId>) -> ThrowCompletionOr<CellId> {
    heap.allocate(HeapCell::Environment(LexEnvironment::new(
        EnvironmentRecordType::Module(DeclarativeEnvironmentRecord::new()),
        outer_lex,
    )))
}

/// The slot table a name may live in. For the global record that is its
/// declarative half.
fn slot_table(record: &EnvironmentRecordType) -> Option<&DeclarativeEnvironmentRecord> {
    match record {
        EnvironmentRecordType::Global(g) => Some(&g.declarative_record),
        EnvironmentRecordType::Object(_) => None,
        other => other.declarative(),
    }
}

fn slot_table_mut(record: &mut EnvironmentRecordType) -> Option<&mut DeclarativeEnvironmentRecord> {
    match record {
        EnvironmentRecordType::Global(g) => Some(&mut g.declarative_record),
        EnvironmentRecordType::Object(_) => None,
        other => other.declarative_mut(),
    }
}

fn binding_object(record: &EnvironmentRecordType) -> Option<CellId> {
    match record {
        EnvironmentRecordType::Object(o) => Some(o.binding_object),
        EnvironmentRecordType::Global(g) => Some(g.object_record.binding_object),
        _ => None,
    }
}

enum SlotRead {
    Value(JsValue),
    Uninitialized(String),
    Indirect(CellId, String),
    Missing,
}

impl Vm {
    /// Resolve `name` starting at `environment`, or at the running context's
    /// lexical environment when none is given.
    pub fn resolve_binding(&self, name: &str, environment: Option<CellId>) -> Reference {
        let env = match environment {
            Some(env) => env,
            None => self
                .running_execution_context()
                .and_then(|ctx| ctx.lex_env)
                .expect("resolve_binding needs a running context with a lexical environment"),
        };
        get_identifier_reference(&self.heap, Some(env), name, self.in_strict_mode(), 0)
    }

    fn read_slot(&self, env: CellId, index: usize) -> SlotRead {
        let table = slot_table(&self.heap.environment(env).record);
        match table.and_then(|t| t.binding(index)) {
            None => SlotRead::Missing,
            Some(b) => match (&b.indirect, b.value) {
                (Some(indirect), _) => SlotRead::Indirect(indirect.environment, indirect.name.clone()),
                (None, Some(v)) => SlotRead::Value(v),
                (None, None) => SlotRead::Uninitialized(b.name.clone()),
            },
        }
    }

    pub fn get_binding_value_at_index(&mut self, env: CellId, index: usize) -> ThrowCompletionOr<JsValue> {
        match self.read_slot(env, index) {
            SlotRead::Value(v) => Ok(v),
            SlotRead::Uninitialized(name) => Err(JErrorType::ReferenceError(
                ErrorMessage::NotInitialized.format(&name),
            )),
            SlotRead::Indirect(target, name) => self.get_binding_value(target, &name, true),
            SlotRead::Missing => Err(JErrorType::InternalError(format!(
                "environment {:?} has no slot {}",
                env, index
            ))),
        }
    }

    /// Read through a cached coordinate, starting from `start`.
    pub fn get_binding_value_at(&mut self, start: CellId, coordinate: EnvironmentCoordinate) -> ThrowCompletionOr<JsValue> {
        let mut env = start;
        for _ in 0..coordinate.hops {
            env = self.heap.environment(env).outer.ok_or_else(|| {
                JErrorType::InternalError("environment coordinate walks past the chain".to_string())
            })?;
        }
        self.get_binding_value_at_index(env, coordinate.index as usize)
    }

    pub fn get_binding_value(&mut self, env: CellId, name: &str, strict: bool) -> ThrowCompletionOr<JsValue> {
        let record = &self.heap.environment(env).record;
        if let Some(index) = slot_table(record).and_then(|t| t.binding_index(name)) {
            return self.get_binding_value_at_index(env, index);
        }
        match binding_object(record) {
            Some(object) => {
                let key = PropertyKey::from(name);
                if !has_property(&self.heap, object, &key) {
                    return if strict {
                        Err(JErrorType::ReferenceError(ErrorMessage::NotDefined.format(name)))
                    } else {
                        Ok(JsValue::Undefined)
                    };
                }
                self.get(object, &key, JsValue::Object(object))
            }
            None => Err(JErrorType::ReferenceError(ErrorMessage::NotDefined.format(name))),
        }
    }

    pub fn set_mutable_binding(&mut self, env: CellId, name: &str, value: JsValue, strict: bool) -> ThrowCompletionOr<()> {
        let record = &mut self.heap.environment_mut(env).record;
        let object = binding_object(record);
        if let Some(table) = slot_table_mut(record) {
            if let Some(index) = table.binding_index(name) {
                let binding = table
                    .binding_mut(index)
                    .ok_or_else(|| JErrorType::InternalError(format!("stale slot for '{}'", name)))?;
                if binding.indirect.is_some() {
                    return Err(JErrorType::TypeError(ErrorMessage::ImmutableBinding.format(name)));
                }
                if binding.value.is_none() {
                    return Err(JErrorType::ReferenceError(ErrorMessage::NotInitialized.format(name)));
                }
                if binding.is_mutable() {
                    binding.value = Some(value);
                } else if strict || binding.is_strict() {
                    return Err(JErrorType::TypeError(ErrorMessage::ImmutableBinding.format(name)));
                }
                return Ok(());
            }
            if object.is_none() {
                if strict {
                    return Err(JErrorType::ReferenceError(ErrorMessage::NotDefined.format(name)));
                }
                let index = table.create_mutable_binding(name.to_string(), true);
                table.initialize_binding_at(index, value);
                return Ok(());
            }
        }
        let object = match object {
            Some(o) => o,
            None => {
                return Err(JErrorType::ReferenceError(ErrorMessage::NotDefined.format(name)))
            }
        };
        let key = PropertyKey::from(name);
        if strict && !has_property(&self.heap, object, &key) {
            return Err(JErrorType::ReferenceError(ErrorMessage::NotDefined.format(name)));
        }
        self.set(object, key, value, JsValue::Object(object), strict)?;
        Ok(())
    }

    pub fn initialize_binding(&mut self, env: CellId, name: &str, value: JsValue) -> ThrowCompletionOr<()> {
        let record = &mut self.heap.environment_mut(env).record;
        let object = binding_object(record);
        if let Some(table) = slot_table_mut(record) {
            if table.has_binding(name) {
                return if table.initialize_binding(name, value) {
                    Ok(())
                } else {
                    Err(JErrorType::InternalError(format!(
                        "binding '{}' is already initialized",
                        name
                    )))
                };
            }
        }
        match object {
            Some(o) => {
                self.set(o, PropertyKey::from(name), value, JsValue::Object(o), false)?;
                Ok(())
            }
            None => Err(JErrorType::InternalError(format!(
                "no binding named '{}' to initialize",
                name
            ))),
        }
    }

    pub fn create_mutable_binding(&mut self, env: CellId, name: &str, can_delete: bool) -> ThrowCompletionOr<()> {
        let record = &mut self.heap.environment_mut(env).record;
        match record {
            EnvironmentRecordType::Object(o) => {
                let object = o.binding_object;
                self.define_property_or_throw(
                    object,
                    PropertyKey::from(name),
                    PropertyDescriptor::Data {
                        value: JsValue::Undefined,
                        writable: true,
                        enumerable: true,
                        configurable: can_delete,
                    },
                )
            }
            EnvironmentRecordType::Global(g) if g.declarative_record.has_binding(name) => Err(
                JErrorType::TypeError(format!("'{}' has already been declared", name)),
            ),
            other => {
                if let Some(table) = slot_table_mut(other) {
                    table.create_mutable_binding(name.to_string(), can_delete);
                }
                Ok(())
            }
        }
    }

    pub fn create_immutable_binding(&mut self, env: CellId, name: &str, strict: bool) -> ThrowCompletionOr<()> {
        let record = &mut self.heap.environment_mut(env).record;
        match slot_table_mut(record) {
            Some(table) => {
                table.create_immutable_binding(name.to_string(), strict);
                Ok(())
            }
            None => Err(JErrorType::InternalError(
                "object environments cannot hold immutable bindings".to_string(),
            )),
        }
    }

    /// Global `var`: lives on the global object and is remembered as a var name.
    pub fn create_global_var_binding(&mut self, env: CellId, name: &str, can_delete: bool) -> ThrowCompletionOr<()> {
        let global_object = match &self.heap.environment(env).record {
            EnvironmentRecordType::Global(g) => g.object_record.binding_object,
            _ => {
                return Err(JErrorType::InternalError(
                    "var bindings of this kind need the global environment".to_string(),
                ))
            }
        };
        let key = PropertyKey::from(name);
        if self.heap.object(global_object).get_own_property(&key).is_none()
            && self.heap.object(global_object).is_extensible()
        {
            self.define_property_or_throw(
                global_object,
                key,
                PropertyDescriptor::Data {
                    value: JsValue::Undefined,
                    writable: true,
                    enumerable: true,
                    configurable: can_delete,
                },
            )?;
        }
        if let EnvironmentRecordType::Global(g) = &mut self.heap.environment_mut(env).record {
            if !g.var_names.iter().any(|n| n == name) {
                g.var_names.push(name.to_string());
            }
        }
        Ok(())
    }

    pub fn delete_binding(&mut self, env: CellId, name: &str) -> ThrowCompletionOr<bool> {
        let record = &mut self.heap.environment_mut(env).record;
        let object = binding_object(record);
        if let Some(table) = slot_table_mut(record) {
            if table.has_binding(name) {
                return Ok(table.delete_binding(name));
            }
        }
        match object {
            Some(o) => {
                let deleted = self.heap.object_mut(o).delete(&PropertyKey::from(name));
                if deleted {
                    if let EnvironmentRecordType::Global(g) = &mut self.heap.environment_mut(env).record {
                        g.var_names.retain(|n| n != name);
                    }
                }
                Ok(deleted)
            }
            None => Ok(true),
        }
    }

    /// The innermost environment that binds `this`.
    pub fn get_this_environment(&self) -> Option<CellId> {
        let mut env = self.running_execution_context().and_then(|ctx| ctx.lex_env);
        while let Some(e) = env {
            let lex = self.heap.environment(e);
            if lex.record.has_this_binding() {
                return Some(e);
            }
            env = lex.outer;
        }
        None
    }

    pub fn resolve_this_binding(&self) -> ThrowCompletionOr<JsValue> {
        match self.get_this_environment() {
            Some(env) => self.heap.environment(env).record.get_this_binding(),
            None => Err(JErrorType::InternalError(
                "no environment binds 'this'".to_string(),
            )),
        }
    }

    pub fn get_new_target(&self) -> JsValue {
        match self
            .get_this_environment()
            .map(|env| &self.heap.environment(env).record)
        {
            Some(EnvironmentRecordType::Function(f)) => f.new_target,
            _ => JsValue::Undefined,
        }
    }
}
