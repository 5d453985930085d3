use std::collections::HashMap;
use std::rc::Rc;

use crate::runner::ds::env_record::{EnvironmentRecordType, GlobalEnvironmentRecord};
use crate::runner::ds::error::{ErrorMessage, JErrorType, ThrowCompletionOr};
use crate::runner::ds::heap::{CellId, CellVisitor, HeapCell};
use crate::runner::ds::lex_env::LexEnvironment;
use crate::runner::ds::object::{JsObject, ObjectKind};
use crate::runner::ds::object_property::{PropertyDescriptor, PropertyKey};
use crate::runner::ds::value::{JsNumberType, JsValue};
use crate::runner::vm::Vm;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownIntrinsics {
    ArrayBufferPrototype,
    ArrayIteratorPrototype,
    ArrayPrototype,
    BooleanPrototype,
    ErrorPrototype,
    FinalizationRegistryPrototype,
    FunctionPrototype,
    IteratorPrototype,
    NumberPrototype,
    ObjectPrototype,
    PromisePrototype,
    StringIteratorPrototype,
    StringPrototype,
    SymbolPrototype,
}

pub struct CodeRealm {
    pub intrinsics: HashMap<WellKnownIntrinsics, CellId>,
    pub global_object: CellId,
    pub global_env: CellId,
}

impl CodeRealm {
    pub fn intrinsic(&self, which: WellKnownIntrinsics) -> CellId {
        self.intrinsics[&which]
    }

    pub fn visit_edges(&self, visitor: &mut dyn CellVisitor) {
        for cell in self.intrinsics.values() {
            visitor.visit(*cell);
        }
        visitor.visit(self.global_object);
        visitor.visit(self.global_env);
    }
}

impl Vm {
    /// Build a fresh realm: intrinsic prototypes, a global object and the global
    /// environment wrapping it.
    pub fn create_realm(&mut self) -> ThrowCompletionOr<CellId> {
        let object_prototype = self.heap.allocate(HeapCell::Object(JsObject::ordinary(None)))?;
        let mut intrinsics = HashMap::new();
        intrinsics.insert(WellKnownIntrinsics::ObjectPrototype, object_prototype);
        for which in [
            WellKnownIntrinsics::ArrayBufferPrototype,
            WellKnownIntrinsics::BooleanPrototype,
            WellKnownIntrinsics::ErrorPrototype,
            WellKnownIntrinsics::FinalizationRegistryPrototype,
            WellKnownIntrinsics::FunctionPrototype,
            WellKnownIntrinsics::IteratorPrototype,
            WellKnownIntrinsics::NumberPrototype,
            WellKnownIntrinsics::PromisePrototype,
            WellKnownIntrinsics::StringPrototype,
            WellKnownIntrinsics::SymbolPrototype,
        ] {
            let proto = self
                .heap
                .allocate(HeapCell::Object(JsObject::ordinary(Some(object_prototype))))?;
            intrinsics.insert(which, proto);
        }
        let array_prototype = self.heap.allocate(HeapCell::Object(JsObject::new(
            Some(object_prototype),
            ObjectKind::Array,
        )))?;
        intrinsics.insert(WellKnownIntrinsics::ArrayPrototype, array_prototype);
        let iterator_prototype = intrinsics[&WellKnownIntrinsics::IteratorPrototype];
        for which in [
            WellKnownIntrinsics::ArrayIteratorPrototype,
            WellKnownIntrinsics::StringIteratorPrototype,
        ] {
            let proto = self
                .heap
                .allocate(HeapCell::Object(JsObject::ordinary(Some(iterator_prototype))))?;
            intrinsics.insert(which, proto);
        }

        let global_object = self
            .heap
            .allocate(HeapCell::Object(JsObject::ordinary(Some(object_prototype))))?;
        let global_env = self.heap.allocate(HeapCell::Environment(LexEnvironment::new(
            EnvironmentRecordType::Global(GlobalEnvironmentRecord::new(global_object, global_object)),
            None,
        )))?;
        let realm = self.heap.allocate(HeapCell::Realm(CodeRealm {
            intrinsics,
            global_object,
            global_env,
        }))?;

        self.install_iteration_intrinsics(realm)?;
        self.set_default_global_bindings(realm)?;
        Ok(realm)
    }

    fn set_default_global_bindings(&mut self, realm: CellId) -> ThrowCompletionOr<()> {
        let global_object = self.heap.realm(realm).global_object;
        let fixed = |value| PropertyDescriptor::Data {
            value,
            writable: false,
            enumerable: false,
            configurable: false,
        };
        let object = self.heap.object_mut(global_object);
        object.define_own_property(
            PropertyKey::from("globalThis"),
            PropertyDescriptor::hidden(JsValue::Object(global_object)),
        );
        object.define_own_property(PropertyKey::from("undefined"), fixed(JsValue::Undefined));
        object.define_own_property(
            PropertyKey::from("NaN"),
            fixed(JsValue::Number(JsNumberType::NaN)),
        );
        object.define_own_property(
            PropertyKey::from("Infinity"),
            fixed(JsValue::Number(JsNumberType::PositiveInfinity)),
        );
        Ok(())
    }

    fn install_iteration_intrinsics(&mut self, realm: CellId) -> ThrowCompletionOr<()> {
        let iterator_symbol = PropertyKey::Sym(self.well_known_symbols.iterator);
        let (array_proto, array_iter_proto, string_proto, string_iter_proto, iter_proto) = {
            let r = self.heap.realm(realm);
            (
                r.intrinsic(WellKnownIntrinsics::ArrayPrototype),
                r.intrinsic(WellKnownIntrinsics::ArrayIteratorPrototype),
                r.intrinsic(WellKnownIntrinsics::StringPrototype),
                r.intrinsic(WellKnownIntrinsics::StringIteratorPrototype),
                r.intrinsic(WellKnownIntrinsics::IteratorPrototype),
            )
        };

        let values = self.new_native_function_in(
            realm,
            "values",
            Rc::new(move |vm: &mut Vm, this: JsValue, _: &[JsValue], _: &[JsValue]| -> ThrowCompletionOr<JsValue> {
                let iterated = JsValue::Object(vm.to_object(&this)?);
                let proto = vm.intrinsic(WellKnownIntrinsics::ArrayIteratorPrototype);
                let iterator = vm.heap.allocate(HeapCell::Object(JsObject::new(
                    Some(proto),
                    ObjectKind::ArrayIterator {
                        iterated,
                        next_index: 0,
                        done: false,
                    },
                )))?;
                Ok(JsValue::Object(iterator))
            }),
        )?;
        self.heap
            .object_mut(array_proto)
            .define_own_property(iterator_symbol.clone(), PropertyDescriptor::hidden(values));

        let array_next = self.new_native_function_in(
            realm,
            "next",
            Rc::new(|vm: &mut Vm, this: JsValue, _: &[JsValue], _: &[JsValue]| {
                vm.array_iterator_next(this)
            }),
        )?;
        self.heap
            .object_mut(array_iter_proto)
            .define_own_property(PropertyKey::from("next"), PropertyDescriptor::hidden(array_next));

        let string_iterator = self.new_native_function_in(
            realm,
            "[Symbol.iterator]",
            Rc::new(|vm: &mut Vm, this: JsValue, _: &[JsValue], _: &[JsValue]| -> ThrowCompletionOr<JsValue> {
                vm.require_object_coercible(&this)?;
                let string = vm.to_js_string(&this)?;
                let proto = vm.intrinsic(WellKnownIntrinsics::StringIteratorPrototype);
                let iterator = vm.heap.allocate(HeapCell::Object(JsObject::new(
                    Some(proto),
                    ObjectKind::StringIterator {
                        string,
                        position: 0,
                    },
                )))?;
                Ok(JsValue::Object(iterator))
            }),
        )?;
        self.heap
            .object_mut(string_proto)
            .define_own_property(iterator_symbol.clone(), PropertyDescriptor::hidden(string_iterator));

        let string_next = self.new_native_function_in(
            realm,
            "next",
            Rc::new(|vm: &mut Vm, this: JsValue, _: &[JsValue], _: &[JsValue]| {
                vm.string_iterator_next(this)
            }),
        )?;
        self.heap
            .object_mut(string_iter_proto)
            .define_own_property(PropertyKey::from("next"), PropertyDescriptor::hidden(string_next));

        let self_iterator = self.new_native_function_in(
            realm,
            "[Symbol.iterator]",
            Rc::new(|_: &mut Vm, this: JsValue, _: &[JsValue], _: &[JsValue]| -> ThrowCompletionOr<JsValue> { Ok(this) }),
        )?;
        self.heap
            .object_mut(iter_proto)
            .define_own_property(iterator_symbol, PropertyDescriptor::hidden(self_iterator));
        Ok(())
    }

    fn array_iterator_next(&mut self, this: JsValue) -> ThrowCompletionOr<JsValue> {
        let iterator = match this {
            JsValue::Object(o) => o,
            other => {
                return Err(JErrorType::TypeError(
                    ErrorMessage::NotAnObject.format(other.type_name()),
                ))
            }
        };
        let (iterated, index) = match &self.heap.object(iterator).kind {
            ObjectKind::ArrayIterator { done: true, .. } => {
                return self.create_iter_result_object(JsValue::Undefined, true)
            }
            ObjectKind::ArrayIterator {
                iterated,
                next_index,
                ..
            } => (*iterated, *next_index),
            _ => {
                return Err(JErrorType::TypeError(
                    "next called on an object that is not an array iterator".to_string(),
                ))
            }
        };
        let length_value = self.get_v(&iterated, &PropertyKey::from("length"))?;
        let length = self.to_length(&length_value)?;
        let finished = u64::from(index) >= length;
        if let ObjectKind::ArrayIterator {
            next_index, done, ..
        } = &mut self.heap.object_mut(iterator).kind
        {
            if finished {
                *done = true;
            } else {
                *next_index += 1;
            }
        }
        if finished {
            return self.create_iter_result_object(JsValue::Undefined, true);
        }
        let value = self.get_v(&iterated, &PropertyKey::Int(index))?;
        self.create_iter_result_object(value, false)
    }

    fn string_iterator_next(&mut self, this: JsValue) -> ThrowCompletionOr<JsValue> {
        let iterator = this.as_object().ok_or_else(|| {
            JErrorType::TypeError(ErrorMessage::NotAnObject.format(this.type_name()))
        })?;
        let (string, position) = match &self.heap.object(iterator).kind {
            ObjectKind::StringIterator { string, position } => (*string, *position),
            _ => {
                return Err(JErrorType::TypeError(
                    "next called on an object that is not a string iterator".to_string(),
                ))
            }
        };
        let next = self.heap.string(string)[position..]
            .chars()
            .next()
            .map(|c| (c.to_string(), c.len_utf8()));
        match next {
            None => self.create_iter_result_object(JsValue::Undefined, true),
            Some((chunk, width)) => {
                if let ObjectKind::StringIterator { position, .. } =
                    &mut self.heap.object_mut(iterator).kind
                {
                    *position += width;
                }
                let value = self.js_string(&chunk)?;
                self.create_iter_result_object(value, false)
            }
        }
    }
}
