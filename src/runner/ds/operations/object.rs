use crate::runner::ds::error::{ErrorMessage, JErrorType, ThrowCompletionOr};
use crate::runner::ds::heap::{CellId, Heap, HeapCell};
use crate::runner::ds::object::{JsObject, ObjectKind};
use crate::runner::ds::object_property::{PropertyDescriptor, PropertyKey};
use crate::runner::ds::realm::WellKnownIntrinsics;
use crate::runner::ds::value::JsValue;
use crate::runner::vm::Vm;

/// Prototype chains longer than this are treated as broken.
const MAX_PROTOTYPE_CHAIN: usize = 10_000;

pub fn has_own_property(heap: &Heap, o: CellId, p: &PropertyKey) -> bool {
    heap.object(o).get_own_property(p).is_some()
}

pub fn has_property(heap: &Heap, o: CellId, p: &PropertyKey) -> bool {
    lookup_property(heap, o, p).is_some()
}

/// Find `p` on `o` or the first prototype that has it.
pub fn lookup_property(heap: &Heap, o: CellId, p: &PropertyKey) -> Option<PropertyDescriptor> {
    let mut current = Some(o);
    let mut depth = 0;
    while let Some(object) = current {
        let obj = heap.object(object);
        if let Some(desc) = obj.get_own_property(p) {
            return Some(*desc);
        }
        depth += 1;
        if depth > MAX_PROTOTYPE_CHAIN {
            return None;
        }
        current = obj.get_prototype_of();
    }
    None
}

pub fn is_callable(heap: &Heap, v: &JsValue) -> bool {
    match v {
        JsValue::Object(o) => heap.object(*o).is_callable(),
        _ => false,
    }
}

impl Vm {
    pub fn new_object(&mut self) -> ThrowCompletionOr<CellId> {
        let proto = self.intrinsic(WellKnownIntrinsics::ObjectPrototype);
        self.new_object_with_prototype(Some(proto))
    }

    pub fn new_object_with_prototype(&mut self, prototype: Option<CellId>) -> ThrowCompletionOr<CellId> {
        self.heap
            .allocate(HeapCell::Object(JsObject::ordinary(prototype)))
    }

    pub fn create_array_from_list(&mut self, values: &[JsValue]) -> ThrowCompletionOr<CellId> {
        let proto = self.intrinsic(WellKnownIntrinsics::ArrayPrototype);
        let array = self
            .heap
            .allocate(HeapCell::Object(JsObject::new(Some(proto), ObjectKind::Array)))?;
        let object = self.heap.object_mut(array);
        for (i, value) in values.iter().enumerate() {
            object.define_own_property(PropertyKey::Int(i as u32), PropertyDescriptor::data(*value));
        }
        Ok(array)
    }

    pub fn create_iter_result_object(&mut self, value: JsValue, done: bool) -> ThrowCompletionOr<JsValue> {
        let result = self.new_object()?;
        let object = self.heap.object_mut(result);
        object.define_own_property(PropertyKey::from("value"), PropertyDescriptor::data(value));
        object.define_own_property(
            PropertyKey::from("done"),
            PropertyDescriptor::data(JsValue::Boolean(done)),
        );
        Ok(JsValue::Object(result))
    }

    pub fn get(&mut self, o: CellId, p: &PropertyKey, receiver: JsValue) -> ThrowCompletionOr<JsValue> {
        match lookup_property(&self.heap, o, p) {
            None => Ok(JsValue::Undefined),
            Some(PropertyDescriptor::Data { value, .. }) => Ok(value),
            Some(PropertyDescriptor::Accessor { get: None, .. }) => Ok(JsValue::Undefined),
            Some(PropertyDescriptor::Accessor { get: Some(getter), .. }) => {
                self.call(JsValue::Object(getter), receiver, &[])
            }
        }
    }

    pub fn get_v(&mut self, v: &JsValue, p: &PropertyKey) -> ThrowCompletionOr<JsValue> {
        let o = self.to_object(v)?;
        self.get(o, p, *v)
    }

    /// The callable at `v[p]`, or `None` when the property is nullish.
    pub fn get_method(&mut self, v: &JsValue, p: &PropertyKey) -> ThrowCompletionOr<Option<CellId>> {
        let func = self.get_v(v, p)?;
        if func.is_nullish() {
            return Ok(None);
        }
        if !is_callable(&self.heap, &func) {
            return Err(JErrorType::TypeError(ErrorMessage::NotAFunction.format(&p.to_string())));
        }
        Ok(func.as_object())
    }

    pub fn set(&mut self, o: CellId, p: PropertyKey, v: JsValue, receiver: JsValue, throw: bool) -> ThrowCompletionOr<bool> {
        let success = match lookup_property(&self.heap, o, &p) {
            Some(PropertyDescriptor::Accessor { set: Some(setter), .. }) => {
                self.call(JsValue::Object(setter), receiver, &[v])?;
                true
            }
            Some(PropertyDescriptor::Accessor { set: None, .. }) => false,
            Some(PropertyDescriptor::Data { writable: false, .. }) => false,
            _ => match receiver {
                JsValue::Object(r) => {
                    let target = self.heap.object_mut(r);
                    match target.get_own_property(&p).copied() {
                        Some(PropertyDescriptor::Data {
                            writable: true,
                            enumerable,
                            configurable,
                            ..
                        }) => target.define_own_property(
                            p.clone(),
                            PropertyDescriptor::Data {
                                value: v,
                                writable: true,
                                enumerable,
                                configurable,
                            },
                        ),
                        Some(_) => false,
                        None => target.define_own_property(p.clone(), PropertyDescriptor::data(v)),
                    }
                }
                _ => false,
            },
        };
        if !success && throw {
            return Err(JErrorType::TypeError(format!(
                "Cannot assign to property '{}'",
                p
            )));
        }
        Ok(success)
    }

    pub fn create_data_property(&mut self, o: CellId, p: PropertyKey, v: JsValue) -> bool {
        self.heap
            .object_mut(o)
            .define_own_property(p, PropertyDescriptor::data(v))
    }

    pub fn create_data_property_or_throw(&mut self, o: CellId, p: PropertyKey, v: JsValue) -> ThrowCompletionOr<()> {
        self.define_property_or_throw(o, p, PropertyDescriptor::data(v))
    }

    pub fn define_property_or_throw(&mut self, o: CellId, p: PropertyKey, desc: PropertyDescriptor) -> ThrowCompletionOr<()> {
        let message = format!("Cannot define property '{}'", p);
        if self.heap.object_mut(o).define_own_property(p, desc) {
            Ok(())
        } else {
            Err(JErrorType::TypeError(message))
        }
    }

    pub fn delete_property_or_throw(&mut self, o: CellId, p: &PropertyKey) -> ThrowCompletionOr<()> {
        if self.heap.object_mut(o).delete(p) {
            Ok(())
        } else {
            Err(JErrorType::TypeError(format!("Cannot delete property '{}'", p)))
        }
    }

    /// Copy every own enumerable property of `source` not named in `excluded`
    /// onto `target`, in own-key order.
    pub fn copy_data_properties(&mut self, target: CellId, source: &JsValue, excluded: &[PropertyKey]) -> ThrowCompletionOr<()> {
        if source.is_nullish() {
            return Ok(());
        }
        let from = self.to_object(source)?;
        let keys = self.heap.object(from).own_property_keys();
        for key in keys {
            if excluded.contains(&key) {
                continue;
            }
            let enumerable = self
                .heap
                .object(from)
                .get_own_property(&key)
                .map(|d| d.is_enumerable())
                .unwrap_or(false);
            if !enumerable {
                continue;
            }
            let value = self.get(from, &key, JsValue::Object(from))?;
            self.create_data_property_or_throw(target, key, value)?;
        }
        Ok(())
    }

    pub fn is_callable(&self, v: &JsValue) -> bool {
        is_callable(&self.heap, v)
    }
}
