use std::mem::size_of;

use indexmap::IndexMap;

use crate::runner::ds::finalization_registry::FinalizationRegistryData;
use crate::runner::ds::function_object::FunctionData;
use crate::runner::ds::heap::{CellId, CellVisitor};
use crate::runner::ds::object_property::{PropertyDescriptor, PropertyKey};
use crate::runner::ds::promise::PromiseData;
use crate::runner::ds::value::{JsNumberType, JsValue};

/// What an object is beyond its property bag.
pub enum ObjectKind {
    Ordinary,
    Array,
    Function(FunctionData),
    ArrayIterator {
        iterated: JsValue,
        next_index: u32,
        done: bool,
    },
    StringIterator {
        string: CellId,
        position: usize,
    },
    ArrayBuffer(Vec<u8>),
    Promise(PromiseData),
    FinalizationRegistry(FinalizationRegistryData),
    PrimitiveWrapper(JsValue),
}

pub struct JsObject {
    properties: IndexMap<PropertyKey, PropertyDescriptor>,
    prototype: Option<CellId>,
    extensible: bool,
    pub kind: ObjectKind,
}

impl JsObject {
    pub fn new(prototype: Option<CellId>, kind: ObjectKind) -> Self {
        let mut object = JsObject {
            properties: IndexMap::new(),
            prototype,
            extensible: true,
            kind,
        };
        if let ObjectKind::Array = object.kind {
            object.properties.insert(
                PropertyKey::from("length"),
                PropertyDescriptor::Data {
                    value: JsValue::from_i64(0),
                    writable: true,
                    enumerable: false,
                    configurable: false,
                },
            );
        }
        object
    }

    pub fn ordinary(prototype: Option<CellId>) -> Self {
        JsObject::new(prototype, ObjectKind::Ordinary)
    }

    pub fn get_prototype_of(&self) -> Option<CellId> {
        self.prototype
    }

    pub fn set_prototype_of(&mut self, prototype: Option<CellId>) -> bool {
        if self.prototype == prototype {
            return true;
        }
        if !self.extensible {
            return false;
        }
        self.prototype = prototype;
        true
    }

    pub fn is_extensible(&self) -> bool {
        self.extensible
    }

    pub fn prevent_extensions(&mut self) -> bool {
        self.extensible = false;
        true
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, ObjectKind::Array)
    }

    pub fn get_own_property(&self, property: &PropertyKey) -> Option<&PropertyDescriptor> {
        self.properties.get(property)
    }

    pub fn define_own_property(&mut self, property: PropertyKey, descriptor: PropertyDescriptor) -> bool {
        match self.properties.get(&property) {
            Some(current) if !current.is_configurable() => {
                let writable_data = matches!(
                    (current, &descriptor),
                    (
                        PropertyDescriptor::Data { writable: true, .. },
                        PropertyDescriptor::Data { .. }
                    )
                );
                if !writable_data || current.is_enumerable() != descriptor.is_enumerable() {
                    return false;
                }
            }
            Some(_) => {}
            None if !self.extensible => return false,
            None => {}
        }
        if let (ObjectKind::Array, Some(index)) = (&self.kind, property.as_index()) {
            self.grow_array_length(index as i64 + 1);
        }
        self.properties.insert(property, descriptor);
        true
    }

    fn grow_array_length(&mut self, required: i64) {
        if let Some(PropertyDescriptor::Data { value, .. }) =
            self.properties.get_mut(&PropertyKey::from("length"))
        {
            if let JsValue::Number(JsNumberType::Integer(length)) = value {
                if *length < required {
                    *value = JsValue::from_i64(required);
                }
            }
        }
    }

    pub fn delete(&mut self, property: &PropertyKey) -> bool {
        match self.properties.get(property) {
            None => true,
            Some(pd) => {
                if pd.is_configurable() {
                    self.properties.shift_remove(property);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Integer keys ascending, then string keys and symbol keys in insertion order.
    pub fn own_property_keys(&self) -> Vec<PropertyKey> {
        let mut int_keys = vec![];
        let mut str_keys = vec![];
        let mut sym_keys = vec![];
        for key in self.properties.keys() {
            match key {
                PropertyKey::Int(i) => int_keys.push(*i),
                PropertyKey::Str(_) => str_keys.push(key.clone()),
                PropertyKey::Sym(_) => sym_keys.push(key.clone()),
            }
        }
        int_keys.sort_unstable();

        let mut result: Vec<PropertyKey> = int_keys.into_iter().map(PropertyKey::Int).collect();
        result.append(&mut str_keys);
        result.append(&mut sym_keys);
        result
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    pub fn visit_edges(&self, visitor: &mut dyn CellVisitor) {
        if let Some(proto) = self.prototype {
            visitor.visit(proto);
        }
        for (key, descriptor) in &self.properties {
            if let PropertyKey::Sym(s) = key {
                visitor.visit(*s);
            }
            descriptor.visit_edges(visitor);
        }
        match &self.kind {
            ObjectKind::Ordinary | ObjectKind::Array | ObjectKind::ArrayBuffer(_) => {}
            ObjectKind::Function(f) => f.visit_edges(visitor),
            ObjectKind::ArrayIterator { iterated, .. } => visitor.visit_value(iterated),
            ObjectKind::StringIterator { string, .. } => visitor.visit(*string),
            ObjectKind::Promise(p) => p.visit_edges(visitor),
            ObjectKind::FinalizationRegistry(r) => r.visit_edges(visitor),
            ObjectKind::PrimitiveWrapper(v) => visitor.visit_value(v),
        }
    }

    pub(crate) fn estimated_size(&self) -> usize {
        let own = self.properties.len() * size_of::<(PropertyKey, PropertyDescriptor)>();
        own + match &self.kind {
            ObjectKind::ArrayBuffer(bytes) => bytes.len(),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_keys_put_integers_first() {
        let mut o = JsObject::ordinary(None);
        o.define_own_property(PropertyKey::from("b"), PropertyDescriptor::data(JsValue::Null));
        o.define_own_property(PropertyKey::from("2"), PropertyDescriptor::data(JsValue::Null));
        o.define_own_property(PropertyKey::from("a"), PropertyDescriptor::data(JsValue::Null));
        o.define_own_property(PropertyKey::Int(0), PropertyDescriptor::data(JsValue::Null));

        assert_eq!(
            o.own_property_keys(),
            vec![
                PropertyKey::Int(0),
                PropertyKey::Int(2),
                PropertyKey::from("b"),
                PropertyKey::from("a"),
            ]
        );
    }

    #[test]
    fn array_length_tracks_highest_index() {
        let mut a = JsObject::new(None, ObjectKind::Array);
        a.define_own_property(PropertyKey::Int(4), PropertyDescriptor::data(JsValue::Null));
        match a.get_own_property(&PropertyKey::from("length")) {
            Some(PropertyDescriptor::Data { value, .. }) => assert_eq!(*value, JsValue::from_i64(5)),
            _ => panic!("array has no length"),
        }
    }

    #[test]
    fn non_configurable_property_survives_delete() {
        let mut o = JsObject::ordinary(None);
        o.define_own_property(
            PropertyKey::from("x"),
            PropertyDescriptor::Data {
                value: JsValue::Null,
                writable: false,
                enumerable: true,
                configurable: false,
            },
        );
        assert!(!o.delete(&PropertyKey::from("x")));
        assert!(o.get_own_property(&PropertyKey::from("x")).is_some());
    }
}
