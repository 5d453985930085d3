use std::collections::HashMap;

use crate::runner::ds::error::{ErrorMessage, JErrorType};
use crate::runner::ds::heap::{CellId, CellVisitor, Heap};
use crate::runner::ds::operations::object::has_property;
use crate::runner::ds::object_property::PropertyKey;
use crate::runner::ds::value::JsValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingFlag {
    NoDelete,
    IsImmutable,
    /// Immutable binding whose assignment throws even in sloppy code.
    Strict,
}

/// An import binding: reads go to `name` in the exporting module's environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndirectBinding {
    pub environment: CellId,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    /// `None` until initialized (temporal dead zone).
    pub value: Option<JsValue>,
    pub flags: Vec<BindingFlag>,
    pub indirect: Option<IndirectBinding>,
    deleted: bool,
}

impl Binding {
    pub fn is_mutable(&self) -> bool {
        !self.flags.contains(&BindingFlag::IsImmutable)
    }

    pub fn is_strict(&self) -> bool {
        self.flags.contains(&BindingFlag::Strict)
    }

    pub fn is_deletable(&self) -> bool {
        !self.flags.contains(&BindingFlag::NoDelete)
    }
}

/// Bindings held in stable slots. A slot index, once handed out, keeps naming
/// the same binding for the lifetime of the record; deleted bindings become
/// tombstones instead of shifting their neighbours.
#[derive(Debug, Clone, Default)]
pub struct DeclarativeEnvironmentRecord {
    bindings: Vec<Binding>,
    index: HashMap<String, usize>,
}

impl DeclarativeEnvironmentRecord {
    pub fn new() -> Self {
        DeclarativeEnvironmentRecord {
            bindings: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn has_binding(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn binding_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn binding(&self, index: usize) -> Option<&Binding> {
        self.bindings.get(index).filter(|b| !b.deleted)
    }

    pub fn binding_mut(&mut self, index: usize) -> Option<&mut Binding> {
        self.bindings.get_mut(index).filter(|b| !b.deleted)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings
            .iter()
            .filter(|b| !b.deleted)
            .map(|b| b.name.as_str())
    }

    fn push(&mut self, name: String, flags: Vec<BindingFlag>, indirect: Option<IndirectBinding>) -> usize {
        if let Some(index) = self.index.get(&name) {
            return *index;
        }
        let index = self.bindings.len();
        self.index.insert(name.clone(), index);
        self.bindings.push(Binding {
            name,
            value: None,
            flags,
            indirect,
            deleted: false,
        });
        index
    }

    pub fn create_mutable_binding(&mut self, name: String, can_delete: bool) -> usize {
        let flags = if can_delete {
            vec![]
        } else {
            vec![BindingFlag::NoDelete]
        };
        self.push(name, flags, None)
    }

    pub fn create_immutable_binding(&mut self, name: String, strict: bool) -> usize {
        let mut flags = vec![BindingFlag::IsImmutable, BindingFlag::NoDelete];
        if strict {
            flags.push(BindingFlag::Strict);
        }
        self.push(name, flags, None)
    }

    pub fn create_import_binding(&mut self, name: String, environment: CellId, target_name: String) -> usize {
        self.push(
            name,
            vec![BindingFlag::IsImmutable, BindingFlag::NoDelete, BindingFlag::Strict],
            Some(IndirectBinding {
                environment,
                name: target_name,
            }),
        )
    }

    /// Returns false if the binding is missing or already initialized.
    pub fn initialize_binding(&mut self, name: &str, value: JsValue) -> bool {
        match self.index.get(name).copied() {
            Some(index) => self.initialize_binding_at(index, value),
            None => false,
        }
    }

    pub fn initialize_binding_at(&mut self, index: usize, value: JsValue) -> bool {
        match self.binding_mut(index) {
            Some(b) if b.value.is_none() && b.indirect.is_none() => {
                b.value = Some(value);
                true
            }
            _ => false,
        }
    }

    pub fn delete_binding(&mut self, name: &str) -> bool {
        match self.index.get(name).copied() {
            None => true,
            Some(index) => {
                let binding = &mut self.bindings[index];
                if !binding.is_deletable() {
                    return false;
                }
                binding.deleted = true;
                binding.value = None;
                self.index.remove(name);
                true
            }
        }
    }

    pub fn visit_edges(&self, visitor: &mut dyn CellVisitor) {
        for binding in &self.bindings {
            if let Some(v) = &binding.value {
                visitor.visit_value(v);
            }
            if let Some(indirect) = &binding.indirect {
                visitor.visit(indirect.environment);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObjectEnvironmentRecord {
    pub binding_object: CellId,
    pub is_with_environment: bool,
}

impl ObjectEnvironmentRecord {
    pub fn new(binding_object: CellId, is_with_environment: bool) -> Self {
        ObjectEnvironmentRecord {
            binding_object,
            is_with_environment,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThisBindingStatus {
    Lexical,
    Initialized,
    Uninitialized,
}

#[derive(Debug, Clone)]
pub struct FunctionEnvironmentRecord {
    pub declarative: DeclarativeEnvironmentRecord,
    pub this_value: Option<JsValue>,
    pub this_binding_status: ThisBindingStatus,
    pub function_object: CellId,
    pub new_target: JsValue,
}

impl FunctionEnvironmentRecord {
    pub fn bind_this_value(&mut self, value: JsValue) -> Result<(), JErrorType> {
        match self.this_binding_status {
            ThisBindingStatus::Lexical => {
                Err(JErrorType::InternalError("Arrow functions have no this binding".to_string()))
            }
            ThisBindingStatus::Initialized => Err(JErrorType::ReferenceError(
                "'this' is already initialized".to_string(),
            )),
            ThisBindingStatus::Uninitialized => {
                self.this_value = Some(value);
                self.this_binding_status = ThisBindingStatus::Initialized;
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct GlobalEnvironmentRecord {
    pub object_record: ObjectEnvironmentRecord,
    pub declarative_record: DeclarativeEnvironmentRecord,
    pub global_this: CellId,
    pub var_names: Vec<String>,
}

impl GlobalEnvironmentRecord {
    pub fn new(global_object: CellId, global_this: CellId) -> Self {
        GlobalEnvironmentRecord {
            object_record: ObjectEnvironmentRecord::new(global_object, false),
            declarative_record: DeclarativeEnvironmentRecord::new(),
            global_this,
            var_names: Vec::new(),
        }
    }
}

pub enum EnvironmentRecordType {
    Declarative(DeclarativeEnvironmentRecord),
    Object(ObjectEnvironmentRecord),
    Function(FunctionEnvironmentRecord),
    Global(GlobalEnvironmentRecord),
    Module(DeclarativeEnvironmentRecord),
}

impl EnvironmentRecordType {
    /// The slot table, for record kinds whose bindings live in stable slots.
    pub fn declarative(&self) -> Option<&DeclarativeEnvironmentRecord> {
        match self {
            EnvironmentRecordType::Declarative(d) | EnvironmentRecordType::Module(d) => Some(d),
            EnvironmentRecordType::Function(f) => Some(&f.declarative),
            _ => None,
        }
    }

    pub fn declarative_mut(&mut self) -> Option<&mut DeclarativeEnvironmentRecord> {
        match self {
            EnvironmentRecordType::Declarative(d) | EnvironmentRecordType::Module(d) => Some(d),
            EnvironmentRecordType::Function(f) => Some(&mut f.declarative),
            _ => None,
        }
    }

    pub fn has_this_binding(&self) -> bool {
        match self {
            EnvironmentRecordType::Declarative(_) | EnvironmentRecordType::Object(_) => false,
            EnvironmentRecordType::Function(f) => {
                f.this_binding_status != ThisBindingStatus::Lexical
            }
            EnvironmentRecordType::Global(_) | EnvironmentRecordType::Module(_) => true,
        }
    }

    pub fn get_this_binding(&self) -> Result<JsValue, JErrorType> {
        match self {
            EnvironmentRecordType::Function(f) => match f.this_value {
                Some(v) if f.this_binding_status == ThisBindingStatus::Initialized => Ok(v),
                _ => Err(JErrorType::ReferenceError(
                    ErrorMessage::NotInitialized.format("this"),
                )),
            },
            EnvironmentRecordType::Global(g) => Ok(JsValue::Object(g.global_this)),
            EnvironmentRecordType::Module(_) => Ok(JsValue::Undefined),
            _ => Err(JErrorType::InternalError(
                "environment has no this binding".to_string(),
            )),
        }
    }

    /// The object a `with` statement contributes as the implicit `this` of calls.
    pub fn with_base_object(&self) -> Option<CellId> {
        match self {
            EnvironmentRecordType::Object(o) if o.is_with_environment => Some(o.binding_object),
            _ => None,
        }
    }

    pub fn visit_edges(&self, visitor: &mut dyn CellVisitor) {
        match self {
            EnvironmentRecordType::Declarative(d) | EnvironmentRecordType::Module(d) => {
                d.visit_edges(visitor)
            }
            EnvironmentRecordType::Object(o) => visitor.visit(o.binding_object),
            EnvironmentRecordType::Function(f) => {
                f.declarative.visit_edges(visitor);
                if let Some(this) = &f.this_value {
                    visitor.visit_value(this);
                }
                visitor.visit(f.function_object);
                visitor.visit_value(&f.new_target);
            }
            EnvironmentRecordType::Global(g) => {
                visitor.visit(g.object_record.binding_object);
                g.declarative_record.visit_edges(visitor);
                visitor.visit(g.global_this);
            }
        }
    }
}

/// Whether `environment` directly declares `name`, and the binding's slot when
/// it lives in one.
pub enum BindingLookup {
    Absent,
    Present(Option<usize>),
}

pub fn has_binding(heap: &Heap, environment: CellId, name: &str) -> BindingLookup {
    match &heap.environment(environment).record {
        EnvironmentRecordType::Declarative(d) | EnvironmentRecordType::Module(d) => {
            present_at(d.binding_index(name))
        }
        EnvironmentRecordType::Function(f) => present_at(f.declarative.binding_index(name)),
        EnvironmentRecordType::Object(o) => {
            if has_property(heap, o.binding_object, &PropertyKey::from(name)) {
                BindingLookup::Present(None)
            } else {
                BindingLookup::Absent
            }
        }
        EnvironmentRecordType::Global(g) => {
            if g.declarative_record.has_binding(name)
                || has_property(heap, g.object_record.binding_object, &PropertyKey::from(name))
            {
                BindingLookup::Present(None)
            } else {
                BindingLookup::Absent
            }
        }
    }
}

fn present_at(index: Option<usize>) -> BindingLookup {
    match index {
        Some(i) => BindingLookup::Present(Some(i)),
        None => BindingLookup::Absent,
    }
}
