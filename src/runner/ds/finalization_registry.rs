use crate::runner::ds::error::{ErrorMessage, JErrorType, ThrowCompletionOr};
use crate::runner::ds::heap::{CellId, CellVisitor, HeapCell};
use crate::runner::ds::object::{JsObject, ObjectKind};
use crate::runner::ds::operations::type_conversion::display_value;
use crate::runner::ds::realm::WellKnownIntrinsics;
use crate::runner::ds::value::JsValue;
use crate::runner::jobs::JobCallback;
use crate::runner::vm::Vm;

/// A registered target. `target` and `unregister_token` are weak and become
/// `None` once the collector finds them unreachable.
#[derive(Debug, Clone)]
pub struct FinalizationRecord {
    pub target: Option<CellId>,
    pub held_value: JsValue,
    pub unregister_token: Option<CellId>,
}

pub struct FinalizationRegistryData {
    pub cleanup_callback: JobCallback,
    records: Vec<FinalizationRecord>,
}

impl FinalizationRegistryData {
    pub fn new(cleanup_callback: JobCallback) -> Self {
        FinalizationRegistryData {
            cleanup_callback,
            records: Vec::new(),
        }
    }

    pub fn register(&mut self, target: CellId, held_value: JsValue, unregister_token: Option<CellId>) {
        self.records.push(FinalizationRecord {
            target: Some(target),
            held_value,
            unregister_token,
        });
    }

    pub fn unregister(&mut self, token: CellId) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.unregister_token != Some(token));
        before != self.records.len()
    }

    pub fn records(&self) -> &[FinalizationRecord] {
        &self.records
    }

    /// Drop weak references to cells that did not survive marking. Returns true
    /// when a target was cleared, meaning a cleanup job is owed.
    pub fn clear_dead_targets(&mut self, is_live: &dyn Fn(CellId) -> bool) -> bool {
        let mut cleared = false;
        for record in self.records.iter_mut() {
            if let Some(target) = record.target {
                if !is_live(target) {
                    record.target = None;
                    cleared = true;
                }
            }
            if let Some(token) = record.unregister_token {
                if !is_live(token) {
                    record.unregister_token = None;
                }
            }
        }
        cleared
    }

    /// Remove and return the held values of every record whose target is gone.
    pub fn take_cleared(&mut self) -> Vec<JsValue> {
        let mut held = Vec::new();
        self.records.retain(|r| {
            if r.target.is_none() {
                held.push(r.held_value);
                false
            } else {
                true
            }
        });
        held
    }

    pub fn visit_edges(&self, visitor: &mut dyn CellVisitor) {
        visitor.visit(self.cleanup_callback.callback);
        for record in &self.records {
            visitor.visit_value(&record.held_value);
        }
    }
}

impl Vm {
    pub fn new_finalization_registry(&mut self, cleanup_callback: JsValue) -> ThrowCompletionOr<CellId> {
        let callback = match cleanup_callback {
            JsValue::Object(f) if self.is_callable(&cleanup_callback) => f,
            _ => {
                return Err(JErrorType::TypeError(
                    ErrorMessage::NotAFunction.format(&display_value(&self.heap, &cleanup_callback)),
                ))
            }
        };
        let make_job_callback = self.host_hooks.make_job_callback.clone();
        let job_callback = make_job_callback(self, callback);
        let proto = self.intrinsic(WellKnownIntrinsics::FinalizationRegistryPrototype);
        self.heap.allocate(HeapCell::Object(JsObject::new(
            Some(proto),
            ObjectKind::FinalizationRegistry(FinalizationRegistryData::new(job_callback)),
        )))
    }

    fn registry_data_mut(&mut self, registry: CellId) -> ThrowCompletionOr<&mut FinalizationRegistryData> {
        match &mut self.heap.object_mut(registry).kind {
            ObjectKind::FinalizationRegistry(data) => Ok(data),
            _ => Err(JErrorType::TypeError(
                "object is not a FinalizationRegistry".to_string(),
            )),
        }
    }

    /// Objects and unregistered symbols can be held weakly.
    fn can_be_held_weakly(&self, value: &JsValue) -> Option<CellId> {
        match value {
            JsValue::Object(o) => Some(*o),
            JsValue::Symbol(s) if !self.heap.symbol(*s).is_registered() => Some(*s),
            _ => None,
        }
    }

    pub fn finalization_registry_register(
        &mut self,
        registry: CellId,
        target: JsValue,
        held_value: JsValue,
        unregister_token: JsValue,
    ) -> ThrowCompletionOr<()> {
        let target_cell = self.can_be_held_weakly(&target).ok_or_else(|| {
            JErrorType::TypeError("register target cannot be held weakly".to_string())
        })?;
        if target == held_value {
            return Err(JErrorType::TypeError(
                "target and held value must not be the same".to_string(),
            ));
        }
        let token = match self.can_be_held_weakly(&unregister_token) {
            Some(token) => Some(token),
            None if unregister_token.is_undefined() => None,
            None => {
                return Err(JErrorType::TypeError(
                    "unregister token cannot be held weakly".to_string(),
                ))
            }
        };
        self.registry_data_mut(registry)?
            .register(target_cell, held_value, token);
        Ok(())
    }

    pub fn finalization_registry_unregister(&mut self, registry: CellId, unregister_token: JsValue) -> ThrowCompletionOr<bool> {
        let token = self.can_be_held_weakly(&unregister_token).ok_or_else(|| {
            JErrorType::TypeError("unregister token cannot be held weakly".to_string())
        })?;
        Ok(self.registry_data_mut(registry)?.unregister(token))
    }
}
