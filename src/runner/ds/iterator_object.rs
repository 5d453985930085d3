use crate::runner::ds::error::{ErrorMessage, JErrorType, ThrowCompletionOr};
use crate::runner::ds::heap::CellId;
use crate::runner::ds::object_property::PropertyKey;
use crate::runner::ds::operations::type_conversion::{display_value, to_boolean};
use crate::runner::ds::value::JsValue;
use crate::runner::vm::Vm;

/// A synchronous iterator in use. `done` is set once the iterator is exhausted
/// or has failed, after which it must not be closed.
#[derive(Debug, Clone, Copy)]
pub struct IteratorRecord {
    pub iterator: CellId,
    pub next_method: JsValue,
    pub done: bool,
}

impl Vm {
    pub fn get_iterator(&mut self, value: &JsValue) -> ThrowCompletionOr<IteratorRecord> {
        let key = PropertyKey::Sym(self.well_known_symbols.iterator);
        let method = match self.get_method(value, &key)? {
            Some(m) => m,
            None => {
                return Err(JErrorType::TypeError(
                    ErrorMessage::NotIterable.format(&display_value(&self.heap, value)),
                ))
            }
        };
        let iterator = self.call(JsValue::Object(method), *value, &[])?;
        let iterator = iterator.as_object().ok_or_else(|| {
            JErrorType::TypeError(ErrorMessage::NotAnObject.format(&display_value(&self.heap, &iterator)))
        })?;
        let next_method = self.get(iterator, &PropertyKey::from("next"), JsValue::Object(iterator))?;
        Ok(IteratorRecord {
            iterator,
            next_method,
            done: false,
        })
    }

    pub fn iterator_next(&mut self, record: &mut IteratorRecord) -> ThrowCompletionOr<CellId> {
        let result = match self.call(record.next_method, JsValue::Object(record.iterator), &[]) {
            Ok(r) => r,
            Err(e) => {
                record.done = true;
                return Err(e);
            }
        };
        match result.as_object() {
            Some(o) => Ok(o),
            None => {
                record.done = true;
                Err(JErrorType::TypeError(
                    "iterator result is not an object".to_string(),
                ))
            }
        }
    }

    /// Pull the next value, or `None` once the iterator reports done. Any
    /// failure marks the record done.
    pub fn iterator_step_value(&mut self, record: &mut IteratorRecord) -> ThrowCompletionOr<Option<JsValue>> {
        let result = self.iterator_next(record)?;
        let receiver = JsValue::Object(result);
        let done = match self.get(result, &PropertyKey::from("done"), receiver) {
            Ok(d) => to_boolean(&self.heap, &d),
            Err(e) => {
                record.done = true;
                return Err(e);
            }
        };
        if done {
            record.done = true;
            return Ok(None);
        }
        match self.get(result, &PropertyKey::from("value"), receiver) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                record.done = true;
                Err(e)
            }
        }
    }

    /// Call the iterator's `return`. A pending error in `completion` wins over
    /// anything `return` does; otherwise `return`'s own failure is reported.
    pub fn iterator_close(&mut self, record: &IteratorRecord, completion: ThrowCompletionOr<()>) -> ThrowCompletionOr<()> {
        let iterator = JsValue::Object(record.iterator);
        let inner = match self.get_method(&iterator, &PropertyKey::from("return")) {
            Ok(None) => return completion,
            Ok(Some(return_method)) => self.call(JsValue::Object(return_method), iterator, &[]),
            Err(e) => Err(e),
        };
        completion?;
        let inner = inner?;
        if inner.as_object().is_none() {
            return Err(JErrorType::TypeError(
                "iterator return() result is not an object".to_string(),
            ));
        }
        Ok(())
    }
}
