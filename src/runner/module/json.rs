//! JSON modules: the parsed document becomes the single `default` export.

use std::path::Path;

use serde_json::Value;

use crate::runner::ds::error::{JErrorType, ThrowCompletionOr};
use crate::runner::ds::object_property::PropertyKey;
use crate::runner::ds::value::{JsNumberType, JsValue};
use crate::runner::module::{ModuleBody, ModuleId, ModuleRecord, ModuleType, SyntheticModule};
use crate::runner::vm::Vm;

impl Vm {
    pub fn parse_json_module(&mut self, source: &str, filename: &Path) -> ThrowCompletionOr<ModuleId> {
        let document: Value =
            serde_json::from_str(source).map_err(|e| JErrorType::SyntaxError(e.to_string()))?;
        let value = self.json_to_value(&document)?;
        let realm = self.current_realm();
        Ok(self.add_module(ModuleRecord::new(
            filename.to_path_buf(),
            ModuleType::Json,
            realm,
            Vec::new(),
            ModuleBody::Synthetic(SyntheticModule {
                export_names: vec!["default".to_string()],
                values: vec![value],
            }),
        )))
    }

    /// Convert a JSON document into engine values. Object keys keep document order.
    pub fn json_to_value(&mut self, value: &Value) -> ThrowCompletionOr<JsValue> {
        Ok(match value {
            Value::Null => JsValue::Null,
            Value::Bool(b) => JsValue::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => JsValue::from_i64(i),
                None => JsValue::Number(JsNumberType::from_f64(n.as_f64().unwrap_or(f64::NAN))),
            },
            Value::String(s) => self.js_string(s)?,
            Value::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.json_to_value(item)?);
                }
                JsValue::Object(self.create_array_from_list(&values)?)
            }
            Value::Object(map) => {
                let object = self.new_object()?;
                for (key, item) in map {
                    let item = self.json_to_value(item)?;
                    self.create_data_property_or_throw(object, PropertyKey::from_string(key), item)?;
                }
                JsValue::Object(object)
            }
        })
    }
}
