//! Host hooks: the points where an embedder can take over engine behaviour.
//!
//! Every hook is a plain `Rc<dyn Fn>` slot. [`HostHooks::default`] installs
//! behaviour that is good enough for a standalone engine, so an embedder only
//! replaces the slots it cares about:
//!
//! ```text
//! let mut hooks = HostHooks::default();
//! hooks.get_import_meta_properties = Rc::new(|vm, module| { ... });
//! vm.host_hooks = hooks;
//! ```

use std::fmt;
use std::rc::Rc;

use crate::parser::ast::ModuleRequest;
use crate::runner::ds::error::{ErrorMessage, JErrorType, ThrowCompletionOr};
use crate::runner::ds::heap::CellId;
use crate::runner::ds::object::ObjectKind;
use crate::runner::ds::object_property::PropertyKey;
use crate::runner::ds::promise::RejectionOperation;
use crate::runner::ds::value::JsValue;
use crate::runner::jobs::{Job, JobCallback};
use crate::runner::module::{
    FinishLoadingImportedModule, ImportedModulePayload, ImportedModuleReferrer, ModuleId,
};
use crate::runner::vm::Vm;

/// Whether the host took care of an operation itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandledByHost {
    Handled,
    Unhandled,
}

pub type PromiseRejectionTrackerHook = Rc<dyn Fn(&mut Vm, CellId, RejectionOperation)>;
pub type CallJobCallbackHook =
    Rc<dyn Fn(&mut Vm, &JobCallback, JsValue, &[JsValue]) -> ThrowCompletionOr<JsValue>>;
pub type EnqueueFinalizationRegistryCleanupJobHook = Rc<dyn Fn(&mut Vm, CellId)>;
pub type EnqueuePromiseJobHook = Rc<dyn Fn(&mut Vm, Job, Option<CellId>)>;
pub type MakeJobCallbackHook = Rc<dyn Fn(&mut Vm, CellId) -> JobCallback>;
pub type LoadImportedModuleHook = Rc<
    dyn Fn(
        &mut Vm,
        ImportedModuleReferrer,
        &ModuleRequest,
        ImportedModulePayload,
        FinishLoadingImportedModule,
    ),
>;
pub type GetImportMetaPropertiesHook = Rc<dyn Fn(&mut Vm, ModuleId) -> Vec<(PropertyKey, JsValue)>>;
pub type FinalizeImportMetaHook = Rc<dyn Fn(&mut Vm, CellId, ModuleId)>;
pub type GetSupportedImportAttributesHook = Rc<dyn Fn() -> Vec<String>>;
pub type EnsureCanCompileStringsHook = Rc<dyn Fn(&mut Vm, &str) -> ThrowCompletionOr<()>>;
pub type EnsureCanAddPrivateElementHook = Rc<dyn Fn(&mut Vm, CellId) -> ThrowCompletionOr<()>>;
pub type ResizeArrayBufferHook =
    Rc<dyn Fn(&mut Vm, CellId, usize) -> ThrowCompletionOr<HandledByHost>>;

#[derive(Clone)]
pub struct HostHooks {
    pub promise_rejection_tracker: PromiseRejectionTrackerHook,
    pub call_job_callback: CallJobCallbackHook,
    pub enqueue_finalization_registry_cleanup_job: EnqueueFinalizationRegistryCleanupJobHook,
    pub enqueue_promise_job: EnqueuePromiseJobHook,
    pub make_job_callback: MakeJobCallbackHook,
    pub load_imported_module: LoadImportedModuleHook,
    pub get_import_meta_properties: GetImportMetaPropertiesHook,
    pub finalize_import_meta: FinalizeImportMetaHook,
    pub get_supported_import_attributes: GetSupportedImportAttributesHook,
    pub ensure_can_compile_strings: EnsureCanCompileStringsHook,
    pub ensure_can_add_private_element: EnsureCanAddPrivateElementHook,
    pub resize_array_buffer: ResizeArrayBufferHook,
}

impl Default for HostHooks {
    fn default() -> Self {
        HostHooks {
            promise_rejection_tracker: Rc::new(default_promise_rejection_tracker),
            call_job_callback: Rc::new(
                |vm: &mut Vm, job_callback: &JobCallback, this: JsValue, args: &[JsValue]| {
                    vm.call(JsValue::Object(job_callback.callback), this, args)
                },
            ),
            enqueue_finalization_registry_cleanup_job: Rc::new(|vm: &mut Vm, registry: CellId| {
                vm.enqueue_finalization_registry_cleanup_job(registry)
            }),
            enqueue_promise_job: Rc::new(|vm: &mut Vm, job: Job, realm: Option<CellId>| {
                vm.enqueue_promise_job(job, realm)
            }),
            make_job_callback: Rc::new(|_: &mut Vm, callback: CellId| JobCallback { callback }),
            load_imported_module: Rc::new(
                |vm: &mut Vm,
                 referrer: ImportedModuleReferrer,
                 request: &ModuleRequest,
                 payload: ImportedModulePayload,
                 finish: FinishLoadingImportedModule| {
                    vm.load_imported_module(referrer, request, payload, finish)
                },
            ),
            get_import_meta_properties: Rc::new(
                |_: &mut Vm, _: ModuleId| -> Vec<(PropertyKey, JsValue)> { Vec::new() },
            ),
            finalize_import_meta: Rc::new(|_: &mut Vm, _: CellId, _: ModuleId| {}),
            get_supported_import_attributes: Rc::new(|| vec!["type".to_string()]),
            ensure_can_compile_strings: Rc::new(
                |_: &mut Vm, _: &str| -> ThrowCompletionOr<()> { Ok(()) },
            ),
            ensure_can_add_private_element: Rc::new(
                |_: &mut Vm, _: CellId| -> ThrowCompletionOr<()> { Ok(()) },
            ),
            resize_array_buffer: Rc::new(default_resize_array_buffer),
        }
    }
}

impl fmt::Debug for HostHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostHooks")
    }
}

fn default_promise_rejection_tracker(vm: &mut Vm, promise: CellId, operation: RejectionOperation) {
    let callback = match operation {
        RejectionOperation::Reject => vm.on_promise_unhandled_rejection.clone(),
        RejectionOperation::Handle => vm.on_promise_rejection_handled.clone(),
    };
    if let Some(callback) = callback {
        callback(vm, promise);
    }
}

/// Grow or shrink the buffer in place.
pub(crate) fn default_resize_array_buffer(
    vm: &mut Vm,
    buffer: CellId,
    new_byte_length: usize,
) -> ThrowCompletionOr<HandledByHost> {
    match &mut vm.heap.object_mut(buffer).kind {
        ObjectKind::ArrayBuffer(bytes) => {
            if new_byte_length > bytes.len() {
                bytes.try_reserve(new_byte_length - bytes.len()).map_err(|_| {
                    JErrorType::RangeError(
                        ErrorMessage::NotEnoughMemoryToAllocate.format(&new_byte_length.to_string()),
                    )
                })?;
            }
            bytes.resize(new_byte_length, 0);
            Ok(HandledByHost::Handled)
        }
        _ => Err(JErrorType::TypeError(
            "resize target is not an ArrayBuffer".to_string(),
        )),
    }
}
