//! Module graph loading, linking and evaluation, plus the embedder entry points
//! built on them: entry modules, dynamic `import()`, `import.meta` and
//! namespace objects.
//!
//! Everything here runs synchronously and depth-first. Cycles are cut by the
//! module cache, the visited list of a graph load, and module status.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use tracing::debug;

use crate::parser::ast::{
    DeclarationKind, ExportImportName, FunctionKind, ImportName, ModuleRequest, Node,
};
use crate::runner::ds::error::{JErrorType, ThrowCompletionOr};
use crate::runner::ds::execution_context::{ExecutionContext, ScriptOrModule};
use crate::runner::ds::heap::CellId;
use crate::runner::ds::object_property::{PropertyDescriptor, PropertyKey};
use crate::runner::ds::operations::lex_env::new_module_environment;
use crate::runner::ds::promise::{PromiseReaction, PromiseState};
use crate::runner::ds::value::JsValue;
use crate::runner::jobs::JobSource;
use crate::runner::module::{
    GraphLoadingState, ImportedModulePayload, ImportedModuleReferrer, ModuleBody, ModuleId,
    ModuleStatus,
};
use crate::runner::vm::Vm;

/// What an export name refers to once re-exports are followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingName {
    Name(String),
    Namespace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedBinding {
    Resolved {
        module: ModuleId,
        binding_name: BindingName,
    },
    NotFound,
    Ambiguous,
}

impl Vm {
    /// Load every module reachable from `module` that is not loaded yet.
    pub fn load_requested_modules(&mut self, module: ModuleId) -> ThrowCompletionOr<()> {
        let state = Rc::new(RefCell::new(GraphLoadingState::new()));
        self.inner_module_loading(&state, module);
        let mut state = state.borrow_mut();
        if let Some(error) = state.error.take() {
            return Err(error);
        }
        if state.is_loading {
            return Err(JErrorType::InternalError(
                "module graph did not finish loading synchronously".to_string(),
            ));
        }
        Ok(())
    }

    fn inner_module_loading(&mut self, state: &Rc<RefCell<GraphLoadingState>>, module: ModuleId) {
        let record = &self.modules[module.0];
        let eligible = record.source_text().is_some()
            && record.status == ModuleStatus::Unlinked
            && !state.borrow().visited.contains(&module);
        if eligible {
            state.borrow_mut().visited.push(module);
            let requested = self.modules[module.0].requested_modules.clone();
            state.borrow_mut().pending_modules += requested.len();
            for request in requested {
                match self.modules[module.0].get_imported_module(&request) {
                    Some(loaded) => self.inner_module_loading(state, loaded),
                    None => {
                        let hook = self.host_hooks.load_imported_module.clone();
                        hook(
                            self,
                            ImportedModuleReferrer::Module(module),
                            &request,
                            ImportedModulePayload::GraphLoadingState(state.clone()),
                            Box::new(|vm: &mut Vm, payload: ImportedModulePayload, result: ThrowCompletionOr<ModuleId>| {
                                if let ImportedModulePayload::GraphLoadingState(state) = payload {
                                    vm.continue_module_loading(&state, result);
                                }
                            }),
                        );
                    }
                }
                if !state.borrow().is_loading {
                    return;
                }
            }
        }
        let mut state = state.borrow_mut();
        state.pending_modules -= 1;
        if state.pending_modules == 0 {
            state.is_loading = false;
        }
    }

    fn continue_module_loading(&mut self, state: &Rc<RefCell<GraphLoadingState>>, result: ThrowCompletionOr<ModuleId>) {
        if !state.borrow().is_loading {
            return;
        }
        match result {
            Ok(module) => self.inner_module_loading(state, module),
            Err(error) => {
                let mut state = state.borrow_mut();
                state.is_loading = false;
                state.error = Some(error);
            }
        }
    }

    /// Create environments and wire imports for `module` and everything it
    /// depends on. On failure the modules still in `Linking` are reset to
    /// `Unlinked`; dependencies that finished linking keep their state.
    pub fn link_module(&mut self, module: ModuleId) -> ThrowCompletionOr<()> {
        debug!(vm = %self.id(), filename = %self.modules[module.0].filename.display(), "linking module");
        let mut stack = Vec::new();
        if let Err(error) = self.inner_module_linking(module, &mut stack) {
            for touched in stack {
                let record = &mut self.modules[touched.0];
                if record.status != ModuleStatus::Linking {
                    continue;
                }
                record.status = ModuleStatus::Unlinked;
                record.environment = None;
                record.namespace = None;
            }
            debug!(vm = %self.id(), %error, "linking failed");
            return Err(error);
        }
        Ok(())
    }

    fn inner_module_linking(&mut self, module: ModuleId, stack: &mut Vec<ModuleId>) -> ThrowCompletionOr<()> {
        if self.modules[module.0].status != ModuleStatus::Unlinked {
            return Ok(());
        }
        self.modules[module.0].status = ModuleStatus::Linking;
        stack.push(module);

        // Created before recursing so that modules in a cycle can bind to it.
        let global_env = self.heap.realm(self.modules[module.0].realm).global_env;
        let environment = new_module_environment(&mut self.heap, Some(global_env))?;
        self.modules[module.0].environment = Some(environment);

        let requested = self.modules[module.0].requested_modules.clone();
        for request in &requested {
            let required = self.imported_module(module, request)?;
            self.inner_module_linking(required, stack)?;
        }
        self.initialize_environment(module, environment)?;
        self.modules[module.0].status = ModuleStatus::Linked;
        Ok(())
    }

    fn imported_module(&self, module: ModuleId, request: &ModuleRequest) -> ThrowCompletionOr<ModuleId> {
        self.modules[module.0]
            .get_imported_module(request)
            .ok_or_else(|| {
                JErrorType::InternalError(format!("module '{}' was never loaded", request.specifier))
            })
    }

    fn initialize_environment(&mut self, module: ModuleId, environment: CellId) -> ThrowCompletionOr<()> {
        let (indirect_exports, imports, declarations) = match &self.modules[module.0].body {
            ModuleBody::Synthetic(synthetic) => {
                let exports: Vec<(String, JsValue)> = synthetic
                    .export_names
                    .iter()
                    .cloned()
                    .zip(synthetic.values.iter().copied())
                    .collect();
                for (name, value) in exports {
                    self.create_mutable_binding(environment, &name, false)?;
                    self.initialize_binding(environment, &name, value)?;
                }
                return Ok(());
            }
            ModuleBody::SourceText(source) => (
                source.indirect_export_entries.clone(),
                source.import_entries.clone(),
                source.declarations.clone(),
            ),
        };

        for entry in &indirect_exports {
            let name = entry.export_name.as_deref().unwrap_or_default();
            match self.resolve_export(module, name, &mut Vec::new()) {
                ResolvedBinding::Resolved { .. } => {}
                ResolvedBinding::NotFound => {
                    return Err(JErrorType::SyntaxError(format!(
                        "Could not resolve indirect export '{}'",
                        name
                    )))
                }
                ResolvedBinding::Ambiguous => {
                    return Err(JErrorType::SyntaxError(format!(
                        "Indirect export '{}' is ambiguous",
                        name
                    )))
                }
            }
        }

        for import in &imports {
            let imported = self.imported_module(module, &import.module_request)?;
            let local = import.local_name.as_str();
            let resolution = match &import.import_name {
                ImportName::Namespace => ResolvedBinding::Resolved {
                    module: imported,
                    binding_name: BindingName::Namespace,
                },
                ImportName::Name(name) => self.resolve_export(imported, name, &mut Vec::new()),
            };
            match resolution {
                ResolvedBinding::Resolved {
                    module: target,
                    binding_name: BindingName::Namespace,
                } => {
                    let namespace = self.module_namespace(target)?;
                    self.create_immutable_binding(environment, local, true)?;
                    self.initialize_binding(environment, local, JsValue::Object(namespace))?;
                }
                ResolvedBinding::Resolved {
                    module: target,
                    binding_name: BindingName::Name(binding),
                } => {
                    let target_env = self.modules[target.0].environment.ok_or_else(|| {
                        JErrorType::InternalError("import target has no environment".to_string())
                    })?;
                    self.create_import_binding(environment, local, target_env, &binding)?;
                }
                ResolvedBinding::NotFound => {
                    return Err(JErrorType::SyntaxError(format!(
                        "Module '{}' does not export '{}'",
                        import.module_request.specifier,
                        import_name_display(&import.import_name)
                    )))
                }
                ResolvedBinding::Ambiguous => {
                    return Err(JErrorType::SyntaxError(format!(
                        "Export '{}' of module '{}' is ambiguous",
                        import_name_display(&import.import_name),
                        import.module_request.specifier
                    )))
                }
            }
        }

        for declaration in &declarations {
            let name = declaration.name.as_str();
            let exists = self
                .heap
                .environment(environment)
                .record
                .declarative()
                .map(|d| d.has_binding(name))
                .unwrap_or(false);
            match declaration.kind {
                DeclarationKind::Var | DeclarationKind::Function => {
                    if !exists {
                        self.create_mutable_binding(environment, name, false)?;
                        self.initialize_binding(environment, name, JsValue::Undefined)?;
                    }
                }
                DeclarationKind::Let | DeclarationKind::Class => {
                    self.create_mutable_binding(environment, name, false)?
                }
                DeclarationKind::Const => self.create_immutable_binding(environment, name, true)?,
            }
        }
        Ok(())
    }

    fn create_import_binding(&mut self, environment: CellId, name: &str, target_env: CellId, target_name: &str) -> ThrowCompletionOr<()> {
        match self.heap.environment_mut(environment).record.declarative_mut() {
            Some(record) => {
                record.create_import_binding(name.to_string(), target_env, target_name.to_string());
                Ok(())
            }
            None => Err(JErrorType::InternalError(
                "import bindings need a module environment".to_string(),
            )),
        }
    }

    /// Follow `export_name` through local, indirect and star exports.
    /// `resolve_set` breaks cycles: a repeated (module, name) pair resolves to
    /// nothing.
    pub fn resolve_export(
        &self,
        module: ModuleId,
        export_name: &str,
        resolve_set: &mut Vec<(ModuleId, String)>,
    ) -> ResolvedBinding {
        if resolve_set
            .iter()
            .any(|(m, n)| *m == module && n == export_name)
        {
            return ResolvedBinding::NotFound;
        }
        resolve_set.push((module, export_name.to_string()));

        let source = match &self.modules[module.0].body {
            ModuleBody::Synthetic(synthetic) => {
                return if synthetic.export_names.iter().any(|n| n == export_name) {
                    ResolvedBinding::Resolved {
                        module,
                        binding_name: BindingName::Name(export_name.to_string()),
                    }
                } else {
                    ResolvedBinding::NotFound
                };
            }
            ModuleBody::SourceText(source) => source,
        };

        for entry in &source.local_export_entries {
            if entry.export_name.as_deref() == Some(export_name) {
                let local = entry.local_name.clone().unwrap_or_default();
                return ResolvedBinding::Resolved {
                    module,
                    binding_name: BindingName::Name(local),
                };
            }
        }

        for entry in &source.indirect_export_entries {
            if entry.export_name.as_deref() != Some(export_name) {
                continue;
            }
            let imported = match entry
                .module_request
                .as_ref()
                .and_then(|r| self.modules[module.0].get_imported_module(r))
            {
                Some(m) => m,
                None => return ResolvedBinding::NotFound,
            };
            return match &entry.import_name {
                Some(ExportImportName::Name(name)) => self.resolve_export(imported, name, resolve_set),
                _ => ResolvedBinding::Resolved {
                    module: imported,
                    binding_name: BindingName::Namespace,
                },
            };
        }

        if export_name == "default" {
            return ResolvedBinding::NotFound;
        }

        let mut star_resolution: Option<(ModuleId, BindingName)> = None;
        for entry in &source.star_export_entries {
            let imported = match entry
                .module_request
                .as_ref()
                .and_then(|r| self.modules[module.0].get_imported_module(r))
            {
                Some(m) => m,
                None => continue,
            };
            match self.resolve_export(imported, export_name, resolve_set) {
                ResolvedBinding::Ambiguous => return ResolvedBinding::Ambiguous,
                ResolvedBinding::NotFound => {}
                ResolvedBinding::Resolved {
                    module: found,
                    binding_name,
                } => match &star_resolution {
                    None => star_resolution = Some((found, binding_name)),
                    Some((existing, existing_name)) => {
                        if *existing != found || *existing_name != binding_name {
                            return ResolvedBinding::Ambiguous;
                        }
                    }
                },
            }
        }
        match star_resolution {
            Some((module, binding_name)) => ResolvedBinding::Resolved {
                module,
                binding_name,
            },
            None => ResolvedBinding::NotFound,
        }
    }

    /// Every name `module` exports, star re-exports included.
    pub fn get_exported_names(&self, module: ModuleId, export_star_set: &mut Vec<ModuleId>) -> Vec<String> {
        if export_star_set.contains(&module) {
            return Vec::new();
        }
        export_star_set.push(module);
        let source = match &self.modules[module.0].body {
            ModuleBody::Synthetic(synthetic) => return synthetic.export_names.clone(),
            ModuleBody::SourceText(source) => source,
        };
        let mut names: Vec<String> = source
            .local_export_entries
            .iter()
            .chain(source.indirect_export_entries.iter())
            .filter_map(|e| e.export_name.clone())
            .collect();
        for entry in &source.star_export_entries {
            let requested = match entry
                .module_request
                .as_ref()
                .and_then(|r| self.modules[module.0].get_imported_module(r))
            {
                Some(m) => m,
                None => continue,
            };
            for name in self.get_exported_names(requested, export_star_set) {
                if name != "default" && !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// The namespace object of `module`: a frozen, prototype-less object with
    /// one enumerable getter per unambiguous export, in name order. Getters
    /// read the live binding.
    pub fn module_namespace(&mut self, module: ModuleId) -> ThrowCompletionOr<CellId> {
        if let Some(namespace) = self.modules[module.0].namespace {
            return Ok(namespace);
        }
        let mut names = self.get_exported_names(module, &mut Vec::new());
        names.sort();
        names.dedup();

        let namespace = self.new_object_with_prototype(None)?;
        self.modules[module.0].namespace = Some(namespace);
        let tag = self.js_string("Module")?;
        let to_string_tag = self.well_known_symbols.to_string_tag;
        self.heap.object_mut(namespace).define_own_property(
            PropertyKey::Sym(to_string_tag),
            PropertyDescriptor::Data {
                value: tag,
                writable: false,
                enumerable: false,
                configurable: false,
            },
        );

        for name in names {
            let (target, binding_name) = match self.resolve_export(module, &name, &mut Vec::new()) {
                ResolvedBinding::Resolved {
                    module,
                    binding_name,
                } => (module, binding_name),
                _ => continue,
            };
            let descriptor = match binding_name {
                BindingName::Namespace => {
                    let nested = self.module_namespace(target)?;
                    PropertyDescriptor::Data {
                        value: JsValue::Object(nested),
                        writable: true,
                        enumerable: true,
                        configurable: false,
                    }
                }
                BindingName::Name(binding) => {
                    let environment = self.modules[target.0].environment.ok_or_else(|| {
                        JErrorType::InternalError("namespace of an unlinked module".to_string())
                    })?;
                    let getter = self.new_native_function(
                        &name,
                        Rc::new(move |vm: &mut Vm, _: JsValue, _: &[JsValue], _: &[JsValue]| {
                            vm.get_binding_value(environment, &binding, true)
                        }),
                    )?;
                    PropertyDescriptor::Accessor {
                        get: getter.as_object(),
                        set: None,
                        enumerable: true,
                        configurable: false,
                    }
                }
            };
            self.heap
                .object_mut(namespace)
                .define_own_property(PropertyKey::from_string(&name), descriptor);
        }
        self.heap.object_mut(namespace).prevent_extensions();
        Ok(namespace)
    }

    /// Evaluate `module` and its dependencies. The returned promise is the
    /// module's top-level capability; it settles once evaluation completes.
    pub fn evaluate_module(&mut self, module: ModuleId) -> ThrowCompletionOr<CellId> {
        if let Some(capability) = self.modules[module.0].top_level_capability {
            return Ok(capability);
        }
        let capability = self.new_promise()?;
        self.modules[module.0].top_level_capability = Some(capability);
        match self.inner_module_evaluation(module) {
            Ok(completion) => self.resolve_promise(capability, completion)?,
            Err(error) => {
                let reason = self.error_to_value(&error)?;
                self.reject_promise(capability, reason)?;
            }
        }
        Ok(capability)
    }

    fn inner_module_evaluation(&mut self, module: ModuleId) -> ThrowCompletionOr<JsValue> {
        match self.modules[module.0].status {
            ModuleStatus::Evaluated => {
                return match &self.modules[module.0].evaluation_error {
                    Some(error) => Err(error.clone()),
                    None => Ok(JsValue::Undefined),
                }
            }
            ModuleStatus::Evaluating => return Ok(JsValue::Undefined),
            ModuleStatus::Linked => {}
            ModuleStatus::Unlinked | ModuleStatus::Linking => {
                return Err(JErrorType::InternalError(
                    "module must be linked before it is evaluated".to_string(),
                ))
            }
        }
        self.modules[module.0].status = ModuleStatus::Evaluating;

        let requested = self.modules[module.0].requested_modules.clone();
        let mut result = Ok(JsValue::Undefined);
        for request in &requested {
            let dependency = self
                .imported_module(module, request)
                .and_then(|required| self.inner_module_evaluation(required));
            if let Err(error) = dependency {
                result = Err(error);
                break;
            }
        }
        if result.is_ok() {
            result = self.execute_module(module);
        }

        let record = &mut self.modules[module.0];
        record.status = ModuleStatus::Evaluated;
        record.evaluation_error = result.as_ref().err().cloned();
        result
    }

    fn execute_module(&mut self, module: ModuleId) -> ThrowCompletionOr<JsValue> {
        let record = &self.modules[module.0];
        let (program, has_top_level_await) = match &record.body {
            ModuleBody::SourceText(source) => (source.program.clone(), source.has_top_level_await),
            ModuleBody::Synthetic(_) => return Ok(JsValue::Undefined),
        };
        let environment = record.environment;
        debug!(vm = %self.id(), filename = %record.filename.display(), "evaluating module");

        let mut ctx = ExecutionContext::new(record.realm);
        ctx.script_or_module = ScriptOrModule::Module(module);
        ctx.lex_env = environment;
        ctx.var_env = environment;
        ctx.is_strict = true;
        self.push_execution_context(ctx);

        let kind = if has_top_level_await {
            FunctionKind::Async
        } else {
            FunctionKind::Normal
        };
        let executor = self.executor.clone();
        let result = executor
            .compile(self, &Node::Program(program), kind, "")
            .and_then(|executable| {
                if let Some(ctx) = self.running_execution_context_mut() {
                    ctx.executable = Some(executable.clone());
                }
                executor.run(self, &executable, None).value
            });
        self.pop_execution_context();
        result
    }

    /// Load, link and evaluate `module`, then drain the promise jobs its
    /// evaluation queued. A rejected evaluation comes back as a thrown error.
    pub fn link_and_eval_module(&mut self, module: ModuleId) -> ThrowCompletionOr<()> {
        debug!(vm = %self.id(), filename = %self.modules[module.0].filename.display(), "link and evaluate");
        self.load_requested_modules(module)?;
        self.mark_started_linking(module);
        self.link_module(module)?;

        let evaluated = self.evaluate_module(module)?;
        self.run_queued_promise_jobs();
        assert_eq!(
            self.job_queues.promise_job_count(),
            0,
            "promise jobs left behind after draining"
        );

        match self.promise_state(evaluated)? {
            PromiseState::Pending => panic!(
                "top-level evaluation of {} is still pending after draining all jobs",
                self.modules[module.0].filename.display()
            ),
            PromiseState::Rejected(reason) => Err(self.modules[module.0]
                .evaluation_error
                .clone()
                .unwrap_or(JErrorType::Thrown(reason))),
            PromiseState::Fulfilled(_) => {
                debug!(vm = %self.id(), "evaluation passed");
                Ok(())
            }
        }
    }

    /// Load an embedder-supplied entry module through the `load_imported_module`
    /// hook. Relative paths resolve against the working directory.
    pub fn load_entry_module(&mut self, path: &Path) -> ThrowCompletionOr<ModuleId> {
        let mut request = ModuleRequest::new(&path.to_string_lossy());
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            request = request.with_attribute("type", "json");
        }
        let referrer = ImportedModuleReferrer::Realm(self.current_realm());
        let outcome: Rc<RefCell<Option<ThrowCompletionOr<ModuleId>>>> = Rc::new(RefCell::new(None));
        let slot = outcome.clone();
        let hook = self.host_hooks.load_imported_module.clone();
        hook(
            self,
            referrer,
            &request,
            ImportedModulePayload::GraphLoadingState(Rc::new(RefCell::new(GraphLoadingState::new()))),
            Box::new(move |_: &mut Vm, _: ImportedModulePayload, result: ThrowCompletionOr<ModuleId>| {
                *slot.borrow_mut() = Some(result);
            }),
        );
        let result = outcome.borrow_mut().take();
        result.unwrap_or_else(|| {
            Err(JErrorType::InternalError(
                "the host did not finish loading the entry module".to_string(),
            ))
        })
    }

    /// Load and run the module at `path`.
    pub fn run_module(&mut self, path: &Path) -> ThrowCompletionOr<ModuleId> {
        let module = self.load_entry_module(path)?;
        self.link_and_eval_module(module)?;
        Ok(module)
    }

    /// `import(specifier, { with: attributes })`. The returned promise settles
    /// with the module's namespace object, or with the reason loading, linking
    /// or evaluation failed.
    pub fn import_dynamically(&mut self, specifier: &str, attributes: &[(&str, &str)]) -> ThrowCompletionOr<CellId> {
        let promise = self.new_promise()?;
        let supported = (self.host_hooks.get_supported_import_attributes)();
        let mut request = ModuleRequest::new(specifier);
        for &(key, value) in attributes {
            if !supported.iter().any(|s| s == key) {
                let reason = self.error_to_value(&JErrorType::TypeError(format!(
                    "Import attribute '{}' is not supported",
                    key
                )))?;
                self.reject_promise(promise, reason)?;
                return Ok(promise);
            }
            request = request.with_attribute(key, value);
        }

        let referrer = match self.get_active_script_or_module() {
            ScriptOrModule::Script(id) => ImportedModuleReferrer::Script(id),
            ScriptOrModule::Module(id) => ImportedModuleReferrer::Module(id),
            ScriptOrModule::Empty => ImportedModuleReferrer::Realm(self.current_realm()),
        };
        let hook = self.host_hooks.load_imported_module.clone();
        hook(
            self,
            referrer,
            &request,
            ImportedModulePayload::PromiseCapability(promise),
            Box::new(|vm: &mut Vm, payload: ImportedModulePayload, result: ThrowCompletionOr<ModuleId>| {
                vm.continue_dynamic_import(payload, result)
            }),
        );
        Ok(promise)
    }

    fn continue_dynamic_import(&mut self, payload: ImportedModulePayload, result: ThrowCompletionOr<ModuleId>) {
        let promise = match payload {
            ImportedModulePayload::PromiseCapability(promise) => promise,
            ImportedModulePayload::GraphLoadingState(_) => return,
        };
        let outcome = result.and_then(|module| {
            self.load_requested_modules(module)?;
            self.mark_started_linking(module);
            self.link_module(module)?;
            let evaluated = self.evaluate_module(module)?;
            Ok((module, evaluated))
        });
        if let Err(error) = self.settle_dynamic_import(promise, outcome) {
            self.report_job_error(JobSource::Promise, error);
        }
    }

    fn settle_dynamic_import(&mut self, promise: CellId, outcome: ThrowCompletionOr<(ModuleId, CellId)>) -> ThrowCompletionOr<()> {
        let (module, evaluated) = match outcome {
            Ok(loaded) => loaded,
            Err(error) => {
                let reason = self.error_to_value(&error)?;
                return self.reject_promise(promise, reason);
            }
        };
        let reaction = PromiseReaction::native(
            Box::new(move |vm: &mut Vm, _: JsValue| -> ThrowCompletionOr<JsValue> {
                match vm.module_namespace(module) {
                    Ok(namespace) => vm.resolve_promise(promise, JsValue::Object(namespace))?,
                    Err(error) => {
                        let reason = vm.error_to_value(&error)?;
                        vm.reject_promise(promise, reason)?;
                    }
                }
                Ok(JsValue::Undefined)
            }),
            Box::new(move |vm: &mut Vm, reason: JsValue| -> ThrowCompletionOr<JsValue> {
                vm.reject_promise(promise, reason)?;
                Ok(JsValue::Undefined)
            }),
        )
        .holding(&[JsValue::Object(promise)]);
        self.perform_promise_then(evaluated, reaction)
    }

    /// `import.meta` for the running module, built on first use.
    pub fn get_import_meta(&mut self) -> ThrowCompletionOr<CellId> {
        let module = match self.get_active_script_or_module() {
            ScriptOrModule::Module(module) => module,
            _ => {
                return Err(JErrorType::SyntaxError(
                    "Cannot use 'import.meta' outside a module".to_string(),
                ))
            }
        };
        if let Some(meta) = self.modules[module.0].import_meta {
            return Ok(meta);
        }
        let meta = self.new_object_with_prototype(None)?;
        let get_properties = self.host_hooks.get_import_meta_properties.clone();
        for (key, value) in get_properties(self, module) {
            self.create_data_property_or_throw(meta, key, value)?;
        }
        let finalize = self.host_hooks.finalize_import_meta.clone();
        finalize(self, meta, module);
        self.modules[module.0].import_meta = Some(meta);
        Ok(meta)
    }
}

fn import_name_display(name: &ImportName) -> &str {
    match name {
        ImportName::Name(n) => n,
        ImportName::Namespace => "*",
    }
}
