//! The default `load_imported_module` host hook: resolve, consult the cache,
//! read, parse, cache, then finish.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use crate::parser::ast::ModuleRequest;
use crate::runner::ds::error::{ErrorMessage, JErrorType, ThrowCompletionOr};
use crate::runner::ds::execution_context::ScriptOrModule;
use crate::runner::module::resolver::{absolute_path, base_directory, resolve_module_filename};
use crate::runner::module::{
    FinishLoadingImportedModule, ImportedModulePayload, ImportedModuleReferrer, ModuleBody,
    ModuleId, ModuleRecord, ModuleType, SourceTextModule, StoredModule,
};
use crate::runner::vm::Vm;

impl Vm {
    /// Load the module `request` names, relative to `referrer`, and hand the
    /// outcome to `finish` together with the untouched `payload`. `finish` runs
    /// exactly once, before this returns.
    pub fn load_imported_module(
        &mut self,
        referrer: ImportedModuleReferrer,
        request: &ModuleRequest,
        payload: ImportedModulePayload,
        finish: FinishLoadingImportedModule,
    ) {
        let result = self.load_module_for_request(referrer, request, &payload);
        self.finish_loading_imported_module(referrer, request, payload, result, finish);
    }

    fn load_module_for_request(
        &mut self,
        referrer: ImportedModuleReferrer,
        request: &ModuleRequest,
        payload: &ImportedModulePayload,
    ) -> ThrowCompletionOr<ModuleId> {
        if let ImportedModulePayload::PromiseCapability(_) = payload {
            if !self.dynamic_imports_allowed() {
                return Err(JErrorType::InternalError(
                    ErrorMessage::DynamicImportsNotAllowed.format(&request.specifier),
                ));
            }
        }

        let module_type = ModuleType::from_request(request);
        debug!(vm = %self.id(), specifier = %request.specifier, ?module_type, "loading module");

        let base_filename = self.referrer_filename(referrer);
        let filename = absolute_path(&base_directory(&base_filename), &request.specifier);
        debug!(vm = %self.id(), base = %base_filename.display(), initial = %filename.display(), "resolving module");
        let filename = resolve_module_filename(&filename, module_type);
        debug!(vm = %self.id(), resolved = %filename.display(), "resolved module filename");

        if let Some(stored) = self.get_stored_module(&filename) {
            debug!(vm = %self.id(), filename = %filename.display(), module = ?stored.module, "module cache hit");
            return Ok(stored.module);
        }

        debug!(vm = %self.id(), filename = %filename.display(), "reading module source");
        let source = read_module_source(&filename, &request.specifier)?;

        let module = match module_type {
            ModuleType::Json => {
                debug!(vm = %self.id(), filename = %filename.display(), "parsing JSON module");
                self.parse_json_module(&source, &filename)?
            }
            _ => {
                debug!(vm = %self.id(), filename = %filename.display(), "parsing source text module");
                self.parse_source_text_module(&source, &filename)?
            }
        };
        self.stored_modules.push(StoredModule {
            referrer,
            filename,
            module_type,
            module,
            has_once_started_linking: false,
        });
        Ok(module)
    }

    /// Record a successful load on the referring module, then finish.
    pub fn finish_loading_imported_module(
        &mut self,
        referrer: ImportedModuleReferrer,
        request: &ModuleRequest,
        payload: ImportedModulePayload,
        result: ThrowCompletionOr<ModuleId>,
        finish: FinishLoadingImportedModule,
    ) {
        if let (Ok(module), ImportedModuleReferrer::Module(referrer)) = (&result, referrer) {
            let record = &mut self.modules[referrer.0];
            match record.get_imported_module(request) {
                Some(existing) => debug_assert_eq!(existing, *module),
                None => record.loaded_modules.push((request.clone(), *module)),
            }
        }
        finish(self, payload, result)
    }

    /// The cache entry for `filename`, whatever referrer first loaded it.
    pub fn get_stored_module(&self, filename: &Path) -> Option<&StoredModule> {
        self.stored_modules.iter().find(|m| m.filename == filename)
    }

    fn get_stored_module_mut(&mut self, module: ModuleId) -> Option<&mut StoredModule> {
        self.stored_modules.iter_mut().find(|m| m.module == module)
    }

    pub(crate) fn mark_started_linking(&mut self, module: ModuleId) {
        if let Some(stored) = self.get_stored_module_mut(module) {
            stored.has_once_started_linking = true;
        }
    }

    fn referrer_filename(&self, referrer: ImportedModuleReferrer) -> PathBuf {
        let script_or_module = match referrer {
            ImportedModuleReferrer::Script(id) => ScriptOrModule::Script(id),
            ImportedModuleReferrer::Module(id) => ScriptOrModule::Module(id),
            ImportedModuleReferrer::Realm(_) => self.get_active_script_or_module(),
        };
        match script_or_module {
            ScriptOrModule::Script(id) => PathBuf::from(&self.scripts[id.0].filename),
            ScriptOrModule::Module(id) => self.modules[id.0].filename.clone(),
            ScriptOrModule::Empty => PathBuf::from("."),
        }
    }

    /// Parse `source` as module code and register a record for it.
    pub fn parse_source_text_module(&mut self, source: &str, filename: &Path) -> ThrowCompletionOr<ModuleId> {
        let parser = self.parser.clone();
        let parsed = parser
            .parse_module(source, &filename.to_string_lossy())
            .map_err(|errors| {
                JErrorType::SyntaxError(
                    errors
                        .first()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "invalid module".to_string()),
                )
            })?;
        let body = ModuleBody::SourceText(SourceTextModule {
            program: Rc::new(parsed.program),
            import_entries: parsed.import_entries,
            local_export_entries: parsed.local_export_entries,
            indirect_export_entries: parsed.indirect_export_entries,
            star_export_entries: parsed.star_export_entries,
            declarations: parsed.declarations,
            has_top_level_await: parsed.has_top_level_await,
        });
        let realm = self.current_realm();
        Ok(self.add_module(ModuleRecord::new(
            filename.to_path_buf(),
            ModuleType::SourceText,
            realm,
            parsed.requested_modules,
            body,
        )))
    }

    pub(crate) fn add_module(&mut self, record: ModuleRecord) -> ModuleId {
        let id = ModuleId(self.modules.len());
        self.modules.push(record);
        id
    }
}

fn read_module_source(filename: &Path, specifier: &str) -> ThrowCompletionOr<String> {
    let bytes = fs::read(filename).map_err(|e| match e.kind() {
        io::ErrorKind::OutOfMemory => {
            JErrorType::InternalError(ErrorMessage::OutOfMemory.format(""))
        }
        _ => JErrorType::SyntaxError(ErrorMessage::ModuleNotFound.format(specifier)),
    })?;
    String::from_utf8(bytes).map_err(|_| {
        JErrorType::SyntaxError(ErrorMessage::ModuleNotUtf8.format(&filename.to_string_lossy()))
    })
}
