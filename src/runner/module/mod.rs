//! Module records, the stored-module cache and the loading/linking/evaluation
//! pipeline built on them.
//!
//! Records live in `Vm::modules` and are addressed by [`ModuleId`]; they are
//! never evicted while the engine is alive. The cache (`Vm::stored_modules`)
//! maps a canonical filename to the record loaded for it.

use std::cell::RefCell;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use crate::parser::ast::{Declaration, ExportEntry, ImportEntry, ModuleRequest, Program};
use crate::runner::ds::error::{JErrorType, ThrowCompletionOr};
use crate::runner::ds::heap::{CellId, CellVisitor};
use crate::runner::ds::value::JsValue;
use crate::runner::vm::Vm;

pub mod json;
pub mod linker;
pub mod loader;
pub mod resolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleType {
    SourceText,
    Json,
    /// Built by the host rather than parsed from a file.
    Synthetic,
}

impl ModuleType {
    /// The type a request asks for through its `type` attribute.
    pub fn from_request(request: &ModuleRequest) -> Self {
        match request.attribute("type") {
            Some("json") => ModuleType::Json,
            _ => ModuleType::SourceText,
        }
    }

    /// Extensions tried, in order, when the literal specifier does not exist.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ModuleType::Json => &["json"],
            _ => &["js", "mjs"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    Unlinked,
    Linking,
    Linked,
    Evaluating,
    Evaluated,
}

pub struct SourceTextModule {
    pub program: Rc<Program>,
    pub import_entries: Vec<ImportEntry>,
    pub local_export_entries: Vec<ExportEntry>,
    pub indirect_export_entries: Vec<ExportEntry>,
    pub star_export_entries: Vec<ExportEntry>,
    pub declarations: Vec<Declaration>,
    pub has_top_level_await: bool,
}

/// Exports whose values are known up front, as for JSON modules.
pub struct SyntheticModule {
    pub export_names: Vec<String>,
    pub values: Vec<JsValue>,
}

pub enum ModuleBody {
    SourceText(SourceTextModule),
    Synthetic(SyntheticModule),
}

pub struct ModuleRecord {
    pub filename: PathBuf,
    pub module_type: ModuleType,
    pub realm: CellId,
    pub status: ModuleStatus,
    pub requested_modules: Vec<ModuleRequest>,
    pub loaded_modules: Vec<(ModuleRequest, ModuleId)>,
    pub environment: Option<CellId>,
    pub namespace: Option<CellId>,
    pub import_meta: Option<CellId>,
    pub evaluation_error: Option<JErrorType>,
    pub top_level_capability: Option<CellId>,
    pub body: ModuleBody,
}

impl ModuleRecord {
    pub fn new(filename: PathBuf, module_type: ModuleType, realm: CellId, requested_modules: Vec<ModuleRequest>, body: ModuleBody) -> Self {
        ModuleRecord {
            filename,
            module_type,
            realm,
            status: ModuleStatus::Unlinked,
            requested_modules,
            loaded_modules: Vec::new(),
            environment: None,
            namespace: None,
            import_meta: None,
            evaluation_error: None,
            top_level_capability: None,
            body,
        }
    }

    pub fn get_imported_module(&self, request: &ModuleRequest) -> Option<ModuleId> {
        self.loaded_modules
            .iter()
            .find(|(r, _)| r == request)
            .map(|(_, m)| *m)
    }

    pub fn source_text(&self) -> Option<&SourceTextModule> {
        match &self.body {
            ModuleBody::SourceText(m) => Some(m),
            ModuleBody::Synthetic(_) => None,
        }
    }

    pub fn visit_edges(&self, visitor: &mut dyn CellVisitor) {
        visitor.visit(self.realm);
        for cell in [
            self.environment,
            self.namespace,
            self.import_meta,
            self.top_level_capability,
        ]
        .iter()
        .flatten()
        {
            visitor.visit(*cell);
        }
        if let Some(JErrorType::Thrown(value)) = &self.evaluation_error {
            visitor.visit_value(value);
        }
        if let ModuleBody::Synthetic(synthetic) = &self.body {
            for value in &synthetic.values {
                visitor.visit_value(value);
            }
        }
    }
}

impl fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("filename", &self.filename)
            .field("module_type", &self.module_type)
            .field("status", &self.status)
            .finish()
    }
}

pub struct ScriptRecord {
    pub filename: String,
    pub program: Rc<Program>,
    pub realm: CellId,
}

impl ScriptRecord {
    pub fn visit_edges(&self, visitor: &mut dyn CellVisitor) {
        visitor.visit(self.realm);
    }
}

/// Who asked for a module to be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportedModuleReferrer {
    Script(ScriptId),
    Module(ModuleId),
    Realm(CellId),
}

/// Progress of one static module graph load.
#[derive(Debug)]
pub struct GraphLoadingState {
    pub is_loading: bool,
    pub pending_modules: usize,
    pub visited: Vec<ModuleId>,
    pub error: Option<JErrorType>,
}

impl GraphLoadingState {
    pub fn new() -> Self {
        GraphLoadingState {
            is_loading: true,
            pending_modules: 1,
            visited: Vec::new(),
            error: None,
        }
    }
}

impl Default for GraphLoadingState {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque to the loader; handed back unchanged to the finish callback.
#[derive(Debug, Clone)]
pub enum ImportedModulePayload {
    GraphLoadingState(Rc<RefCell<GraphLoadingState>>),
    /// The promise a dynamic `import()` returned.
    PromiseCapability(CellId),
}

pub type FinishLoadingImportedModule =
    Box<dyn FnOnce(&mut Vm, ImportedModulePayload, ThrowCompletionOr<ModuleId>)>;

/// One entry of the module cache.
#[derive(Debug, Clone)]
pub struct StoredModule {
    pub referrer: ImportedModuleReferrer,
    pub filename: PathBuf,
    pub module_type: ModuleType,
    pub module: ModuleId,
    pub has_once_started_linking: bool,
}

impl StoredModule {
    pub fn visit_edges(&self, visitor: &mut dyn CellVisitor) {
        if let ImportedModuleReferrer::Realm(realm) = self.referrer {
            visitor.visit(realm);
        }
    }
}
