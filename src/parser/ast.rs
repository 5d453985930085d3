//! The slice of the syntax tree the execution core reads directly.
//!
//! Statement and expression bodies stay opaque ([`OpaqueNode`]): they are
//! produced by a [`SourceParser`](super::api::SourceParser) and only ever
//! interpreted by an [`Executor`](crate::runner::executor::Executor). What is
//! spelled out here is what the core itself must inspect: binding patterns,
//! the few expression shapes that matter for function naming, programs and
//! the static import/export tables of modules.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Meta {
    pub start_index: usize,
    pub end_index: usize,
}

/// A position in a source file, for stack traces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRange {
    pub filename: String,
    pub line: usize,
    pub column: usize,
    pub meta: Meta,
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)
    }
}

/// Executor-owned payload carried through the tree without inspection.
#[derive(Clone)]
pub struct OpaqueNode(pub Rc<dyn Any>);

impl OpaqueNode {
    pub fn new<T: Any>(value: T) -> Self {
        OpaqueNode(Rc::new(value))
    }

    pub fn empty() -> Self {
        OpaqueNode(Rc::new(()))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for OpaqueNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueNode")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Normal,
    Generator,
    Async,
    AsyncGenerator,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
}

#[derive(Debug, Clone)]
pub struct FunctionExpression {
    pub name: Option<String>,
    pub kind: FunctionKind,
    pub is_arrow: bool,
    pub body: OpaqueNode,
}

#[derive(Debug, Clone)]
pub struct ClassExpression {
    pub name: Option<String>,
    pub body: OpaqueNode,
}

#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Literal),
    Identifier(String),
    Function(FunctionExpression),
    Class(ClassExpression),
    /// Anything else; evaluated entirely by the executor.
    Opaque(OpaqueNode),
}

impl Expression {
    /// Function and class expressions without their own name pick up the name
    /// of the binding they initialize.
    pub fn is_anonymous_function_definition(&self) -> bool {
        match self {
            Expression::Function(f) => f.name.is_none(),
            Expression::Class(c) => c.name.is_none(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingPatternKind {
    Object,
    Array,
}

#[derive(Debug, Clone)]
pub enum BindingEntryName {
    Empty,
    Identifier(String),
    Computed(Rc<Expression>),
}

#[derive(Debug, Clone)]
pub enum BindingAlias {
    Empty,
    Identifier(String),
    Pattern(Rc<BindingPattern>),
}

/// One element of a destructuring pattern.
///
/// In object patterns `name` is the property key and `alias` the target when
/// it differs from the key. In array patterns `name` is empty and `alias` is
/// the target. Both empty is an elision (`[, x]`).
#[derive(Debug, Clone)]
pub struct BindingEntry {
    pub name: BindingEntryName,
    pub alias: BindingAlias,
    pub initializer: Option<Rc<Expression>>,
    pub is_rest: bool,
}

impl BindingEntry {
    /// `{ key }` shorthand.
    pub fn key(name: &str) -> Self {
        BindingEntry {
            name: BindingEntryName::Identifier(name.to_string()),
            alias: BindingAlias::Empty,
            initializer: None,
            is_rest: false,
        }
    }

    /// `{ [expr]: ... }`; needs an alias.
    pub fn computed(key: Expression) -> Self {
        BindingEntry {
            name: BindingEntryName::Computed(Rc::new(key)),
            alias: BindingAlias::Empty,
            initializer: None,
            is_rest: false,
        }
    }

    /// An array element bound to `name`.
    pub fn element(name: &str) -> Self {
        BindingEntry {
            name: BindingEntryName::Empty,
            alias: BindingAlias::Identifier(name.to_string()),
            initializer: None,
            is_rest: false,
        }
    }

    /// An array element destructured further.
    pub fn nested(pattern: BindingPattern) -> Self {
        BindingEntry {
            name: BindingEntryName::Empty,
            alias: BindingAlias::Pattern(Rc::new(pattern)),
            initializer: None,
            is_rest: false,
        }
    }

    pub fn elision() -> Self {
        BindingEntry {
            name: BindingEntryName::Empty,
            alias: BindingAlias::Empty,
            initializer: None,
            is_rest: false,
        }
    }

    /// `...name`, in either pattern kind.
    pub fn rest(name: &str) -> Self {
        BindingEntry {
            name: BindingEntryName::Empty,
            alias: BindingAlias::Identifier(name.to_string()),
            initializer: None,
            is_rest: true,
        }
    }

    pub fn alias_to(mut self, name: &str) -> Self {
        self.alias = BindingAlias::Identifier(name.to_string());
        self
    }

    pub fn with_pattern(mut self, pattern: BindingPattern) -> Self {
        self.alias = BindingAlias::Pattern(Rc::new(pattern));
        self
    }

    pub fn with_default(mut self, initializer: Expression) -> Self {
        self.initializer = Some(Rc::new(initializer));
        self
    }

    pub fn is_elision(&self) -> bool {
        matches!(
            (&self.name, &self.alias),
            (BindingEntryName::Empty, BindingAlias::Empty)
        )
    }
}

#[derive(Debug, Clone)]
pub struct BindingPattern {
    pub kind: BindingPatternKind,
    pub entries: Vec<BindingEntry>,
}

impl BindingPattern {
    pub fn object(entries: Vec<BindingEntry>) -> Self {
        BindingPattern {
            kind: BindingPatternKind::Object,
            entries,
        }
    }

    pub fn array(entries: Vec<BindingEntry>) -> Self {
        BindingPattern {
            kind: BindingPatternKind::Array,
            entries,
        }
    }
}

#[derive(Debug, Clone)]
pub enum BindingTarget {
    Identifier(String),
    Pattern(Rc<BindingPattern>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramKind {
    Script,
    Module,
}

#[derive(Debug, Clone)]
pub struct Program {
    pub kind: ProgramKind,
    pub is_strict: bool,
    pub filename: String,
    pub body: OpaqueNode,
}

/// Something an executor can compile.
#[derive(Debug, Clone)]
pub enum Node {
    Expression(Rc<Expression>),
    Program(Rc<Program>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportAttribute {
    pub key: String,
    pub value: String,
}

/// A specifier plus its `with { ... }` attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleRequest {
    pub specifier: String,
    pub attributes: Vec<ImportAttribute>,
}

impl ModuleRequest {
    pub fn new(specifier: &str) -> Self {
        ModuleRequest {
            specifier: specifier.to_string(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.push(ImportAttribute {
            key: key.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportName {
    Name(String),
    Namespace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    pub module_request: ModuleRequest,
    pub import_name: ImportName,
    pub local_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportImportName {
    Name(String),
    All,
    AllButDefault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    pub export_name: Option<String>,
    pub module_request: Option<ModuleRequest>,
    pub import_name: Option<ExportImportName>,
    pub local_name: Option<String>,
}

impl ExportEntry {
    /// `export { local as exported }`, or a declaration export when the names match.
    pub fn local(local_name: &str, export_name: &str) -> Self {
        ExportEntry {
            export_name: Some(export_name.to_string()),
            module_request: None,
            import_name: None,
            local_name: Some(local_name.to_string()),
        }
    }

    /// `export { name as exported } from "request"`.
    pub fn indirect(request: ModuleRequest, import_name: &str, export_name: &str) -> Self {
        ExportEntry {
            export_name: Some(export_name.to_string()),
            module_request: Some(request),
            import_name: Some(ExportImportName::Name(import_name.to_string())),
            local_name: None,
        }
    }

    /// `export * from "request"`.
    pub fn star(request: ModuleRequest) -> Self {
        ExportEntry {
            export_name: None,
            module_request: Some(request),
            import_name: Some(ExportImportName::AllButDefault),
            local_name: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Var,
    Let,
    Const,
    Function,
    Class,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclarationKind,
}
