use std::fmt;

use crate::parser::ast::{Declaration, ExportEntry, ImportEntry, ModuleRequest, Program, SourceRange};

/// A parser diagnostic. Loading reports the first one as a `SyntaxError`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParserError {
    pub message: String,
    pub source_range: Option<SourceRange>,
}

impl ParserError {
    pub fn new(message: &str) -> Self {
        ParserError {
            message: message.to_string(),
            source_range: None,
        }
    }
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source_range {
            Some(range) => write!(f, "{} at {}", self.message, range),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Static semantics of a parsed module: what it asks for and what it offers.
#[derive(Debug, Clone)]
pub struct ParsedModule {
    pub program: Program,
    pub requested_modules: Vec<ModuleRequest>,
    pub import_entries: Vec<ImportEntry>,
    pub local_export_entries: Vec<ExportEntry>,
    pub indirect_export_entries: Vec<ExportEntry>,
    pub star_export_entries: Vec<ExportEntry>,
    pub declarations: Vec<Declaration>,
    pub has_top_level_await: bool,
}

impl ParsedModule {
    pub fn new(program: Program) -> Self {
        ParsedModule {
            program,
            requested_modules: Vec::new(),
            import_entries: Vec::new(),
            local_export_entries: Vec::new(),
            indirect_export_entries: Vec::new(),
            star_export_entries: Vec::new(),
            declarations: Vec::new(),
            has_top_level_await: false,
        }
    }
}

pub trait SourceParser {
    fn parse_script(&self, source: &str, filename: &str) -> Result<Program, Vec<ParserError>>;

    fn parse_module(&self, source: &str, filename: &str) -> Result<ParsedModule, Vec<ParserError>>;
}
