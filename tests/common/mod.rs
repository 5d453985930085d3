//! A toy line-oriented language used to drive the engine end to end.
//!
//! Every non-empty line is one statement:
//!
//! ```text
//! import { a, b as c } from "./dep.js"
//! import * as ns from "./dep.js"
//! import data from "./data.json"
//! export { a as b } from "./dep.js"
//! export * from "./dep.js"
//! export { local as exported }
//! export const x = 1          (also `export let`, plain `const` and `let`)
//! const y = x                 (operands: integers, "strings", identifiers,
//!                              import.meta, import("spec"), function)
//! throw message
//! await forever               (a top-level await that never settles)
//! 42                          (an expression statement; the last one is the
//!                              completion value)
//! ```
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use just_vm::parser::ast::{
    Declaration, DeclarationKind, ExportEntry, Expression, FunctionKind, ImportEntry, ImportName,
    Literal, ModuleRequest, Node, OpaqueNode, Program, ProgramKind,
};
use just_vm::parser::{ParsedModule, ParserError, SourceParser};
use just_vm::runner::ds::error::{JErrorType, ThrowCompletionOr};
use just_vm::runner::ds::heap::CellId;
use just_vm::runner::ds::object_property::PropertyKey;
use just_vm::runner::ds::value::{JsNumberType, JsValue};
use just_vm::runner::executor::{Executable, Executor, RunResult};
use just_vm::runner::module::ModuleId;
use just_vm::runner::plugin::EngineConfig;
use just_vm::runner::Vm;

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Int(i64),
    Str(String),
    Ident(String),
    ImportMeta,
    DynamicImport(String),
    Function,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Bind { name: String, value: Operand },
    Value(Operand),
    Throw(String),
    AwaitForever,
}

pub struct ToyParser;

impl ToyParser {
    fn program(kind: ProgramKind, filename: &str, body: Vec<Stmt>) -> Program {
        Program {
            kind,
            is_strict: kind == ProgramKind::Module,
            filename: filename.to_string(),
            body: OpaqueNode::new(body),
        }
    }
}

impl SourceParser for ToyParser {
    fn parse_script(&self, source: &str, filename: &str) -> Result<Program, Vec<ParserError>> {
        let mut body = Vec::new();
        for line in lines(source) {
            if let Some(message) = line.strip_prefix("throw ") {
                body.push(Stmt::Throw(message.to_string()));
            } else if line.starts_with("import ") || line.starts_with("export ") {
                return Err(vec![ParserError::new("import and export only appear in modules")]);
            } else {
                body.push(Stmt::Value(parse_operand(line)?));
            }
        }
        Ok(Self::program(ProgramKind::Script, filename, body))
    }

    fn parse_module(&self, source: &str, filename: &str) -> Result<ParsedModule, Vec<ParserError>> {
        let mut module = ParsedModule::new(Self::program(ProgramKind::Module, filename, Vec::new()));
        let mut body = Vec::new();

        for line in lines(source) {
            if let Some(rest) = line.strip_prefix("import ") {
                let (clause, request) = split_from(rest)?;
                request_module(&mut module, &request);
                for (import_name, local_name) in parse_import_clause(clause)? {
                    module.import_entries.push(ImportEntry {
                        module_request: request.clone(),
                        import_name,
                        local_name,
                    });
                }
            } else if let Some(rest) = line.strip_prefix("export * from ") {
                let request = parse_request(rest)?;
                request_module(&mut module, &request);
                module.star_export_entries.push(ExportEntry::star(request));
            } else if let Some(rest) = line.strip_prefix("export {") {
                let braced = format!("{{{}", rest);
                if rest.contains(" from ") {
                    let (clause, request) = split_from(&braced)?;
                    request_module(&mut module, &request);
                    for (name, exported) in parse_specifiers(clause)? {
                        module
                            .indirect_export_entries
                            .push(ExportEntry::indirect(request.clone(), &name, &exported));
                    }
                } else {
                    for (local, exported) in parse_specifiers(&braced)? {
                        module.local_export_entries.push(ExportEntry::local(&local, &exported));
                    }
                }
            } else if let Some(rest) = line.strip_prefix("export ") {
                let (name, kind, value) = parse_declaration(rest)?;
                module.local_export_entries.push(ExportEntry::local(&name, &name));
                module.declarations.push(Declaration {
                    name: name.clone(),
                    kind,
                });
                body.push(Stmt::Bind { name, value });
            } else if line.starts_with("const ") || line.starts_with("let ") {
                let (name, kind, value) = parse_declaration(line)?;
                module.declarations.push(Declaration {
                    name: name.clone(),
                    kind,
                });
                body.push(Stmt::Bind { name, value });
            } else if line == "await forever" {
                module.has_top_level_await = true;
                body.push(Stmt::AwaitForever);
            } else if let Some(message) = line.strip_prefix("throw ") {
                body.push(Stmt::Throw(message.to_string()));
            } else {
                body.push(Stmt::Value(parse_operand(line)?));
            }
        }

        module.program.body = OpaqueNode::new(body);
        Ok(module)
    }
}

fn lines(source: &str) -> impl Iterator<Item = &str> {
    source
        .lines()
        .map(|l| l.trim().trim_end_matches(';'))
        .filter(|l| !l.is_empty())
}

fn error(message: &str) -> Vec<ParserError> {
    vec![ParserError::new(message)]
}

fn request_module(module: &mut ParsedModule, request: &ModuleRequest) {
    if !module.requested_modules.contains(request) {
        module.requested_modules.push(request.clone());
    }
}

fn parse_request(quoted: &str) -> Result<ModuleRequest, Vec<ParserError>> {
    let specifier = quoted.trim().trim_matches('"');
    if specifier.is_empty() {
        return Err(error("expected a module specifier"));
    }
    let request = ModuleRequest::new(specifier);
    Ok(if specifier.ends_with(".json") {
        request.with_attribute("type", "json")
    } else {
        request
    })
}

fn split_from(rest: &str) -> Result<(&str, ModuleRequest), Vec<ParserError>> {
    let at = rest.rfind(" from ").ok_or_else(|| error("expected 'from'"))?;
    Ok((rest[..at].trim(), parse_request(&rest[at + 6..])?))
}

/// `{ a, b as c }` into `(a, a)` and `(b, c)`.
fn parse_specifiers(clause: &str) -> Result<Vec<(String, String)>, Vec<ParserError>> {
    let inner = clause
        .trim()
        .strip_prefix('{')
        .and_then(|c| c.strip_suffix('}'))
        .ok_or_else(|| error("expected braces"))?;
    Ok(inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.split_once(" as ") {
            Some((name, alias)) => (name.trim().to_string(), alias.trim().to_string()),
            None => (s.to_string(), s.to_string()),
        })
        .collect())
}

fn parse_import_clause(clause: &str) -> Result<Vec<(ImportName, String)>, Vec<ParserError>> {
    if let Some(local) = clause.strip_prefix("* as ") {
        return Ok(vec![(ImportName::Namespace, local.trim().to_string())]);
    }
    if clause.starts_with('{') {
        return Ok(parse_specifiers(clause)?
            .into_iter()
            .map(|(name, local)| (ImportName::Name(name), local))
            .collect());
    }
    Ok(vec![(ImportName::Name("default".to_string()), clause.to_string())])
}

fn parse_declaration(text: &str) -> Result<(String, DeclarationKind, Operand), Vec<ParserError>> {
    let (kind, rest) = if let Some(rest) = text.strip_prefix("const ") {
        (DeclarationKind::Const, rest)
    } else if let Some(rest) = text.strip_prefix("let ") {
        (DeclarationKind::Let, rest)
    } else {
        return Err(error("expected a declaration"));
    };
    let (name, value) = rest.split_once('=').ok_or_else(|| error("expected '='"))?;
    Ok((name.trim().to_string(), kind, parse_operand(value.trim())?))
}

fn parse_operand(text: &str) -> Result<Operand, Vec<ParserError>> {
    if let Ok(i) = text.parse::<i64>() {
        return Ok(Operand::Int(i));
    }
    if text == "import.meta" {
        return Ok(Operand::ImportMeta);
    }
    if text == "function" {
        return Ok(Operand::Function);
    }
    if let Some(specifier) = text.strip_prefix("import(").and_then(|t| t.strip_suffix(')')) {
        return Ok(Operand::DynamicImport(specifier.trim_matches('"').to_string()));
    }
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        return Ok(Operand::Str(text[1..text.len() - 1].to_string()));
    }
    if text.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$') {
        return Ok(Operand::Ident(text.to_string()));
    }
    Err(error(&format!("cannot parse '{}'", text)))
}

/// Runs toy statements directly against the running execution context.
pub struct ToyExecutor;

impl ToyExecutor {
    fn evaluate(vm: &mut Vm, operand: &Operand, name: &str) -> ThrowCompletionOr<JsValue> {
        match operand {
            Operand::Int(i) => Ok(JsValue::from_i64(*i)),
            Operand::Str(s) => vm.js_string(s),
            Operand::Ident(id) => {
                let reference = vm.resolve_binding(id, None);
                vm.get_value(&reference)
            }
            Operand::ImportMeta => Ok(JsValue::Object(vm.get_import_meta()?)),
            Operand::DynamicImport(specifier) => Ok(JsValue::Object(vm.import_dynamically(specifier, &[])?)),
            Operand::Function => vm.new_native_function(
                name,
                Rc::new(|_: &mut Vm, _: JsValue, _: &[JsValue], _: &[JsValue]| -> ThrowCompletionOr<JsValue> {
                    Ok(JsValue::Undefined)
                }),
            ),
        }
    }

    fn execute(vm: &mut Vm, body: &[Stmt], name: &str) -> ThrowCompletionOr<JsValue> {
        let mut completion = JsValue::Undefined;
        for stmt in body {
            match stmt {
                Stmt::Bind { name, value } => {
                    let value = Self::evaluate(vm, value, name)?;
                    let env = vm
                        .running_execution_context()
                        .and_then(|ctx| ctx.lex_env)
                        .ok_or_else(|| JErrorType::InternalError("no environment".to_string()))?;
                    vm.initialize_binding(env, name, value)?;
                }
                Stmt::Value(operand) => completion = Self::evaluate(vm, operand, name)?,
                Stmt::Throw(message) => return Err(JErrorType::TypeError(message.clone())),
                Stmt::AwaitForever => return Ok(JsValue::Object(vm.new_promise()?)),
            }
        }
        Ok(completion)
    }
}

impl Executor for ToyExecutor {
    fn compile(&self, _: &mut Vm, node: &Node, kind: FunctionKind, name: &str) -> ThrowCompletionOr<Rc<Executable>> {
        let body = match node {
            Node::Program(program) => program
                .body
                .downcast_ref::<Vec<Stmt>>()
                .cloned()
                .ok_or_else(|| JErrorType::InternalError("foreign program body".to_string()))?,
            Node::Expression(expression) => vec![Stmt::Value(match &**expression {
                Expression::Literal(Literal::Number(n)) => match JsNumberType::from_f64(*n) {
                    JsNumberType::Integer(i) => Operand::Int(i),
                    _ => return Err(JErrorType::InternalError("toy numbers are integers".to_string())),
                },
                Expression::Literal(Literal::String(s)) => Operand::Str(s.clone()),
                Expression::Identifier(id) => Operand::Ident(id.clone()),
                Expression::Function(_) | Expression::Class(_) => Operand::Function,
                other => {
                    return Err(JErrorType::InternalError(format!("cannot compile {:?}", other)))
                }
            })],
        };
        Ok(Rc::new(Executable::new(name, kind, OpaqueNode::new(body))))
    }

    fn run(&self, vm: &mut Vm, executable: &Executable, _: Option<JsValue>) -> RunResult {
        let body = match executable.code.downcast_ref::<Vec<Stmt>>() {
            Some(body) => body.clone(),
            None => {
                return RunResult::value(Err(JErrorType::InternalError(
                    "foreign executable".to_string(),
                )))
            }
        };
        RunResult::value(Self::execute(vm, &body, &executable.name))
    }
}

pub fn new_vm() -> Vm {
    new_vm_with(EngineConfig::default())
}

pub fn new_vm_with(config: EngineConfig) -> Vm {
    Vm::new(config, Rc::new(ToyExecutor), Rc::new(ToyParser)).unwrap()
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

pub fn property(vm: &mut Vm, object: CellId, name: &str) -> JsValue {
    vm.get(object, &PropertyKey::from(name), JsValue::Object(object)).unwrap()
}

pub fn string_keys(vm: &Vm, object: CellId) -> Vec<String> {
    vm.heap()
        .object(object)
        .own_property_keys()
        .into_iter()
        .filter(|k| !matches!(k, PropertyKey::Sym(_)))
        .map(|k| k.to_string())
        .collect()
}

pub fn export_value(vm: &mut Vm, module: ModuleId, name: &str) -> JsValue {
    let namespace = vm.module_namespace(module).unwrap();
    property(vm, namespace, name)
}
