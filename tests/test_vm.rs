//! The engine façade: scripts, the context stack, jobs and collection.

mod common;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use just_vm::runner::ds::error::{JErrorType, ThrowCompletionOr};
use just_vm::runner::ds::execution_context::{ExecutionContext, ScriptOrModule};
use just_vm::runner::ds::heap::HeapRoot;
use just_vm::runner::ds::value::JsValue;
use just_vm::runner::jobs::{Job, JobSource};
use just_vm::runner::module::ScriptId;
use just_vm::runner::plugin::EngineConfig;
use just_vm::runner::Vm;
use tempfile::tempdir;

use common::{new_vm, new_vm_with, property, write_file};

#[test]
fn test_script_completion_value() {
    let mut vm = new_vm();
    assert_eq!(vm.run_script("1\n2\n42", "answer.js").unwrap(), JsValue::from_i64(42));
    assert!(vm.execution_context_stack().is_empty());
    assert_eq!(vm.script(ScriptId(0)).filename, "answer.js");
}

#[test]
fn test_script_errors_propagate() {
    let mut vm = new_vm();
    match vm.run_script("throw broken", "bad.js") {
        Err(JErrorType::TypeError(message)) => assert_eq!(message, "broken"),
        other => panic!("expected a TypeError, got {:?}", other),
    }
    assert!(matches!(
        vm.run_script("export const x = 1", "module-syntax.js"),
        Err(JErrorType::SyntaxError(_))
    ));
    assert!(vm.execution_context_stack().is_empty());
}

#[test]
fn test_undeclared_identifier_is_a_reference_error() {
    let mut vm = new_vm();
    assert!(matches!(
        vm.run_script("missing", "ref.js"),
        Err(JErrorType::ReferenceError(_))
    ));
}

#[test]
fn test_call_stack_emptied_fires_per_script() {
    let mut vm = new_vm();
    let count = Rc::new(Cell::new(0));
    let seen = count.clone();
    vm.set_on_call_stack_emptied(Rc::new(move |_: &mut Vm| seen.set(seen.get() + 1)));

    vm.run_script("1", "one.js").unwrap();
    vm.run_script("2", "two.js").unwrap();
    assert_eq!(count.get(), 2);
}

#[test]
fn test_save_and_restore_stack() {
    let mut vm = new_vm();
    let realm = vm.current_realm();
    let mut outer = ExecutionContext::new(realm);
    outer.function_name = Some("outer".to_string());
    vm.push_execution_context(outer);

    vm.save_execution_context_stack();
    assert!(vm.execution_context_stack().is_empty());
    assert_eq!(vm.run_script("5", "nested.js").unwrap(), JsValue::from_i64(5));

    vm.restore_execution_context_stack();
    assert_eq!(vm.execution_context_stack().len(), 1);
    assert_eq!(
        vm.running_execution_context().unwrap().function_name.as_deref(),
        Some("outer")
    );
    vm.pop_execution_context();
}

#[test]
fn test_active_script_is_innermost_with_one() {
    let mut vm = new_vm();
    let realm = vm.current_realm();
    let mut script_ctx = ExecutionContext::new(realm);
    script_ctx.script_or_module = ScriptOrModule::Script(ScriptId(3));
    vm.push_execution_context(script_ctx);
    vm.push_execution_context(ExecutionContext::new(realm));

    assert_eq!(vm.get_active_script_or_module(), ScriptOrModule::Script(ScriptId(3)));
    vm.clear_execution_context_stack();
    assert_eq!(vm.get_active_script_or_module(), ScriptOrModule::Empty);
}

#[test]
fn test_stack_trace_lists_innermost_first() {
    let mut vm = new_vm();
    let realm = vm.current_realm();
    for name in ["main", "helper"] {
        let mut ctx = ExecutionContext::new(realm);
        ctx.function_name = Some(name.to_string());
        vm.push_execution_context(ctx);
    }
    let names: Vec<Option<String>> = vm.stack_trace().into_iter().map(|f| f.function_name).collect();
    assert_eq!(names, vec![Some("helper".to_string()), Some("main".to_string())]);
    vm.clear_execution_context_stack();
}

#[test]
fn test_promise_jobs_run_in_order() {
    let mut vm = new_vm();
    let log = Rc::new(RefCell::new(Vec::new()));
    for i in 0..3 {
        let log = log.clone();
        vm.enqueue_promise_job(
            Job::new(Box::new(move |vm: &mut Vm| -> ThrowCompletionOr<JsValue> {
                log.borrow_mut().push(i);
                if i == 0 {
                    let log = log.clone();
                    vm.enqueue_promise_job(
                        Job::new(Box::new(move |_: &mut Vm| -> ThrowCompletionOr<JsValue> {
                            log.borrow_mut().push(10);
                            Ok(JsValue::Undefined)
                        })),
                        None,
                    );
                }
                Ok(JsValue::Undefined)
            })),
            None,
        );
    }
    vm.run_queued_promise_jobs();
    assert_eq!(*log.borrow(), vec![0, 1, 2, 10]);
}

#[test]
fn test_failing_job_is_reported_and_draining_continues() {
    let mut vm = new_vm_with(EngineConfig::parse("[jobs]\nlog_errors = false").unwrap());
    let reported = Rc::new(RefCell::new(Vec::new()));
    let sink = reported.clone();
    vm.set_on_job_error(Rc::new(move |_: &mut Vm, source: JobSource, error: &JErrorType| {
        sink.borrow_mut().push((source, error.name()));
    }));
    let ran = Rc::new(Cell::new(false));
    let flag = ran.clone();

    vm.enqueue_promise_job(
        Job::new(Box::new(|_: &mut Vm| -> ThrowCompletionOr<JsValue> {
            Err(JErrorType::RangeError("too far".to_string()))
        })),
        None,
    );
    vm.enqueue_promise_job(
        Job::new(Box::new(move |_: &mut Vm| -> ThrowCompletionOr<JsValue> {
            flag.set(true);
            Ok(JsValue::Undefined)
        })),
        None,
    );
    vm.run_queued_promise_jobs();

    assert!(ran.get());
    assert_eq!(*reported.borrow(), vec![(JobSource::Promise, "RangeError")]);
}

#[test]
fn test_queued_job_values_survive_collection() {
    let mut vm = new_vm();
    let held = vm.new_object().unwrap();
    vm.enqueue_promise_job(
        Job::new(Box::new(|_: &mut Vm| -> ThrowCompletionOr<JsValue> { Ok(JsValue::Undefined) }))
            .holding(&[JsValue::Object(held)]),
        None,
    );

    let mut roots = HashMap::new();
    vm.gather_roots(&mut roots);
    assert_eq!(roots.get(&held), Some(&HeapRoot::PromiseJob));
    vm.collect_garbage();
    assert!(vm.heap().contains(held));

    vm.run_queued_promise_jobs();
    vm.collect_garbage();
    assert!(!vm.heap().contains(held));
}

#[test]
fn test_module_records_keep_their_cells() {
    let dir = tempdir().unwrap();
    let main = write_file(dir.path(), "main.js", "export const x = 1");
    let mut vm = new_vm();
    let module = vm.run_module(&main).unwrap();
    let namespace = vm.module_namespace(module).unwrap();
    let environment = vm.module(module).environment.unwrap();

    let mut roots = HashMap::new();
    vm.gather_roots(&mut roots);
    assert_eq!(roots.get(&namespace), Some(&HeapRoot::StoredModule));
    assert_eq!(roots.get(&environment), Some(&HeapRoot::StoredModule));

    vm.collect_garbage();
    assert!(vm.heap().contains(namespace));
    assert!(vm.heap().contains(environment));
}

#[test]
fn test_heap_limit_from_config() {
    let config = EngineConfig::parse("[heap]\nmax_bytes = 65536").unwrap();
    assert_eq!(config.heap_config().max_bytes, Some(65536));
    assert_eq!(EngineConfig::default().heap_config().max_bytes, None);
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempdir().unwrap();
    let path = write_file(dir.path(), "engine.toml", "[engine]\ndynamic_imports_allowed = true\n");
    let config = EngineConfig::load(&path).unwrap();
    assert!(config.engine.dynamic_imports_allowed);
    assert!(config.jobs.log_errors);
    assert!(new_vm_with(config).dynamic_imports_allowed());
}

#[test]
fn test_string_wrapper_indexes_utf16_code_units() {
    let mut vm = new_vm();
    let text = vm.js_string("a\u{1F600}").unwrap();
    let wrapper = vm.to_object(&text).unwrap();
    assert_eq!(property(&mut vm, wrapper, "length"), JsValue::from_i64(3));
    let first = property(&mut vm, wrapper, "0");
    assert_eq!(vm.string_value(&first), Some("a"));
    let high = property(&mut vm, wrapper, "1");
    assert_eq!(vm.string_value(&high), Some("\u{FFFD}"));
    assert_eq!(property(&mut vm, wrapper, "3"), JsValue::Undefined);
}
