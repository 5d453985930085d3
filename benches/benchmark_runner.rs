/// Benchmark runner for the execution core.
///
/// Times the engine's own bookkeeping: identifier lookup with and without a
/// cached coordinate, context push/pop, job draining and collection.

extern crate just_vm;

use std::rc::Rc;
use std::time::{Duration, Instant};

use just_vm::parser::ast::{FunctionKind, Node, OpaqueNode, Program};
use just_vm::parser::{ParsedModule, ParserError, SourceParser};
use just_vm::runner::ds::error::ThrowCompletionOr;
use just_vm::runner::ds::execution_context::ExecutionContext;
use just_vm::runner::ds::heap::CellId;
use just_vm::runner::ds::operations::lex_env::new_declarative_environment;
use just_vm::runner::ds::value::JsValue;
use just_vm::runner::executor::{Executable, Executor, RunResult};
use just_vm::runner::jobs::Job;
use just_vm::runner::plugin::EngineConfig;
use just_vm::runner::Vm;

struct Idle;

impl Executor for Idle {
    fn compile(&self, _: &mut Vm, _: &Node, kind: FunctionKind, name: &str) -> ThrowCompletionOr<Rc<Executable>> {
        Ok(Rc::new(Executable::new(name, kind, OpaqueNode::empty())))
    }

    fn run(&self, _: &mut Vm, _: &Executable, _: Option<JsValue>) -> RunResult {
        RunResult::value(Ok(JsValue::Undefined))
    }
}

impl SourceParser for Idle {
    fn parse_script(&self, _: &str, _: &str) -> Result<Program, Vec<ParserError>> {
        Err(vec![ParserError::new("benchmarks do not parse")])
    }

    fn parse_module(&self, _: &str, _: &str) -> Result<ParsedModule, Vec<ParserError>> {
        Err(vec![ParserError::new("benchmarks do not parse")])
    }
}

fn new_vm() -> Vm {
    let idle = Rc::new(Idle);
    Vm::new(EngineConfig::default(), idle.clone(), idle).expect("engine construction")
}

/// A chain of `depth` scopes; the outermost declares `needle`.
fn deep_scope(vm: &mut Vm, depth: usize) -> CellId {
    let global = vm.heap().realm(vm.current_realm()).global_env;
    let mut env = new_declarative_environment(vm.heap_mut(), Some(global)).unwrap();
    vm.create_mutable_binding(env, "needle", false).unwrap();
    vm.initialize_binding(env, "needle", JsValue::from_i64(1)).unwrap();
    for i in 0..depth {
        env = new_declarative_environment(vm.heap_mut(), Some(env)).unwrap();
        let name = format!("filler{}", i);
        vm.create_mutable_binding(env, &name, false).unwrap();
        vm.initialize_binding(env, &name, JsValue::Undefined).unwrap();
    }
    env
}

fn bench_lookup_walk(iterations: u32) -> Duration {
    let mut vm = new_vm();
    let env = deep_scope(&mut vm, 32);
    let start = Instant::now();
    for _ in 0..iterations {
        let reference = vm.resolve_binding("needle", Some(env));
        let _ = vm.get_value(&reference);
    }
    start.elapsed()
}

fn bench_lookup_cached(iterations: u32) -> Duration {
    let mut vm = new_vm();
    let env = deep_scope(&mut vm, 32);
    let coordinate = vm
        .resolve_binding("needle", Some(env))
        .environment_coordinate
        .expect("slot binding");
    let start = Instant::now();
    for _ in 0..iterations {
        let _ = vm.get_binding_value_at(env, coordinate);
    }
    start.elapsed()
}

fn bench_context_push_pop(iterations: u32) -> Duration {
    let mut vm = new_vm();
    let realm = vm.current_realm();
    let start = Instant::now();
    for _ in 0..iterations {
        vm.push_execution_context(ExecutionContext::new(realm));
        vm.pop_execution_context();
    }
    start.elapsed()
}

fn bench_job_drain(iterations: u32) -> Duration {
    let mut vm = new_vm();
    let start = Instant::now();
    for _ in 0..iterations {
        vm.enqueue_promise_job(
            Job::new(Box::new(|_: &mut Vm| -> ThrowCompletionOr<JsValue> { Ok(JsValue::Undefined) })),
            None,
        );
    }
    vm.run_queued_promise_jobs();
    start.elapsed()
}

fn bench_collect(iterations: u32) -> Duration {
    let mut vm = new_vm();
    for _ in 0..iterations {
        let _ = vm.new_object();
    }
    let start = Instant::now();
    let report = vm.collect_garbage();
    let elapsed = start.elapsed();
    assert!(report.freed_cells >= iterations as usize);
    elapsed
}

fn main() {
    println!("=======================================================");
    println!("  just-vm - Execution Core Benchmarks");
    println!("=======================================================\n");

    let benchmarks: Vec<(&str, fn(u32) -> Duration, u32)> = vec![
        ("Lookup, chain walk (depth 32)", bench_lookup_walk, 100_000),
        ("Lookup, cached coordinate", bench_lookup_cached, 100_000),
        ("Context push/pop", bench_context_push_pop, 100_000),
        ("Promise job drain", bench_job_drain, 100_000),
        ("Collect unreachable objects", bench_collect, 100_000),
    ];

    println!("{:<34} {:>12} {:>14}", "Benchmark", "Total", "Per iteration");
    println!("{}", "-".repeat(62));

    for (name, run, iterations) in &benchmarks {
        let elapsed = run(*iterations);
        let per = elapsed / *iterations;
        println!("{:<34} {:>10.2?} {:>14.2?}", name, elapsed, per);
    }
}
