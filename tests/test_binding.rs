//! Identifier resolution and destructuring binding initialization.

mod common;

use std::cell::Cell;
use std::rc::Rc;

use just_vm::parser::ast::{BindingEntry, BindingPattern, BindingTarget, Expression, FunctionExpression, FunctionKind, Literal, OpaqueNode};
use just_vm::runner::ds::error::{JErrorType, ThrowCompletionOr};
use just_vm::runner::ds::execution_context::ExecutionContext;
use just_vm::runner::ds::heap::CellId;
use just_vm::runner::ds::lex_env::EnvironmentCoordinate;
use just_vm::runner::ds::object_property::PropertyKey;
use just_vm::runner::ds::operations::lex_env::new_declarative_environment;
use just_vm::runner::ds::value::JsValue;
use just_vm::runner::Vm;

use common::{new_vm, property, string_keys};

fn global_env(vm: &Vm) -> CellId {
    vm.heap().realm(vm.current_realm()).global_env
}

/// A fresh declarative scope under the global one with uninitialized
/// mutable bindings for `names`.
fn scope(vm: &mut Vm, names: &[&str]) -> CellId {
    let outer = global_env(vm);
    let env = new_declarative_environment(vm.heap_mut(), Some(outer)).unwrap();
    for name in names {
        vm.create_mutable_binding(env, name, false).unwrap();
    }
    env
}

fn object(vm: &mut Vm, entries: &[(&str, JsValue)]) -> JsValue {
    let o = vm.new_object().unwrap();
    for (key, value) in entries {
        vm.create_data_property_or_throw(o, PropertyKey::from(*key), *value).unwrap();
    }
    JsValue::Object(o)
}

fn array(vm: &mut Vm, values: &[JsValue]) -> JsValue {
    JsValue::Object(vm.create_array_from_list(values).unwrap())
}

fn int(i: i64) -> JsValue {
    JsValue::from_i64(i)
}

#[derive(Clone, Copy)]
enum OnReturn {
    Object,
    Throw,
    Primitive,
}

/// An endless iterable yielding `undefined` whose `return` bumps `closes`
/// and then behaves as `on_return` says.
fn endless_iterable(vm: &mut Vm, closes: Rc<Cell<u32>>, on_return: OnReturn) -> JsValue {
    let iterator = vm.new_object().unwrap();
    let next = vm
        .new_native_function(
            "next",
            Rc::new(|vm: &mut Vm, _: JsValue, _: &[JsValue], _: &[JsValue]| -> ThrowCompletionOr<JsValue> {
                let result = vm.new_object()?;
                vm.create_data_property_or_throw(result, PropertyKey::from("value"), JsValue::Undefined)?;
                vm.create_data_property_or_throw(result, PropertyKey::from("done"), JsValue::Boolean(false))?;
                Ok(JsValue::Object(result))
            }),
        )
        .unwrap();
    let close = vm
        .new_native_function(
            "return",
            Rc::new(move |vm: &mut Vm, _: JsValue, _: &[JsValue], _: &[JsValue]| -> ThrowCompletionOr<JsValue> {
                closes.set(closes.get() + 1);
                match on_return {
                    OnReturn::Object => Ok(JsValue::Object(vm.new_object()?)),
                    OnReturn::Throw => Err(JErrorType::RangeError("return failed".to_string())),
                    OnReturn::Primitive => Ok(int(1)),
                }
            }),
        )
        .unwrap();
    vm.create_data_property_or_throw(iterator, PropertyKey::from("next"), next).unwrap();
    vm.create_data_property_or_throw(iterator, PropertyKey::from("return"), close).unwrap();

    let get_iterator = vm
        .new_native_function_with_captures(
            "[Symbol.iterator]",
            Rc::new(|_: &mut Vm, _: JsValue, _: &[JsValue], captures: &[JsValue]| -> ThrowCompletionOr<JsValue> {
                Ok(captures[0])
            }),
            &[JsValue::Object(iterator)],
        )
        .unwrap();
    let iterable = vm.new_object().unwrap();
    let key = PropertyKey::Sym(vm.well_known_symbols().iterator);
    vm.create_data_property_or_throw(iterable, key, get_iterator).unwrap();
    JsValue::Object(iterable)
}

fn binding(vm: &mut Vm, env: CellId, name: &str) -> JsValue {
    vm.get_binding_value(env, name, true).unwrap()
}

#[test]
fn test_coordinate_matches_chain_walk() {
    let mut vm = new_vm();
    let outer = scope(&mut vm, &["first", "second"]);
    vm.initialize_binding(outer, "first", int(1)).unwrap();
    vm.initialize_binding(outer, "second", int(2)).unwrap();
    let inner = new_declarative_environment(vm.heap_mut(), Some(outer)).unwrap();
    vm.create_mutable_binding(inner, "local", false).unwrap();
    vm.initialize_binding(inner, "local", int(3)).unwrap();

    let reference = vm.resolve_binding("second", Some(inner));
    let coordinate = reference.environment_coordinate.unwrap();
    assert_eq!(coordinate, EnvironmentCoordinate { hops: 1, index: 1 });
    assert_eq!(vm.get_binding_value_at(inner, coordinate).unwrap(), int(2));
    assert_eq!(vm.get_value(&reference).unwrap(), int(2));

    let local = vm.resolve_binding("local", Some(inner));
    assert_eq!(local.environment_coordinate, Some(EnvironmentCoordinate { hops: 0, index: 0 }));
}

#[test]
fn test_unknown_name_is_unresolvable() {
    let mut vm = new_vm();
    let env = scope(&mut vm, &[]);
    let reference = vm.resolve_binding("nowhere", Some(env));
    assert!(reference.is_unresolvable());
    assert!(matches!(vm.get_value(&reference), Err(JErrorType::ReferenceError(_))));
}

#[test]
fn test_global_properties_resolve_without_a_slot() {
    let mut vm = new_vm();
    let global = vm.get_global_object();
    vm.create_data_property_or_throw(global, PropertyKey::from("hostValue"), int(9))
        .unwrap();
    let env = scope(&mut vm, &[]);

    let reference = vm.resolve_binding("hostValue", Some(env));
    assert!(!reference.is_unresolvable());
    assert!(reference.environment_coordinate.is_none());
    assert_eq!(vm.get_value(&reference).unwrap(), int(9));
}

#[test]
fn test_reading_before_initialization_is_a_reference_error() {
    let mut vm = new_vm();
    let env = scope(&mut vm, &["pending"]);
    assert!(matches!(
        vm.get_binding_value(env, "pending", true),
        Err(JErrorType::ReferenceError(_))
    ));
}

#[test]
fn test_object_pattern_with_defaults_alias_and_rest() {
    let mut vm = new_vm();
    let env = scope(&mut vm, &["a", "b", "renamed", "rest"]);
    let value = object(
        &mut vm,
        &[("a", int(1)), ("b", JsValue::Undefined), ("c", int(3)), ("d", int(4)), ("e", int(5))],
    );
    let pattern = BindingPattern::object(vec![
        BindingEntry::key("a"),
        BindingEntry::key("b").with_default(Expression::Literal(Literal::Number(20.0))),
        BindingEntry::key("c").alias_to("renamed"),
        BindingEntry::rest("rest"),
    ]);

    vm.binding_initialization(&BindingTarget::Pattern(Rc::new(pattern)), value, Some(env))
        .unwrap();

    assert_eq!(binding(&mut vm, env, "a"), int(1));
    assert_eq!(binding(&mut vm, env, "b"), int(20));
    assert_eq!(binding(&mut vm, env, "renamed"), int(3));
    let rest = binding(&mut vm, env, "rest").as_object().unwrap();
    assert_eq!(string_keys(&vm, rest), vec!["d", "e"]);
}

#[test]
fn test_computed_key_pattern() {
    let mut vm = new_vm();
    let env = scope(&mut vm, &["picked"]);
    let value = object(&mut vm, &[("dynamic", int(8))]);
    let pattern = BindingPattern::object(vec![BindingEntry::computed(Expression::Literal(
        Literal::String("dynamic".to_string()),
    ))
    .alias_to("picked")]);

    vm.binding_initialization(&BindingTarget::Pattern(Rc::new(pattern)), value, Some(env))
        .unwrap();
    assert_eq!(binding(&mut vm, env, "picked"), int(8));
}

#[test]
fn test_array_pattern_with_elision_and_rest() {
    let mut vm = new_vm();
    let env = scope(&mut vm, &["first", "third", "tail"]);
    let value = array(&mut vm, &[int(1), int(2), int(3), int(4), int(5)]);
    let pattern = BindingPattern::array(vec![
        BindingEntry::element("first"),
        BindingEntry::elision(),
        BindingEntry::element("third"),
        BindingEntry::rest("tail"),
    ]);

    vm.binding_initialization(&BindingTarget::Pattern(Rc::new(pattern)), value, Some(env))
        .unwrap();

    assert_eq!(binding(&mut vm, env, "first"), int(1));
    assert_eq!(binding(&mut vm, env, "third"), int(3));
    let tail = binding(&mut vm, env, "tail").as_object().unwrap();
    assert_eq!(property(&mut vm, tail, "0"), int(4));
    assert_eq!(property(&mut vm, tail, "1"), int(5));
    assert_eq!(property(&mut vm, tail, "length"), int(2));
}

#[test]
fn test_short_array_fills_with_defaults() {
    let mut vm = new_vm();
    let env = scope(&mut vm, &["x", "y", "z"]);
    let value = array(&mut vm, &[int(1)]);
    let pattern = BindingPattern::array(vec![
        BindingEntry::element("x"),
        BindingEntry::element("y").with_default(Expression::Literal(Literal::Number(7.0))),
        BindingEntry::element("z"),
    ]);

    vm.binding_initialization(&BindingTarget::Pattern(Rc::new(pattern)), value, Some(env))
        .unwrap();
    assert_eq!(binding(&mut vm, env, "x"), int(1));
    assert_eq!(binding(&mut vm, env, "y"), int(7));
    assert_eq!(binding(&mut vm, env, "z"), JsValue::Undefined);
}

#[test]
fn test_nested_patterns() {
    let mut vm = new_vm();
    let env = scope(&mut vm, &["inner", "deep"]);
    let point = object(&mut vm, &[("inner", int(11))]);
    let list = array(&mut vm, &[int(22)]);
    let value = array(&mut vm, &[point, list]);
    let pattern = BindingPattern::array(vec![
        BindingEntry::nested(BindingPattern::object(vec![BindingEntry::key("inner")])),
        BindingEntry::nested(BindingPattern::array(vec![BindingEntry::element("deep")])),
    ]);

    vm.binding_initialization(&BindingTarget::Pattern(Rc::new(pattern)), value, Some(env))
        .unwrap();
    assert_eq!(binding(&mut vm, env, "inner"), int(11));
    assert_eq!(binding(&mut vm, env, "deep"), int(22));
}

#[test]
fn test_anonymous_default_takes_the_binding_name() {
    let mut vm = new_vm();
    let env = scope(&mut vm, &["callback"]);
    let value = object(&mut vm, &[]);
    let function = Expression::Function(FunctionExpression {
        name: None,
        kind: FunctionKind::Normal,
        is_arrow: true,
        body: OpaqueNode::empty(),
    });
    let pattern = BindingPattern::object(vec![BindingEntry::key("callback").with_default(function)]);

    vm.binding_initialization(&BindingTarget::Pattern(Rc::new(pattern)), value, Some(env))
        .unwrap();
    let callback = binding(&mut vm, env, "callback").as_object().unwrap();
    let name = property(&mut vm, callback, "name");
    assert_eq!(vm.string_value(&name), Some("callback"));
}

#[test]
fn test_destructuring_nullish_is_a_type_error() {
    let mut vm = new_vm();
    let env = scope(&mut vm, &["a"]);
    let pattern = BindingPattern::object(vec![BindingEntry::key("a")]);
    let target = BindingTarget::Pattern(Rc::new(pattern));
    assert!(matches!(
        vm.binding_initialization(&target, JsValue::Undefined, Some(env)),
        Err(JErrorType::TypeError(_))
    ));
    assert!(matches!(
        vm.binding_initialization(&target, JsValue::Null, Some(env)),
        Err(JErrorType::TypeError(_))
    ));
}

#[test]
fn test_array_pattern_on_non_iterable_is_a_type_error() {
    let mut vm = new_vm();
    let env = scope(&mut vm, &["a"]);
    let pattern = BindingPattern::array(vec![BindingEntry::element("a")]);
    let result = vm.binding_initialization(&BindingTarget::Pattern(Rc::new(pattern)), int(5), Some(env));
    assert!(matches!(result, Err(JErrorType::TypeError(_))));
}

#[test]
fn test_assignment_without_environment_updates_existing_bindings() {
    let mut vm = new_vm();
    let env = scope(&mut vm, &["left", "right"]);
    vm.initialize_binding(env, "left", int(0)).unwrap();
    vm.initialize_binding(env, "right", int(0)).unwrap();

    let mut ctx = ExecutionContext::new(vm.current_realm());
    ctx.lex_env = Some(env);
    ctx.var_env = Some(env);
    vm.push_execution_context(ctx);

    let value = array(&mut vm, &[int(5), int(6)]);
    let pattern = BindingPattern::array(vec![BindingEntry::element("left"), BindingEntry::element("right")]);
    vm.binding_initialization(&BindingTarget::Pattern(Rc::new(pattern)), value, None)
        .unwrap();
    vm.binding_initialization(&BindingTarget::Identifier("left".to_string()), int(9), None)
        .unwrap();
    vm.pop_execution_context();

    assert_eq!(binding(&mut vm, env, "left"), int(9));
    assert_eq!(binding(&mut vm, env, "right"), int(6));
}

#[test]
fn test_array_pattern_closes_unexhausted_iterator() {
    let mut vm = new_vm();
    let env = scope(&mut vm, &["a"]);
    let plain = Rc::new(BindingPattern::array(vec![BindingEntry::element("a")]));
    let failing_default = Rc::new(BindingPattern::array(vec![
        BindingEntry::element("a").with_default(Expression::Identifier("missing".to_string())),
    ]));

    let closes = Rc::new(Cell::new(0));
    let iterable = endless_iterable(&mut vm, closes.clone(), OnReturn::Object);
    vm.binding_initialization(&BindingTarget::Pattern(plain.clone()), iterable, Some(env))
        .unwrap();
    assert_eq!(closes.get(), 1);
    assert_eq!(binding(&mut vm, env, "a"), JsValue::Undefined);

    // The default's error is kept even though `return` throws too.
    let closes = Rc::new(Cell::new(0));
    let iterable = endless_iterable(&mut vm, closes.clone(), OnReturn::Throw);
    let retry = scope(&mut vm, &["a"]);
    let mut ctx = ExecutionContext::new(vm.current_realm());
    ctx.lex_env = Some(retry);
    ctx.var_env = Some(retry);
    vm.push_execution_context(ctx);
    let result = vm.binding_initialization(&BindingTarget::Pattern(failing_default), iterable, Some(retry));
    vm.pop_execution_context();
    assert!(matches!(result, Err(JErrorType::ReferenceError(_))), "{:?}", result);
    assert_eq!(closes.get(), 1);

    let closes = Rc::new(Cell::new(0));
    let iterable = endless_iterable(&mut vm, closes.clone(), OnReturn::Throw);
    let env = scope(&mut vm, &["a"]);
    let result = vm.binding_initialization(&BindingTarget::Pattern(plain.clone()), iterable, Some(env));
    assert!(matches!(result, Err(JErrorType::RangeError(_))), "{:?}", result);
    assert_eq!(closes.get(), 1);

    let closes = Rc::new(Cell::new(0));
    let iterable = endless_iterable(&mut vm, closes.clone(), OnReturn::Primitive);
    let env = scope(&mut vm, &["a"]);
    let result = vm.binding_initialization(&BindingTarget::Pattern(plain), iterable, Some(env));
    assert!(matches!(result, Err(JErrorType::TypeError(_))), "{:?}", result);
    assert_eq!(closes.get(), 1);
}
