//! End-to-end checking behaviour for the descriptor trees the transformer
//! emits for representative sources.

use super::{arr, num, obj, s};
use crate::runtime::context::TypeContext;
use crate::runtime::error::RuntimeError;
use crate::runtime::types::ClassPart;
use crate::runtime::value::{InstanceValue, Value};

/// `type Thing = {id: string | number, name: string};`
/// `const w: Thing = {id: false, name: "Widget"};`
#[test]
fn mismatched_alias_member_reports_its_path() {
    let t = TypeContext::new();
    let thing = t
        .type_alias(
            "Thing",
            t.object(vec![
                t.property("id", t.union(vec![t.string(), t.number()])),
                t.property("name", t.string()),
            ]),
        )
        .expect("register");

    let widget = obj(vec![("id", Value::Bool(false)), ("name", s("Widget"))]);
    let failures = thing.validate(&widget);
    assert_eq!(failures.len(), 1);
    let error = &failures.errors()[0];
    assert_eq!(error.path_string(), "id");
    assert_eq!(error.expected.to_string(), "string | number");
    assert_eq!(error.actual.kind_name(), "boolean");

    let err = thing.assert(&widget).expect_err("assert should raise");
    assert!(matches!(err, RuntimeError::AssertionFailed { .. }));
}

/// `function id<T>(x: T): T { return x } id(1); id("a")`: every call
/// redeclares its parameters, so observations never leak across calls.
#[test]
fn each_call_instantiates_fresh_parameters() {
    let t = TypeContext::new();
    for value in [num(1.0), s("a")] {
        let type_param = t.type_parameter("T", None);
        let slot = t.param("x", t.flow_into(type_param.clone()), false);
        assert!(slot.accepts(&value));
        assert!(t.ret(type_param).accepts(&value));
    }
}

/// `function pair<T>(a: T, b: T): T { return a } pair(1, "x")`
#[test]
fn sibling_parameters_unify_into_a_union() {
    let t = TypeContext::new();
    let type_param = t.type_parameter("T", None);
    let a = t.param("a", t.flow_into(type_param.clone()), false);
    let b = t.param("b", t.flow_into(type_param.clone()), false);

    assert!(a.accepts(&num(1.0)));
    assert!(b.accepts(&s("x")));
    assert!(t.ret(type_param.clone()).accepts(&num(1.0)));
    assert_eq!(type_param.unwrap().to_string(), "number | string");
    assert!(!type_param.accepts(&Value::Bool(true)));
}

/// `type Tree = {kids: Tree[]}` terminates at construction and only
/// dereferences on check.
#[test]
fn recursive_aliases_check_nested_paths() {
    let t = TypeContext::new();
    let tree = {
        let factory = t.clone();
        t.type_alias_thunk("Tree", move |tree| {
            factory.object(vec![factory.property("kids", factory.array(tree.clone()))])
        })
        .expect("register")
    };

    let good = obj(vec![("kids", arr(vec![obj(vec![("kids", arr(vec![]))])]))]);
    assert!(tree.accepts(&good));

    let bad = obj(vec![(
        "kids",
        arr(vec![obj(vec![("kids", arr(vec![num(42.0)]))])]),
    )]);
    let failures = tree.validate(&bad);
    assert!(failures.has_errors());
    assert_eq!(failures.errors()[0].path_string(), "kids[0].kids[0]");
}

/// `class Box<T> { v: T; constructor(v: T) { this.v = v } }`
/// `const b = new Box(3); b.v = "nope"`
#[test]
fn class_parameters_monomorphize_per_instance() {
    let t = TypeContext::new();
    let box_class = {
        let factory = t.clone();
        t.class_thunk("Box", move |class| {
            let type_param = class.type_parameter("T", None);
            vec![ClassPart::Member(
                factory.property("v", factory.flow_into(type_param)),
            )]
        })
    };

    // each construction activates a fresh descriptor, so instances do not
    // share parameter state
    let per_instance = box_class.activate();
    let b = InstanceValue::new("Box");
    b.set("v", num(3.0));
    assert!(per_instance.accepts(&Value::Instance(b.clone())));

    // the assignment site checks against the instance's recorded T
    let recorded = per_instance.type_params()[0].clone();
    let site = t.param("v", recorded, false);
    let failures = site.validate(&s("nope"));
    assert!(failures.has_errors());
    let error = &failures.errors()[0];
    assert_eq!(error.path_string(), "v");
    assert_eq!(error.expected.to_string(), "number");

    let other = box_class.activate();
    let c = InstanceValue::new("Box");
    c.set("v", s("tagged"));
    assert!(other.accepts(&Value::Instance(c)));
}

/// `function f(x: Array<number>) {}; f([1, 2, "3"])`
#[test]
fn array_parameters_report_element_paths() {
    let t = TypeContext::new();
    let slot = t.param("x", t.array(t.number()), false);
    let failures = slot.validate(&arr(vec![num(1.0), num(2.0), s("3")]));
    assert!(failures.has_errors());
    assert_eq!(failures.errors()[0].path_string(), "x[2]");
}

#[test]
fn function_descriptors_check_call_sites() {
    let t = TypeContext::new();
    let signature = t.function(vec![
        t.param("head", t.number(), false),
        t.rest("tail", t.number()),
        t.ret(t.number()),
    ]);
    assert!(signature.assert_params(&[num(1.0), num(2.0), num(3.0)]).is_ok());
    let err = signature
        .assert_params(&[num(1.0), num(2.0), s("3")])
        .expect_err("rest mismatch");
    let RuntimeError::AssertionFailed { failures } = err else {
        panic!("expected assertion failure");
    };
    assert_eq!(failures.errors()[0].path_string(), "tail[1]");

    assert!(signature.assert_return(&num(9.0)).is_ok());
    let err = signature.assert_return(&s("9")).expect_err("return mismatch");
    let RuntimeError::AssertionFailed { failures } = err else {
        panic!("expected assertion failure");
    };
    assert_eq!(failures.errors()[0].path_string(), "return");
}

#[test]
fn optional_params_tolerate_missing_arguments() {
    let t = TypeContext::new();
    let signature = t.function(vec![
        t.param("x", t.number(), false),
        t.param("label", t.string(), true),
        t.ret(t.void()),
    ]);
    assert!(signature.assert_params(&[num(1.0)]).is_ok());
    assert!(signature.assert_params(&[num(1.0), s("ok")]).is_ok());
    assert!(signature.assert_params(&[]).is_err());
}

#[test]
fn nominal_predicates_and_class_chains() {
    let t = TypeContext::new();
    let array = t.nominal("Array");
    assert!(array.accepts(&arr(vec![])));
    assert!(!array.accepts(&obj(vec![])));

    let frozen = t.nominal("$ReadOnlyArray");
    let Value::Array(items) = arr(vec![num(1.0)]) else {
        unreachable!();
    };
    assert!(!frozen.accepts(&Value::Array(items.clone())));
    items.freeze();
    assert!(frozen.accepts(&Value::Array(items)));

    let sorted = InstanceValue::new("SortedList").with_supers(vec!["List".to_string()]);
    assert!(t.nominal("List").accepts(&Value::Instance(sorted)));
}

#[test]
fn unions_descend_into_the_only_matching_branch() {
    let t = TypeContext::new();
    let shape = t.union(vec![
        t.string(),
        t.object(vec![t.property("id", t.number())]),
    ]);
    let failures = shape.validate(&obj(vec![("id", s("seven"))]));
    assert!(failures.has_errors());
    assert_eq!(failures.errors()[0].path_string(), "|1.id");
}

#[test]
fn warn_mode_reports_without_raising() {
    use crate::runtime::context::{Mode, WarningSink};
    use crate::runtime::validation::Validation;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Collecting {
        seen: RefCell<Vec<usize>>,
    }

    impl WarningSink for Collecting {
        fn warn(&self, failures: &Validation) {
            self.seen.borrow_mut().push(failures.len());
        }
    }

    let t = TypeContext::new();
    let sink = Rc::new(Collecting::default());
    t.set_warning_sink(sink.clone());
    t.set_mode(Mode::Warn);

    let number = t.number();
    assert!(number.check(&s("not a number")).is_ok());
    assert_eq!(sink.seen.borrow().as_slice(), &[1]);

    t.set_mode(Mode::Off);
    assert!(number.check(&s("still fine")).is_ok());
    assert_eq!(sink.seen.borrow().len(), 1);

    t.set_mode(Mode::Assert);
    assert!(number.check(&s("now it raises")).is_err());
}
