use super::{arr, num, obj, s};
use crate::language::parser::parse_annotation;
use crate::language::printer::print_annotation;
use crate::runtime::context::TypeContext;
use crate::runtime::value::Value;

#[test]
fn accepts_agrees_with_collect_errors() {
    let t = TypeContext::new();
    let descriptors = vec![
        t.number(),
        t.string_literal("on"),
        t.nullable(t.boolean()),
        t.array(t.number()),
        t.tuple(vec![t.number(), t.string()]),
        t.object(vec![t.property("id", t.number())]),
        t.union(vec![t.string(), t.number()]),
        t.intersection(vec![
            t.object(vec![t.property("a", t.number())]),
            t.object(vec![t.property("b", t.string())]),
        ]),
    ];
    let values = vec![
        Value::Undefined,
        Value::Null,
        Value::Bool(true),
        num(3.0),
        s("on"),
        arr(vec![num(1.0), num(2.0)]),
        obj(vec![("id", num(7.0)), ("a", num(1.0)), ("b", s("x"))]),
    ];
    for descriptor in &descriptors {
        for value in &values {
            let validation = descriptor.validate(value);
            assert_eq!(
                descriptor.accepts(value),
                validation.is_empty(),
                "accepts and collectErrors disagree for {descriptor} on {value}"
            );
        }
    }
}

#[test]
fn unwrap_is_idempotent() {
    let t = TypeContext::new();
    t.type_alias("Id", t.number()).expect("register");
    let reference = t.ref_by_name("Id", vec![]);
    let once = reference.unwrap();
    assert!(once.ptr_eq(&once.unwrap()));

    let factory = t.clone();
    let boxed = t.box_of(move || factory.string());
    let once = boxed.unwrap();
    assert!(once.ptr_eq(&once.unwrap()));

    let param = t.type_parameter("T", None);
    assert!(param.accepts(&num(1.0)));
    let once = param.unwrap();
    assert!(once.ptr_eq(&once.unwrap()));
}

#[test]
fn union_of_duplicates_behaves_like_the_member() {
    let t = TypeContext::new();
    let duplicated = t.union(vec![t.number(), t.number()]);
    for value in [num(1.0), s("no"), Value::Null] {
        assert_eq!(duplicated.accepts(&value), t.number().accepts(&value));
    }
}

#[test]
fn intersection_with_any_behaves_like_the_member() {
    let t = TypeContext::new();
    let intersected = t.intersection(vec![t.string(), t.any()]);
    for value in [s("yes"), num(2.0), Value::Undefined] {
        assert_eq!(intersected.accepts(&value), t.string().accepts(&value));
    }
}

#[test]
fn nullable_accepts_both_nullish_forms() {
    let t = TypeContext::new();
    let nullable = t.nullable(t.number());
    assert!(nullable.accepts(&Value::Null));
    assert!(nullable.accepts(&Value::Undefined));
    assert!(nullable.accepts(&num(4.0)));
    assert!(!nullable.accepts(&s("4")));
}

#[test]
fn exact_objects_close_the_key_set() {
    let t = TypeContext::new();
    let exact = t.exact_object(vec![t.property("a", t.number())]);
    let open = t.object(vec![t.property("a", t.number())]);
    let wide = obj(vec![("a", num(1.0)), ("b", num(2.0))]);
    assert!(!exact.accepts(&wide));
    assert!(open.accepts(&wide));
}

#[test]
fn type_of_round_trips_its_sample() {
    let t = TypeContext::new();
    let samples = vec![
        num(3.5),
        s("tag"),
        Value::Bool(false),
        arr(vec![num(1.0), s("two")]),
        obj(vec![("kind", s("leaf")), ("size", num(9.0))]),
    ];
    for sample in samples {
        assert!(t.type_of(&sample).accepts(&sample), "typeOf({sample}) rejected its sample");
    }
}

#[test]
fn fresh_parameters_fix_on_first_observation() {
    let t = TypeContext::new();
    let param = t.type_parameter("T", None);
    assert!(param.accepts(&num(1.0)));
    assert!(param.accepts(&num(2.0)));
    assert!(!param.accepts(&s("x")));
    assert_eq!(
        param.accepts(&s("x")),
        t.type_of(&num(1.0)).accepts(&s("x"))
    );
}

#[test]
fn flow_into_widens_into_a_union() {
    let t = TypeContext::new();
    let param = t.type_parameter("T", None);
    let flow = t.flow_into(param.clone());
    assert!(flow.accepts(&num(1.0)));
    assert!(flow.accepts(&s("x")));
    assert_eq!(param.unwrap().to_string(), "number | string");
    assert!(!param.accepts(&Value::Bool(true)));
}

#[test]
fn bounded_parameters_reject_before_recording() {
    let t = TypeContext::new();
    let param = t.type_parameter("T", Some(t.number()));
    assert!(!param.accepts(&s("no")));
    // the rejected observation must not have recorded anything
    assert!(param.accepts(&num(1.0)));
}

#[test]
fn any_bound_accepts_without_recording() {
    let t = TypeContext::new();
    let param = t.type_parameter("T", Some(t.any()));
    assert!(param.accepts(&num(1.0)));
    assert!(param.accepts(&s("also fine")));
}

#[test]
fn empty_union_rejects_everything() {
    let t = TypeContext::new();
    let none = t.union(vec![]);
    for value in [num(0.0), s(""), Value::Null, Value::Undefined] {
        assert!(!none.accepts(&value));
    }
}

#[test]
fn empty_intersection_accepts_everything() {
    let t = TypeContext::new();
    let all = t.intersection(vec![]);
    for value in [num(0.0), s(""), Value::Null, Value::Undefined] {
        assert!(all.accepts(&value));
    }
}

#[test]
fn tuples_need_at_least_their_arity() {
    let t = TypeContext::new();
    let pair = t.tuple(vec![t.number(), t.string()]);
    assert!(!pair.accepts(&arr(vec![num(1.0)])));
    assert!(pair.accepts(&arr(vec![num(1.0), s("x")])));
    // longer inputs satisfy the declared prefix
    assert!(pair.accepts(&arr(vec![num(1.0), s("x"), Value::Bool(true)])));
}

#[test]
fn optional_properties_accept_absence() {
    let t = TypeContext::new();
    let shape = t.object(vec![
        t.property("id", t.number()),
        t.optional_property("label", t.string()),
    ]);
    assert!(shape.accepts(&obj(vec![("id", num(1.0))])));
    assert!(shape.accepts(&obj(vec![("id", num(1.0)), ("label", s("a"))])));
    assert!(!shape.accepts(&obj(vec![("id", num(1.0)), ("label", num(2.0))])));
}

#[test]
fn indexers_cover_undeclared_keys() {
    let t = TypeContext::new();
    let dictionary = t.object(vec![
        t.property("name", t.string()),
        t.indexer(Some("key".to_string()), t.string(), t.number()),
    ]);
    assert!(dictionary.accepts(&obj(vec![("name", s("d")), ("hits", num(3.0))])));
    assert!(!dictionary.accepts(&obj(vec![("name", s("d")), ("hits", s("3"))])));
}

#[test]
fn accepts_type_orders_literals_under_primitives() {
    let t = TypeContext::new();
    assert!(t.number().accepts_type(&t.number_literal(4.0)));
    assert!(!t.number_literal(4.0).accepts_type(&t.number()));
    assert!(t.union(vec![t.string(), t.number()]).accepts_type(&t.number()));
    assert!(
        t.object(vec![t.property("a", t.number())])
            .accepts_type(&t.object(vec![
                t.property("a", t.number_literal(1.0)),
                t.property("b", t.string()),
            ]))
    );
}

#[test]
fn accepts_type_handles_recursive_aliases() {
    let t = TypeContext::new();
    let tree = {
        let factory = t.clone();
        t.type_alias_thunk("Tree", move |tree| {
            factory.object(vec![factory.property("kids", factory.array(tree.clone()))])
        })
        .expect("register")
    };
    assert!(tree.accepts_type(&tree));
}

#[test]
fn to_string_round_trips_through_the_parser() {
    let t = TypeContext::new();
    let descriptors = vec![
        t.union(vec![t.string(), t.number()]),
        t.nullable(t.union(vec![t.string(), t.number()])),
        t.array(t.number()),
        t.tuple(vec![t.number_literal(42.0), t.string_literal("on")]),
        t.object(vec![
            t.property("id", t.number()),
            t.optional_property("label", t.string()),
        ]),
        t.exact_object(vec![t.property("a", t.boolean())]),
        t.function(vec![
            t.param("x", t.number(), false),
            t.ret(t.string()),
        ]),
    ];
    for descriptor in descriptors {
        let rendered = descriptor.to_string();
        let parsed = parse_annotation(&rendered)
            .unwrap_or_else(|_| panic!("`{rendered}` failed to parse"));
        assert_eq!(print_annotation(&parsed), rendered);
    }
}

#[test]
fn to_json_tags_and_terminates_on_recursion() {
    let t = TypeContext::new();
    let shape = t.object(vec![t.property("id", t.union(vec![t.string(), t.number()]))]);
    let json = shape.to_json();
    assert_eq!(json["typeName"], "object");
    assert_eq!(json["properties"][0]["key"], "id");
    assert_eq!(json["properties"][0]["type"]["typeName"], "union");

    let tree = {
        let factory = t.clone();
        t.type_alias_thunk("Loop", move |tree| {
            factory.object(vec![factory.property("next", tree.clone())])
        })
        .expect("register")
    };
    let json = tree.to_json();
    assert_eq!(json["typeName"], "alias");
    assert_eq!(json["type"]["properties"][0]["type"]["typeName"], "ref");
}

#[test]
fn applications_do_not_share_parameter_state() {
    let t = TypeContext::new();
    let boxed = {
        let factory = t.clone();
        t.type_alias_thunk("Carton", move |carton| {
            let item = carton.type_parameter("Item", None);
            factory.object(vec![factory.property("item", factory.flow_into(item))])
        })
        .expect("register")
    };
    let of_number = boxed.apply(vec![t.number()]).expect("apply");
    let of_string = boxed.apply(vec![t.string()]).expect("apply");
    assert!(of_number.accepts(&obj(vec![("item", num(1.0))])));
    assert!(!of_number.accepts(&obj(vec![("item", s("a"))])));
    assert!(of_string.accepts(&obj(vec![("item", s("a"))])));
}

#[test]
fn rebinding_composes_through_intersection() {
    let t = TypeContext::new();
    let constrained = {
        let factory = t.clone();
        t.type_alias_thunk("Wrap", move |wrap| {
            let inner = wrap.type_parameter("Inner", Some(factory.any()));
            factory.object(vec![factory.property("value", inner)])
        })
        .expect("register")
    };
    // `any` is the identity element for rebinding
    let applied = constrained.apply(vec![t.number()]).expect("apply");
    assert!(applied.accepts(&obj(vec![("value", num(2.0))])));
    assert!(!applied.accepts(&obj(vec![("value", s("two"))])));
}
