//! Full passes: source module → transformed module → (printed source,
//! evaluated descriptors).

use super::{num, obj, s};
use crate::language::ast::*;
use crate::language::parser::parse_annotation;
use crate::language::printer::print_module;
use crate::language::span::Span;
use crate::language::transform::{TransformOptions, transform_module};
use crate::runtime::build::Builder;
use crate::runtime::context::{Mode, TypeContext};
use crate::runtime::types::TypeKind;
use crate::runtime::value::{InstanceValue, Value};
use indoc::indoc;
use std::path::PathBuf;

fn module(items: Vec<Item>) -> Module {
    Module {
        name: "fixture".to_string(),
        path: PathBuf::from("fixture.js"),
        items,
    }
}

fn ann(source: &str) -> Annotation {
    parse_annotation(source).expect("annotation")
}

fn alias(name: &str, body: &str) -> Item {
    Item::TypeAlias(TypeAliasDecl {
        name: name.to_string(),
        type_params: Vec::new(),
        body: ann(body),
        span: Span::empty(),
    })
}

fn param(name: &str, annotation: &str) -> ParamDecl {
    ParamDecl {
        name: name.to_string(),
        annotation: Some(ann(annotation)),
        optional: false,
        rest: false,
        span: Span::empty(),
    }
}

fn type_param(name: &str) -> TypeParamDecl {
    TypeParamDecl {
        name: name.to_string(),
        bound: None,
        span: Span::empty(),
    }
}

fn stmts_of(module: &Module) -> Vec<Stmt> {
    module
        .items
        .iter()
        .filter_map(|item| match item {
            Item::Stmt(stmt) => Some(stmt.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn alias_and_value_site_round_trip() {
    let source = module(vec![
        alias("Thing", "{ id: string | number, name: string }"),
        Item::Stmt(Stmt::Const(ConstDecl {
            name: "w".to_string(),
            annotation: Some(ann("Thing")),
            init: Some(Expr::ObjectLit(
                vec![
                    ("id".to_string(), Expr::BooleanLit(false, Span::empty())),
                    ("name".to_string(), Expr::string("Widget")),
                ],
                Span::empty(),
            )),
            span: Span::empty(),
        })),
    ]);

    let out = transform_module(&source, &TransformOptions::default()).expect("transform");
    assert!(out.warnings.is_empty());
    let printed = print_module(&out.module);
    assert!(printed.starts_with("import t from \"shapecheck\";\n"));
    assert!(printed.contains("t.predicate(\"Array\");"));
    assert!(printed.contains(
        "const Thing = t.type(\"Thing\", t.object(t.property(\"id\", \
         t.union(t.string(), t.number())), t.property(\"name\", t.string())));"
    ));
    assert!(printed.contains("const w = Thing.check({ id: false, name: \"Widget\" });"));

    let context = TypeContext::new();
    let builder = Builder::new(context, "t");
    let types = builder.evaluate_program(&stmts_of(&out.module)).expect("evaluate");
    let thing = &types["Thing"];
    assert!(thing.accepts(&obj(vec![("id", num(7.0)), ("name", s("Widget"))])));
    let failures = thing.validate(&obj(vec![("id", Value::Bool(false)), ("name", s("Widget"))]));
    assert_eq!(failures.errors()[0].path_string(), "id");
}

#[test]
fn generic_functions_get_per_call_parameters() {
    let source = module(vec![Item::Function(FunctionDecl {
        name: "pair".to_string(),
        type_params: vec![type_param("T")],
        params: vec![param("a", "T"), param("b", "T")],
        return_annotation: Some(ann("T")),
        body: vec![Stmt::Return {
            value: Some(Expr::ident("a")),
            span: Span::empty(),
        }],
        span: Span::empty(),
    })]);

    let out = transform_module(&source, &TransformOptions::default()).expect("transform");
    let printed = print_module(&out.module);
    let expected = indoc! {r#"
        function pair(a, b) {
          const T = t.typeParameter("T");
          t.param("a", t.flowInto(T)).check(a);
          t.param("b", t.flowInto(T)).check(b);
          const _returnType = t.return(T);
          return _returnType.check(a);
        }
    "#};
    assert!(
        printed.contains(expected),
        "missing rewritten function in:\n{printed}"
    );
}

#[test]
fn classes_emit_stores_and_registered_descriptors() {
    let source = module(vec![Item::Class(ClassDecl {
        name: "Box".to_string(),
        type_params: vec![type_param("T")],
        superclass: None,
        members: vec![
            ClassMemberDecl::Property {
                name: "v".to_string(),
                annotation: Some(ann("T")),
                value: None,
                is_static: false,
                span: Span::empty(),
            },
            ClassMemberDecl::Method {
                def: FunctionDecl {
                    name: "constructor".to_string(),
                    type_params: Vec::new(),
                    params: vec![param("v", "T")],
                    return_annotation: None,
                    body: vec![Stmt::Assign {
                        target: Expr::member(Expr::This(Span::empty()), "v"),
                        value: Expr::ident("v"),
                        span: Span::empty(),
                    }],
                    span: Span::empty(),
                },
                kind: MethodKind::Constructor,
                is_static: false,
            },
        ],
        span: Span::empty(),
    })]);

    let out = transform_module(&source, &TransformOptions::default()).expect("transform");
    let printed = print_module(&out.module);

    assert!(printed.contains(
        "const _BoxTypeParametersSymbol = Symbol(\"BoxTypeParameters\");"
    ));
    assert!(printed.contains("const _BoxTypeParameters = { T: t.typeParameter(\"T\") };"));
    let descriptor = indoc! {r#"
        const _BoxType = t.type("Box", t.class("Box", Box => {
          const T = Box.typeParameter("T");
          return [t.property("v", t.flowInto(T))];
        }));
    "#};
    assert!(
        printed.contains(descriptor),
        "missing class descriptor in:\n{printed}"
    );
    for line in [
        "constructor(v) {",
        "this[_BoxTypeParametersSymbol] = { T: t.typeParameter(\"T\") };",
        "const _methodSignature = t.function(t.param(\"v\", t.flowInto(this[_BoxTypeParametersSymbol].T)));",
        "_methodSignature.assertParams(v);",
        "this.v = v;",
    ] {
        assert!(
            printed.contains(line),
            "missing `{line}` in:\n{printed}"
        );
    }

    let context = TypeContext::new();
    let builder = Builder::new(context.clone(), "t");
    builder.evaluate_program(&stmts_of(&out.module)).expect("evaluate");
    let registered = context.lookup("Box").expect("class registered by name");
    let instance = InstanceValue::new("Box");
    instance.set("v", num(3.0));
    assert!(registered.accepts(&Value::Instance(instance)));
    assert!(!registered.accepts(&num(3.0)));
}

#[test]
fn class_references_resolve_through_the_registry() {
    let source = module(vec![
        Item::Class(ClassDecl {
            name: "Point".to_string(),
            type_params: Vec::new(),
            superclass: None,
            members: vec![ClassMemberDecl::Property {
                name: "x".to_string(),
                annotation: Some(ann("number")),
                value: None,
                is_static: false,
                span: Span::empty(),
            }],
            span: Span::empty(),
        }),
        Item::Function(FunctionDecl {
            name: "shift".to_string(),
            type_params: Vec::new(),
            params: vec![param("p", "Point")],
            return_annotation: None,
            body: Vec::new(),
            span: Span::empty(),
        }),
    ]);

    let out = transform_module(&source, &TransformOptions::default()).expect("transform");
    let printed = print_module(&out.module);
    assert!(printed.contains("t.param(\"p\", t.ref(\"Point\")).check(p);"));

    let context = TypeContext::new();
    let builder = Builder::new(context.clone(), "t");
    builder.evaluate_program(&stmts_of(&out.module)).expect("evaluate");
    let reference = context.lookup("Point").expect("registered");
    let point = InstanceValue::new("Point");
    point.set("x", num(1.0));
    assert!(reference.accepts(&Value::Instance(point)));
}

#[test]
fn declared_modules_register_their_exports() {
    let source = module(vec![Item::Declare(DeclareDecl::Module {
        name: "fs".to_string(),
        items: vec![
            Item::TypeAlias(TypeAliasDecl {
                name: "Stats".to_string(),
                type_params: Vec::new(),
                body: ann("{ size: number }"),
                span: Span::empty(),
            }),
            Item::Declare(DeclareDecl::ModuleExports {
                annotation: ann("(path: string) => string"),
                span: Span::empty(),
            }),
        ],
        span: Span::empty(),
    })]);

    let out = transform_module(&source, &TransformOptions::default()).expect("transform");
    let printed = print_module(&out.module);
    assert!(printed.contains("t.declare(t.module(\"fs\", t => {"));
    assert!(printed.contains("const Stats = t.type(\"Stats\", t.object(t.property(\"size\", t.number())));"));
    assert!(printed.contains("t.moduleExports(t.function(t.param(\"path\", t.string()), t.return(t.string())));"));

    let context = TypeContext::new();
    let builder = Builder::new(context.clone(), "t");
    builder.evaluate_program(&stmts_of(&out.module)).expect("evaluate");
    let module_type = context.lookup("fs").expect("module registered");
    let TypeKind::Module(module) = module_type.kind() else {
        panic!("expected module descriptor");
    };
    assert!(module.exports().is_some());
    assert!(module.context().lookup("Stats").is_some());
    // module-scoped names stay out of the root registry
    assert!(context.lookup("Stats").is_none());
}

#[test]
fn declare_function_skips_the_wrapper() {
    let source = module(vec![Item::Declare(DeclareDecl::Function {
        name: "relativePath".to_string(),
        annotation: FunctionAnnotation {
            type_params: Vec::new(),
            params: vec![FunctionAnnotationParam {
                name: Some("from".to_string()),
                annotation: ann("string"),
                optional: false,
                span: Span::empty(),
            }],
            rest: None,
            return_annotation: Box::new(ann("string")),
            span: Span::empty(),
        },
        span: Span::empty(),
    })]);

    let out = transform_module(&source, &TransformOptions::default()).expect("transform");
    let printed = print_module(&out.module);
    assert!(printed.contains(
        "t.declare(\"relativePath\", t.function(t.param(\"from\", t.string()), t.return(t.string())));"
    ));
}

#[test]
fn annotate_off_leaves_the_module_alone() {
    let source = module(vec![alias("Thing", "number")]);
    let options = TransformOptions {
        annotate: false,
        ..TransformOptions::default()
    };
    let out = transform_module(&source, &options).expect("transform");
    assert_eq!(print_module(&out.module), print_module(&source));
}

#[test]
fn warn_mode_is_installed_in_the_output() {
    let source = module(vec![alias("Thing", "number")]);
    let options = TransformOptions {
        assertion_mode: Mode::Warn,
        ..TransformOptions::default()
    };
    let out = transform_module(&source, &options).expect("transform");
    let printed = print_module(&out.module);
    assert!(printed.contains("t.mode(\"warn\");"));
}

#[test]
fn off_mode_emits_descriptors_without_site_checks() {
    let source = module(vec![Item::Function(FunctionDecl {
        name: "f".to_string(),
        type_params: Vec::new(),
        params: vec![param("x", "number")],
        return_annotation: Some(ann("number")),
        body: vec![Stmt::Return {
            value: Some(Expr::ident("x")),
            span: Span::empty(),
        }],
        span: Span::empty(),
    })]);
    let options = TransformOptions {
        assertion_mode: Mode::Off,
        ..TransformOptions::default()
    };
    let out = transform_module(&source, &options).expect("transform");
    let printed = print_module(&out.module);
    assert!(!printed.contains("check("));
    assert!(!printed.contains("_returnType"));
}

#[test]
fn suppressed_names_are_erased_everywhere() {
    let source = module(vec![Item::Function(FunctionDecl {
        name: "load".to_string(),
        type_params: Vec::new(),
        params: vec![param("raw", "Opaque<number>")],
        return_annotation: None,
        body: Vec::new(),
        span: Span::empty(),
    })]);
    let options = TransformOptions {
        suppress_type_names: vec!["Opaque".to_string()],
        ..TransformOptions::default()
    };
    let out = transform_module(&source, &options).expect("transform");
    let printed = print_module(&out.module);
    assert!(printed.contains("t.param(\"raw\", t.any()).check(raw);"));
}

#[test]
fn duplicate_type_declarations_are_fatal() {
    let source = module(vec![alias("Thing", "number"), alias("Thing", "string")]);
    assert!(transform_module(&source, &TransformOptions::default()).is_err());
}

#[test]
fn recursive_alias_is_thunked_and_usable() {
    let source = module(vec![alias("Tree", "{ kids: Tree[] }")]);
    let out = transform_module(&source, &TransformOptions::default()).expect("transform");
    let printed = print_module(&out.module);
    assert!(printed.contains(
        "const Tree = t.type(\"Tree\", Tree => t.object(t.property(\"kids\", t.array(Tree))));"
    ));

    let context = TypeContext::new();
    let builder = Builder::new(context, "t");
    let types = builder.evaluate_program(&stmts_of(&out.module)).expect("evaluate");
    let tree = &types["Tree"];
    let good = obj(vec![("kids", super::arr(vec![]))]);
    assert!(tree.accepts(&good));
    let bad = obj(vec![("kids", super::arr(vec![num(42.0)]))]);
    let failures = tree.validate(&bad);
    assert_eq!(failures.errors()[0].path_string(), "kids[0]");
}

#[test]
fn parameterized_aliases_apply_through_refs() {
    let source = module(vec![Item::TypeAlias(TypeAliasDecl {
        name: "Pair".to_string(),
        type_params: vec![type_param("A"), type_param("B")],
        body: ann("[A, B]"),
        span: Span::empty(),
    })]);
    let out = transform_module(&source, &TransformOptions::default()).expect("transform");
    let printed = print_module(&out.module);
    let expected = indoc! {r#"
        const Pair = t.type("Pair", Pair => {
          const A = Pair.typeParameter("A");
          const B = Pair.typeParameter("B");
          return t.tuple(A, B);
        });
    "#};
    assert!(
        printed.contains(expected),
        "missing parameterized alias in:\n{printed}"
    );

    let context = TypeContext::new();
    let builder = Builder::new(context, "t");
    let types = builder.evaluate_program(&stmts_of(&out.module)).expect("evaluate");
    let pair = &types["Pair"];
    let applied = pair
        .apply(vec![
            pair.context().number(),
            pair.context().string(),
        ])
        .expect("apply");
    assert!(applied.accepts(&super::arr(vec![num(1.0), s("x")])));
    assert!(!applied.accepts(&super::arr(vec![s("x"), s("y")])));
}
