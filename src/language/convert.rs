use crate::language::ast::*;
use crate::language::errors::SyntaxError;
use crate::language::symbols::{Classification, ConversionContext, ScopeKind};
use std::collections::HashMap;

pub type ConvertFn = fn(&Converter, &mut ConversionContext, &Annotation) -> Expr;

/// Pattern-matches annotation kinds and emits equivalent
/// descriptor-constructor call expressions against the runtime library.
/// The dispatch table is public surface: hosts may override the handler
/// for any kind.
pub struct Converter {
    library_id: String,
    handlers: HashMap<AnnotationKind, ConvertFn>,
}

impl Converter {
    pub fn new(library_id: impl Into<String>) -> Self {
        let mut converter = Self {
            library_id: library_id.into(),
            handlers: HashMap::new(),
        };
        converter.seed_handlers();
        converter
    }

    pub fn library_id(&self) -> &str {
        &self.library_id
    }

    pub fn set_handler(&mut self, kind: AnnotationKind, handler: ConvertFn) {
        self.handlers.insert(kind, handler);
    }

    fn seed_handlers(&mut self) {
        self.set_handler(AnnotationKind::Any, |c, _, _| c.factory("any", vec![]));
        self.set_handler(AnnotationKind::Mixed, |c, _, _| c.factory("mixed", vec![]));
        self.set_handler(AnnotationKind::Empty, |c, _, _| c.factory("empty", vec![]));
        self.set_handler(AnnotationKind::Void, |c, _, _| c.factory("void", vec![]));
        self.set_handler(AnnotationKind::Existential, |c, _, _| {
            c.factory("existential", vec![])
        });
        self.set_handler(AnnotationKind::NullLiteral, |c, _, _| {
            c.factory("null", vec![])
        });
        self.set_handler(AnnotationKind::Number, |c, _, _| c.factory("number", vec![]));
        self.set_handler(AnnotationKind::String, |c, _, _| c.factory("string", vec![]));
        self.set_handler(AnnotationKind::Boolean, |c, _, _| {
            c.factory("boolean", vec![])
        });
        self.set_handler(AnnotationKind::Symbol, |c, _, _| c.factory("symbol", vec![]));
        self.set_handler(AnnotationKind::NumberLiteral, |c, _, ann| {
            let Annotation::NumberLiteral { value, span } = ann else {
                unreachable!("dispatched on kind");
            };
            c.factory("number", vec![Expr::NumberLit(*value, *span)])
        });
        self.set_handler(AnnotationKind::StringLiteral, |c, _, ann| {
            let Annotation::StringLiteral { value, span } = ann else {
                unreachable!("dispatched on kind");
            };
            c.factory("string", vec![Expr::StringLit(value.clone(), *span)])
        });
        self.set_handler(AnnotationKind::BooleanLiteral, |c, _, ann| {
            let Annotation::BooleanLiteral { value, span } = ann else {
                unreachable!("dispatched on kind");
            };
            c.factory("boolean", vec![Expr::BooleanLit(*value, *span)])
        });
        self.set_handler(AnnotationKind::Nullable, |c, cx, ann| {
            let Annotation::Nullable { inner, .. } = ann else {
                unreachable!("dispatched on kind");
            };
            c.factory("nullable", vec![c.convert(cx, inner)])
        });
        self.set_handler(AnnotationKind::Array, |c, cx, ann| {
            let Annotation::Array { element, .. } = ann else {
                unreachable!("dispatched on kind");
            };
            c.factory("array", vec![c.convert(cx, element)])
        });
        self.set_handler(AnnotationKind::Tuple, |c, cx, ann| {
            let Annotation::Tuple { elements, .. } = ann else {
                unreachable!("dispatched on kind");
            };
            let args = elements.iter().map(|element| c.convert(cx, element)).collect();
            c.factory("tuple", args)
        });
        self.set_handler(AnnotationKind::Union, |c, cx, ann| {
            let Annotation::Union { members, .. } = ann else {
                unreachable!("dispatched on kind");
            };
            let args = members.iter().map(|member| c.convert(cx, member)).collect();
            c.factory("union", args)
        });
        self.set_handler(AnnotationKind::Intersection, |c, cx, ann| {
            let Annotation::Intersection { members, .. } = ann else {
                unreachable!("dispatched on kind");
            };
            let args = members.iter().map(|member| c.convert(cx, member)).collect();
            c.factory("intersection", args)
        });
        self.set_handler(AnnotationKind::Object, |c, cx, ann| {
            let Annotation::Object(object) = ann else {
                unreachable!("dispatched on kind");
            };
            c.convert_object(cx, object)
        });
        self.set_handler(AnnotationKind::Function, |c, cx, ann| {
            let Annotation::Function(function) = ann else {
                unreachable!("dispatched on kind");
            };
            c.convert_function(cx, function)
        });
        self.set_handler(AnnotationKind::Generic, |c, cx, ann| {
            let Annotation::Generic { id, args, .. } = ann else {
                unreachable!("dispatched on kind");
            };
            c.convert_generic(cx, id, args)
        });
        self.set_handler(AnnotationKind::Typeof, |c, cx, ann| {
            let Annotation::Typeof { target, .. } = ann else {
                unreachable!("dispatched on kind");
            };
            let _ = cx;
            c.factory("typeOf", vec![annotation_to_value(target)])
        });
        self.set_handler(AnnotationKind::Unknown, |c, cx, ann| {
            let Annotation::Unknown { kind, span } = ann else {
                unreachable!("dispatched on kind");
            };
            cx.report(SyntaxError::unknown_kind(kind, *span));
            c.factory("any", vec![])
        });
    }

    /// Converts one annotation node. Kinds without a handler degrade to
    /// `any` with a diagnostic.
    pub fn convert(&self, cx: &mut ConversionContext, annotation: &Annotation) -> Expr {
        match self.handlers.get(&annotation.kind()) {
            Some(handler) => handler(self, cx, annotation),
            None => {
                cx.warn(
                    format!(
                        "No conversion handler for `{:?}`; emitting `any`",
                        annotation.kind()
                    ),
                    annotation.span(),
                );
                self.factory("any", vec![])
            }
        }
    }

    // --- emission helpers ---

    pub fn library(&self) -> Expr {
        Expr::ident(self.library_id.clone())
    }

    pub fn factory(&self, name: &str, args: Vec<Expr>) -> Expr {
        Expr::call(Expr::member(self.library(), name), args)
    }

    // --- composite kinds ---

    fn convert_object(&self, cx: &mut ConversionContext, object: &ObjectAnnotation) -> Expr {
        let mut args = Vec::new();
        for member in &object.members {
            args.push(self.convert_object_member(cx, member));
        }
        let factory = if object.exact { "exactObject" } else { "object" };
        self.factory(factory, args)
    }

    pub(crate) fn convert_object_member(
        &self,
        cx: &mut ConversionContext,
        member: &ObjectAnnotationMember,
    ) -> Expr {
        match member {
            ObjectAnnotationMember::Property {
                key,
                value,
                optional,
                is_static,
                ..
            } => {
                let converted = self.convert(cx, value);
                let mut args = vec![Expr::string(key.clone()), converted];
                if *optional {
                    args.push(Expr::BooleanLit(true, value.span()));
                }
                let factory = if *is_static { "staticProperty" } else { "property" };
                self.factory(factory, args)
            }
            ObjectAnnotationMember::Method {
                key,
                value,
                is_static,
                ..
            } => {
                let converted = self.convert_function(cx, value);
                let factory = if *is_static { "staticMethod" } else { "method" };
                self.factory(factory, vec![Expr::string(key.clone()), converted])
            }
            ObjectAnnotationMember::Indexer { id, key, value, .. } => {
                let mut args = Vec::new();
                if let Some(id) = id {
                    args.push(Expr::string(id.clone()));
                }
                args.push(self.convert(cx, key));
                args.push(self.convert(cx, value));
                self.factory("indexer", args)
            }
            ObjectAnnotationMember::Call { value, .. } => {
                let converted = self.convert_function(cx, value);
                self.factory("callProperty", vec![converted])
            }
        }
    }

    /// Function annotations with type parameters are wrapped in a thunk so
    /// the parameters are scoped to the signature; parameter positions
    /// inside the signature are flowable.
    fn convert_function(&self, cx: &mut ConversionContext, function: &FunctionAnnotation) -> Expr {
        if function.type_params.is_empty() {
            let parts = self.convert_signature_parts(cx, function);
            return self.factory("function", parts);
        }
        cx.push_scope(ScopeKind::Function, &function.type_params);
        let fn_id = "fn";
        let mut stmts: Vec<Stmt> = Vec::new();
        for type_param in &function.type_params {
            stmts.push(Stmt::Const(ConstDecl {
                name: type_param.name.clone(),
                annotation: None,
                init: Some(self.type_parameter_init(cx, Expr::ident(fn_id), type_param)),
                span: type_param.span,
            }));
        }
        let parts = self.convert_signature_parts(cx, function);
        stmts.push(Stmt::Return {
            value: Some(Expr::ArrayLit(parts, function.span)),
            span: function.span,
        });
        cx.pop_scope();
        self.factory(
            "function",
            vec![Expr::Arrow {
                params: vec![fn_id.to_string()],
                body: ArrowBody::Block(stmts),
                span: function.span,
            }],
        )
    }

    fn convert_signature_parts(
        &self,
        cx: &mut ConversionContext,
        function: &FunctionAnnotation,
    ) -> Vec<Expr> {
        let mut parts = Vec::new();
        for (index, param) in function.params.iter().enumerate() {
            let name = param
                .name
                .clone()
                .unwrap_or_else(|| format!("_arg{index}"));
            let converted = cx.with_flowable(true, |cx| self.convert(cx, &param.annotation));
            let mut args = vec![Expr::string(name), converted];
            if param.optional {
                args.push(Expr::BooleanLit(true, param.span));
            }
            parts.push(self.factory("param", args));
        }
        if let Some(rest) = &function.rest {
            let name = rest.name.clone().unwrap_or_else(|| "rest".to_string());
            let converted = cx.with_flowable(true, |cx| self.convert(cx, &rest.annotation));
            parts.push(self.factory("rest", vec![Expr::string(name), converted]));
        }
        let ret = cx.with_flowable(false, |cx| self.convert(cx, &function.return_annotation));
        parts.push(self.factory("return", vec![ret]));
        parts
    }

    pub(crate) fn type_parameter_init(
        &self,
        cx: &mut ConversionContext,
        owner: Expr,
        type_param: &TypeParamDecl,
    ) -> Expr {
        let mut args = vec![Expr::string(type_param.name.clone())];
        if let Some(bound) = &type_param.bound {
            let converted = cx.with_flowable(false, |cx| self.convert(cx, bound));
            args.push(converted);
        }
        Expr::call(Expr::member(owner, "typeParameter"), args)
    }

    /// Reference conversion is classification-driven; `Array` specializes
    /// to the array factory.
    fn convert_generic(
        &self,
        cx: &mut ConversionContext,
        id: &QualifiedId,
        args: &[Annotation],
    ) -> Expr {
        if !id.is_simple() {
            let converted: Vec<Expr> = std::iter::once(Expr::string(id.dotted()))
                .chain(args.iter().map(|arg| self.convert(cx, arg)))
                .collect();
            return self.factory("ref", converted);
        }
        let name = id.head();
        if cx.is_suppressed(name) {
            return self.factory("any", vec![]);
        }
        if name == "Array" {
            let element = match args.first() {
                Some(arg) => self.convert(cx, arg),
                None => self.factory("any", vec![]),
            };
            return self.factory("array", vec![element]);
        }
        match cx.classify(name) {
            Classification::TypeAlias => {
                if cx.is_class_name(name) {
                    let converted: Vec<Expr> = std::iter::once(Expr::string(name))
                        .chain(args.iter().map(|arg| self.convert(cx, arg)))
                        .collect();
                    self.factory("ref", converted)
                } else if args.is_empty() {
                    Expr::ident(name)
                } else {
                    let converted: Vec<Expr> = std::iter::once(Expr::ident(name))
                        .chain(args.iter().map(|arg| self.convert(cx, arg)))
                        .collect();
                    self.factory("ref", converted)
                }
            }
            Classification::TypeParameter => {
                let reference = Expr::ident(name);
                self.maybe_flow(cx, reference)
            }
            Classification::ClassTypeParameter { class, is_static } => {
                let store = cx.class_store(&class);
                let reference = if is_static {
                    Expr::member(Expr::ident(store.type_parameters_uid), name)
                } else {
                    Expr::member(
                        Expr::computed_member(
                            Expr::This(id.span),
                            store.type_parameters_symbol_uid,
                        ),
                        name,
                    )
                };
                self.maybe_flow(cx, reference)
            }
            Classification::External => {
                let converted: Vec<Expr> = std::iter::once(Expr::string(name))
                    .chain(args.iter().map(|arg| self.convert(cx, arg)))
                    .collect();
                self.factory("ref", converted)
            }
        }
    }

    /// Wraps a type-parameter reference in `flowInto` when the node sits
    /// at a flowable position (function parameter, class property).
    fn maybe_flow(&self, cx: &mut ConversionContext, reference: Expr) -> Expr {
        if cx.in_flowable_position() {
            self.factory("flowInto", vec![reference])
        } else {
            reference
        }
    }
}

/// Converts a type-level identifier chain back to its value-level
/// expression: `typeof Foo.Bar` samples the value `Foo.Bar`.
pub fn annotation_to_value(target: &QualifiedId) -> Expr {
    let mut expr = Expr::Identifier(Identifier {
        name: target.parts[0].clone(),
        span: target.span,
    });
    for part in &target.parts[1..] {
        expr = Expr::member(expr, part.clone());
    }
    expr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::parser::parse_annotation;
    use crate::language::printer::print_expr;
    use crate::language::span::Span;
    use std::path::PathBuf;

    fn empty_module() -> Module {
        Module {
            name: "fixtures".to_string(),
            path: PathBuf::from("fixtures.js"),
            items: Vec::new(),
        }
    }

    fn convert_source(source: &str) -> String {
        let module = empty_module();
        let mut cx = ConversionContext::for_module(&module, &[]).expect("symbols");
        let converter = Converter::new("t");
        let annotation = parse_annotation(source).expect("parse");
        print_expr(&converter.convert(&mut cx, &annotation))
    }

    #[test]
    fn converts_union_of_primitives() {
        assert_eq!(
            convert_source("string | number"),
            "t.union(t.string(), t.number())"
        );
    }

    #[test]
    fn converts_nullable_and_literals() {
        assert_eq!(convert_source("?42"), "t.nullable(t.number(42))");
        assert_eq!(convert_source("\"on\""), "t.string(\"on\")");
    }

    #[test]
    fn converts_array_specialization() {
        assert_eq!(convert_source("Array<number>"), "t.array(t.number())");
        assert_eq!(convert_source("Array"), "t.array(t.any())");
        assert_eq!(convert_source("number[]"), "t.array(t.number())");
    }

    #[test]
    fn converts_exact_object_with_members() {
        assert_eq!(
            convert_source("{| id: number, label?: string |}"),
            "t.exactObject(t.property(\"id\", t.number()), t.property(\"label\", t.string(), true))"
        );
    }

    #[test]
    fn converts_indexer_and_call_property() {
        assert_eq!(
            convert_source("{ [key: string]: number, (x: number) => string }"),
            "t.object(t.indexer(\"key\", t.string(), t.number()), \
             t.callProperty(t.function(t.param(\"x\", t.number()), t.return(t.string()))))"
        );
    }

    #[test]
    fn external_names_become_string_refs() {
        assert_eq!(
            convert_source("Elem<number>"),
            "t.ref(\"Elem\", t.number())"
        );
        assert_eq!(convert_source("Foo.Bar"), "t.ref(\"Foo.Bar\")");
    }

    #[test]
    fn aliases_emit_bare_identifiers() {
        let module = Module {
            name: "fixtures".to_string(),
            path: PathBuf::from("fixtures.js"),
            items: vec![Item::TypeAlias(TypeAliasDecl {
                name: "Thing".to_string(),
                type_params: Vec::new(),
                body: Annotation::String(Span::empty()),
                span: Span::empty(),
            })],
        };
        let mut cx = ConversionContext::for_module(&module, &[]).expect("symbols");
        let converter = Converter::new("t");
        let annotation = parse_annotation("Thing").expect("parse");
        assert_eq!(print_expr(&converter.convert(&mut cx, &annotation)), "Thing");
        let applied = parse_annotation("Thing<number>").expect("parse");
        assert_eq!(
            print_expr(&converter.convert(&mut cx, &applied)),
            "t.ref(Thing, t.number())"
        );
    }

    #[test]
    fn suppressed_names_collapse_to_any() {
        let module = empty_module();
        let mut cx =
            ConversionContext::for_module(&module, &["Opaque".to_string()]).expect("symbols");
        let converter = Converter::new("t");
        let annotation = parse_annotation("Opaque<number>").expect("parse");
        assert_eq!(print_expr(&converter.convert(&mut cx, &annotation)), "t.any()");
    }

    #[test]
    fn generic_function_annotations_scope_their_parameters() {
        assert_eq!(
            convert_source("<T>(a: T, b: T) => T"),
            "t.function(fn => {\n  \
             const T = fn.typeParameter(\"T\");\n  \
             return [t.param(\"a\", t.flowInto(T)), t.param(\"b\", t.flowInto(T)), t.return(T)];\n\
             })"
        );
    }

    #[test]
    fn typeof_round_trips_to_value_expression() {
        assert_eq!(
            convert_source("typeof Config.defaults"),
            "t.typeOf(Config.defaults)"
        );
    }

    #[test]
    fn unknown_kinds_degrade_to_any_with_warning() {
        let module = empty_module();
        let mut cx = ConversionContext::for_module(&module, &[]).expect("symbols");
        let converter = Converter::new("t");
        let annotation = Annotation::Unknown {
            kind: "OpaqueTypeAnnotation".to_string(),
            span: Span::empty(),
        };
        assert_eq!(print_expr(&converter.convert(&mut cx, &annotation)), "t.any()");
        assert_eq!(cx.warnings().len(), 1);
    }
}
