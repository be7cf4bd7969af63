use crate::language::ast::*;
use crate::language::convert::Converter;
use crate::language::errors::{SyntaxError, SyntaxErrors};
use crate::language::span::Span;
use crate::language::symbols::{ConversionContext, ScopeKind};
use crate::runtime::context::Mode;
use serde::{Deserialize, Serialize};

pub const SEED_PREDICATES: [&str; 5] = ["Array", "$ReadOnlyArray", "Map", "Set", "Promise"];

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    pub assertion_mode: Mode,
    pub annotate: bool,
    pub library_id: String,
    pub library_source: String,
    pub suppress_type_names: Vec<String>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            assertion_mode: Mode::Assert,
            annotate: true,
            library_id: "t".to_string(),
            library_source: "shapecheck".to_string(),
            suppress_type_names: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct TransformOutput {
    pub module: Module,
    pub warnings: Vec<SyntaxError>,
}

/// One full pass over a module: inject the library import, prepend
/// predicate registrations, then replace or supplement each top-level
/// declaration with its descriptor form and rewrite annotated functions
/// and classes to check at their value sites.
pub fn transform_module(
    module: &Module,
    options: &TransformOptions,
) -> Result<TransformOutput, SyntaxErrors> {
    if !options.annotate {
        return Ok(TransformOutput {
            module: module.clone(),
            warnings: Vec::new(),
        });
    }
    let mut cx = ConversionContext::for_module(module, &options.suppress_type_names)
        .map_err(SyntaxErrors::from)?;
    let converter = Converter::new(options.library_id.clone());
    let pass = Pass {
        converter,
        options: options.clone(),
    };

    let mut items = Vec::new();
    items.push(Item::Import(Import {
        binding: options.library_id.clone(),
        source: options.library_source.clone(),
        span: Span::empty(),
    }));
    for name in SEED_PREDICATES {
        items.push(Item::Stmt(Stmt::Expr(
            pass.converter
                .factory("predicate", vec![Expr::string(name)]),
        )));
    }
    if options.assertion_mode == Mode::Warn {
        items.push(Item::Stmt(Stmt::Expr(
            pass.converter.factory("mode", vec![Expr::string("warn")]),
        )));
    }

    for item in &module.items {
        match item {
            Item::Import(import) => items.push(Item::Import(import.clone())),
            Item::TypeAlias(decl) => {
                items.push(Item::Stmt(pass.emit_alias(&mut cx, decl)));
            }
            Item::Interface(decl) => {
                let alias = TypeAliasDecl {
                    name: decl.name.clone(),
                    type_params: decl.type_params.clone(),
                    body: Annotation::Object(decl.body.clone()),
                    span: decl.span,
                };
                items.push(Item::Stmt(pass.emit_alias(&mut cx, &alias)));
            }
            Item::Function(decl) => {
                items.push(Item::Function(pass.rewrite_function(&mut cx, decl)));
            }
            Item::Class(decl) => {
                pass.emit_class(&mut cx, decl, &mut items);
            }
            Item::Declare(decl) => {
                pass.emit_declare(&mut cx, decl, &mut items);
            }
            Item::Stmt(stmt) => items.push(Item::Stmt(pass.rewrite_stmt(&mut cx, stmt))),
        }
    }

    Ok(TransformOutput {
        module: Module {
            name: module.name.clone(),
            path: module.path.clone(),
            items,
        },
        warnings: cx.take_warnings(),
    })
}

struct Pass {
    converter: Converter,
    options: TransformOptions,
}

impl Pass {
    fn checks_enabled(&self) -> bool {
        self.options.assertion_mode != Mode::Off
    }

    /// `type X = body` becomes `const X = t.type("X", ...)`. A body that
    /// mentions its own name, or a parameterized alias, is wrapped as a
    /// thunk receiving the alias itself.
    fn emit_alias(&self, cx: &mut ConversionContext, decl: &TypeAliasDecl) -> Stmt {
        let init = self.alias_descriptor(cx, decl);
        Stmt::Const(ConstDecl {
            name: decl.name.clone(),
            annotation: None,
            init: Some(init),
            span: decl.span,
        })
    }

    fn alias_descriptor(&self, cx: &mut ConversionContext, decl: &TypeAliasDecl) -> Expr {
        let self_referential = annotation_references(&decl.name, &decl.body);
        if decl.type_params.is_empty() && !self_referential {
            let body = self.converter.convert(cx, &decl.body);
            return self
                .converter
                .factory("type", vec![Expr::string(decl.name.clone()), body]);
        }

        cx.push_scope(ScopeKind::Alias, &decl.type_params);
        let body = if decl.type_params.is_empty() {
            // pure self-reference: `X => body`
            ArrowBody::Expr(Box::new(self.converter.convert(cx, &decl.body)))
        } else {
            let mut stmts = Vec::new();
            for type_param in &decl.type_params {
                stmts.push(Stmt::Const(ConstDecl {
                    name: type_param.name.clone(),
                    annotation: None,
                    init: Some(self.converter.type_parameter_init(
                        cx,
                        Expr::ident(decl.name.clone()),
                        type_param,
                    )),
                    span: type_param.span,
                }));
            }
            let converted = self.converter.convert(cx, &decl.body);
            stmts.push(Stmt::Return {
                value: Some(converted),
                span: decl.span,
            });
            ArrowBody::Block(stmts)
        };
        cx.pop_scope();

        self.converter.factory(
            "type",
            vec![
                Expr::string(decl.name.clone()),
                Expr::Arrow {
                    params: vec![decl.name.clone()],
                    body,
                    span: decl.span,
                },
            ],
        )
    }

    /// Standalone functions get per-parameter slot checks at entry, fresh
    /// type-parameter descriptors per invocation, and a return slot that
    /// wraps every `return`.
    fn rewrite_function(&self, cx: &mut ConversionContext, decl: &FunctionDecl) -> FunctionDecl {
        cx.push_scope(ScopeKind::Function, &decl.type_params);
        let mut body = Vec::new();
        if self.checks_enabled() {
            for type_param in &decl.type_params {
                body.push(Stmt::Const(ConstDecl {
                    name: type_param.name.clone(),
                    annotation: None,
                    init: Some(self.converter.type_parameter_init(
                        cx,
                        self.converter.library(),
                        type_param,
                    )),
                    span: type_param.span,
                }));
            }
            for param in &decl.params {
                let Some(annotation) = &param.annotation else {
                    continue;
                };
                let converted = cx.with_flowable(true, |cx| self.converter.convert(cx, annotation));
                let factory = if param.rest { "rest" } else { "param" };
                let mut args = vec![Expr::string(param.name.clone()), converted];
                if param.optional && !param.rest {
                    args.push(Expr::BooleanLit(true, param.span));
                }
                let slot = self.converter.factory(factory, args);
                body.push(Stmt::Expr(Expr::call(
                    Expr::member(slot, "check"),
                    vec![Expr::ident(param.name.clone())],
                )));
            }
        }
        let return_slot = decl.return_annotation.as_ref().filter(|_| self.checks_enabled()).map(
            |annotation| {
                let converted = self.converter.convert(cx, annotation);
                let uid = cx.generate_uid("returnType");
                body.push(Stmt::Const(ConstDecl {
                    name: uid.clone(),
                    annotation: None,
                    init: Some(self.converter.factory("return", vec![converted])),
                    span: decl.span,
                }));
                uid
            },
        );
        for stmt in &decl.body {
            body.push(wrap_returns(stmt.clone(), return_slot.as_deref(), "check"));
        }
        cx.pop_scope();
        FunctionDecl {
            name: decl.name.clone(),
            type_params: Vec::new(),
            params: strip_params(&decl.params),
            return_annotation: None,
            body,
            span: decl.span,
        }
    }

    /// Classes emit a registered class descriptor, per-class stores for
    /// their type parameters (a module-level uid for static contexts and
    /// a symbol key for per-instance storage), and method rewrites that
    /// assert parameters on entry and returns on exit.
    fn emit_class(&self, cx: &mut ConversionContext, decl: &ClassDecl, items: &mut Vec<Item>) {
        let parameterized = !decl.type_params.is_empty();
        let store = parameterized.then(|| cx.class_store(&decl.name));

        if let Some(store) = &store {
            items.push(Item::Stmt(Stmt::Const(ConstDecl {
                name: store.type_parameters_symbol_uid.clone(),
                annotation: None,
                init: Some(Expr::call(
                    Expr::ident("Symbol"),
                    vec![Expr::string(format!("{}TypeParameters", decl.name))],
                )),
                span: decl.span,
            })));
            let entries = self.type_parameter_entries(cx, decl);
            items.push(Item::Stmt(Stmt::Const(ConstDecl {
                name: store.type_parameters_uid.clone(),
                annotation: None,
                init: Some(Expr::ObjectLit(entries, decl.span)),
                span: decl.span,
            })));
        }

        items.push(Item::Stmt(self.class_descriptor(cx, decl)));

        let members = decl
            .members
            .iter()
            .map(|member| self.rewrite_class_member(cx, decl, member))
            .collect();
        items.push(Item::Class(ClassDecl {
            name: decl.name.clone(),
            type_params: Vec::new(),
            superclass: decl.superclass.clone(),
            members,
            span: decl.span,
        }));
    }

    fn type_parameter_entries(
        &self,
        cx: &mut ConversionContext,
        decl: &ClassDecl,
    ) -> Vec<(String, Expr)> {
        decl.type_params
            .iter()
            .map(|type_param| {
                (
                    type_param.name.clone(),
                    self.converter
                        .type_parameter_init(cx, self.converter.library(), type_param),
                )
            })
            .collect()
    }

    /// The class descriptor registers under the class name so references
    /// and `extends` resolve through the registry. Parameterized or
    /// self-referential bodies go through a thunk.
    fn class_descriptor(&self, cx: &mut ConversionContext, decl: &ClassDecl) -> Stmt {
        let uid = cx.generate_uid(&format!("{}Type", decl.name));
        cx.push_scope(ScopeKind::Alias, &decl.type_params);
        let mut parts = Vec::new();
        if let Some(superclass) = &decl.superclass {
            let super_ref: Vec<Expr> =
                std::iter::once(Expr::string(superclass.name.dotted()))
                    .chain(
                        superclass
                            .type_args
                            .iter()
                            .map(|arg| self.converter.convert(cx, arg)),
                    )
                    .collect();
            let reference = self.converter.factory("ref", super_ref);
            parts.push(self.converter.factory("extends", vec![reference]));
        }
        for member in &decl.members {
            match member {
                ClassMemberDecl::Property {
                    name,
                    annotation: Some(annotation),
                    is_static,
                    ..
                } => {
                    let converted =
                        cx.with_flowable(true, |cx| self.converter.convert(cx, annotation));
                    let factory = if *is_static { "staticProperty" } else { "property" };
                    parts.push(
                        self.converter
                            .factory(factory, vec![Expr::string(name.clone()), converted]),
                    );
                }
                ClassMemberDecl::Property { .. } => {}
                ClassMemberDecl::Method { def, kind, is_static } => {
                    if *kind == MethodKind::Constructor {
                        continue;
                    }
                    cx.push_scope(ScopeKind::Function, &def.type_params);
                    let signature = self.method_signature(cx, def);
                    cx.pop_scope();
                    let factory = if *is_static { "staticMethod" } else { "method" };
                    parts.push(
                        self.converter
                            .factory(factory, vec![Expr::string(def.name.clone()), signature]),
                    );
                }
            }
        }

        let class_expr = if decl.type_params.is_empty() {
            let mut args = vec![Expr::string(decl.name.clone())];
            args.extend(parts);
            self.converter.factory("class", args)
        } else {
            let mut stmts = Vec::new();
            for type_param in &decl.type_params {
                stmts.push(Stmt::Const(ConstDecl {
                    name: type_param.name.clone(),
                    annotation: None,
                    init: Some(self.converter.type_parameter_init(
                        cx,
                        Expr::ident(decl.name.clone()),
                        type_param,
                    )),
                    span: type_param.span,
                }));
            }
            stmts.push(Stmt::Return {
                value: Some(Expr::ArrayLit(parts, decl.span)),
                span: decl.span,
            });
            self.converter.factory(
                "class",
                vec![
                    Expr::string(decl.name.clone()),
                    Expr::Arrow {
                        params: vec![decl.name.clone()],
                        body: ArrowBody::Block(stmts),
                        span: decl.span,
                    },
                ],
            )
        };
        cx.pop_scope();

        Stmt::Const(ConstDecl {
            name: uid,
            annotation: None,
            init: Some(
                self.converter
                    .factory("type", vec![Expr::string(decl.name.clone()), class_expr]),
            ),
            span: decl.span,
        })
    }

    fn method_signature(&self, cx: &mut ConversionContext, def: &FunctionDecl) -> Expr {
        let mut parts = Vec::new();
        for (index, param) in def.params.iter().enumerate() {
            let annotation = match &param.annotation {
                Some(annotation) => {
                    cx.with_flowable(true, |cx| self.converter.convert(cx, annotation))
                }
                None => self.converter.factory("any", vec![]),
            };
            let name = if param.name.is_empty() {
                format!("_arg{index}")
            } else {
                param.name.clone()
            };
            let factory = if param.rest { "rest" } else { "param" };
            let mut args = vec![Expr::string(name), annotation];
            if param.optional && !param.rest {
                args.push(Expr::BooleanLit(true, param.span));
            }
            parts.push(self.converter.factory(factory, args));
        }
        if let Some(annotation) = &def.return_annotation {
            let converted = self.converter.convert(cx, annotation);
            parts.push(self.converter.factory("return", vec![converted]));
        }
        self.converter.factory("function", parts)
    }

    fn rewrite_class_member(
        &self,
        cx: &mut ConversionContext,
        class: &ClassDecl,
        member: &ClassMemberDecl,
    ) -> ClassMemberDecl {
        match member {
            ClassMemberDecl::Property {
                name,
                value,
                is_static,
                span,
                ..
            } => ClassMemberDecl::Property {
                name: name.clone(),
                annotation: None,
                value: value.clone(),
                is_static: *is_static,
                span: *span,
            },
            ClassMemberDecl::Method { def, kind, is_static } => {
                let rewritten = self.rewrite_method(cx, class, def, *kind, *is_static);
                ClassMemberDecl::Method {
                    def: rewritten,
                    kind: *kind,
                    is_static: *is_static,
                }
            }
        }
    }

    fn rewrite_method(
        &self,
        cx: &mut ConversionContext,
        class: &ClassDecl,
        def: &FunctionDecl,
        kind: MethodKind,
        is_static: bool,
    ) -> FunctionDecl {
        cx.push_class_scope(&class.name, &class.type_params, is_static);
        cx.push_scope(ScopeKind::Function, &def.type_params);

        let mut original = def.body.clone().into_iter().peekable();
        let mut body = Vec::new();

        // a constructor chaining to super() reads parameters from the
        // static store until `this` is initialized
        if kind == MethodKind::Constructor {
            if let Some(stmt) = original.peek() {
                if is_super_call(stmt) {
                    body.push(original.next().expect("peeked"));
                }
            }
            if !class.type_params.is_empty() && self.checks_enabled() {
                let store = cx.class_store(&class.name);
                let entries = self.type_parameter_entries(cx, class);
                body.push(Stmt::Assign {
                    target: Expr::computed_member(
                        Expr::This(def.span),
                        store.type_parameters_symbol_uid,
                    ),
                    value: Expr::ObjectLit(entries, def.span),
                    span: def.span,
                });
            }
        }

        let has_annotations =
            def.params.iter().any(|param| param.annotation.is_some())
                || def.return_annotation.is_some();
        let signature_uid = (has_annotations && self.checks_enabled()).then(|| {
            for type_param in &def.type_params {
                body.push(Stmt::Const(ConstDecl {
                    name: type_param.name.clone(),
                    annotation: None,
                    init: Some(self.converter.type_parameter_init(
                        cx,
                        self.converter.library(),
                        type_param,
                    )),
                    span: type_param.span,
                }));
            }
            let uid = cx.generate_uid("methodSignature");
            let signature = self.method_signature(cx, def);
            body.push(Stmt::Const(ConstDecl {
                name: uid.clone(),
                annotation: None,
                init: Some(signature),
                span: def.span,
            }));
            body.push(Stmt::Expr(Expr::call(
                Expr::member(Expr::ident(uid.clone()), "assertParams"),
                def.params
                    .iter()
                    .map(|param| Expr::ident(param.name.clone()))
                    .collect(),
            )));
            uid
        });

        for stmt in original {
            body.push(wrap_returns(
                stmt,
                signature_uid.as_deref(),
                "assertReturn",
            ));
        }

        cx.pop_scope();
        cx.pop_scope();
        FunctionDecl {
            name: def.name.clone(),
            type_params: Vec::new(),
            params: strip_params(&def.params),
            return_annotation: None,
            body,
            span: def.span,
        }
    }

    fn emit_declare(&self, cx: &mut ConversionContext, decl: &DeclareDecl, items: &mut Vec<Item>) {
        match decl {
            DeclareDecl::Module { name, items: inner, span } => {
                let mut stmts = Vec::new();
                for item in inner {
                    match item {
                        Item::TypeAlias(alias) => stmts.push(self.emit_alias(cx, alias)),
                        Item::Interface(interface) => {
                            let alias = TypeAliasDecl {
                                name: interface.name.clone(),
                                type_params: interface.type_params.clone(),
                                body: Annotation::Object(interface.body.clone()),
                                span: interface.span,
                            };
                            stmts.push(self.emit_alias(cx, &alias));
                        }
                        Item::Declare(DeclareDecl::ModuleExports { annotation, .. }) => {
                            let converted = self.converter.convert(cx, annotation);
                            stmts.push(Stmt::Expr(
                                self.converter.factory("moduleExports", vec![converted]),
                            ));
                        }
                        Item::Declare(DeclareDecl::Function { name, annotation, .. }) => {
                            let converted = self
                                .converter
                                .convert(cx, &Annotation::Function(annotation.clone()));
                            stmts.push(Stmt::Expr(self.converter.factory(
                                "declare",
                                vec![Expr::string(name.clone()), converted],
                            )));
                        }
                        Item::Declare(DeclareDecl::Variable { name, annotation, .. }) => {
                            let converted = self.converter.convert(cx, annotation);
                            stmts.push(Stmt::Expr(self.converter.factory(
                                "declare",
                                vec![Expr::string(name.clone()), converted],
                            )));
                        }
                        Item::Declare(DeclareDecl::TypeAlias(alias)) => {
                            stmts.push(self.emit_alias(cx, alias));
                        }
                        Item::Declare(DeclareDecl::Class(class)) => {
                            stmts.push(self.class_descriptor(cx, class));
                        }
                        Item::Declare(DeclareDecl::Module { .. }) => {}
                        _ => {}
                    }
                }
                let module_expr = self.converter.factory(
                    "module",
                    vec![
                        Expr::string(name.clone()),
                        Expr::Arrow {
                            params: vec![self.converter.library_id().to_string()],
                            body: ArrowBody::Block(stmts),
                            span: *span,
                        },
                    ],
                );
                items.push(Item::Stmt(Stmt::Expr(
                    self.converter.factory("declare", vec![module_expr]),
                )));
            }
            DeclareDecl::ModuleExports { annotation, .. } => {
                let converted = self.converter.convert(cx, annotation);
                items.push(Item::Stmt(Stmt::Expr(
                    self.converter.factory("moduleExports", vec![converted]),
                )));
            }
            // mirrors the source behaviour: no intermediate `function`
            // wrapper around the annotation
            DeclareDecl::Function { name, annotation, .. } => {
                let converted = self
                    .converter
                    .convert(cx, &Annotation::Function(annotation.clone()));
                items.push(Item::Stmt(Stmt::Expr(self.converter.factory(
                    "declare",
                    vec![Expr::string(name.clone()), converted],
                ))));
            }
            DeclareDecl::Variable { name, annotation, .. } => {
                let converted = self.converter.convert(cx, annotation);
                items.push(Item::Stmt(Stmt::Expr(self.converter.factory(
                    "declare",
                    vec![Expr::string(name.clone()), converted],
                ))));
            }
            DeclareDecl::TypeAlias(alias) => {
                items.push(Item::Stmt(self.emit_alias(cx, alias)));
            }
            DeclareDecl::Class(class) => {
                items.push(Item::Stmt(self.class_descriptor(cx, class)));
            }
        }
    }

    /// Annotated value sites: `const x: T = v` becomes
    /// `const x = <T>.check(v)`.
    fn rewrite_stmt(&self, cx: &mut ConversionContext, stmt: &Stmt) -> Stmt {
        match stmt {
            Stmt::Const(decl) => {
                let (Some(annotation), Some(init)) = (&decl.annotation, &decl.init) else {
                    return stmt.clone();
                };
                if !self.checks_enabled() {
                    return Stmt::Const(ConstDecl {
                        name: decl.name.clone(),
                        annotation: None,
                        init: decl.init.clone(),
                        span: decl.span,
                    });
                }
                let converted = self.converter.convert(cx, annotation);
                Stmt::Const(ConstDecl {
                    name: decl.name.clone(),
                    annotation: None,
                    init: Some(Expr::call(
                        Expr::member(converted, "check"),
                        vec![init.clone()],
                    )),
                    span: decl.span,
                })
            }
            _ => stmt.clone(),
        }
    }
}

fn strip_params(params: &[ParamDecl]) -> Vec<ParamDecl> {
    params
        .iter()
        .map(|param| ParamDecl {
            name: param.name.clone(),
            annotation: None,
            optional: param.optional,
            rest: param.rest,
            span: param.span,
        })
        .collect()
}

fn is_super_call(stmt: &Stmt) -> bool {
    matches!(
        stmt,
        Stmt::Expr(Expr::Call { callee, .. })
            if matches!(&**callee, Expr::Identifier(id) if id.name == "super")
    )
}

fn wrap_returns(stmt: Stmt, slot: Option<&str>, method: &str) -> Stmt {
    let Some(slot) = slot else {
        return stmt;
    };
    match stmt {
        Stmt::Return {
            value: Some(value),
            span,
        } => Stmt::Return {
            value: Some(Expr::call(
                Expr::member(Expr::ident(slot), method),
                vec![value],
            )),
            span,
        },
        other => other,
    }
}

/// Does the annotation mention the given name? Drives self-reference
/// thunking for aliases.
pub fn annotation_references(name: &str, annotation: &Annotation) -> bool {
    match annotation {
        Annotation::Nullable { inner, .. } | Annotation::Array { element: inner, .. } => {
            annotation_references(name, inner)
        }
        Annotation::Tuple { elements, .. } => elements
            .iter()
            .any(|element| annotation_references(name, element)),
        Annotation::Union { members, .. } | Annotation::Intersection { members, .. } => members
            .iter()
            .any(|member| annotation_references(name, member)),
        Annotation::Object(object) => object.members.iter().any(|member| match member {
            ObjectAnnotationMember::Property { value, .. } => annotation_references(name, value),
            ObjectAnnotationMember::Method { value, .. }
            | ObjectAnnotationMember::Call { value, .. } => {
                function_annotation_references(name, value)
            }
            ObjectAnnotationMember::Indexer { key, value, .. } => {
                annotation_references(name, key) || annotation_references(name, value)
            }
        }),
        Annotation::Function(function) => function_annotation_references(name, function),
        Annotation::Generic { id, args, .. } => {
            id.head() == name
                || args.iter().any(|arg| annotation_references(name, arg))
        }
        _ => false,
    }
}

fn function_annotation_references(name: &str, function: &FunctionAnnotation) -> bool {
    function
        .params
        .iter()
        .any(|param| annotation_references(name, &param.annotation))
        || function
            .rest
            .as_ref()
            .is_some_and(|rest| annotation_references(name, &rest.annotation))
        || annotation_references(name, &function.return_annotation)
}
