use crate::language::ast::{ArrowBody, Expr, Stmt};
use crate::runtime::context::TypeContext;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::types::{ClassPart, ObjectMember, TypeKind, TypeRef};
use crate::runtime::value::Value;
use std::collections::HashMap;

/// Evaluates the descriptor-construction expressions the converter emits
/// against a live [`TypeContext`]. Only the library-call subset of the
/// host expression language is understood: literals, member calls on the
/// library binding, arrows (thunks), and const bindings.
pub struct Builder {
    context: TypeContext,
    library_id: String,
}

type Env = HashMap<String, Evaluated>;

#[derive(Clone)]
pub enum Evaluated {
    Type(TypeRef),
    Member(ObjectMember),
    Part(ClassPart),
    String(String),
    Number(f64),
    Bool(bool),
    List(Vec<Evaluated>),
    Closure {
        params: Vec<String>,
        body: ArrowBody,
        env: Env,
    },
    Library {
        context: TypeContext,
        module: Option<TypeRef>,
    },
    Unit,
}

impl Evaluated {
    fn describe(&self) -> &'static str {
        match self {
            Evaluated::Type(_) => "type",
            Evaluated::Member(_) => "object member",
            Evaluated::Part(_) => "class member",
            Evaluated::String(_) => "string",
            Evaluated::Number(_) => "number",
            Evaluated::Bool(_) => "boolean",
            Evaluated::List(_) => "array",
            Evaluated::Closure { .. } => "function",
            Evaluated::Library { .. } => "library",
            Evaluated::Unit => "undefined",
        }
    }

    fn into_type(self, factory: &str) -> RuntimeResult<TypeRef> {
        match self {
            Evaluated::Type(ty) => Ok(ty),
            other => Err(bad_arg(factory, "a type", other.describe())),
        }
    }

    fn into_string(self, factory: &str) -> RuntimeResult<String> {
        match self {
            Evaluated::String(value) => Ok(value),
            other => Err(bad_arg(factory, "a string", other.describe())),
        }
    }
}

fn bad_arg(factory: &str, expected: &str, received: &str) -> RuntimeError {
    RuntimeError::BadFactoryArgument {
        factory: factory.to_string(),
        expected: expected.to_string(),
        received: received.to_string(),
    }
}

impl Builder {
    pub fn new(context: TypeContext, library_id: impl Into<String>) -> Self {
        Self {
            context,
            library_id: library_id.into(),
        }
    }

    /// Evaluates a list of emitted statements. Named const bindings whose
    /// value is a descriptor are returned so tests and hosts can reach
    /// them.
    pub fn evaluate_program(&self, stmts: &[Stmt]) -> RuntimeResult<HashMap<String, TypeRef>> {
        let mut env = Env::new();
        let mut out = HashMap::new();
        for stmt in stmts {
            match stmt {
                Stmt::Const(decl) => {
                    let Some(init) = &decl.init else { continue };
                    let value = self.eval(init, &mut env)?;
                    if let Evaluated::Type(ty) = &value {
                        out.insert(decl.name.clone(), ty.clone());
                    }
                    env.insert(decl.name.clone(), value);
                }
                Stmt::Expr(expr) => {
                    self.eval(expr, &mut env)?;
                }
                Stmt::Return { .. } | Stmt::Assign { .. } => {}
            }
        }
        Ok(out)
    }

    pub fn evaluate_expr(&self, expr: &Expr) -> RuntimeResult<Evaluated> {
        let mut env = Env::new();
        self.eval(expr, &mut env)
    }

    /// Evaluates a single emitted expression to a descriptor.
    pub fn build_type(&self, expr: &Expr) -> RuntimeResult<TypeRef> {
        self.evaluate_expr(expr)?.into_type("<expression>")
    }

    fn eval(&self, expr: &Expr, env: &mut Env) -> RuntimeResult<Evaluated> {
        match expr {
            Expr::Identifier(id) => {
                // bindings shadow the library id: a module thunk rebinds
                // it to the module's own context
                if let Some(bound) = env.get(&id.name) {
                    return Ok(bound.clone());
                }
                if id.name == self.library_id {
                    return Ok(Evaluated::Library {
                        context: self.context.clone(),
                        module: None,
                    });
                }
                Err(RuntimeError::UnknownType {
                    name: id.name.clone(),
                })
            }
            Expr::StringLit(value, _) => Ok(Evaluated::String(value.clone())),
            Expr::NumberLit(value, _) => Ok(Evaluated::Number(*value)),
            Expr::BooleanLit(value, _) => Ok(Evaluated::Bool(*value)),
            Expr::NullLit(_) | Expr::UndefinedLit(_) => Ok(Evaluated::Unit),
            Expr::ArrayLit(items, _) => {
                let mut out = Vec::new();
                for item in items {
                    out.push(self.eval(item, env)?);
                }
                Ok(Evaluated::List(out))
            }
            Expr::Arrow { params, body, .. } => Ok(Evaluated::Closure {
                params: params.clone(),
                body: body.clone(),
                env: env.clone(),
            }),
            Expr::Call { callee, args, .. } => self.eval_call(callee, args, env),
            // generated storage scaffolding (symbol keys, parameter
            // stores) evaluates to nothing here; only descriptors matter
            Expr::ObjectLit(entries, _) => {
                for (_, value) in entries {
                    self.eval(value, env)?;
                }
                Ok(Evaluated::Unit)
            }
            Expr::Member { .. } | Expr::New { .. } | Expr::This(_) => {
                Err(RuntimeError::Unsupported {
                    message: "expression form outside the descriptor-construction subset"
                        .to_string(),
                })
            }
        }
    }

    fn eval_call(&self, callee: &Expr, args: &[Expr], env: &mut Env) -> RuntimeResult<Evaluated> {
        if let Expr::Identifier(id) = callee {
            if id.name == "Symbol" {
                return Ok(Evaluated::Unit);
            }
        }
        let Expr::Member {
            object, property, ..
        } = callee
        else {
            return Err(RuntimeError::Unsupported {
                message: "only library member calls are evaluated".to_string(),
            });
        };
        let receiver = self.eval(object, env)?;
        // value-site calls may carry arbitrary host expressions; they are
        // not part of the construction subset and are skipped wholesale
        if matches!(receiver, Evaluated::Type(_))
            && matches!(
                property.as_str(),
                "assert" | "check" | "warn" | "assertParams" | "assertReturn"
            )
        {
            return Ok(Evaluated::Unit);
        }
        let mut evaluated = Vec::new();
        for arg in args {
            evaluated.push(self.eval(arg, env)?);
        }
        match receiver {
            Evaluated::Library { context, module } => {
                self.call_factory(&context, module.as_ref(), property, evaluated)
            }
            Evaluated::Type(ty) => self.call_type_method(&ty, property, evaluated),
            other => Err(bad_arg(property, "the library or a type", other.describe())),
        }
    }

    fn call_type_method(
        &self,
        receiver: &TypeRef,
        method: &str,
        mut args: Vec<Evaluated>,
    ) -> RuntimeResult<Evaluated> {
        match method {
            "typeParameter" => {
                let name = take_arg(&mut args, method)?.into_string(method)?;
                let bound = match args.is_empty() {
                    true => None,
                    false => Some(take_arg(&mut args, method)?.into_type(method)?),
                };
                Ok(Evaluated::Type(receiver.type_parameter(name, bound)))
            }
            "moduleExports" => {
                let ty = take_arg(&mut args, method)?.into_type(method)?;
                if let TypeKind::Module(module) = receiver.kind() {
                    module.set_exports(ty);
                }
                Ok(Evaluated::Unit)
            }
            // value-site calls inside emitted bodies are not evaluated here
            "assert" | "check" | "warn" | "assertParams" | "assertReturn" => Ok(Evaluated::Unit),
            _ => Err(RuntimeError::UnknownFactory {
                name: method.to_string(),
            }),
        }
    }

    fn call_factory(
        &self,
        context: &TypeContext,
        module: Option<&TypeRef>,
        factory: &str,
        mut args: Vec<Evaluated>,
    ) -> RuntimeResult<Evaluated> {
        let ty = |ty: TypeRef| Ok(Evaluated::Type(ty));
        match factory {
            "any" => ty(context.any()),
            "mixed" => ty(context.mixed()),
            "existential" => ty(context.existential()),
            "empty" => ty(context.empty()),
            "void" => ty(context.void()),
            "null" => ty(context.null()),
            "number" => match args.is_empty() {
                true => ty(context.number()),
                false => match take_arg(&mut args, factory)? {
                    Evaluated::Number(value) => ty(context.number_literal(value)),
                    other => Err(bad_arg(factory, "a number literal", other.describe())),
                },
            },
            "string" => match args.is_empty() {
                true => ty(context.string()),
                false => {
                    let value = take_arg(&mut args, factory)?.into_string(factory)?;
                    ty(context.string_literal(value))
                }
            },
            "boolean" => match args.is_empty() {
                true => ty(context.boolean()),
                false => match take_arg(&mut args, factory)? {
                    Evaluated::Bool(value) => ty(context.boolean_literal(value)),
                    other => Err(bad_arg(factory, "a boolean literal", other.describe())),
                },
            },
            "symbol" => ty(context.symbol()),
            "nullable" => {
                let inner = take_arg(&mut args, factory)?.into_type(factory)?;
                ty(context.nullable(inner))
            }
            "array" => match args.is_empty() {
                true => ty(context.array(context.any())),
                false => {
                    let element = take_arg(&mut args, factory)?.into_type(factory)?;
                    ty(context.array(element))
                }
            },
            "tuple" => {
                let elements = take_types(args, factory)?;
                ty(context.tuple(elements))
            }
            "union" => {
                let members = take_types(args, factory)?;
                ty(context.union(members))
            }
            "intersection" | "intersect" => {
                let members = take_types(args, factory)?;
                ty(context.intersection(members))
            }
            "object" | "exactObject" => {
                let mut members = Vec::new();
                for arg in args {
                    match arg {
                        Evaluated::Member(member) => members.push(member),
                        other => {
                            return Err(bad_arg(factory, "object members", other.describe()));
                        }
                    }
                }
                if factory == "object" {
                    ty(context.object(members))
                } else {
                    ty(context.exact_object(members))
                }
            }
            "property" | "staticProperty" => {
                let key = take_arg(&mut args, factory)?.into_string(factory)?;
                let value = take_arg(&mut args, factory)?.into_type(factory)?;
                let optional = matches!(args.first(), Some(Evaluated::Bool(true)));
                let member = match (factory, optional) {
                    ("property", false) => context.property(key, value),
                    ("property", true) => context.optional_property(key, value),
                    _ => context.static_property(key, value),
                };
                Ok(Evaluated::Member(member))
            }
            "method" | "staticMethod" => {
                let key = take_arg(&mut args, factory)?.into_string(factory)?;
                let value = take_arg(&mut args, factory)?.into_type(factory)?;
                let member = if factory == "method" {
                    context.method(key, value)
                } else {
                    context.static_method(key, value)
                };
                Ok(Evaluated::Member(member))
            }
            "indexer" => {
                let first = take_arg(&mut args, factory)?;
                let (id, key) = match first {
                    Evaluated::String(id) => {
                        (Some(id), take_arg(&mut args, factory)?.into_type(factory)?)
                    }
                    Evaluated::Type(key) => (None, key),
                    other => return Err(bad_arg(factory, "an indexer key", other.describe())),
                };
                let value = take_arg(&mut args, factory)?.into_type(factory)?;
                Ok(Evaluated::Member(context.indexer(id, key, value)))
            }
            "callProperty" => {
                let value = take_arg(&mut args, factory)?.into_type(factory)?;
                Ok(Evaluated::Member(context.call_property(value)))
            }
            "extends" => {
                let target = take_arg(&mut args, factory)?.into_type(factory)?;
                Ok(Evaluated::Part(context.extends(target)))
            }
            "param" => {
                let name = take_arg(&mut args, factory)?.into_string(factory)?;
                let slot_type = take_arg(&mut args, factory)?.into_type(factory)?;
                let optional = matches!(args.first(), Some(Evaluated::Bool(true)));
                ty(context.param(name, slot_type, optional))
            }
            "rest" => {
                let first = take_arg(&mut args, factory)?;
                match first {
                    Evaluated::String(name) => {
                        let slot_type = take_arg(&mut args, factory)?.into_type(factory)?;
                        ty(context.rest(name, slot_type))
                    }
                    Evaluated::Type(slot_type) => ty(context.rest("rest", slot_type)),
                    other => Err(bad_arg(factory, "a rest type", other.describe())),
                }
            }
            "return" => {
                let slot_type = take_arg(&mut args, factory)?.into_type(factory)?;
                ty(context.ret(slot_type))
            }
            "function" => match args.first() {
                Some(Evaluated::Closure { .. }) => {
                    let closure = take_arg(&mut args, factory)?;
                    let builder = self.clone_for_thunk();
                    ty(context.function_thunk(move |function| {
                        builder.thunk_slots(&closure, function)
                    }))
                }
                _ => {
                    let parts = take_types(args, factory)?;
                    ty(context.function(parts))
                }
            },
            "ref" => {
                let first = take_arg(&mut args, factory)?;
                let rest = take_types(args, factory)?;
                match first {
                    Evaluated::String(name) => ty(context.ref_by_name(name, rest)),
                    Evaluated::Type(target) => ty(context.ref_to(target, rest)),
                    other => Err(bad_arg(factory, "a name or type", other.describe())),
                }
            }
            "type" => {
                let name = take_arg(&mut args, factory)?.into_string(factory)?;
                match take_arg(&mut args, factory)? {
                    Evaluated::Type(body) => ty(context.type_alias(name, body)?),
                    closure @ Evaluated::Closure { .. } => {
                        let builder = self.clone_for_thunk();
                        let alias = context.type_alias_thunk(name, move |alias| {
                            builder.thunk_type(&closure, alias)
                        })?;
                        ty(alias)
                    }
                    other => Err(bad_arg(factory, "a type or thunk", other.describe())),
                }
            }
            "class" => {
                let name = take_arg(&mut args, factory)?.into_string(factory)?;
                match args.first() {
                    Some(Evaluated::Closure { .. }) => {
                        let closure = take_arg(&mut args, factory)?;
                        let builder = self.clone_for_thunk();
                        ty(context.class_thunk(name, move |class| {
                            builder.thunk_parts(&closure, class)
                        }))
                    }
                    _ => {
                        let mut parts = Vec::new();
                        for arg in args {
                            match arg {
                                Evaluated::Part(part) => parts.push(part),
                                Evaluated::Member(member) => parts.push(ClassPart::Member(member)),
                                other => {
                                    return Err(bad_arg(
                                        factory,
                                        "class members",
                                        other.describe(),
                                    ));
                                }
                            }
                        }
                        ty(context.class(name, parts))
                    }
                }
            }
            "box" => {
                let closure = take_arg(&mut args, factory)?;
                match closure {
                    Evaluated::Closure { .. } => {
                        let builder = self.clone_for_thunk();
                        ty(context.box_of(move || builder.thunk_type_unbound(&closure)))
                    }
                    other => Err(bad_arg(factory, "a thunk", other.describe())),
                }
            }
            "typeParameter" => {
                let name = take_arg(&mut args, factory)?.into_string(factory)?;
                let bound = match args.is_empty() {
                    true => None,
                    false => Some(take_arg(&mut args, factory)?.into_type(factory)?),
                };
                ty(context.type_parameter(name, bound))
            }
            "flowInto" => {
                let target = take_arg(&mut args, factory)?.into_type(factory)?;
                ty(context.flow_into(target))
            }
            "typeOf" => {
                let sample = take_arg(&mut args, factory)?;
                let value = match sample {
                    Evaluated::String(value) => Value::String(value),
                    Evaluated::Number(value) => Value::Number(value),
                    Evaluated::Bool(value) => Value::Bool(value),
                    Evaluated::Unit => Value::Undefined,
                    other => {
                        return Err(bad_arg(factory, "a sample value", other.describe()));
                    }
                };
                ty(context.type_of(&value))
            }
            "module" => {
                let name = take_arg(&mut args, factory)?.into_string(factory)?;
                let module = context.module(name);
                if let Some(closure) = args.into_iter().next() {
                    let TypeKind::Module(inner) = module.kind() else {
                        unreachable!("module factory builds module descriptors");
                    };
                    let library = Evaluated::Library {
                        context: inner.context().clone(),
                        module: Some(module.clone()),
                    };
                    self.call_closure(&closure, vec![library])?;
                }
                ty(module)
            }
            "moduleExports" => {
                let ty_arg = take_arg(&mut args, factory)?.into_type(factory)?;
                if let Some(module) = module {
                    if let TypeKind::Module(inner) = module.kind() {
                        inner.set_exports(ty_arg);
                    }
                }
                Ok(Evaluated::Unit)
            }
            "declare" => {
                let first = take_arg(&mut args, factory)?;
                match first {
                    Evaluated::Type(target) => ty(context.declare(target)?),
                    // `declare(name, annotation)` names an ambient binding
                    Evaluated::String(name) => {
                        let annotation = take_arg(&mut args, factory)?.into_type(factory)?;
                        context.register(name, annotation.clone())?;
                        ty(annotation)
                    }
                    other => Err(bad_arg(factory, "a module or name", other.describe())),
                }
            }
            "predicate" => {
                let name = take_arg(&mut args, factory)?.into_string(factory)?;
                context.install_predicate(&name);
                Ok(Evaluated::Unit)
            }
            "mode" => {
                let name = take_arg(&mut args, factory)?.into_string(factory)?;
                let mode = match name.as_str() {
                    "off" => crate::runtime::context::Mode::Off,
                    "warn" => crate::runtime::context::Mode::Warn,
                    "assert" => crate::runtime::context::Mode::Assert,
                    other => return Err(bad_arg(factory, "off, warn or assert", other)),
                };
                context.set_mode(mode);
                Ok(Evaluated::Unit)
            }
            _ => Err(RuntimeError::UnknownFactory {
                name: factory.to_string(),
            }),
        }
    }

    fn clone_for_thunk(&self) -> Builder {
        Builder {
            context: self.context.clone(),
            library_id: self.library_id.clone(),
        }
    }

    fn call_closure(&self, closure: &Evaluated, args: Vec<Evaluated>) -> RuntimeResult<Evaluated> {
        let Evaluated::Closure { params, body, env } = closure else {
            return Err(bad_arg("thunk", "a function", closure.describe()));
        };
        let mut env = env.clone();
        for (param, arg) in params.iter().zip(args.into_iter()) {
            env.insert(param.clone(), arg);
        }
        match body {
            ArrowBody::Expr(expr) => self.eval(expr, &mut env),
            ArrowBody::Block(stmts) => {
                for stmt in stmts {
                    match stmt {
                        Stmt::Const(decl) => {
                            if let Some(init) = &decl.init {
                                let value = self.eval(init, &mut env)?;
                                env.insert(decl.name.clone(), value);
                            }
                        }
                        Stmt::Expr(expr) => {
                            self.eval(expr, &mut env)?;
                        }
                        Stmt::Return { value, .. } => {
                            return match value {
                                Some(expr) => self.eval(expr, &mut env),
                                None => Ok(Evaluated::Unit),
                            };
                        }
                        Stmt::Assign { .. } => {}
                    }
                }
                Ok(Evaluated::Unit)
            }
        }
    }

    /// Thunk adapters degrade to `any` on evaluation failure; thunks run
    /// lazily at check time where no error channel exists.
    fn thunk_type(&self, closure: &Evaluated, receiver: &TypeRef) -> TypeRef {
        match self.call_closure(closure, vec![Evaluated::Type(receiver.clone())]) {
            Ok(Evaluated::Type(ty)) => ty,
            _ => self.context.any(),
        }
    }

    fn thunk_type_unbound(&self, closure: &Evaluated) -> TypeRef {
        match self.call_closure(closure, Vec::new()) {
            Ok(Evaluated::Type(ty)) => ty,
            _ => self.context.any(),
        }
    }

    fn thunk_slots(&self, closure: &Evaluated, receiver: &TypeRef) -> Vec<TypeRef> {
        match self.call_closure(closure, vec![Evaluated::Type(receiver.clone())]) {
            Ok(Evaluated::List(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Evaluated::Type(ty) => Some(ty),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn thunk_parts(&self, closure: &Evaluated, receiver: &TypeRef) -> Vec<ClassPart> {
        match self.call_closure(closure, vec![Evaluated::Type(receiver.clone())]) {
            Ok(Evaluated::List(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Evaluated::Part(part) => Some(part),
                    Evaluated::Member(member) => Some(ClassPart::Member(member)),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn take_arg(args: &mut Vec<Evaluated>, factory: &str) -> RuntimeResult<Evaluated> {
    if args.is_empty() {
        return Err(bad_arg(factory, "an argument", "nothing"));
    }
    Ok(args.remove(0))
}

fn take_types(args: Vec<Evaluated>, factory: &str) -> RuntimeResult<Vec<TypeRef>> {
    args.into_iter()
        .map(|arg| arg.into_type(factory))
        .collect()
}
