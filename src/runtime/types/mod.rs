use crate::runtime::context::{ContextInner, TypeContext};
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::validation::{PathSegment, Validation};
use crate::runtime::value::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

mod check;
mod compat;
mod display;
mod param;

/// Shared handle to a type descriptor. Clones alias the same node, so the
/// stateful descriptors (type parameters, thunks) behave like the single
/// runtime objects they model.
#[derive(Clone)]
pub struct TypeRef {
    node: Rc<TypeNode>,
}

pub struct TypeNode {
    context: Weak<ContextInner>,
    kind: TypeKind,
}

pub enum TypeKind {
    Any,
    Mixed,
    Existential,
    Empty,
    Void,
    NullLiteral,
    Number { literal: Option<f64> },
    String { literal: Option<String> },
    Boolean { literal: Option<bool> },
    Symbol,
    Nullable(TypeRef),
    Array(TypeRef),
    Tuple(Vec<TypeRef>),
    Object(ObjectType),
    Function(FunctionType),
    Union(Vec<TypeRef>),
    Intersection(Vec<TypeRef>),
    Ref(RefType),
    Alias(AliasType),
    Class(ClassType),
    Nominal(std::string::String),
    Box(BoxType),
    Param(ParamType),
    FlowInto(TypeRef),
    Partial(PartialType),
    Module(ModuleType),
    Slot(SlotType),
}

impl TypeKind {
    /// Stable tag used for cheap discrimination and in the JSON tree.
    pub fn type_name(&self) -> &'static str {
        match self {
            TypeKind::Any => "any",
            TypeKind::Mixed => "mixed",
            TypeKind::Existential => "existential",
            TypeKind::Empty => "empty",
            TypeKind::Void => "void",
            TypeKind::NullLiteral => "null",
            TypeKind::Number { .. } => "number",
            TypeKind::String { .. } => "string",
            TypeKind::Boolean { .. } => "boolean",
            TypeKind::Symbol => "symbol",
            TypeKind::Nullable(_) => "nullable",
            TypeKind::Array(_) => "array",
            TypeKind::Tuple(_) => "tuple",
            TypeKind::Object(_) => "object",
            TypeKind::Function(_) => "function",
            TypeKind::Union(_) => "union",
            TypeKind::Intersection(_) => "intersection",
            TypeKind::Ref(_) => "ref",
            TypeKind::Alias(_) => "alias",
            TypeKind::Class(_) => "class",
            TypeKind::Nominal(_) => "nominal",
            TypeKind::Box(_) => "box",
            TypeKind::Param(_) => "typeParameter",
            TypeKind::FlowInto(_) => "flowInto",
            TypeKind::Partial(_) => "partial",
            TypeKind::Module(_) => "module",
            TypeKind::Slot(_) => "slot",
        }
    }
}

#[derive(Clone)]
pub struct ObjectType {
    pub exact: bool,
    pub members: Vec<ObjectMember>,
}

#[derive(Clone)]
pub enum ObjectMember {
    Property {
        key: std::string::String,
        value: TypeRef,
        optional: bool,
        is_static: bool,
    },
    Method {
        key: std::string::String,
        value: TypeRef,
        is_static: bool,
    },
    Indexer {
        id: Option<std::string::String>,
        key: TypeRef,
        value: TypeRef,
    },
    Call {
        value: TypeRef,
        is_static: bool,
    },
}

impl ObjectMember {
    pub fn key(&self) -> Option<&str> {
        match self {
            ObjectMember::Property { key, .. } | ObjectMember::Method { key, .. } => Some(key),
            _ => None,
        }
    }

    pub fn is_static(&self) -> bool {
        match self {
            ObjectMember::Property { is_static, .. }
            | ObjectMember::Method { is_static, .. }
            | ObjectMember::Call { is_static, .. } => *is_static,
            ObjectMember::Indexer { .. } => false,
        }
    }
}

pub type FunctionThunk = Rc<dyn Fn(&TypeRef) -> Vec<TypeRef>>;

/// Signature parts arrive as slot descriptors (`param`, `rest`, `return`)
/// and are sorted on construction. A parameterized signature is built by a
/// thunk instead so every activation gets fresh type parameters.
pub struct FunctionType {
    pub(crate) thunk: RefCell<Option<FunctionThunk>>,
    pub(crate) signature: RefCell<Option<FunctionSignature>>,
    pub(crate) type_params: RefCell<Vec<TypeRef>>,
}

#[derive(Clone, Default)]
pub struct FunctionSignature {
    pub params: Vec<TypeRef>,
    pub rest: Option<TypeRef>,
    pub ret: Option<TypeRef>,
}

impl FunctionSignature {
    pub fn from_parts(parts: Vec<TypeRef>) -> Self {
        let mut signature = FunctionSignature::default();
        for part in parts {
            match part.kind() {
                TypeKind::Slot(slot) => match slot.role {
                    SlotRole::Param => signature.params.push(part.clone()),
                    SlotRole::Rest => signature.rest = Some(part.clone()),
                    SlotRole::Return => signature.ret = Some(part.clone()),
                },
                _ => signature.params.push(part.clone()),
            }
        }
        signature
    }
}

#[derive(Clone)]
pub struct SlotType {
    pub name: std::string::String,
    pub ty: TypeRef,
    pub role: SlotRole,
    pub optional: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotRole {
    Param,
    Rest,
    Return,
}

pub type AliasThunk = Rc<dyn Fn(&TypeRef) -> TypeRef>;

/// A named type. Self-referential or parameterized aliases carry a thunk;
/// the body is resolved on first use, with the alias itself in scope.
pub struct AliasType {
    pub name: std::string::String,
    pub(crate) thunk: RefCell<Option<AliasThunk>>,
    pub(crate) body: RefCell<Option<TypeRef>>,
    pub(crate) type_params: RefCell<Vec<TypeRef>>,
}

pub type ClassThunk = Rc<dyn Fn(&TypeRef) -> Vec<ClassPart>>;

#[derive(Clone)]
pub enum ClassPart {
    Extends(TypeRef),
    Member(ObjectMember),
}

pub struct ClassType {
    pub name: std::string::String,
    pub(crate) thunk: RefCell<Option<ClassThunk>>,
    pub(crate) shape: RefCell<Option<ClassShape>>,
    pub(crate) type_params: RefCell<Vec<TypeRef>>,
}

#[derive(Clone, Default)]
pub struct ClassShape {
    pub supers: Vec<TypeRef>,
    pub members: Vec<ObjectMember>,
}

impl ClassShape {
    pub fn from_parts(parts: Vec<ClassPart>) -> Self {
        let mut shape = ClassShape::default();
        for part in parts {
            match part {
                ClassPart::Extends(super_type) => shape.supers.push(super_type),
                ClassPart::Member(member) => shape.members.push(member),
            }
        }
        shape
    }
}

/// Lazy lookup, either by registry name at use time or to a descriptor
/// directly, optionally applied to type arguments.
pub struct RefType {
    pub target: RefCell<RefTarget>,
    pub args: Vec<TypeRef>,
}

#[derive(Clone)]
pub enum RefTarget {
    Name(std::string::String),
    Type(TypeRef),
}

pub type BoxThunk = Rc<dyn Fn() -> TypeRef>;

pub struct BoxType {
    pub(crate) thunk: BoxThunk,
    pub(crate) resolved: RefCell<Option<TypeRef>>,
}

pub struct ParamType {
    pub id: std::string::String,
    pub(crate) bound: RefCell<Option<TypeRef>>,
    pub(crate) recorded: RefCell<Option<TypeRef>>,
}

/// A parameterized descriptor applied to concrete type instances. The
/// target is a fresh activation whose parameters are already bound, so
/// concurrent applications never alias each other's parameter state.
pub struct PartialType {
    pub target: TypeRef,
    pub args: Vec<TypeRef>,
}

pub struct ModuleType {
    pub name: std::string::String,
    pub(crate) context: TypeContext,
    pub(crate) exports: RefCell<Option<TypeRef>>,
}

impl ModuleType {
    pub fn context(&self) -> &TypeContext {
        &self.context
    }

    pub fn set_exports(&self, ty: TypeRef) {
        *self.exports.borrow_mut() = Some(ty);
    }

    pub fn exports(&self) -> Option<TypeRef> {
        self.exports.borrow().clone()
    }
}

impl TypeRef {
    pub(crate) fn new(context: Weak<ContextInner>, kind: TypeKind) -> Self {
        Self {
            node: Rc::new(TypeNode { context, kind }),
        }
    }

    pub fn kind(&self) -> &TypeKind {
        &self.node.kind
    }

    pub fn type_name(&self) -> &'static str {
        self.node.kind.type_name()
    }

    pub fn ptr_eq(&self, other: &TypeRef) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.node) as usize
    }

    /// The owning context. Descriptors hold a weak back-reference; a
    /// descriptor outliving its context is a usage error surfaced here.
    pub fn context(&self) -> TypeContext {
        TypeContext::from_inner(
            self.node
                .context
                .upgrade()
                .expect("type descriptor used after its context was dropped"),
        )
    }

    /// Resolves references, boxes, aliases, slots and recorded/bound
    /// parameters to the current concrete descriptor. Idempotent.
    pub fn unwrap(&self) -> TypeRef {
        let mut current = self.clone();
        loop {
            let next = match current.kind() {
                TypeKind::Ref(reference) => match current.resolve_ref(reference) {
                    Some(target) => target,
                    None => return current,
                },
                TypeKind::Box(boxed) => current.force_box(boxed),
                TypeKind::Alias(_) => match current.alias_body() {
                    Some(body) => body,
                    None => return current,
                },
                TypeKind::Param(param) => {
                    let resolved = param
                        .recorded
                        .borrow()
                        .clone()
                        .or_else(|| param.bound.borrow().clone());
                    match resolved {
                        Some(target) if !target.ptr_eq(&current) => target,
                        _ => return current,
                    }
                }
                TypeKind::FlowInto(inner) => inner.clone(),
                TypeKind::Partial(partial) => partial.target.clone(),
                TypeKind::Slot(slot) => slot.ty.clone(),
                _ => return current,
            };
            current = next;
        }
    }

    fn resolve_ref(&self, reference: &RefType) -> Option<TypeRef> {
        let target = match &*reference.target.borrow() {
            RefTarget::Name(name) => self.context().lookup(name)?,
            RefTarget::Type(ty) => ty.clone(),
        };
        if reference.args.is_empty() {
            Some(target)
        } else {
            target.apply(reference.args.clone()).ok()
        }
    }

    fn force_box(&self, boxed: &BoxType) -> TypeRef {
        if let Some(resolved) = boxed.resolved.borrow().clone() {
            return resolved;
        }
        let resolved = (boxed.thunk)();
        *boxed.resolved.borrow_mut() = Some(resolved.clone());
        resolved
    }

    /// Forces an alias body, handing the alias itself to its thunk so
    /// self-references terminate.
    pub(crate) fn alias_body(&self) -> Option<TypeRef> {
        let TypeKind::Alias(alias) = self.kind() else {
            return None;
        };
        if let Some(body) = alias.body.borrow().clone() {
            return Some(body);
        }
        let thunk = alias.thunk.borrow().clone()?;
        let body = thunk(self);
        *alias.body.borrow_mut() = Some(body.clone());
        Some(body)
    }

    /// Forces a class shape the same way.
    pub(crate) fn class_shape(&self) -> Option<ClassShape> {
        let TypeKind::Class(class) = self.kind() else {
            return None;
        };
        if let Some(shape) = class.shape.borrow().clone() {
            return Some(shape);
        }
        let thunk = class.thunk.borrow().clone()?;
        let shape = ClassShape::from_parts(thunk(self));
        *class.shape.borrow_mut() = Some(shape.clone());
        Some(shape)
    }

    /// Forces a function signature.
    pub(crate) fn function_signature(&self) -> Option<FunctionSignature> {
        let TypeKind::Function(function) = self.kind() else {
            return None;
        };
        if let Some(signature) = function.signature.borrow().clone() {
            return Some(signature);
        }
        let thunk = function.thunk.borrow().clone()?;
        let signature = FunctionSignature::from_parts(thunk(self));
        *function.signature.borrow_mut() = Some(signature.clone());
        Some(signature)
    }

    /// Declares a type parameter on a parameterized descriptor (alias,
    /// class, or function). Called from inside the descriptor's thunk.
    pub fn type_parameter(
        &self,
        id: impl Into<std::string::String>,
        bound: Option<TypeRef>,
    ) -> TypeRef {
        let param = self.context().type_parameter(id, bound);
        match self.kind() {
            TypeKind::Alias(alias) => alias.type_params.borrow_mut().push(param.clone()),
            TypeKind::Class(class) => class.type_params.borrow_mut().push(param.clone()),
            TypeKind::Function(function) => function.type_params.borrow_mut().push(param.clone()),
            _ => {}
        }
        param
    }

    pub fn type_params(&self) -> Vec<TypeRef> {
        match self.kind() {
            TypeKind::Alias(alias) => alias.type_params.borrow().clone(),
            TypeKind::Class(class) => class.type_params.borrow().clone(),
            TypeKind::Function(function) => function.type_params.borrow().clone(),
            _ => Vec::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self.kind() {
            TypeKind::Alias(alias) => Some(&alias.name),
            TypeKind::Class(class) => Some(&class.name),
            TypeKind::Nominal(name) => Some(name),
            TypeKind::Module(module) => Some(&module.name),
            _ => None,
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        let mut validation = Validation::new();
        let mut path = Vec::new();
        !self.collect_errors(&mut validation, &mut path, value)
    }

    /// `accepts` against an application of this descriptor to explicit
    /// type instances.
    pub fn accepts_with(&self, value: &Value, instances: &[TypeRef]) -> bool {
        if instances.is_empty() {
            return self.accepts(value);
        }
        match self.apply(instances.to_vec()) {
            Ok(applied) => applied.accepts(value),
            Err(_) => false,
        }
    }

    pub fn validate(&self, value: &Value) -> Validation {
        let mut validation = Validation::new();
        let mut path = Vec::new();
        self.collect_errors(&mut validation, &mut path, value);
        validation
    }

    /// Mode-dependent value-site check: `off` is a no-op, `warn` emits the
    /// failures to the context's sink, `assert` raises them.
    pub fn check(&self, value: &Value) -> RuntimeResult<()> {
        self.context().check_with_mode(self, value)
    }

    pub fn assert(&self, value: &Value) -> RuntimeResult<()> {
        let failures = self.validate(value);
        if failures.has_errors() {
            Err(RuntimeError::AssertionFailed { failures })
        } else {
            Ok(())
        }
    }

    pub fn warn(&self, value: &Value) {
        let failures = self.validate(value);
        if failures.has_errors() {
            self.context().emit_warning(&failures);
        }
    }

    /// Checks call arguments against a function descriptor's parameter
    /// slots, honoring the context mode. Surplus arguments are checked
    /// against the rest slot when one is declared.
    pub fn assert_params(&self, args: &[Value]) -> RuntimeResult<()> {
        let context = self.context();
        if context.mode().is_off() {
            return Ok(());
        }
        let mut validation = Validation::new();
        self.collect_param_errors(&mut validation, args);
        context.finish_site_check(validation)
    }

    pub fn assert_return(&self, value: &Value) -> RuntimeResult<()> {
        let context = self.context();
        if context.mode().is_off() {
            return Ok(());
        }
        let mut validation = Validation::new();
        let Some(signature) = self.function_signature() else {
            return Ok(());
        };
        if let Some(ret) = &signature.ret {
            let mut path = Vec::new();
            ret.collect_errors(&mut validation, &mut path, value);
        }
        context.finish_site_check(validation)
    }

    fn collect_param_errors(&self, validation: &mut Validation, args: &[Value]) {
        let Some(signature) = self.function_signature() else {
            return;
        };
        let mut path = Vec::new();
        for (index, slot) in signature.params.iter().enumerate() {
            let missing = Value::Undefined;
            let arg = args.get(index).unwrap_or(&missing);
            slot.collect_errors(validation, &mut path, arg);
        }
        if let Some(rest) = &signature.rest {
            let TypeKind::Slot(slot) = rest.kind() else {
                return;
            };
            for (offset, arg) in args.iter().enumerate().skip(signature.params.len()) {
                let mut rest_path = vec![
                    PathSegment::Param(slot.name.clone()),
                    PathSegment::Index(offset - signature.params.len()),
                ];
                slot.ty.collect_errors(validation, &mut rest_path, arg);
            }
        }
    }

    /// A fresh activation of a parameterized descriptor: re-runs the thunk
    /// so type parameters carry no recorded state from earlier calls.
    pub fn activate(&self) -> TypeRef {
        let context = self.context();
        match self.kind() {
            TypeKind::Alias(alias) => match alias.thunk.borrow().clone() {
                Some(thunk) => context.alias_from_thunk(&alias.name, thunk),
                None => self.clone(),
            },
            TypeKind::Class(class) => match class.thunk.borrow().clone() {
                Some(thunk) => context.class_from_thunk(&class.name, thunk),
                None => self.clone(),
            },
            TypeKind::Function(function) => match function.thunk.borrow().clone() {
                Some(thunk) => context.function_from_thunk(thunk),
                None => self.clone(),
            },
            _ => self.clone(),
        }
    }

    /// Applies explicit type instances, producing a partial type over a
    /// fresh activation.
    pub fn apply(&self, args: Vec<TypeRef>) -> RuntimeResult<TypeRef> {
        param::apply(self, args)
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef({self})")
    }
}
