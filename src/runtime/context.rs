use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::types::{
    AliasThunk, AliasType, BoxType, ClassPart, ClassShape, ClassThunk, ClassType,
    FunctionSignature, FunctionThunk, FunctionType, ModuleType, ObjectMember, ObjectType,
    ParamType, PartialType, RefTarget, RefType, SlotRole, SlotType, TypeKind, TypeRef,
};
use crate::runtime::validation::Validation;
use crate::runtime::value::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Off,
    Warn,
    Assert,
}

impl Mode {
    pub fn is_off(&self) -> bool {
        matches!(self, Mode::Off)
    }
}

pub trait WarningSink {
    fn warn(&self, failures: &Validation);
}

/// Default sink: write the failure list to stderr.
pub struct StderrSink;

impl WarningSink for StderrSink {
    fn warn(&self, failures: &Validation) {
        eprintln!("Type warning:\n{failures}");
    }
}

pub type Predicate = Rc<dyn Fn(&Value) -> bool>;

/// Factory and registry for type descriptors. Contexts form a tree
/// (module, class, method); name resolution walks towards the root and a
/// child may shadow. Mode and warning sink are inherited unless set.
#[derive(Clone)]
pub struct TypeContext {
    inner: Rc<ContextInner>,
}

pub struct ContextInner {
    // weak, so a registered descriptor owning a child context (a declared
    // module) cannot keep the whole tree alive through its parent
    parent: Option<Weak<ContextInner>>,
    types: RefCell<HashMap<String, TypeRef>>,
    predicates: RefCell<HashMap<String, Predicate>>,
    mode: Cell<Option<Mode>>,
    sink: RefCell<Option<Rc<dyn WarningSink>>>,
}

impl Default for TypeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeContext {
    pub fn new() -> Self {
        let context = Self::bare(None);
        context.seed_predicates();
        context
    }

    fn bare(parent: Option<Weak<ContextInner>>) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                parent,
                types: RefCell::new(HashMap::new()),
                predicates: RefCell::new(HashMap::new()),
                mode: Cell::new(None),
                sink: RefCell::new(None),
            }),
        }
    }

    pub fn child(&self) -> TypeContext {
        Self::bare(Some(Rc::downgrade(&self.inner)))
    }

    fn parent(&self) -> Option<TypeContext> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(TypeContext::from_inner)
    }

    pub(crate) fn from_inner(inner: Rc<ContextInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> Rc<ContextInner> {
        self.inner.clone()
    }

    fn make(&self, kind: TypeKind) -> TypeRef {
        TypeRef::new(Rc::downgrade(&self.inner), kind)
    }

    // --- mode and warning sink ---

    pub fn mode(&self) -> Mode {
        let mut current = Some(self.clone());
        while let Some(context) = current {
            if let Some(mode) = context.inner.mode.get() {
                return mode;
            }
            current = context.parent();
        }
        Mode::Assert
    }

    pub fn set_mode(&self, mode: Mode) {
        self.inner.mode.set(Some(mode));
    }

    pub fn set_warning_sink(&self, sink: Rc<dyn WarningSink>) {
        *self.inner.sink.borrow_mut() = Some(sink);
    }

    pub fn emit_warning(&self, failures: &Validation) {
        let mut current = Some(self.clone());
        while let Some(context) = current {
            let sink = context.inner.sink.borrow().clone();
            if let Some(sink) = sink {
                sink.warn(failures);
                return;
            }
            current = context.parent();
        }
        StderrSink.warn(failures);
    }

    pub(crate) fn check_with_mode(&self, ty: &TypeRef, value: &Value) -> RuntimeResult<()> {
        match self.mode() {
            Mode::Off => Ok(()),
            Mode::Warn => {
                let failures = ty.validate(value);
                if failures.has_errors() {
                    self.emit_warning(&failures);
                }
                Ok(())
            }
            Mode::Assert => {
                let failures = ty.validate(value);
                if failures.has_errors() {
                    Err(RuntimeError::AssertionFailed { failures })
                } else {
                    Ok(())
                }
            }
        }
    }

    pub(crate) fn finish_site_check(&self, failures: Validation) -> RuntimeResult<()> {
        match self.mode() {
            Mode::Off => Ok(()),
            Mode::Warn => {
                if failures.has_errors() {
                    self.emit_warning(&failures);
                }
                Ok(())
            }
            Mode::Assert => {
                if failures.has_errors() {
                    Err(RuntimeError::AssertionFailed { failures })
                } else {
                    Ok(())
                }
            }
        }
    }

    // --- name and predicate registries ---

    /// Registration is write-once per name per context; a duplicate is a
    /// configuration error.
    pub fn register(&self, name: impl Into<String>, ty: TypeRef) -> RuntimeResult<()> {
        let name = name.into();
        let mut types = self.inner.types.borrow_mut();
        if types.contains_key(&name) {
            return Err(RuntimeError::DuplicateTypeName { name });
        }
        types.insert(name, ty);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<TypeRef> {
        let mut current = Some(self.clone());
        while let Some(context) = current {
            if let Some(ty) = context.inner.types.borrow().get(name) {
                return Some(ty.clone());
            }
            current = context.parent();
        }
        None
    }

    /// Predicate registration overwrites silently so hosts can inject
    /// environment predicates over the seeded set.
    pub fn register_predicate(&self, name: impl Into<String>, predicate: Predicate) {
        self.inner
            .predicates
            .borrow_mut()
            .insert(name.into(), predicate);
    }

    pub fn predicate(&self, name: &str) -> Option<Predicate> {
        let mut current = Some(self.clone());
        while let Some(context) = current {
            if let Some(predicate) = context.inner.predicates.borrow().get(name) {
                return Some(predicate.clone());
            }
            current = context.parent();
        }
        None
    }

    fn seed_predicates(&self) {
        self.register_predicate("Array", Rc::new(|value| matches!(value, Value::Array(_))));
        self.register_predicate(
            "$ReadOnlyArray",
            Rc::new(|value| matches!(value, Value::Array(array) if array.is_frozen())),
        );
        self.register_predicate("Map", Rc::new(|value| matches!(value, Value::Map(_))));
        self.register_predicate("Set", Rc::new(|value| matches!(value, Value::Set(_))));
        self.register_predicate(
            "Promise",
            Rc::new(|value| {
                value
                    .get_property("then")
                    .is_some_and(|then| then.is_callable())
            }),
        );
    }

    /// Seeds the built-in predicate under `name` on demand; unknown names
    /// are ignored. Transformed modules call this for each predicate the
    /// orchestrator declared.
    pub fn install_predicate(&self, name: &str) {
        let root = self.root();
        if root.predicate(name).is_none() {
            root.seed_predicates();
        }
    }

    fn root(&self) -> TypeContext {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    // --- primitive factories ---

    pub fn any(&self) -> TypeRef {
        self.make(TypeKind::Any)
    }

    pub fn mixed(&self) -> TypeRef {
        self.make(TypeKind::Mixed)
    }

    pub fn existential(&self) -> TypeRef {
        self.make(TypeKind::Existential)
    }

    pub fn empty(&self) -> TypeRef {
        self.make(TypeKind::Empty)
    }

    pub fn void(&self) -> TypeRef {
        self.make(TypeKind::Void)
    }

    pub fn null(&self) -> TypeRef {
        self.make(TypeKind::NullLiteral)
    }

    pub fn number(&self) -> TypeRef {
        self.make(TypeKind::Number { literal: None })
    }

    pub fn number_literal(&self, value: f64) -> TypeRef {
        self.make(TypeKind::Number {
            literal: Some(value),
        })
    }

    pub fn string(&self) -> TypeRef {
        self.make(TypeKind::String { literal: None })
    }

    pub fn string_literal(&self, value: impl Into<String>) -> TypeRef {
        self.make(TypeKind::String {
            literal: Some(value.into()),
        })
    }

    pub fn boolean(&self) -> TypeRef {
        self.make(TypeKind::Boolean { literal: None })
    }

    pub fn boolean_literal(&self, value: bool) -> TypeRef {
        self.make(TypeKind::Boolean {
            literal: Some(value),
        })
    }

    pub fn symbol(&self) -> TypeRef {
        self.make(TypeKind::Symbol)
    }

    // --- compound factories ---

    pub fn nullable(&self, inner: TypeRef) -> TypeRef {
        self.make(TypeKind::Nullable(inner))
    }

    pub fn array(&self, element: TypeRef) -> TypeRef {
        self.make(TypeKind::Array(element))
    }

    pub fn tuple(&self, elements: Vec<TypeRef>) -> TypeRef {
        self.make(TypeKind::Tuple(elements))
    }

    pub fn object(&self, members: Vec<ObjectMember>) -> TypeRef {
        self.make(TypeKind::Object(ObjectType {
            exact: false,
            members,
        }))
    }

    pub fn exact_object(&self, members: Vec<ObjectMember>) -> TypeRef {
        self.make(TypeKind::Object(ObjectType {
            exact: true,
            members,
        }))
    }

    pub fn union(&self, members: Vec<TypeRef>) -> TypeRef {
        self.make(TypeKind::Union(members))
    }

    pub fn intersection(&self, members: Vec<TypeRef>) -> TypeRef {
        self.make(TypeKind::Intersection(members))
    }

    pub fn intersect(&self, left: TypeRef, right: TypeRef) -> TypeRef {
        self.intersection(vec![left, right])
    }

    /// Union with duplicates collapsed: a member subsumed by another
    /// (literal under its primitive, repeated shapes) is dropped.
    pub fn union_of(&self, members: Vec<TypeRef>) -> TypeRef {
        let mut flat = Vec::new();
        for member in members {
            match member.kind() {
                TypeKind::Union(inner) => flat.extend(inner.iter().cloned()),
                _ => flat.push(member),
            }
        }
        let mut kept: Vec<TypeRef> = Vec::new();
        for candidate in flat {
            if kept.iter().any(|existing| existing.accepts_type(&candidate)) {
                continue;
            }
            kept.retain(|existing| !candidate.accepts_type(existing));
            kept.push(candidate);
        }
        if kept.len() == 1 {
            kept.into_iter().next().expect("non-empty")
        } else {
            self.union(kept)
        }
    }

    // --- references and named types ---

    pub fn ref_by_name(&self, name: impl Into<String>, args: Vec<TypeRef>) -> TypeRef {
        self.make(TypeKind::Ref(RefType {
            target: RefCell::new(RefTarget::Name(name.into())),
            args,
        }))
    }

    pub fn ref_to(&self, target: TypeRef, args: Vec<TypeRef>) -> TypeRef {
        self.make(TypeKind::Ref(RefType {
            target: RefCell::new(RefTarget::Type(target)),
            args,
        }))
    }

    pub fn nominal(&self, name: impl Into<String>) -> TypeRef {
        self.make(TypeKind::Nominal(name.into()))
    }

    /// `type X = body`: creates and registers the named alias.
    pub fn type_alias(&self, name: impl Into<String>, body: TypeRef) -> RuntimeResult<TypeRef> {
        let name = name.into();
        let alias = self.make(TypeKind::Alias(AliasType {
            name: name.clone(),
            thunk: RefCell::new(None),
            body: RefCell::new(Some(body)),
            type_params: RefCell::new(Vec::new()),
        }));
        self.register(name, alias.clone())?;
        Ok(alias)
    }

    /// Self-referential or parameterized alias: the body thunk receives
    /// the alias itself, so construction terminates and dereferencing
    /// happens on check.
    pub fn type_alias_thunk(
        &self,
        name: impl Into<String>,
        thunk: impl Fn(&TypeRef) -> TypeRef + 'static,
    ) -> RuntimeResult<TypeRef> {
        let name = name.into();
        let alias = self.alias_from_thunk(&name, Rc::new(thunk));
        self.register(name, alias.clone())?;
        Ok(alias)
    }

    pub(crate) fn alias_from_thunk(&self, name: &str, thunk: AliasThunk) -> TypeRef {
        self.make(TypeKind::Alias(AliasType {
            name: name.to_string(),
            thunk: RefCell::new(Some(thunk)),
            body: RefCell::new(None),
            type_params: RefCell::new(Vec::new()),
        }))
    }

    pub fn box_of(&self, thunk: impl Fn() -> TypeRef + 'static) -> TypeRef {
        self.make(TypeKind::Box(BoxType {
            thunk: Rc::new(thunk),
            resolved: RefCell::new(None),
        }))
    }

    // --- functions ---

    pub fn function(&self, parts: Vec<TypeRef>) -> TypeRef {
        self.make(TypeKind::Function(FunctionType {
            thunk: RefCell::new(None),
            signature: RefCell::new(Some(FunctionSignature::from_parts(parts))),
            type_params: RefCell::new(Vec::new()),
        }))
    }

    /// Parameterized signature: the thunk declares type parameters on the
    /// function descriptor and returns the slot list.
    pub fn function_thunk(&self, thunk: impl Fn(&TypeRef) -> Vec<TypeRef> + 'static) -> TypeRef {
        self.function_from_thunk(Rc::new(thunk))
    }

    pub(crate) fn function_from_thunk(&self, thunk: FunctionThunk) -> TypeRef {
        self.make(TypeKind::Function(FunctionType {
            thunk: RefCell::new(Some(thunk)),
            signature: RefCell::new(None),
            type_params: RefCell::new(Vec::new()),
        }))
    }

    pub fn param(&self, name: impl Into<String>, ty: TypeRef, optional: bool) -> TypeRef {
        self.make(TypeKind::Slot(SlotType {
            name: name.into(),
            ty,
            role: SlotRole::Param,
            optional,
        }))
    }

    pub fn rest(&self, name: impl Into<String>, ty: TypeRef) -> TypeRef {
        self.make(TypeKind::Slot(SlotType {
            name: name.into(),
            ty,
            role: SlotRole::Rest,
            optional: false,
        }))
    }

    pub fn ret(&self, ty: TypeRef) -> TypeRef {
        self.make(TypeKind::Slot(SlotType {
            name: "return".to_string(),
            ty,
            role: SlotRole::Return,
            optional: false,
        }))
    }

    // --- objects and classes ---

    pub fn property(&self, key: impl Into<String>, value: TypeRef) -> ObjectMember {
        ObjectMember::Property {
            key: key.into(),
            value,
            optional: false,
            is_static: false,
        }
    }

    pub fn optional_property(&self, key: impl Into<String>, value: TypeRef) -> ObjectMember {
        ObjectMember::Property {
            key: key.into(),
            value,
            optional: true,
            is_static: false,
        }
    }

    pub fn static_property(&self, key: impl Into<String>, value: TypeRef) -> ObjectMember {
        ObjectMember::Property {
            key: key.into(),
            value,
            optional: false,
            is_static: true,
        }
    }

    pub fn method(&self, key: impl Into<String>, value: TypeRef) -> ObjectMember {
        ObjectMember::Method {
            key: key.into(),
            value,
            is_static: false,
        }
    }

    pub fn static_method(&self, key: impl Into<String>, value: TypeRef) -> ObjectMember {
        ObjectMember::Method {
            key: key.into(),
            value,
            is_static: true,
        }
    }

    pub fn indexer(&self, id: Option<String>, key: TypeRef, value: TypeRef) -> ObjectMember {
        ObjectMember::Indexer { id, key, value }
    }

    pub fn call_property(&self, value: TypeRef) -> ObjectMember {
        ObjectMember::Call {
            value,
            is_static: false,
        }
    }

    pub fn extends(&self, target: TypeRef) -> ClassPart {
        ClassPart::Extends(target)
    }

    pub fn class(&self, name: impl Into<String>, parts: Vec<ClassPart>) -> TypeRef {
        self.make(TypeKind::Class(ClassType {
            name: name.into(),
            thunk: RefCell::new(None),
            shape: RefCell::new(Some(ClassShape::from_parts(parts))),
            type_params: RefCell::new(Vec::new()),
        }))
    }

    pub fn class_thunk(
        &self,
        name: impl Into<String>,
        thunk: impl Fn(&TypeRef) -> Vec<ClassPart> + 'static,
    ) -> TypeRef {
        self.class_from_thunk(&name.into(), Rc::new(thunk))
    }

    pub(crate) fn class_from_thunk(&self, name: &str, thunk: ClassThunk) -> TypeRef {
        self.make(TypeKind::Class(ClassType {
            name: name.to_string(),
            thunk: RefCell::new(Some(thunk)),
            shape: RefCell::new(None),
            type_params: RefCell::new(Vec::new()),
        }))
    }

    // --- type parameters and flow ---

    pub fn type_parameter(&self, id: impl Into<String>, bound: Option<TypeRef>) -> TypeRef {
        self.make(TypeKind::Param(ParamType {
            id: id.into(),
            bound: RefCell::new(bound),
            recorded: RefCell::new(None),
        }))
    }

    /// Wraps a type parameter for a flowable position. Non-parameter
    /// descriptors pass through unchanged.
    pub fn flow_into(&self, target: TypeRef) -> TypeRef {
        match target.kind() {
            TypeKind::Param(_) => self.make(TypeKind::FlowInto(target)),
            _ => target,
        }
    }

    pub fn partial(&self, target: TypeRef, args: Vec<TypeRef>) -> TypeRef {
        self.make(TypeKind::Partial(PartialType { target, args }))
    }

    // --- modules ---

    pub fn module(&self, name: impl Into<String>) -> TypeRef {
        self.make(TypeKind::Module(ModuleType {
            name: name.into(),
            context: self.child(),
            exports: RefCell::new(None),
        }))
    }

    /// Registers a module descriptor under its name.
    pub fn declare(&self, module: TypeRef) -> RuntimeResult<TypeRef> {
        let name = match module.kind() {
            TypeKind::Module(inner) => inner.name.clone(),
            _ => {
                return Err(RuntimeError::Unsupported {
                    message: "declare expects a module descriptor".to_string(),
                });
            }
        };
        self.register(name, module.clone())?;
        Ok(module)
    }

    // --- inference ---

    /// A fresh structural descriptor of the value's concrete shape.
    /// Primitives infer to their base type, never to literals, so
    /// first-observation monomorphization fixes `T = number` rather than
    /// `T = 42`.
    pub fn type_of(&self, value: &Value) -> TypeRef {
        match value {
            Value::Undefined => self.void(),
            Value::Null => self.null(),
            Value::Bool(_) => self.boolean(),
            Value::Number(_) => self.number(),
            Value::String(_) => self.string(),
            Value::Symbol(_) => self.symbol(),
            Value::Array(array) => {
                let items = array.items.borrow().clone();
                if items.is_empty() {
                    return self.array(self.any());
                }
                let elements: Vec<TypeRef> =
                    items.iter().map(|item| self.type_of(item)).collect();
                self.array(self.union_of(elements))
            }
            Value::Object(object) => {
                let members: Vec<ObjectMember> = object
                    .entries
                    .borrow()
                    .iter()
                    .map(|(key, item)| self.property(key.clone(), self.type_of(item)))
                    .collect();
                self.object(members)
            }
            Value::Function(function) => {
                let params: Vec<TypeRef> = (0..function.arity)
                    .map(|index| self.param(format!("_arg{index}"), self.any(), false))
                    .collect();
                let mut parts = params;
                parts.push(self.ret(self.any()));
                self.function(parts)
            }
            Value::Instance(instance) => self.nominal(instance.class_name.clone()),
            Value::Map(_) => self.nominal("Map"),
            Value::Set(_) => self.nominal("Set"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_write_once() {
        let context = TypeContext::new();
        context
            .type_alias("Id", context.number())
            .expect("first registration");
        let duplicate = context.type_alias("Id", context.string());
        assert!(matches!(
            duplicate,
            Err(RuntimeError::DuplicateTypeName { name }) if name == "Id"
        ));
    }

    #[test]
    fn child_contexts_shadow_and_inherit() {
        let root = TypeContext::new();
        root.type_alias("Id", root.number()).expect("register");
        let child = root.child();
        assert!(child.lookup("Id").is_some());
        child
            .type_alias("Id", child.string())
            .expect("shadowing in a child is a fresh registration");
        let shadowed = child.lookup("Id").expect("lookup");
        assert!(shadowed.accepts(&Value::string("x")));
        let original = root.lookup("Id").expect("lookup");
        assert!(original.accepts(&Value::number(1.0)));
    }

    #[test]
    fn predicate_registration_overwrites_silently() {
        let context = TypeContext::new();
        context.register_predicate("Array", Rc::new(|_| false));
        let array = context.nominal("Array");
        assert!(!array.accepts(&Value::Array(crate::runtime::value::ArrayValue::new())));
    }

    #[test]
    fn mode_is_inherited_until_set() {
        let root = TypeContext::new();
        let child = root.child();
        root.set_mode(Mode::Warn);
        assert_eq!(child.mode(), Mode::Warn);
        child.set_mode(Mode::Off);
        assert_eq!(child.mode(), Mode::Off);
        assert_eq!(root.mode(), Mode::Warn);
    }

    #[test]
    fn type_of_infers_structural_shapes() {
        let context = TypeContext::new();
        let value = Value::Object(crate::runtime::value::ObjectValue::from_entries(vec![
            ("id".to_string(), Value::number(3.0)),
            ("name".to_string(), Value::string("fern")),
        ]));
        let inferred = context.type_of(&value);
        assert!(inferred.accepts(&value));
        assert!(!inferred.accepts(&Value::number(3.0)));
    }

    #[test]
    fn union_of_collapses_duplicates_and_literals() {
        let context = TypeContext::new();
        let collapsed = context.union_of(vec![
            context.number(),
            context.number_literal(3.0),
            context.number(),
        ]);
        assert!(matches!(collapsed.kind(), TypeKind::Number { literal: None }));
    }
}
