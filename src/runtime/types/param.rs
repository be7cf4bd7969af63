use super::*;

/// Type-parameter checking follows a strict order: delegate upward through
/// flow wrappers, then honor the recorded (monomorphized) shape, then the
/// bound, and only then infer and record.
pub(crate) fn param_collect_errors(
    this: &TypeRef,
    param: &ParamType,
    validation: &mut Validation,
    path: &mut Vec<PathSegment>,
    value: &Value,
) -> bool {
    let bound = param.bound.borrow().clone();
    if let Some(bound) = &bound {
        if matches!(bound.kind(), TypeKind::FlowInto(_) | TypeKind::Param(_)) {
            return bound.collect_errors(validation, path, value);
        }
    }
    let recorded = param.recorded.borrow().clone();
    if let Some(recorded) = recorded {
        return recorded.collect_errors(validation, path, value);
    }
    if let Some(bound) = bound {
        if is_unconstrained(&bound) {
            return false;
        }
        if bound.collect_errors(validation, path, value) {
            return true;
        }
    }
    let inferred = this.context().type_of(value);
    *param.recorded.borrow_mut() = Some(inferred);
    false
}

/// `flowInto` is the write-capable wrapper: every accepted value widens the
/// wrapped parameter's recorded shape, monotonically, into a union.
pub(crate) fn flow_collect_errors(
    inner: &TypeRef,
    validation: &mut Validation,
    path: &mut Vec<PathSegment>,
    value: &Value,
) -> bool {
    let TypeKind::Param(param) = inner.kind() else {
        return inner.collect_errors(validation, path, value);
    };
    let bound = param.bound.borrow().clone();
    if let Some(bound) = bound {
        if matches!(bound.kind(), TypeKind::FlowInto(_) | TypeKind::Param(_)) {
            return bound.collect_errors(validation, path, value);
        }
        if !is_unconstrained(&bound) && bound.collect_errors(validation, path, value) {
            return true;
        }
    }
    widen(inner, param, value);
    false
}

fn widen(this: &TypeRef, param: &ParamType, value: &Value) {
    let context = this.context();
    let recorded = param.recorded.borrow().clone();
    match recorded {
        None => {
            *param.recorded.borrow_mut() = Some(context.type_of(value));
        }
        Some(existing) => {
            if !existing.accepts(value) {
                let widened = context.union_of(vec![existing, context.type_of(value)]);
                *param.recorded.borrow_mut() = Some(widened);
            }
        }
    }
}

pub(crate) fn is_unconstrained(bound: &TypeRef) -> bool {
    matches!(
        bound.unwrap().kind(),
        TypeKind::Any | TypeKind::Mixed | TypeKind::Existential
    )
}

/// Binds a type instance into a parameter. Rebinding composes through an
/// intersection, with `any` as the identity element.
pub(crate) fn bind(param_ref: &TypeRef, instance: TypeRef) {
    let TypeKind::Param(param) = param_ref.kind() else {
        return;
    };
    let old = param.bound.borrow().clone();
    let new = match old {
        None => instance,
        Some(old) if matches!(old.unwrap().kind(), TypeKind::Any) => instance,
        Some(_) if matches!(instance.unwrap().kind(), TypeKind::Any) => {
            return;
        }
        Some(old) => param_ref.context().intersect(old, instance),
    };
    *param.bound.borrow_mut() = Some(new);
}

/// Application: activate a fresh copy of the parameterized target (so no
/// parameter state is shared across instantiations), bind its parameters
/// to the given instances, and wrap the result.
pub(crate) fn apply(target: &TypeRef, args: Vec<TypeRef>) -> RuntimeResult<TypeRef> {
    let resolved = resolve_applicable(target);
    let activated = resolved.activate();
    force(&activated);
    let params = activated.type_params();
    for (param, instance) in params.iter().zip(args.iter()) {
        bind(param, instance.clone());
    }
    Ok(TypeRef::new(
        std::rc::Rc::downgrade(&target.context().inner()),
        TypeKind::Partial(PartialType {
            target: activated,
            args,
        }),
    ))
}

/// Walks refs/boxes without entering alias bodies, so the applicable
/// (parameterized) descriptor itself is found.
fn resolve_applicable(target: &TypeRef) -> TypeRef {
    let mut current = target.clone();
    loop {
        let next = match current.kind() {
            TypeKind::Ref(reference) => {
                let resolved = match &*reference.target.borrow() {
                    RefTarget::Name(name) => current.context().lookup(name),
                    RefTarget::Type(ty) => Some(ty.clone()),
                };
                match resolved {
                    Some(ty) => ty,
                    None => return current,
                }
            }
            TypeKind::Box(boxed) => current.force_box(boxed),
            TypeKind::Partial(partial) => partial.target.clone(),
            // a plain named wrapper is transparent; a thunked alias owns
            // its parameters and is the application target itself
            TypeKind::Alias(alias) if alias.thunk.borrow().is_none() => {
                match current.alias_body() {
                    Some(body) => body,
                    None => return current,
                }
            }
            _ => return current,
        };
        current = next;
    }
}

fn force(target: &TypeRef) {
    match target.kind() {
        TypeKind::Alias(_) => {
            target.alias_body();
        }
        TypeKind::Class(_) => {
            target.class_shape();
        }
        TypeKind::Function(_) => {
            target.function_signature();
        }
        _ => {}
    }
}
