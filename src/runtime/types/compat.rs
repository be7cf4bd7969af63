use super::*;

impl TypeRef {
    /// Structural subtyping between descriptors: does every value accepted
    /// by `other` conform to `self`?
    pub fn accepts_type(&self, other: &TypeRef) -> bool {
        let mut seen = Vec::new();
        accepts_type_inner(self, other, &mut seen)
    }
}

/// Recursive descriptors are compared coinductively: a pair already under
/// comparison is assumed compatible.
fn accepts_type_inner(this: &TypeRef, other: &TypeRef, seen: &mut Vec<(usize, usize)>) -> bool {
    if this.ptr_eq(other) {
        return true;
    }
    let pair = (this.addr(), other.addr());
    if seen.contains(&pair) {
        return true;
    }
    seen.push(pair);
    let result = accepts_type_kinds(this, other, seen);
    seen.pop();
    result
}

fn accepts_type_kinds(this: &TypeRef, other: &TypeRef, seen: &mut Vec<(usize, usize)>) -> bool {
    let left = this.unwrap();
    let right = other.unwrap();
    if left.ptr_eq(&right) {
        return true;
    }

    // the right side distributes first: a union conforms when every member
    // does, a nullable when its inner does
    match right.kind() {
        TypeKind::Union(members) => {
            return members
                .iter()
                .all(|member| accepts_type_inner(&left, member, seen));
        }
        TypeKind::Intersection(members) => {
            if members
                .iter()
                .any(|member| accepts_type_inner(&left, member, seen))
            {
                return true;
            }
        }
        TypeKind::Empty => return true,
        _ => {}
    }

    match left.kind() {
        TypeKind::Any | TypeKind::Mixed | TypeKind::Existential => true,
        TypeKind::Empty => false,
        TypeKind::Void => matches!(right.kind(), TypeKind::Void),
        TypeKind::NullLiteral => matches!(right.kind(), TypeKind::NullLiteral),
        TypeKind::Number { literal } => match (literal, right.kind()) {
            (None, TypeKind::Number { .. }) => true,
            (Some(expected), TypeKind::Number {
                literal: Some(actual),
            }) => expected == actual,
            _ => false,
        },
        TypeKind::String { literal } => match (literal, right.kind()) {
            (None, TypeKind::String { .. }) => true,
            (Some(expected), TypeKind::String {
                literal: Some(actual),
            }) => expected == actual,
            _ => false,
        },
        TypeKind::Boolean { literal } => match (literal, right.kind()) {
            (None, TypeKind::Boolean { .. }) => true,
            (Some(expected), TypeKind::Boolean {
                literal: Some(actual),
            }) => expected == actual,
            _ => false,
        },
        TypeKind::Symbol => matches!(right.kind(), TypeKind::Symbol),
        TypeKind::Nullable(inner) => match right.kind() {
            TypeKind::Void | TypeKind::NullLiteral => true,
            TypeKind::Nullable(other_inner) => accepts_type_inner(inner, other_inner, seen),
            _ => accepts_type_inner(inner, &right, seen),
        },
        TypeKind::Array(element) => match right.kind() {
            TypeKind::Array(other_element) => accepts_type_inner(element, other_element, seen),
            TypeKind::Tuple(elements) => elements
                .iter()
                .all(|other_element| accepts_type_inner(element, other_element, seen)),
            _ => false,
        },
        TypeKind::Tuple(elements) => match right.kind() {
            TypeKind::Tuple(other_elements) if other_elements.len() >= elements.len() => elements
                .iter()
                .zip(other_elements.iter())
                .all(|(element, other_element)| accepts_type_inner(element, other_element, seen)),
            _ => false,
        },
        TypeKind::Object(object) => accepts_object(object, &right, seen),
        TypeKind::Function(_) => accepts_function(&left, &right, seen),
        TypeKind::Union(members) => members
            .iter()
            .any(|member| accepts_type_inner(member, &right, seen)),
        TypeKind::Intersection(members) => members
            .iter()
            .all(|member| accepts_type_inner(member, &right, seen)),
        TypeKind::Class(class) => match right.kind() {
            TypeKind::Class(other_class) => {
                class.name == other_class.name || extends_class(&right, &class.name, seen)
            }
            _ => false,
        },
        TypeKind::Nominal(name) => match right.kind() {
            TypeKind::Nominal(other_name) => name == other_name,
            TypeKind::Class(other_class) => {
                &other_class.name == name || extends_class(&right, name, seen)
            }
            _ => false,
        },
        TypeKind::Param(param) => {
            let constraint = param
                .recorded
                .borrow()
                .clone()
                .or_else(|| param.bound.borrow().clone());
            match constraint {
                Some(constraint) => accepts_type_inner(&constraint, &right, seen),
                None => true,
            }
        }
        _ => false,
    }
}

fn accepts_object(
    object: &ObjectType,
    right: &TypeRef,
    seen: &mut Vec<(usize, usize)>,
) -> bool {
    let other_members: Vec<ObjectMember> = match right.kind() {
        TypeKind::Object(other) => {
            // an exact object only admits shapes with no undeclared keys
            if object.exact {
                let declared: Vec<&str> = object
                    .members
                    .iter()
                    .filter_map(|member| member.key())
                    .collect();
                let has_extra = other.members.iter().any(|member| {
                    member
                        .key()
                        .is_some_and(|key| !declared.contains(&key))
                });
                if has_extra {
                    return false;
                }
            }
            other.members.clone()
        }
        TypeKind::Class(_) => match right.class_shape() {
            Some(shape) => shape.members,
            None => return false,
        },
        _ => return false,
    };

    for member in &object.members {
        match member {
            ObjectMember::Property {
                key,
                value,
                optional,
                is_static,
            } => {
                if *is_static {
                    continue;
                }
                let found = other_members.iter().find_map(|other_member| match other_member {
                    ObjectMember::Property {
                        key: other_key,
                        value: other_value,
                        ..
                    }
                    | ObjectMember::Method {
                        key: other_key,
                        value: other_value,
                        ..
                    } if other_key == key => Some(other_value.clone()),
                    _ => None,
                });
                match found {
                    Some(other_value) => {
                        if !accepts_type_inner(value, &other_value, seen) {
                            return false;
                        }
                    }
                    None => {
                        if !*optional {
                            return false;
                        }
                    }
                }
            }
            ObjectMember::Method { key, value, is_static } => {
                if *is_static {
                    continue;
                }
                let found = other_members.iter().find_map(|other_member| match other_member {
                    ObjectMember::Method {
                        key: other_key,
                        value: other_value,
                        ..
                    }
                    | ObjectMember::Property {
                        key: other_key,
                        value: other_value,
                        ..
                    } if other_key == key => Some(other_value.clone()),
                    _ => None,
                });
                match found {
                    Some(other_value) => {
                        if !accepts_type_inner(value, &other_value, seen) {
                            return false;
                        }
                    }
                    None => return false,
                }
            }
            ObjectMember::Indexer { value, .. } => {
                // every property the other side declares must fit the
                // indexer's value type
                for other_member in &other_members {
                    if let ObjectMember::Property {
                        value: other_value, ..
                    } = other_member
                    {
                        if !accepts_type_inner(value, other_value, seen) {
                            return false;
                        }
                    }
                }
            }
            ObjectMember::Call { value, .. } => {
                let found = other_members.iter().any(|other_member| {
                    matches!(other_member, ObjectMember::Call { value: other_value, .. }
                        if accepts_type_inner(value, other_value, seen))
                });
                if !found {
                    return false;
                }
            }
        }
    }
    true
}

/// Function compatibility: parameters are contravariant, the return type
/// covariant, and the other side may not require more parameters.
fn accepts_function(left: &TypeRef, right: &TypeRef, seen: &mut Vec<(usize, usize)>) -> bool {
    let (Some(mine), Some(theirs)) = (left.function_signature(), right.function_signature())
    else {
        return matches!(right.kind(), TypeKind::Function(_));
    };
    let required: usize = theirs
        .params
        .iter()
        .filter(|slot| match slot.kind() {
            TypeKind::Slot(slot) => !slot.optional,
            _ => true,
        })
        .count();
    if required > mine.params.len() {
        return false;
    }
    for (my_slot, their_slot) in mine.params.iter().zip(theirs.params.iter()) {
        let mine_ty = slot_type(my_slot);
        let theirs_ty = slot_type(their_slot);
        if !accepts_type_inner(&theirs_ty, &mine_ty, seen) {
            return false;
        }
    }
    match (slot_opt(&mine.ret), slot_opt(&theirs.ret)) {
        (Some(my_ret), Some(their_ret)) => accepts_type_inner(&my_ret, &their_ret, seen),
        (Some(my_ret), None) => matches!(my_ret.unwrap().kind(), TypeKind::Any | TypeKind::Void),
        (None, _) => true,
    }
}

fn slot_type(slot: &TypeRef) -> TypeRef {
    match slot.kind() {
        TypeKind::Slot(slot) => slot.ty.clone(),
        _ => slot.clone(),
    }
}

fn slot_opt(slot: &Option<TypeRef>) -> Option<TypeRef> {
    slot.as_ref().map(slot_type)
}

fn extends_class(class: &TypeRef, name: &str, seen: &mut Vec<(usize, usize)>) -> bool {
    let Some(shape) = class.class_shape() else {
        return false;
    };
    shape.supers.iter().any(|super_type| {
        let resolved = super_type.unwrap();
        match resolved.kind() {
            TypeKind::Class(super_class) => {
                super_class.name == name || extends_class(&resolved, name, seen)
            }
            TypeKind::Nominal(super_name) => super_name == name,
            _ => false,
        }
    })
}
