use super::*;
use serde_json::{Value as Json, json};

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", render(self))
    }
}

fn format_number(value: f64) -> std::string::String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Renders the textual type syntax. The output parses back through
/// `language::parser::parse_annotation`.
fn render(ty: &TypeRef) -> std::string::String {
    match ty.kind() {
        TypeKind::Any => "any".to_string(),
        TypeKind::Mixed => "mixed".to_string(),
        TypeKind::Existential => "*".to_string(),
        TypeKind::Empty => "empty".to_string(),
        TypeKind::Void => "void".to_string(),
        TypeKind::NullLiteral => "null".to_string(),
        TypeKind::Number { literal } => match literal {
            Some(value) => format_number(*value),
            None => "number".to_string(),
        },
        TypeKind::String { literal } => match literal {
            Some(value) => format!("\"{value}\""),
            None => "string".to_string(),
        },
        TypeKind::Boolean { literal } => match literal {
            Some(value) => value.to_string(),
            None => "boolean".to_string(),
        },
        TypeKind::Symbol => "symbol".to_string(),
        TypeKind::Nullable(inner) => format!("?{}", render_atom(inner)),
        TypeKind::Array(element) => format!("Array<{}>", render(element)),
        TypeKind::Tuple(elements) => {
            let parts: Vec<_> = elements.iter().map(render).collect();
            format!("[{}]", parts.join(", "))
        }
        TypeKind::Object(object) => render_object(object),
        TypeKind::Function(_) => render_function(ty),
        TypeKind::Union(members) => {
            if members.is_empty() {
                return "empty".to_string();
            }
            let parts: Vec<_> = members.iter().map(render_atom).collect();
            parts.join(" | ")
        }
        TypeKind::Intersection(members) => {
            if members.is_empty() {
                return "mixed".to_string();
            }
            let parts: Vec<_> = members.iter().map(render_atom).collect();
            parts.join(" & ")
        }
        TypeKind::Ref(reference) => {
            let base = match &*reference.target.borrow() {
                RefTarget::Name(name) => name.clone(),
                RefTarget::Type(target) => render(target),
            };
            if reference.args.is_empty() {
                base
            } else {
                let parts: Vec<_> = reference.args.iter().map(render).collect();
                format!("{base}<{}>", parts.join(", "))
            }
        }
        TypeKind::Alias(alias) => alias.name.clone(),
        TypeKind::Class(class) => class.name.clone(),
        TypeKind::Nominal(name) => name.clone(),
        TypeKind::Box(boxed) => match boxed.resolved.borrow().clone() {
            Some(resolved) => render(&resolved),
            None => render(&ty.unwrap()),
        },
        TypeKind::Param(param) => param.id.clone(),
        TypeKind::FlowInto(inner) => render(inner),
        TypeKind::Partial(partial) => {
            let base = partial
                .target
                .name()
                .map(|name| name.to_string())
                .unwrap_or_else(|| render(&partial.target));
            if partial.args.is_empty() {
                base
            } else {
                let parts: Vec<_> = partial.args.iter().map(render).collect();
                format!("{base}<{}>", parts.join(", "))
            }
        }
        TypeKind::Module(module) => module.name.clone(),
        TypeKind::Slot(slot) => match slot.role {
            SlotRole::Param => {
                let marker = if slot.optional { "?" } else { "" };
                format!("{}{marker}: {}", slot.name, render(&slot.ty))
            }
            SlotRole::Rest => format!("...{}: {}", slot.name, render(&slot.ty)),
            SlotRole::Return => render(&slot.ty),
        },
    }
}

/// Wraps compound types in parentheses where the grammar needs it.
fn render_atom(ty: &TypeRef) -> std::string::String {
    match ty.kind() {
        TypeKind::Union(members) | TypeKind::Intersection(members) if members.len() > 1 => {
            format!("({})", render(ty))
        }
        TypeKind::Function(_) => format!("({})", render(ty)),
        _ => render(ty),
    }
}

fn render_object(object: &ObjectType) -> std::string::String {
    let mut parts = Vec::new();
    for member in &object.members {
        let is_static = member.is_static();
        let prefix = if is_static { "static " } else { "" };
        match member {
            ObjectMember::Property {
                key,
                value,
                optional,
                ..
            } => {
                let marker = if *optional { "?" } else { "" };
                parts.push(format!("{prefix}{key}{marker}: {}", render(value)));
            }
            ObjectMember::Method { key, value, .. } => {
                parts.push(format!("{prefix}{key}: {}", render(value)));
            }
            ObjectMember::Indexer { id, key, value } => {
                let name = id.clone().unwrap_or_else(|| "key".to_string());
                parts.push(format!("[{name}: {}]: {}", render(key), render(value)));
            }
            ObjectMember::Call { value, .. } => {
                parts.push(format!("{prefix}{}", render(value)));
            }
        }
    }
    if object.exact {
        if parts.is_empty() {
            "{| |}".to_string()
        } else {
            format!("{{| {} |}}", parts.join(", "))
        }
    } else if parts.is_empty() {
        "{}".to_string()
    } else {
        format!("{{ {} }}", parts.join(", "))
    }
}

fn render_function(ty: &TypeRef) -> std::string::String {
    let Some(signature) = ty.function_signature() else {
        return "() => any".to_string();
    };
    let type_params = ty.type_params();
    let mut out = std::string::String::new();
    if !type_params.is_empty() {
        let parts: Vec<_> = type_params
            .iter()
            .map(|param| match param.kind() {
                TypeKind::Param(param) => param.id.clone(),
                _ => render(param),
            })
            .collect();
        out.push_str(&format!("<{}>", parts.join(", ")));
    }
    let mut parts: Vec<_> = signature.params.iter().map(render).collect();
    if let Some(rest) = &signature.rest {
        parts.push(render(rest));
    }
    out.push_str(&format!("({})", parts.join(", ")));
    out.push_str(" => ");
    match &signature.ret {
        Some(ret) => out.push_str(&render(ret)),
        None => out.push_str("any"),
    }
    out
}

impl TypeRef {
    /// A JSON tree describing the descriptor. Named descriptors already
    /// seen are emitted as references so recursive types terminate.
    pub fn to_json(&self) -> Json {
        let mut seen = Vec::new();
        to_json_inner(self, &mut seen)
    }
}

fn to_json_inner(ty: &TypeRef, seen: &mut Vec<usize>) -> Json {
    let tag = ty.type_name();
    if seen.contains(&ty.addr()) {
        return match ty.name() {
            Some(name) => json!({ "typeName": "ref", "name": name }),
            None => json!({ "typeName": tag }),
        };
    }
    seen.push(ty.addr());
    let out = match ty.kind() {
        TypeKind::Number { literal } => match literal {
            Some(value) => json!({ "typeName": "numberLiteral", "value": value }),
            None => json!({ "typeName": tag }),
        },
        TypeKind::String { literal } => match literal {
            Some(value) => json!({ "typeName": "stringLiteral", "value": value }),
            None => json!({ "typeName": tag }),
        },
        TypeKind::Boolean { literal } => match literal {
            Some(value) => json!({ "typeName": "booleanLiteral", "value": value }),
            None => json!({ "typeName": tag }),
        },
        TypeKind::Nullable(inner) => {
            json!({ "typeName": tag, "type": to_json_inner(inner, seen) })
        }
        TypeKind::Array(element) => {
            json!({ "typeName": tag, "elementType": to_json_inner(element, seen) })
        }
        TypeKind::Tuple(elements) => {
            let parts: Vec<_> = elements
                .iter()
                .map(|element| to_json_inner(element, seen))
                .collect();
            json!({ "typeName": tag, "types": parts })
        }
        TypeKind::Object(object) => {
            let members: Vec<_> = object
                .members
                .iter()
                .map(|member| member_to_json(member, seen))
                .collect();
            json!({ "typeName": tag, "exact": object.exact, "properties": members })
        }
        TypeKind::Function(_) => {
            let signature = ty.function_signature().unwrap_or_default();
            let params: Vec<_> = signature
                .params
                .iter()
                .map(|param| to_json_inner(param, seen))
                .collect();
            json!({
                "typeName": tag,
                "params": params,
                "rest": signature.rest.as_ref().map(|rest| to_json_inner(rest, seen)),
                "returnType": signature.ret.as_ref().map(|ret| to_json_inner(ret, seen)),
            })
        }
        TypeKind::Union(members) | TypeKind::Intersection(members) => {
            let parts: Vec<_> = members
                .iter()
                .map(|member| to_json_inner(member, seen))
                .collect();
            json!({ "typeName": tag, "types": parts })
        }
        TypeKind::Ref(reference) => match &*reference.target.borrow() {
            RefTarget::Name(name) => json!({ "typeName": tag, "name": name }),
            RefTarget::Type(target) => {
                json!({ "typeName": tag, "type": to_json_inner(target, seen) })
            }
        },
        TypeKind::Alias(alias) => {
            let body = ty.alias_body().map(|body| to_json_inner(&body, seen));
            json!({ "typeName": tag, "name": alias.name, "type": body })
        }
        TypeKind::Class(class) => {
            json!({ "typeName": tag, "name": class.name })
        }
        TypeKind::Nominal(name) => json!({ "typeName": tag, "name": name }),
        TypeKind::Box(_) => to_json_inner(&ty.unwrap(), seen),
        TypeKind::Param(param) => {
            json!({
                "typeName": tag,
                "id": param.id,
                "bound": param.bound.borrow().as_ref().map(|bound| to_json_inner(bound, seen)),
                "recorded": param
                    .recorded
                    .borrow()
                    .as_ref()
                    .map(|recorded| to_json_inner(recorded, seen)),
            })
        }
        TypeKind::FlowInto(inner) => {
            json!({ "typeName": tag, "type": to_json_inner(inner, seen) })
        }
        TypeKind::Partial(partial) => {
            let args: Vec<_> = partial
                .args
                .iter()
                .map(|arg| to_json_inner(arg, seen))
                .collect();
            json!({
                "typeName": tag,
                "type": to_json_inner(&partial.target, seen),
                "typeInstances": args,
            })
        }
        TypeKind::Module(module) => json!({ "typeName": tag, "name": module.name }),
        TypeKind::Slot(slot) => {
            json!({
                "typeName": slot_tag(slot.role),
                "name": slot.name,
                "optional": slot.optional,
                "type": to_json_inner(&slot.ty, seen),
            })
        }
        _ => json!({ "typeName": tag }),
    };
    seen.pop();
    out
}

fn slot_tag(role: SlotRole) -> &'static str {
    match role {
        SlotRole::Param => "param",
        SlotRole::Rest => "rest",
        SlotRole::Return => "return",
    }
}

fn member_to_json(member: &ObjectMember, seen: &mut Vec<usize>) -> Json {
    match member {
        ObjectMember::Property {
            key,
            value,
            optional,
            is_static,
        } => json!({
            "typeName": "property",
            "key": key,
            "optional": optional,
            "static": is_static,
            "type": to_json_inner(value, seen),
        }),
        ObjectMember::Method {
            key,
            value,
            is_static,
        } => json!({
            "typeName": "method",
            "key": key,
            "static": is_static,
            "type": to_json_inner(value, seen),
        }),
        ObjectMember::Indexer { id, key, value } => json!({
            "typeName": "indexer",
            "id": id,
            "key": to_json_inner(key, seen),
            "type": to_json_inner(value, seen),
        }),
        ObjectMember::Call { value, is_static } => json!({
            "typeName": "callProperty",
            "static": is_static,
            "type": to_json_inner(value, seen),
        }),
    }
}
