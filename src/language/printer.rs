use crate::language::ast::*;

/// Renders transformed host AST back to source text. Two-space indent,
/// one statement per line.
pub fn print_module(module: &Module) -> String {
    let mut out = String::new();
    for (idx, item) in module.items.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        write_item(&mut out, item, 0);
    }
    out
}

pub fn print_expr(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr, 0);
    out
}

pub fn print_stmts(stmts: &[Stmt]) -> String {
    let mut out = String::new();
    for stmt in stmts {
        write_stmt(&mut out, stmt, 0);
    }
    out
}

fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

fn write_item(out: &mut String, item: &Item, level: usize) {
    match item {
        Item::Import(import) => {
            indent(out, level);
            out.push_str(&format!(
                "import {} from \"{}\";\n",
                import.binding, import.source
            ));
        }
        Item::TypeAlias(decl) => {
            indent(out, level);
            out.push_str(&format!(
                "type {}{} = {};\n",
                decl.name,
                format_type_params(&decl.type_params),
                print_annotation(&decl.body)
            ));
        }
        Item::Interface(decl) => {
            indent(out, level);
            out.push_str(&format!(
                "interface {}{} {}\n",
                decl.name,
                format_type_params(&decl.type_params),
                print_annotation(&Annotation::Object(decl.body.clone()))
            ));
        }
        Item::Function(decl) => write_function(out, decl, level, "function "),
        Item::Class(decl) => write_class(out, decl, level),
        Item::Declare(decl) => write_declare(out, decl, level),
        Item::Stmt(stmt) => write_stmt(out, stmt, level),
    }
}

fn write_declare(out: &mut String, decl: &DeclareDecl, level: usize) {
    indent(out, level);
    match decl {
        DeclareDecl::Module { name, items, .. } => {
            out.push_str(&format!("declare module \"{name}\" {{\n"));
            for item in items {
                write_item(out, item, level + 1);
            }
            indent(out, level);
            out.push_str("}\n");
        }
        DeclareDecl::ModuleExports { annotation, .. } => {
            out.push_str(&format!(
                "declare module.exports: {};\n",
                print_annotation(annotation)
            ));
        }
        DeclareDecl::Function { name, annotation, .. } => {
            out.push_str(&format!(
                "declare function {name}: {};\n",
                print_annotation(&Annotation::Function(annotation.clone()))
            ));
        }
        DeclareDecl::Variable { name, annotation, .. } => {
            out.push_str(&format!(
                "declare var {name}: {};\n",
                print_annotation(annotation)
            ));
        }
        DeclareDecl::TypeAlias(alias) => {
            out.push_str(&format!(
                "declare type {}{} = {};\n",
                alias.name,
                format_type_params(&alias.type_params),
                print_annotation(&alias.body)
            ));
        }
        DeclareDecl::Class(class) => {
            out.push_str(&format!(
                "declare class {}{} {{}}\n",
                class.name,
                format_type_params(&class.type_params)
            ));
        }
    }
}

fn write_function(out: &mut String, decl: &FunctionDecl, level: usize, keyword: &str) {
    indent(out, level);
    out.push_str(keyword);
    out.push_str(&decl.name);
    out.push_str(&format_type_params(&decl.type_params));
    out.push('(');
    out.push_str(&format_params(&decl.params));
    out.push(')');
    if let Some(ret) = &decl.return_annotation {
        out.push_str(&format!(": {}", print_annotation(ret)));
    }
    out.push_str(" {\n");
    for stmt in &decl.body {
        write_stmt(out, stmt, level + 1);
    }
    indent(out, level);
    out.push_str("}\n");
}

fn write_class(out: &mut String, decl: &ClassDecl, level: usize) {
    indent(out, level);
    out.push_str(&format!(
        "class {}{}",
        decl.name,
        format_type_params(&decl.type_params)
    ));
    if let Some(superclass) = &decl.superclass {
        out.push_str(&format!(" extends {}", superclass.name.dotted()));
        if !superclass.type_args.is_empty() {
            let args: Vec<_> = superclass.type_args.iter().map(print_annotation).collect();
            out.push_str(&format!("<{}>", args.join(", ")));
        }
    }
    out.push_str(" {\n");
    for member in &decl.members {
        match member {
            ClassMemberDecl::Property {
                name,
                annotation,
                value,
                is_static,
                ..
            } => {
                indent(out, level + 1);
                if *is_static {
                    out.push_str("static ");
                }
                out.push_str(name);
                if let Some(annotation) = annotation {
                    out.push_str(&format!(": {}", print_annotation(annotation)));
                }
                if let Some(value) = value {
                    out.push_str(" = ");
                    write_expr(out, value, level + 1);
                }
                out.push_str(";\n");
            }
            ClassMemberDecl::Method { def, is_static, .. } => {
                let keyword = if *is_static { "static " } else { "" };
                write_function(out, def, level + 1, keyword);
            }
        }
    }
    indent(out, level);
    out.push_str("}\n");
}

fn format_type_params(params: &[TypeParamDecl]) -> String {
    if params.is_empty() {
        return String::new();
    }
    let parts: Vec<_> = params
        .iter()
        .map(|param| match &param.bound {
            Some(bound) => format!("{}: {}", param.name, print_annotation(bound)),
            None => param.name.clone(),
        })
        .collect();
    format!("<{}>", parts.join(", "))
}

fn format_params(params: &[ParamDecl]) -> String {
    let parts: Vec<_> = params
        .iter()
        .map(|param| {
            let mut out = String::new();
            if param.rest {
                out.push_str("...");
            }
            out.push_str(&param.name);
            if param.optional {
                out.push('?');
            }
            if let Some(annotation) = &param.annotation {
                out.push_str(&format!(": {}", print_annotation(annotation)));
            }
            out
        })
        .collect();
    parts.join(", ")
}

fn write_stmt(out: &mut String, stmt: &Stmt, level: usize) {
    indent(out, level);
    match stmt {
        Stmt::Const(decl) => {
            out.push_str("const ");
            out.push_str(&decl.name);
            if let Some(annotation) = &decl.annotation {
                out.push_str(&format!(": {}", print_annotation(annotation)));
            }
            if let Some(init) = &decl.init {
                out.push_str(" = ");
                write_expr(out, init, level);
            }
            out.push_str(";\n");
        }
        Stmt::Expr(expr) => {
            write_expr(out, expr, level);
            out.push_str(";\n");
        }
        Stmt::Return { value, .. } => {
            out.push_str("return");
            if let Some(value) = value {
                out.push(' ');
                write_expr(out, value, level);
            }
            out.push_str(";\n");
        }
        Stmt::Assign { target, value, .. } => {
            write_expr(out, target, level);
            out.push_str(" = ");
            write_expr(out, value, level);
            out.push_str(";\n");
        }
    }
}

fn write_expr(out: &mut String, expr: &Expr, level: usize) {
    match expr {
        Expr::Identifier(id) => out.push_str(&id.name),
        Expr::StringLit(value, _) => {
            out.push_str(&format!("\"{}\"", value.replace('"', "\\\"")));
        }
        Expr::NumberLit(value, _) => out.push_str(&format_number(*value)),
        Expr::BooleanLit(value, _) => out.push_str(&value.to_string()),
        Expr::NullLit(_) => out.push_str("null"),
        Expr::UndefinedLit(_) => out.push_str("undefined"),
        Expr::This(_) => out.push_str("this"),
        Expr::Member {
            object,
            property,
            computed,
            ..
        } => {
            write_expr(out, object, level);
            if *computed {
                out.push_str(&format!("[{property}]"));
            } else {
                out.push_str(&format!(".{property}"));
            }
        }
        Expr::Call { callee, args, .. } => {
            write_expr(out, callee, level);
            write_args(out, args, level);
        }
        Expr::New { callee, args, .. } => {
            out.push_str("new ");
            write_expr(out, callee, level);
            write_args(out, args, level);
        }
        Expr::Arrow { params, body, .. } => {
            match params.as_slice() {
                [single] => out.push_str(single),
                _ => out.push_str(&format!("({})", params.join(", "))),
            }
            out.push_str(" => ");
            match body {
                ArrowBody::Expr(expr) => write_expr(out, expr, level),
                ArrowBody::Block(stmts) => {
                    out.push_str("{\n");
                    for stmt in stmts {
                        write_stmt(out, stmt, level + 1);
                    }
                    indent(out, level);
                    out.push('}');
                }
            }
        }
        Expr::ArrayLit(items, _) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push_str(", ");
                }
                write_expr(out, item, level);
            }
            out.push(']');
        }
        Expr::ObjectLit(entries, _) => {
            if entries.is_empty() {
                out.push_str("{}");
                return;
            }
            out.push_str("{ ");
            for (idx, (key, value)) in entries.iter().enumerate() {
                if idx > 0 {
                    out.push_str(", ");
                }
                out.push_str(&format!("{key}: "));
                write_expr(out, value, level);
            }
            out.push_str(" }");
        }
    }
}

fn write_args(out: &mut String, args: &[Expr], level: usize) {
    out.push('(');
    for (idx, arg) in args.iter().enumerate() {
        if idx > 0 {
            out.push_str(", ");
        }
        write_expr(out, arg, level);
    }
    out.push(')');
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Renders an annotation in the textual type syntax.
pub fn print_annotation(annotation: &Annotation) -> String {
    match annotation {
        Annotation::Any(_) => "any".to_string(),
        Annotation::Mixed(_) => "mixed".to_string(),
        Annotation::Empty(_) => "empty".to_string(),
        Annotation::Void(_) => "void".to_string(),
        Annotation::Existential(_) => "*".to_string(),
        Annotation::NullLiteral(_) => "null".to_string(),
        Annotation::Number(_) => "number".to_string(),
        Annotation::NumberLiteral { value, .. } => format_number(*value),
        Annotation::String(_) => "string".to_string(),
        Annotation::StringLiteral { value, .. } => format!("\"{value}\""),
        Annotation::Boolean(_) => "boolean".to_string(),
        Annotation::BooleanLiteral { value, .. } => value.to_string(),
        Annotation::Symbol(_) => "symbol".to_string(),
        Annotation::Nullable { inner, .. } => format!("?{}", print_annotation_atom(inner)),
        Annotation::Array { element, .. } => format!("{}[]", print_annotation_atom(element)),
        Annotation::Tuple { elements, .. } => {
            let parts: Vec<_> = elements.iter().map(print_annotation).collect();
            format!("[{}]", parts.join(", "))
        }
        Annotation::Object(object) => print_object_annotation(object),
        Annotation::Function(function) => print_function_annotation(function, " => "),
        Annotation::Union { members, .. } => {
            let parts: Vec<_> = members.iter().map(print_annotation_atom).collect();
            parts.join(" | ")
        }
        Annotation::Intersection { members, .. } => {
            let parts: Vec<_> = members.iter().map(print_annotation_atom).collect();
            parts.join(" & ")
        }
        Annotation::Generic { id, args, .. } => {
            if args.is_empty() {
                id.dotted()
            } else {
                let parts: Vec<_> = args.iter().map(print_annotation).collect();
                format!("{}<{}>", id.dotted(), parts.join(", "))
            }
        }
        Annotation::Typeof { target, .. } => format!("typeof {}", target.dotted()),
        Annotation::Unknown { kind, .. } => format!("/* {kind} */ any"),
    }
}

fn print_annotation_atom(annotation: &Annotation) -> String {
    match annotation {
        Annotation::Union { members, .. } | Annotation::Intersection { members, .. }
            if members.len() > 1 =>
        {
            format!("({})", print_annotation(annotation))
        }
        Annotation::Function(_) => format!("({})", print_annotation(annotation)),
        _ => print_annotation(annotation),
    }
}

fn print_object_annotation(object: &ObjectAnnotation) -> String {
    let mut parts = Vec::new();
    for member in &object.members {
        match member {
            ObjectAnnotationMember::Property {
                key,
                value,
                optional,
                is_static,
                ..
            } => {
                let prefix = if *is_static { "static " } else { "" };
                let marker = if *optional { "?" } else { "" };
                parts.push(format!("{prefix}{key}{marker}: {}", print_annotation(value)));
            }
            ObjectAnnotationMember::Method {
                key,
                value,
                is_static,
                ..
            } => {
                let prefix = if *is_static { "static " } else { "" };
                parts.push(format!(
                    "{prefix}{key}{}",
                    print_function_annotation(value, ": ")
                ));
            }
            ObjectAnnotationMember::Indexer { id, key, value, .. } => {
                let name = id.clone().unwrap_or_else(|| "key".to_string());
                parts.push(format!(
                    "[{name}: {}]: {}",
                    print_annotation(key),
                    print_annotation(value)
                ));
            }
            ObjectAnnotationMember::Call { value, .. } => {
                parts.push(print_function_annotation(value, " => "));
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

fn print_function_annotation(function: &FunctionAnnotation, ret_separator: &str) -> String {
    let mut out = String::new();
    out.push_str(&format_type_params(&function.type_params));
    let mut parts: Vec<_> = function
        .params
        .iter()
        .map(|param| {
            let marker = if param.optional { "?" } else { "" };
            match &param.name {
                Some(name) => format!("{name}{marker}: {}", print_annotation(&param.annotation)),
                None => print_annotation(&param.annotation),
            }
        })
        .collect();
    if let Some(rest) = &function.rest {
        let name = rest.name.clone().unwrap_or_else(|| "rest".to_string());
        parts.push(format!("...{name}: {}", print_annotation(&rest.annotation)));
    }
    out.push_str(&format!("({})", parts.join(", ")));
    out.push_str(ret_separator);
    out.push_str(&print_annotation(&function.return_annotation));
    out
}
