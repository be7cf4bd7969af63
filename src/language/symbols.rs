use crate::language::ast::*;
use crate::language::errors::SyntaxError;
use crate::language::span::Span;
use std::collections::{HashMap, HashSet};

/// How an identifier in annotation position resolves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    /// Declared by `type X = ...`, `interface X { ... }` or a `declare`
    /// form in this module.
    TypeAlias,
    /// Introduced by a parametric scope (alias, interface, function)
    /// enclosing the node.
    TypeParameter,
    /// Introduced on the enclosing class declaration; instance access
    /// routes through the per-instance store.
    ClassTypeParameter { class: String, is_static: bool },
    /// Unresolved; emitted as a string-keyed reference for late binding.
    External,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    Alias,
    Function,
    Class,
}

struct ScopeFrame {
    kind: ScopeKind,
    class: Option<String>,
    params: Vec<String>,
    is_static: bool,
}

/// Storage bindings generated for a parameterized class: a module-level
/// uid for static-method contexts and a symbol-key uid for per-instance
/// storage.
#[derive(Clone, Debug)]
pub struct ClassStore {
    pub type_parameters_uid: String,
    pub type_parameters_symbol_uid: String,
}

/// Symbol-table walker for one module. Classifies identifiers, allocates
/// uids for generated bindings, and accumulates converter diagnostics.
pub struct ConversionContext {
    module_types: HashMap<String, Span>,
    class_names: HashSet<String>,
    suppressed: HashSet<String>,
    scopes: Vec<ScopeFrame>,
    class_stores: HashMap<String, ClassStore>,
    used_uids: HashSet<String>,
    warnings: Vec<SyntaxError>,
    flowable: bool,
}

impl ConversionContext {
    /// Walks the module's top-level declarations into a symbol table.
    /// Duplicate type declarations are fatal.
    pub fn for_module(
        module: &Module,
        suppress_type_names: &[String],
    ) -> Result<Self, SyntaxError> {
        let mut context = Self {
            module_types: HashMap::new(),
            class_names: HashSet::new(),
            suppressed: suppress_type_names.iter().cloned().collect(),
            scopes: Vec::new(),
            class_stores: HashMap::new(),
            used_uids: HashSet::new(),
            warnings: Vec::new(),
            flowable: false,
        };
        context.collect_items(&module.items)?;
        for item in &module.items {
            context.reserve_item_names(item);
        }
        Ok(context)
    }

    fn collect_items(&mut self, items: &[Item]) -> Result<(), SyntaxError> {
        for item in items {
            match item {
                Item::TypeAlias(decl) => self.declare_type(&decl.name, decl.span, false)?,
                Item::Interface(decl) => self.declare_type(&decl.name, decl.span, false)?,
                Item::Class(decl) => self.declare_type(&decl.name, decl.span, true)?,
                Item::Declare(decl) => match decl {
                    DeclareDecl::TypeAlias(alias) => {
                        self.declare_type(&alias.name, alias.span, false)?
                    }
                    DeclareDecl::Class(class) => self.declare_type(&class.name, class.span, true)?,
                    DeclareDecl::Module { .. }
                    | DeclareDecl::ModuleExports { .. }
                    | DeclareDecl::Function { .. }
                    | DeclareDecl::Variable { .. } => {}
                },
                _ => {}
            }
        }
        Ok(())
    }

    fn declare_type(&mut self, name: &str, span: Span, is_class: bool) -> Result<(), SyntaxError> {
        if self.module_types.contains_key(name) {
            return Err(SyntaxError::duplicate_declaration(name, span));
        }
        self.module_types.insert(name.to_string(), span);
        if is_class {
            self.class_names.insert(name.to_string());
        }
        Ok(())
    }

    /// Class declarations register like aliases but their descriptor
    /// bindings are uids, so references emit string-keyed refs instead of
    /// bare identifiers.
    pub fn is_class_name(&self, name: &str) -> bool {
        self.class_names.contains(name)
    }

    /// Seeds the uid generator with names the module already binds so
    /// generated bindings never collide.
    fn reserve_item_names(&mut self, item: &Item) {
        match item {
            Item::Import(import) => {
                self.used_uids.insert(import.binding.clone());
            }
            Item::TypeAlias(decl) => {
                self.used_uids.insert(decl.name.clone());
            }
            Item::Interface(decl) => {
                self.used_uids.insert(decl.name.clone());
            }
            Item::Function(decl) => {
                self.used_uids.insert(decl.name.clone());
            }
            Item::Class(decl) => {
                self.used_uids.insert(decl.name.clone());
            }
            Item::Stmt(Stmt::Const(decl)) => {
                self.used_uids.insert(decl.name.clone());
            }
            _ => {}
        }
    }

    // --- scopes ---

    pub fn push_scope(&mut self, kind: ScopeKind, params: &[TypeParamDecl]) {
        self.scopes.push(ScopeFrame {
            kind,
            class: None,
            params: params.iter().map(|param| param.name.clone()).collect(),
            is_static: false,
        });
    }

    pub fn push_class_scope(&mut self, class: &str, params: &[TypeParamDecl], is_static: bool) {
        self.scopes.push(ScopeFrame {
            kind: ScopeKind::Class,
            class: Some(class.to_string()),
            params: params.iter().map(|param| param.name.clone()).collect(),
            is_static,
        });
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Lexical resolution: innermost scope first, then the module table.
    pub fn classify(&self, name: &str) -> Classification {
        for frame in self.scopes.iter().rev() {
            if frame.params.iter().any(|param| param == name) {
                return match frame.kind {
                    ScopeKind::Class => Classification::ClassTypeParameter {
                        class: frame.class.clone().unwrap_or_default(),
                        is_static: frame.is_static,
                    },
                    _ => Classification::TypeParameter,
                };
            }
        }
        if self.module_types.contains_key(name) {
            Classification::TypeAlias
        } else {
            Classification::External
        }
    }

    pub fn is_suppressed(&self, name: &str) -> bool {
        self.suppressed.contains(name)
    }

    // --- flowable positions ---

    pub fn in_flowable_position(&self) -> bool {
        self.flowable
    }

    /// Runs `f` with the flowable flag set; function parameters and class
    /// properties are the flowable positions.
    pub fn with_flowable<T>(&mut self, flowable: bool, f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = self.flowable;
        self.flowable = flowable;
        let result = f(self);
        self.flowable = previous;
        result
    }

    // --- generated names ---

    pub fn generate_uid(&mut self, base: &str) -> String {
        let mut candidate = format!("_{base}");
        let mut counter = 1;
        while self.used_uids.contains(&candidate) {
            counter += 1;
            candidate = format!("_{base}{counter}");
        }
        self.used_uids.insert(candidate.clone());
        candidate
    }

    /// The generated storage bindings for a parameterized class,
    /// allocated on first touch.
    pub fn class_store(&mut self, class: &str) -> ClassStore {
        if let Some(store) = self.class_stores.get(class) {
            return store.clone();
        }
        let store = ClassStore {
            type_parameters_uid: self.generate_uid(&format!("{class}TypeParameters")),
            type_parameters_symbol_uid: self
                .generate_uid(&format!("{class}TypeParametersSymbol")),
        };
        self.class_stores.insert(class.to_string(), store.clone());
        store
    }

    // --- diagnostics ---

    pub fn warn(&mut self, message: impl Into<String>, span: Span) {
        self.report(SyntaxError::new(message, span));
    }

    pub fn report(&mut self, error: SyntaxError) {
        self.warnings.push(error);
    }

    pub fn warnings(&self) -> &[SyntaxError] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<SyntaxError> {
        std::mem::take(&mut self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn module_with_alias() -> Module {
        Module {
            name: "fixtures".to_string(),
            path: PathBuf::from("fixtures.js"),
            items: vec![Item::TypeAlias(TypeAliasDecl {
                name: "Thing".to_string(),
                type_params: Vec::new(),
                body: Annotation::String(Span::empty()),
                span: Span::empty(),
            })],
        }
    }

    #[test]
    fn classifies_alias_params_and_externals() {
        let module = module_with_alias();
        let mut context = ConversionContext::for_module(&module, &[]).expect("symbols");
        assert_eq!(context.classify("Thing"), Classification::TypeAlias);
        assert_eq!(context.classify("Missing"), Classification::External);

        context.push_scope(
            ScopeKind::Function,
            &[TypeParamDecl {
                name: "T".to_string(),
                bound: None,
                span: Span::empty(),
            }],
        );
        assert_eq!(context.classify("T"), Classification::TypeParameter);
        context.pop_scope();
        assert_eq!(context.classify("T"), Classification::External);
    }

    #[test]
    fn class_params_resolve_through_class_scope() {
        let module = module_with_alias();
        let mut context = ConversionContext::for_module(&module, &[]).expect("symbols");
        context.push_class_scope(
            "Box",
            &[TypeParamDecl {
                name: "T".to_string(),
                bound: None,
                span: Span::empty(),
            }],
            false,
        );
        assert_eq!(
            context.classify("T"),
            Classification::ClassTypeParameter {
                class: "Box".to_string(),
                is_static: false,
            }
        );
    }

    #[test]
    fn duplicate_declarations_are_fatal() {
        let mut module = module_with_alias();
        module.items.push(Item::Interface(InterfaceDecl {
            name: "Thing".to_string(),
            type_params: Vec::new(),
            body: ObjectAnnotation {
                exact: false,
                members: Vec::new(),
                span: Span::empty(),
            },
            span: Span::empty(),
        }));
        assert!(ConversionContext::for_module(&module, &[]).is_err());
    }

    #[test]
    fn uids_avoid_module_bindings() {
        let module = Module {
            name: "fixtures".to_string(),
            path: PathBuf::from("fixtures.js"),
            items: vec![Item::Stmt(Stmt::Const(ConstDecl {
                name: "_returnType".to_string(),
                annotation: None,
                init: None,
                span: Span::empty(),
            }))],
        };
        let mut context = ConversionContext::for_module(&module, &[]).expect("symbols");
        assert_eq!(context.generate_uid("returnType"), "_returnType2");
    }
}
