use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A value of the checked (dynamically-typed) language. Compound values
/// share storage through `Rc<RefCell<...>>` so that clones observe the same
/// underlying data, matching host-language aliasing.
#[derive(Clone, Debug)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Symbol(SymbolValue),
    Array(ArrayValue),
    Object(ObjectValue),
    Function(FunctionValue),
    Instance(InstanceValue),
    Map(MapValue),
    Set(SetValue),
}

impl Value {
    pub fn string(value: impl Into<String>) -> Value {
        Value::String(value.into())
    }

    pub fn number(value: impl Into<f64>) -> Value {
        Value::Number(value.into())
    }

    /// The `typeof`-style tag used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Instance(_) => "instance",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    /// Object-like values expose named properties: plain objects, class
    /// instances, and functions (which may carry properties of their own).
    pub fn properties(&self) -> Option<Rc<RefCell<IndexMap<String, Value>>>> {
        match self {
            Value::Object(object) => Some(object.entries.clone()),
            Value::Instance(instance) => Some(instance.fields.clone()),
            Value::Function(function) => Some(function.properties.clone()),
            _ => None,
        }
    }

    pub fn get_property(&self, key: &str) -> Option<Value> {
        self.properties()
            .and_then(|props| props.borrow().get(key).cloned())
    }
}

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Debug)]
pub struct SymbolValue {
    pub description: Option<String>,
    id: u64,
}

impl SymbolValue {
    pub fn new(description: Option<String>) -> Self {
        Self {
            description,
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::SeqCst),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Clone, Debug)]
pub struct ArrayValue {
    pub items: Rc<RefCell<Vec<Value>>>,
    frozen: Rc<Cell<bool>>,
}

impl ArrayValue {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self {
            items: Rc::new(RefCell::new(items)),
            frozen: Rc::new(Cell::new(false)),
        }
    }

    pub fn push(&self, value: Value) {
        self.items.borrow_mut().push(value);
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.borrow().get(index).cloned()
    }

    pub fn freeze(&self) {
        self.frozen.set(true);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }
}

impl Default for ArrayValue {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct ObjectValue {
    pub entries: Rc<RefCell<IndexMap<String, Value>>>,
}

impl ObjectValue {
    pub fn new() -> Self {
        Self {
            entries: Rc::new(RefCell::new(IndexMap::new())),
        }
    }

    pub fn from_entries(entries: Vec<(String, Value)>) -> Self {
        let object = Self::new();
        for (key, value) in entries {
            object.set(key, value);
        }
        object
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.entries.borrow_mut().insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.borrow().get(key).cloned()
    }
}

impl Default for ObjectValue {
    fn default() -> Self {
        Self::new()
    }
}

/// A callable value. Only the shape is retained; bodies live in the host.
#[derive(Clone, Debug)]
pub struct FunctionValue {
    pub name: Option<String>,
    pub arity: usize,
    pub properties: Rc<RefCell<IndexMap<String, Value>>>,
}

impl FunctionValue {
    pub fn new(name: Option<String>, arity: usize) -> Self {
        Self {
            name,
            arity,
            properties: Rc::new(RefCell::new(IndexMap::new())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct InstanceValue {
    pub class_name: String,
    /// Superclass chain, nearest first.
    pub supers: Vec<String>,
    pub fields: Rc<RefCell<IndexMap<String, Value>>>,
}

impl InstanceValue {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            supers: Vec::new(),
            fields: Rc::new(RefCell::new(IndexMap::new())),
        }
    }

    pub fn with_supers(mut self, supers: Vec<String>) -> Self {
        self.supers = supers;
        self
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.fields.borrow_mut().insert(key.into(), value);
    }

    pub fn is_instance_of(&self, class_name: &str) -> bool {
        self.class_name == class_name || self.supers.iter().any(|name| name == class_name)
    }
}

#[derive(Clone, Debug)]
pub struct MapValue {
    pub entries: Rc<RefCell<BTreeMap<String, Value>>>,
}

impl MapValue {
    pub fn new() -> Self {
        Self {
            entries: Rc::new(RefCell::new(BTreeMap::new())),
        }
    }

    pub fn insert(&self, key: String, value: Value) {
        self.entries.borrow_mut().insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl Default for MapValue {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct SetValue {
    pub items: Rc<RefCell<Vec<Value>>>,
}

impl SetValue {
    pub fn new() -> Self {
        Self {
            items: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl Default for SetValue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Number(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "\"{v}\""),
            Value::Symbol(symbol) => match &symbol.description {
                Some(description) => write!(f, "Symbol({description})"),
                None => write!(f, "Symbol()"),
            },
            Value::Array(array) => {
                write!(f, "[")?;
                for (idx, value) in array.items.borrow().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
            Value::Object(object) => {
                write!(f, "{{")?;
                for (idx, (key, value)) in object.entries.borrow().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Value::Function(function) => match &function.name {
                Some(name) => write!(f, "[function {name}]"),
                None => write!(f, "[function]"),
            },
            Value::Instance(instance) => {
                write!(f, "{} {{", instance.class_name)?;
                for (idx, (key, value)) in instance.fields.borrow().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {key}: {value}")?;
                }
                write!(f, " }}")
            }
            Value::Map(map) => write!(f, "[map of {}]", map.entries.borrow().len()),
            Value::Set(set) => write!(f, "[set of {}]", set.items.borrow().len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_object_storage() {
        let object = ObjectValue::new();
        let value = Value::Object(object.clone());
        let alias = value.clone();
        object.set("id", Value::number(1.0));
        assert!(alias.get_property("id").is_some());
    }

    #[test]
    fn instance_of_walks_super_chain() {
        let instance =
            InstanceValue::new("SortedList").with_supers(vec!["List".to_string(), "Base".to_string()]);
        assert!(instance.is_instance_of("SortedList"));
        assert!(instance.is_instance_of("Base"));
        assert!(!instance.is_instance_of("Map"));
    }

    #[test]
    fn frozen_flag_is_shared() {
        let array = ArrayValue::from_vec(vec![Value::number(1.0)]);
        let clone = array.clone();
        array.freeze();
        assert!(clone.is_frozen());
    }
}
