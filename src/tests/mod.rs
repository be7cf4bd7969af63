mod laws;
mod scenarios;
mod transform_e2e;

use crate::runtime::value::{ArrayValue, ObjectValue, Value};

pub(crate) fn num(value: f64) -> Value {
    Value::Number(value)
}

pub(crate) fn s(value: &str) -> Value {
    Value::string(value)
}

pub(crate) fn arr(items: Vec<Value>) -> Value {
    Value::Array(ArrayValue::from_vec(items))
}

pub(crate) fn obj(entries: Vec<(&str, Value)>) -> Value {
    Value::Object(ObjectValue::from_entries(
        entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect(),
    ))
}
