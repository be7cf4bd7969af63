use super::*;
use crate::runtime::validation::PathSegment;

impl TypeRef {
    /// Structural check. Records `(path, expected, actual)` for every
    /// mismatch and returns whether the check failed. Composite members
    /// are visited in declared order.
    pub fn collect_errors(
        &self,
        validation: &mut Validation,
        path: &mut Vec<PathSegment>,
        value: &Value,
    ) -> bool {
        match self.kind() {
            TypeKind::Any | TypeKind::Mixed | TypeKind::Existential => false,
            TypeKind::Empty => self.fail(validation, path, value),
            TypeKind::Void => match value {
                Value::Undefined => false,
                _ => self.fail(validation, path, value),
            },
            TypeKind::NullLiteral => match value {
                Value::Null => false,
                _ => self.fail(validation, path, value),
            },
            TypeKind::Number { literal } => match (value, literal) {
                (Value::Number(_), None) => false,
                (Value::Number(actual), Some(expected)) if actual == expected => false,
                _ => self.fail(validation, path, value),
            },
            TypeKind::String { literal } => match (value, literal) {
                (Value::String(_), None) => false,
                (Value::String(actual), Some(expected)) if actual == expected => false,
                _ => self.fail(validation, path, value),
            },
            TypeKind::Boolean { literal } => match (value, literal) {
                (Value::Bool(_), None) => false,
                (Value::Bool(actual), Some(expected)) if actual == expected => false,
                _ => self.fail(validation, path, value),
            },
            TypeKind::Symbol => match value {
                Value::Symbol(_) => false,
                _ => self.fail(validation, path, value),
            },
            TypeKind::Nullable(inner) => {
                if value.is_nullish() {
                    false
                } else {
                    inner.collect_errors(validation, path, value)
                }
            }
            TypeKind::Array(element) => match value {
                Value::Array(array) => {
                    let items = array.items.borrow().clone();
                    let mut failed = false;
                    for (index, item) in items.iter().enumerate() {
                        path.push(PathSegment::Index(index));
                        failed |= element.collect_errors(validation, path, item);
                        path.pop();
                    }
                    failed
                }
                _ => self.fail(validation, path, value),
            },
            TypeKind::Tuple(elements) => match value {
                Value::Array(array) if array.len() >= elements.len() => {
                    let items = array.items.borrow().clone();
                    let mut failed = false;
                    for (index, element) in elements.iter().enumerate() {
                        path.push(PathSegment::Index(index));
                        failed |= element.collect_errors(validation, path, &items[index]);
                        path.pop();
                    }
                    failed
                }
                _ => self.fail(validation, path, value),
            },
            TypeKind::Object(object) => self.check_object(object, validation, path, value),
            TypeKind::Function(_) => {
                if value.is_callable() {
                    false
                } else {
                    self.fail(validation, path, value)
                }
            }
            TypeKind::Union(members) => self.check_union(members, validation, path, value),
            TypeKind::Intersection(members) => {
                for member in members {
                    if member.collect_errors(validation, path, value) {
                        return true;
                    }
                }
                false
            }
            TypeKind::Ref(reference) => match self.resolve_ref(reference) {
                Some(target) => target.collect_errors(validation, path, value),
                // late-bound name that never arrived: degrade to `any`
                None => false,
            },
            TypeKind::Alias(_) => match self.alias_body() {
                Some(body) => body.collect_errors(validation, path, value),
                None => false,
            },
            TypeKind::Class(_) => self.check_class(validation, path, value),
            TypeKind::Nominal(name) => self.check_nominal(name, validation, path, value),
            TypeKind::Box(boxed) => {
                let resolved = self.force_box(boxed);
                resolved.collect_errors(validation, path, value)
            }
            TypeKind::Param(param) => {
                param::param_collect_errors(self, param, validation, path, value)
            }
            TypeKind::FlowInto(inner) => param::flow_collect_errors(inner, validation, path, value),
            TypeKind::Partial(partial) => partial.target.collect_errors(validation, path, value),
            TypeKind::Module(module) => match module.exports() {
                Some(exports) => exports.collect_errors(validation, path, value),
                None => false,
            },
            TypeKind::Slot(slot) => {
                match slot.role {
                    SlotRole::Param | SlotRole::Rest => {
                        path.push(PathSegment::Param(slot.name.clone()))
                    }
                    SlotRole::Return => path.push(PathSegment::Return),
                }
                let failed = if slot.optional && value.is_nullish() {
                    false
                } else {
                    slot.ty.collect_errors(validation, path, value)
                };
                path.pop();
                failed
            }
        }
    }

    fn fail(&self, validation: &mut Validation, path: &[PathSegment], value: &Value) -> bool {
        validation.record(path, self.clone(), value);
        true
    }

    fn check_object(
        &self,
        object: &ObjectType,
        validation: &mut Validation,
        path: &mut Vec<PathSegment>,
        value: &Value,
    ) -> bool {
        let Some(props) = value.properties() else {
            return self.fail(validation, path, value);
        };
        let entries: Vec<(std::string::String, Value)> = props
            .borrow()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let mut failed = false;
        let mut declared: Vec<&str> = Vec::new();
        let mut indexers: Vec<(&TypeRef, &TypeRef)> = Vec::new();

        for member in &object.members {
            if member.is_static() {
                continue;
            }
            match member {
                ObjectMember::Property {
                    key,
                    value: expected,
                    optional,
                    ..
                } => {
                    declared.push(key.as_str());
                    let own = value.get_property(key);
                    match own {
                        None => {
                            if !*optional {
                                path.push(PathSegment::Key(key.clone()));
                                validation.record(path, expected.clone(), &Value::Undefined);
                                path.pop();
                                failed = true;
                            }
                        }
                        Some(actual) => {
                            if *optional && actual.is_nullish() {
                                continue;
                            }
                            path.push(PathSegment::Key(key.clone()));
                            failed |= expected.collect_errors(validation, path, &actual);
                            path.pop();
                        }
                    }
                }
                ObjectMember::Method {
                    key,
                    value: expected,
                    ..
                } => {
                    declared.push(key.as_str());
                    let own = value.get_property(key);
                    path.push(PathSegment::Key(key.clone()));
                    match own {
                        None => {
                            validation.record(path, expected.clone(), &Value::Undefined);
                            failed = true;
                        }
                        Some(actual) => {
                            failed |= expected.collect_errors(validation, path, &actual);
                        }
                    }
                    path.pop();
                }
                ObjectMember::Indexer {
                    key: key_type,
                    value: value_type,
                    ..
                } => indexers.push((key_type, value_type)),
                ObjectMember::Call { value: expected, .. } => {
                    if !value.is_callable() {
                        validation.record(path, expected.clone(), value);
                        failed = true;
                    }
                }
            }
        }

        for (key, own_value) in &entries {
            if declared.iter().any(|declared_key| *declared_key == key.as_str()) {
                continue;
            }
            if !indexers.is_empty() {
                let mut matched = false;
                for (key_type, value_type) in &indexers {
                    if !indexer_key_accepts(key_type, key) {
                        continue;
                    }
                    matched = true;
                    path.push(PathSegment::Key(key.clone()));
                    failed |= value_type.collect_errors(validation, path, own_value);
                    path.pop();
                    break;
                }
                if !matched && object.exact {
                    path.push(PathSegment::Key(key.clone()));
                    validation.record(path, self.clone(), own_value);
                    path.pop();
                    failed = true;
                }
            } else if object.exact {
                path.push(PathSegment::Key(key.clone()));
                validation.record(path, self.clone(), own_value);
                path.pop();
                failed = true;
            }
        }

        failed
    }

    fn check_union(
        &self,
        members: &[TypeRef],
        validation: &mut Validation,
        path: &mut Vec<PathSegment>,
        value: &Value,
    ) -> bool {
        let mark = validation.len();
        for member in members {
            if !member.collect_errors(validation, path, value) {
                validation.truncate(mark);
                return false;
            }
        }
        // All branches failed; their speculative records are dropped.
        // When exactly one branch matches the value's coarse shape,
        // descend into it for precise nested paths; otherwise report the
        // union itself.
        validation.truncate(mark);
        let candidates: Vec<usize> = members
            .iter()
            .enumerate()
            .filter(|(_, member)| member.matches_shallow(value))
            .map(|(index, _)| index)
            .collect();
        if let [index] = candidates.as_slice() {
            path.push(PathSegment::Branch(*index));
            members[*index].collect_errors(validation, path, value);
            path.pop();
            return true;
        }
        self.fail(validation, path, value)
    }

    /// Cheap kind-level test used to pick the union branch worth
    /// descending into for error reporting.
    fn matches_shallow(&self, value: &Value) -> bool {
        match self.unwrap().kind() {
            TypeKind::Number { .. } => matches!(value, Value::Number(_)),
            TypeKind::String { .. } => matches!(value, Value::String(_)),
            TypeKind::Boolean { .. } => matches!(value, Value::Bool(_)),
            TypeKind::Symbol => matches!(value, Value::Symbol(_)),
            TypeKind::Void => matches!(value, Value::Undefined),
            TypeKind::NullLiteral => matches!(value, Value::Null),
            TypeKind::Array(_) | TypeKind::Tuple(_) => matches!(value, Value::Array(_)),
            TypeKind::Object(_) => value.properties().is_some(),
            TypeKind::Function(_) => value.is_callable(),
            TypeKind::Class(_) | TypeKind::Nominal(_) => matches!(value, Value::Instance(_)),
            TypeKind::Nullable(inner) => value.is_nullish() || inner.matches_shallow(value),
            TypeKind::Empty => false,
            _ => true,
        }
    }

    fn check_class(
        &self,
        validation: &mut Validation,
        path: &mut Vec<PathSegment>,
        value: &Value,
    ) -> bool {
        let TypeKind::Class(class) = self.kind() else {
            return false;
        };
        let Value::Instance(instance) = value else {
            return self.fail(validation, path, value);
        };
        if !instance.is_instance_of(&class.name) {
            return self.fail(validation, path, value);
        }
        let Some(shape) = self.class_shape() else {
            return false;
        };
        let mut failed = false;
        for super_type in &shape.supers {
            failed |= super_type.collect_errors(validation, path, value);
        }
        let body = ObjectType {
            exact: false,
            members: shape.members.clone(),
        };
        failed |= self.check_object(&body, validation, path, value);
        failed
    }

    fn check_nominal(
        &self,
        name: &str,
        validation: &mut Validation,
        path: &mut Vec<PathSegment>,
        value: &Value,
    ) -> bool {
        if let Some(predicate) = self.context().predicate(name) {
            if predicate(value) {
                return false;
            }
            return self.fail(validation, path, value);
        }
        match value {
            Value::Instance(instance) if instance.is_instance_of(name) => false,
            _ => self.fail(validation, path, value),
        }
    }
}

fn indexer_key_accepts(key_type: &TypeRef, key: &str) -> bool {
    match key_type.unwrap().kind() {
        TypeKind::Number { .. } => key.parse::<f64>().is_ok(),
        TypeKind::String { .. } => true,
        TypeKind::Symbol => false,
        _ => key_type.accepts(&Value::string(key)),
    }
}
