use crate::runtime::types::TypeRef;
use crate::runtime::value::Value;
use std::fmt;

/// One structural mismatch: where it happened, what was expected there,
/// and the offending value.
#[derive(Clone, Debug)]
pub struct TypeErrorRecord {
    pub path: Vec<PathSegment>,
    pub expected: TypeRef,
    pub actual: Value,
}

impl TypeErrorRecord {
    pub fn path_string(&self) -> String {
        render_path(&self.path)
    }
}

impl fmt::Display for TypeErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path_string();
        if path.is_empty() {
            write!(
                f,
                "expected {}, got {} ({})",
                self.expected,
                self.actual.kind_name(),
                self.actual
            )
        } else {
            write!(
                f,
                "{path}: expected {}, got {} ({})",
                self.expected,
                self.actual.kind_name(),
                self.actual
            )
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
    Param(String),
    Return,
    Branch(usize),
}

pub fn render_path(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in path {
        match segment {
            PathSegment::Key(key) | PathSegment::Param(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            PathSegment::Index(index) => {
                out.push_str(&format!("[{index}]"));
            }
            PathSegment::Return => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str("return");
            }
            PathSegment::Branch(index) => {
                out.push_str(&format!("|{index}"));
            }
        }
    }
    out
}

/// Accumulates error records across a nested check. A single validation is
/// threaded through the whole descriptor tree so composite descriptors
/// report every mismatch with its full identifier path.
#[derive(Clone, Debug, Default)]
pub struct Validation {
    errors: Vec<TypeErrorRecord>,
}

impl Validation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: &[PathSegment], expected: TypeRef, actual: &Value) {
        self.errors.push(TypeErrorRecord {
            path: path.to_vec(),
            expected,
            actual: actual.clone(),
        });
    }

    pub fn errors(&self) -> &[TypeErrorRecord] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Drops every record pushed at or after `mark`. Union members are
    /// checked speculatively; records from branches that end up discarded
    /// must not survive into the final report.
    pub fn truncate(&mut self, mark: usize) {
        self.errors.truncate(mark);
    }
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, error) in self.errors.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {error}")?;
        }
        Ok(())
    }
}
