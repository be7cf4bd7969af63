use crate::language::span::Span;
use miette::SourceSpan;

/// A converter-plane diagnostic. Duplicate declarations are fatal; kinds
/// the converter degrades to `any` are accumulated as warnings.
#[derive(Clone, Debug)]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
    pub help: Option<String>,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn duplicate_declaration(name: &str, span: Span) -> Self {
        Self::new(format!("Duplicate type declaration `{name}`"), span).with_help(
            "a type name registers once per module; rename one of the declarations",
        )
    }

    pub fn unknown_kind(kind: &str, span: Span) -> Self {
        Self::new(format!("Unknown annotation kind `{kind}`; emitting `any`"), span)
            .with_help("register a conversion handler for this kind to keep its checks")
    }

    pub fn to_source_span(&self) -> SourceSpan {
        (self.span.start, self.span.len()).into()
    }
}

#[derive(Clone, Debug)]
pub struct SyntaxErrors {
    pub errors: Vec<SyntaxError>,
}

impl SyntaxErrors {
    pub fn new(errors: Vec<SyntaxError>) -> Self {
        Self { errors }
    }
}

impl From<SyntaxError> for SyntaxErrors {
    fn from(error: SyntaxError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}
