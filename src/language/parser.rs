use crate::language::{
    ast::*,
    errors::{SyntaxError, SyntaxErrors},
    lexer::lex,
    span::Span,
    token::{Token, TokenKind},
};

/// Parses the textual type syntax (`{id: string | number}`, `?T`,
/// `(x: T) => T`, ...) into an [`Annotation`]. Descriptor `toString`
/// output round-trips through here.
pub fn parse_annotation(source: &str) -> Result<Annotation, SyntaxErrors> {
    let tokens = match lex(source) {
        Ok(tokens) => tokens,
        Err(errors) => {
            let errs = errors
                .into_iter()
                .map(|err| SyntaxError::new(err.message, err.span))
                .collect();
            return Err(SyntaxErrors::new(errs));
        }
    };
    let mut parser = Parser::new(tokens);
    let annotation = match parser.parse_union() {
        Ok(annotation) => annotation,
        Err(err) => return Err(SyntaxErrors::from(err)),
    };
    if !parser.is_eof() {
        return Err(SyntaxErrors::from(parser.error_here("Expected end of type")));
    }
    Ok(annotation)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn is_eof(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, message: &str) -> Result<Token, SyntaxError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(message))
        }
    }

    fn expect_identifier(&mut self, message: &str) -> Result<(String, Span), SyntaxError> {
        match &self.current().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                let span = self.current().span;
                self.advance();
                Ok((name, span))
            }
            _ => Err(self.error_here(message)),
        }
    }

    fn error_here(&self, message: &str) -> SyntaxError {
        SyntaxError::new(message, self.current().span)
    }

    fn span_from(&self, start: usize) -> Span {
        let end = if self.pos == 0 {
            start
        } else {
            self.tokens[self.pos - 1].span.end
        };
        Span::new(start, end)
    }

    fn parse_union(&mut self) -> Result<Annotation, SyntaxError> {
        let start = self.current().span.start;
        // a leading `|` before the first member is tolerated
        self.matches(&TokenKind::Pipe);
        let first = self.parse_intersection()?;
        if !self.check(&TokenKind::Pipe) {
            return Ok(first);
        }
        let mut members = vec![first];
        while self.matches(&TokenKind::Pipe) {
            members.push(self.parse_intersection()?);
        }
        Ok(Annotation::Union {
            members,
            span: self.span_from(start),
        })
    }

    fn parse_intersection(&mut self) -> Result<Annotation, SyntaxError> {
        let start = self.current().span.start;
        let first = self.parse_postfix()?;
        if !self.check(&TokenKind::Amp) {
            return Ok(first);
        }
        let mut members = vec![first];
        while self.matches(&TokenKind::Amp) {
            members.push(self.parse_postfix()?);
        }
        Ok(Annotation::Intersection {
            members,
            span: self.span_from(start),
        })
    }

    fn parse_postfix(&mut self) -> Result<Annotation, SyntaxError> {
        let start = self.current().span.start;
        let mut annotation = self.parse_primary()?;
        while self.check(&TokenKind::LBracket) {
            // `T[]` only; `T[n]` is not part of the surface
            let saved = self.pos;
            self.advance();
            if self.matches(&TokenKind::RBracket) {
                annotation = Annotation::Array {
                    element: Box::new(annotation),
                    span: self.span_from(start),
                };
            } else {
                self.pos = saved;
                break;
            }
        }
        Ok(annotation)
    }

    fn parse_primary(&mut self) -> Result<Annotation, SyntaxError> {
        let token = self.current().clone();
        let start = token.span.start;
        match &token.kind {
            TokenKind::Question => {
                self.advance();
                let inner = self.parse_postfix()?;
                Ok(Annotation::Nullable {
                    inner: Box::new(inner),
                    span: self.span_from(start),
                })
            }
            TokenKind::Star => {
                self.advance();
                Ok(Annotation::Existential(token.span))
            }
            TokenKind::Typeof => {
                self.advance();
                let target = self.parse_qualified()?;
                Ok(Annotation::Typeof {
                    target,
                    span: self.span_from(start),
                })
            }
            TokenKind::Number(value) => {
                let value = *value;
                self.advance();
                Ok(Annotation::NumberLiteral {
                    value,
                    span: token.span,
                })
            }
            TokenKind::Minus => {
                self.advance();
                match self.current().kind.clone() {
                    TokenKind::Number(value) => {
                        self.advance();
                        Ok(Annotation::NumberLiteral {
                            value: -value,
                            span: self.span_from(start),
                        })
                    }
                    _ => Err(self.error_here("Expected number after `-`")),
                }
            }
            TokenKind::String(value) => {
                let value = value.clone();
                self.advance();
                Ok(Annotation::StringLiteral {
                    value,
                    span: token.span,
                })
            }
            TokenKind::True => {
                self.advance();
                Ok(Annotation::BooleanLiteral {
                    value: true,
                    span: token.span,
                })
            }
            TokenKind::False => {
                self.advance();
                Ok(Annotation::BooleanLiteral {
                    value: false,
                    span: token.span,
                })
            }
            TokenKind::LBracket => self.parse_tuple(),
            TokenKind::LBrace => self.parse_object(false),
            TokenKind::LBraceBar => self.parse_object(true),
            TokenKind::Lt => self.parse_function_annotation().map(Annotation::Function),
            TokenKind::LParen => {
                // either a function type or a parenthesized type; try the
                // function form first and back off
                let saved = self.pos;
                match self.parse_function_annotation() {
                    Ok(function) => Ok(Annotation::Function(function)),
                    Err(_) => {
                        self.pos = saved;
                        self.advance();
                        let inner = self.parse_union()?;
                        self.expect(&TokenKind::RParen, "Expected `)`")?;
                        Ok(inner)
                    }
                }
            }
            TokenKind::Identifier(_) => self.parse_named(),
            _ => Err(self.error_here("Expected type")),
        }
    }

    fn parse_named(&mut self) -> Result<Annotation, SyntaxError> {
        let start = self.current().span.start;
        let id = self.parse_qualified()?;
        if id.is_simple() {
            let span = self.span_from(start);
            match id.head() {
                "any" => return Ok(Annotation::Any(span)),
                "mixed" => return Ok(Annotation::Mixed(span)),
                "empty" => return Ok(Annotation::Empty(span)),
                "void" | "undefined" => return Ok(Annotation::Void(span)),
                "null" => return Ok(Annotation::NullLiteral(span)),
                "number" => return Ok(Annotation::Number(span)),
                "string" => return Ok(Annotation::String(span)),
                "boolean" => return Ok(Annotation::Boolean(span)),
                "symbol" => return Ok(Annotation::Symbol(span)),
                _ => {}
            }
        }
        let mut args = Vec::new();
        if self.matches(&TokenKind::Lt) {
            loop {
                args.push(self.parse_union()?);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::Gt, "Expected `>` after type arguments")?;
        }
        Ok(Annotation::Generic {
            id,
            args,
            span: self.span_from(start),
        })
    }

    fn parse_qualified(&mut self) -> Result<QualifiedId, SyntaxError> {
        let (first, first_span) = self.expect_identifier("Expected type name")?;
        let start = first_span.start;
        let mut parts = vec![first];
        while self.matches(&TokenKind::Dot) {
            let (next, _) = self.expect_identifier("Expected name after `.`")?;
            parts.push(next);
        }
        Ok(QualifiedId {
            parts,
            span: self.span_from(start),
        })
    }

    fn parse_tuple(&mut self) -> Result<Annotation, SyntaxError> {
        let start = self.current().span.start;
        self.expect(&TokenKind::LBracket, "Expected `[`")?;
        let mut elements = Vec::new();
        if !self.check(&TokenKind::RBracket) {
            loop {
                elements.push(self.parse_union()?);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
                if self.check(&TokenKind::RBracket) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBracket, "Expected `]` after tuple members")?;
        Ok(Annotation::Tuple {
            elements,
            span: self.span_from(start),
        })
    }

    fn parse_object(&mut self, exact: bool) -> Result<Annotation, SyntaxError> {
        let start = self.current().span.start;
        let close = if exact {
            TokenKind::BarRBrace
        } else {
            TokenKind::RBrace
        };
        self.advance();
        let mut members = Vec::new();
        while !self.check(&close) && !self.is_eof() {
            members.push(self.parse_object_member()?);
            if !self.matches(&TokenKind::Comma) && !self.matches(&TokenKind::Semi) {
                break;
            }
        }
        self.expect(&close, "Expected end of object type")?;
        Ok(Annotation::Object(ObjectAnnotation {
            exact,
            members,
            span: self.span_from(start),
        }))
    }

    fn parse_object_member(&mut self) -> Result<ObjectAnnotationMember, SyntaxError> {
        let start = self.current().span.start;
        if self.check(&TokenKind::LBracket) {
            return self.parse_indexer();
        }
        if self.check(&TokenKind::LParen) || self.check(&TokenKind::Lt) {
            let value = self.parse_function_annotation()?;
            return Ok(ObjectAnnotationMember::Call {
                value,
                span: self.span_from(start),
            });
        }
        let mut is_static = false;
        let (mut key, _) = self.expect_identifier("Expected object member")?;
        if key == "static"
            && matches!(
                self.current().kind,
                TokenKind::Identifier(_) | TokenKind::LBracket | TokenKind::LParen
            )
        {
            is_static = true;
            if self.check(&TokenKind::LBracket) {
                return self.parse_indexer();
            }
            if self.check(&TokenKind::LParen) {
                let value = self.parse_function_annotation()?;
                return Ok(ObjectAnnotationMember::Call {
                    value,
                    span: self.span_from(start),
                });
            }
            key = self.expect_identifier("Expected member name after `static`")?.0;
        }
        if self.check(&TokenKind::LParen) || self.check(&TokenKind::Lt) {
            // method shorthand: `m(x: T): R`
            let value = self.parse_method_annotation()?;
            return Ok(ObjectAnnotationMember::Method {
                key,
                value,
                is_static,
                span: self.span_from(start),
            });
        }
        let optional = self.matches(&TokenKind::Question);
        self.expect(&TokenKind::Colon, "Expected `:` after member name")?;
        let value = self.parse_union()?;
        Ok(ObjectAnnotationMember::Property {
            key,
            value,
            optional,
            is_static,
            span: self.span_from(start),
        })
    }

    fn parse_indexer(&mut self) -> Result<ObjectAnnotationMember, SyntaxError> {
        let start = self.current().span.start;
        self.expect(&TokenKind::LBracket, "Expected `[`")?;
        // `[id: K]: V` names the key; `[K]: V` leaves it anonymous
        let saved = self.pos;
        let mut id = None;
        if let TokenKind::Identifier(name) = self.current().kind.clone() {
            self.advance();
            if self.matches(&TokenKind::Colon) {
                id = Some(name);
            } else {
                self.pos = saved;
            }
        }
        let key = self.parse_union()?;
        self.expect(&TokenKind::RBracket, "Expected `]` after indexer key")?;
        self.expect(&TokenKind::Colon, "Expected `:` after indexer")?;
        let value = self.parse_union()?;
        Ok(ObjectAnnotationMember::Indexer {
            id,
            key,
            value,
            span: self.span_from(start),
        })
    }

    fn parse_type_params(&mut self) -> Result<Vec<TypeParamDecl>, SyntaxError> {
        let mut params = Vec::new();
        if !self.matches(&TokenKind::Lt) {
            return Ok(params);
        }
        loop {
            let (name, span) = self.expect_identifier("Expected type parameter name")?;
            let bound = if self.matches(&TokenKind::Colon) {
                Some(self.parse_union()?)
            } else {
                None
            };
            params.push(TypeParamDecl { name, bound, span });
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::Gt, "Expected `>` after type parameters")?;
        Ok(params)
    }

    /// `<T>(a: T, ...rest: T[]) => T`
    fn parse_function_annotation(&mut self) -> Result<FunctionAnnotation, SyntaxError> {
        let start = self.current().span.start;
        let type_params = self.parse_type_params()?;
        let (params, rest) = self.parse_function_params()?;
        self.expect(&TokenKind::FatArrow, "Expected `=>` in function type")?;
        let return_annotation = Box::new(self.parse_union()?);
        Ok(FunctionAnnotation {
            type_params,
            params,
            rest,
            return_annotation,
            span: self.span_from(start),
        })
    }

    /// `m<T>(a: T): R`, the method shorthand inside object types.
    fn parse_method_annotation(&mut self) -> Result<FunctionAnnotation, SyntaxError> {
        let start = self.current().span.start;
        let type_params = self.parse_type_params()?;
        let (params, rest) = self.parse_function_params()?;
        self.expect(&TokenKind::Colon, "Expected `:` after method parameters")?;
        let return_annotation = Box::new(self.parse_union()?);
        Ok(FunctionAnnotation {
            type_params,
            params,
            rest,
            return_annotation,
            span: self.span_from(start),
        })
    }

    fn parse_function_params(
        &mut self,
    ) -> Result<(Vec<FunctionAnnotationParam>, Option<Box<FunctionAnnotationParam>>), SyntaxError>
    {
        self.expect(&TokenKind::LParen, "Expected `(`")?;
        let mut params = Vec::new();
        let mut rest = None;
        while !self.check(&TokenKind::RParen) {
            let start = self.current().span.start;
            let is_rest = self.matches(&TokenKind::Ellipsis);
            let param = self.parse_function_param(start)?;
            if is_rest {
                rest = Some(Box::new(param));
                break;
            }
            params.push(param);
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "Expected `)` after parameters")?;
        Ok((params, rest))
    }

    fn parse_function_param(&mut self, start: usize) -> Result<FunctionAnnotationParam, SyntaxError> {
        // `name: T` / `name?: T` / bare `T`
        let saved = self.pos;
        if let TokenKind::Identifier(name) = self.current().kind.clone() {
            self.advance();
            let optional = self.matches(&TokenKind::Question);
            if self.matches(&TokenKind::Colon) {
                let annotation = self.parse_union()?;
                return Ok(FunctionAnnotationParam {
                    name: Some(name),
                    annotation,
                    optional,
                    span: self.span_from(start),
                });
            }
            self.pos = saved;
        }
        let annotation = self.parse_union()?;
        Ok(FunctionAnnotationParam {
            name: None,
            annotation,
            optional: false,
            span: self.span_from(start),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Annotation {
        parse_annotation(source).expect("parse")
    }

    #[test]
    fn parses_union_of_primitives() {
        let annotation = parse("string | number");
        let Annotation::Union { members, .. } = annotation else {
            panic!("expected union");
        };
        assert_eq!(members.len(), 2);
        assert!(matches!(members[0], Annotation::String(_)));
        assert!(matches!(members[1], Annotation::Number(_)));
    }

    #[test]
    fn parses_nullable_generic() {
        let annotation = parse("?Array<number>");
        let Annotation::Nullable { inner, .. } = annotation else {
            panic!("expected nullable");
        };
        let Annotation::Generic { id, args, .. } = *inner else {
            panic!("expected generic");
        };
        assert_eq!(id.dotted(), "Array");
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn parses_exact_object_with_optional_and_indexer() {
        let annotation = parse("{| id: string | number, label?: string, [key: string]: mixed |}");
        let Annotation::Object(object) = annotation else {
            panic!("expected object");
        };
        assert!(object.exact);
        assert_eq!(object.members.len(), 3);
        assert!(matches!(
            &object.members[1],
            ObjectAnnotationMember::Property { optional: true, .. }
        ));
        assert!(matches!(
            &object.members[2],
            ObjectAnnotationMember::Indexer { id: Some(id), .. } if id == "key"
        ));
    }

    #[test]
    fn parses_generic_function_type() {
        let annotation = parse("<T>(a: T, b: T) => T");
        let Annotation::Function(function) = annotation else {
            panic!("expected function");
        };
        assert_eq!(function.type_params.len(), 1);
        assert_eq!(function.params.len(), 2);
        assert_eq!(function.params[0].name.as_deref(), Some("a"));
        assert!(function.rest.is_none());
    }

    #[test]
    fn parses_rest_params_and_array_shorthand() {
        let annotation = parse("(head: number, ...tail: number[]) => number");
        let Annotation::Function(function) = annotation else {
            panic!("expected function");
        };
        let rest = function.rest.expect("rest param");
        assert!(matches!(rest.annotation, Annotation::Array { .. }));
    }

    #[test]
    fn parses_parenthesized_union_element() {
        let annotation = parse("(string | number)[]");
        let Annotation::Array { element, .. } = annotation else {
            panic!("expected array");
        };
        assert!(matches!(*element, Annotation::Union { .. }));
    }

    #[test]
    fn parses_tuple_and_literals() {
        let annotation = parse("[42, \"on\", true]");
        let Annotation::Tuple { elements, .. } = annotation else {
            panic!("expected tuple");
        };
        assert!(matches!(
            elements[0],
            Annotation::NumberLiteral { value, .. } if value == 42.0
        ));
        assert!(matches!(
            &elements[1],
            Annotation::StringLiteral { value, .. } if value == "on"
        ));
        assert!(matches!(
            elements[2],
            Annotation::BooleanLiteral { value: true, .. }
        ));
    }

    #[test]
    fn parses_typeof_chain() {
        let annotation = parse("typeof Config.defaults");
        let Annotation::Typeof { target, .. } = annotation else {
            panic!("expected typeof");
        };
        assert_eq!(target.dotted(), "Config.defaults");
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse_annotation("number number").is_err());
    }
}
