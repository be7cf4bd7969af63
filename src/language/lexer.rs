use crate::language::{
    span::Span,
    token::{Token, TokenKind},
};

#[derive(Debug)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

pub fn lex(source: &str) -> Result<Vec<Token>, Vec<LexError>> {
    let lexer = Lexer::new(source);
    lexer.run()
}

struct Lexer<'a> {
    src: &'a str,
    chars: std::str::Chars<'a>,
    current: Option<char>,
    offset: usize,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        let mut chars = src.chars();
        let current = chars.next();
        Self {
            src,
            chars,
            current,
            offset: 0,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, Vec<LexError>> {
        while let Some(ch) = self.current {
            match ch {
                '/' if self.peek() == Some('/') => self.eat_line_comment(),
                '/' if self.peek() == Some('*') => self.eat_block_comment(),
                ch if ch.is_whitespace() => {
                    self.bump();
                }
                ch if ch.is_ascii_alphabetic() || ch == '_' || ch == '$' => self.lex_identifier(),
                ch if ch.is_ascii_digit() => self.lex_number(),
                '"' | '\'' => self.lex_string(ch),
                _ => self.lex_symbol(),
            }
        }
        self.push_token(TokenKind::Eof, self.offset, self.offset);

        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.errors)
        }
    }

    fn bump(&mut self) -> Option<char> {
        if let Some(ch) = self.current {
            self.offset += ch.len_utf8();
        }
        self.current = self.chars.next();
        self.current
    }

    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn push_token(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start, end),
        });
    }

    fn error(&mut self, start: usize, end: usize, message: impl Into<String>) {
        self.errors.push(LexError {
            message: message.into(),
            span: Span::new(start, end),
        });
    }

    fn eat_line_comment(&mut self) {
        while let Some(ch) = self.current {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn eat_block_comment(&mut self) {
        let start = self.offset;
        self.bump();
        self.bump();
        loop {
            match self.current {
                Some('*') if self.peek() == Some('/') => {
                    self.bump();
                    self.bump();
                    return;
                }
                Some(_) => {
                    self.bump();
                }
                None => {
                    self.error(start, self.offset, "Unterminated block comment");
                    return;
                }
            }
        }
    }

    fn lex_identifier(&mut self) {
        let start = self.offset;
        while let Some(ch) = self.current {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
                self.bump();
            } else {
                break;
            }
        }
        let text = &self.src[start..self.offset];
        let kind = match text {
            "typeof" => TokenKind::Typeof,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => TokenKind::Identifier(text.to_string()),
        };
        self.push_token(kind, start, self.offset);
    }

    fn lex_number(&mut self) {
        let start = self.offset;
        while let Some(ch) = self.current {
            if ch.is_ascii_digit() {
                self.bump();
            } else {
                break;
            }
        }
        if self.current == Some('.') && self.peek().is_some_and(|ch| ch.is_ascii_digit()) {
            self.bump();
            while let Some(ch) = self.current {
                if ch.is_ascii_digit() {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        let text = &self.src[start..self.offset];
        match text.parse::<f64>() {
            Ok(value) => self.push_token(TokenKind::Number(value), start, self.offset),
            Err(_) => self.error(start, self.offset, format!("Invalid number literal `{text}`")),
        }
    }

    fn lex_string(&mut self, quote: char) {
        let start = self.offset;
        self.bump();
        let mut value = String::new();
        loop {
            match self.current {
                Some(ch) if ch == quote => {
                    self.bump();
                    self.push_token(TokenKind::String(value), start, self.offset);
                    return;
                }
                Some('\\') => {
                    self.bump();
                    match self.current {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('\\') => value.push('\\'),
                        Some(ch) if ch == quote => value.push(ch),
                        Some(ch) => value.push(ch),
                        None => {
                            self.error(start, self.offset, "Unterminated string literal");
                            return;
                        }
                    }
                    self.bump();
                }
                Some('\n') | None => {
                    self.error(start, self.offset, "Unterminated string literal");
                    return;
                }
                Some(ch) => {
                    value.push(ch);
                    self.bump();
                }
            }
        }
    }

    fn lex_symbol(&mut self) {
        let start = self.offset;
        let ch = self.current.expect("lex_symbol called at end of input");
        let kind = match ch {
            '?' => Some(TokenKind::Question),
            ':' => Some(TokenKind::Colon),
            ';' => Some(TokenKind::Semi),
            ',' => Some(TokenKind::Comma),
            '.' => {
                if self.peek() == Some('.') {
                    self.bump();
                    if self.peek() == Some('.') {
                        self.bump();
                        Some(TokenKind::Ellipsis)
                    } else {
                        self.error(start, self.offset + 1, "Expected `...`");
                        None
                    }
                } else {
                    Some(TokenKind::Dot)
                }
            }
            '|' => {
                if self.peek() == Some('}') {
                    self.bump();
                    Some(TokenKind::BarRBrace)
                } else {
                    Some(TokenKind::Pipe)
                }
            }
            '&' => Some(TokenKind::Amp),
            '*' => Some(TokenKind::Star),
            '-' => Some(TokenKind::Minus),
            '=' => {
                if self.peek() == Some('>') {
                    self.bump();
                    Some(TokenKind::FatArrow)
                } else {
                    Some(TokenKind::Eq)
                }
            }
            '<' => Some(TokenKind::Lt),
            '>' => Some(TokenKind::Gt),
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '{' => {
                if self.peek() == Some('|') {
                    self.bump();
                    Some(TokenKind::LBraceBar)
                } else {
                    Some(TokenKind::LBrace)
                }
            }
            '}' => Some(TokenKind::RBrace),
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            other => {
                self.error(
                    start,
                    self.offset + other.len_utf8(),
                    format!("Unexpected character `{other}`"),
                );
                None
            }
        };
        self.bump();
        if let Some(kind) = kind {
            self.push_token(kind, start, self.offset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .expect("lex")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn lexes_exact_object_delimiters() {
        assert_eq!(
            kinds("{| a |}"),
            vec![
                TokenKind::LBraceBar,
                TokenKind::Identifier("a".to_string()),
                TokenKind::BarRBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_arrow_and_union() {
        assert_eq!(
            kinds("(x: T) => A | B"),
            vec![
                TokenKind::LParen,
                TokenKind::Identifier("x".to_string()),
                TokenKind::Colon,
                TokenKind::Identifier("T".to_string()),
                TokenKind::RParen,
                TokenKind::FatArrow,
                TokenKind::Identifier("A".to_string()),
                TokenKind::Pipe,
                TokenKind::Identifier("B".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_literals() {
        assert_eq!(
            kinds("42 -1.5 \"hi\" 'there' true"),
            vec![
                TokenKind::Number(42.0),
                TokenKind::Minus,
                TokenKind::Number(1.5),
                TokenKind::String("hi".to_string()),
                TokenKind::String("there".to_string()),
                TokenKind::True,
                TokenKind::Eof,
            ]
        );
    }
}
