//! Tokenizer: `lex(source, filename) -> [Token] | LexError`.

use std::sync::Arc;

use crate::error::LexError;
use crate::span::Span;
use crate::token::{Keyword, Token, TokenKind};

pub struct Lexer<'a> {
    file: Arc<str>,
    chars: Vec<char>,
    src: &'a str,
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(source: &'a str, filename: &str) -> Self {
        Self {
            file: Arc::from(filename),
            chars: source.chars().collect(),
            src: source,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let start = self.pos;
            let (start_line, start_col) = (self.line, self.column);
            let Some(ch) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    span: self.span_from(start, start_line, start_col),
                });
                break;
            };
            let kind = if ch.is_ascii_digit() {
                self.lex_number(start)?
            } else if ch == '"' {
                self.lex_string(start)?
            } else if is_ident_start(ch) {
                self.lex_ident()
            } else {
                self.lex_operator(start)?
            };
            tokens.push(Token {
                kind,
                span: self.span_from(start, start_line, start_col),
            });
        }
        Ok(tokens)
    }

    fn span_from(&self, start: usize, line: u32, column: u32) -> Span {
        Span::new(self.file.clone(), start as u32, self.pos as u32, line, column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek2() == Some('/') => {
                    while !matches!(self.peek(), Some('\n') | None) {
                        self.bump();
                    }
                }
                Some('/') if self.peek2() == Some('*') => {
                    self.bump();
                    self.bump();
                    loop {
                        match (self.peek(), self.peek2()) {
                            (Some('*'), Some('/')) => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            (Some(_), _) => {
                                self.bump();
                            }
                            (None, _) => break,
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_number(&mut self, start: usize) -> Result<TokenKind, LexError> {
        let mut is_float = false;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '_') {
            self.bump();
        }
        if self.peek() == Some('.') && matches!(self.peek2(), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.bump();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '_') {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            is_float = true;
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let cleaned = text.replace('_', "");
        if is_float {
            cleaned
                .parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| LexError::InvalidNumber {
                    span: self.span_from(start, self.line, self.column),
                    text,
                })
        } else {
            cleaned
                .parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|_| LexError::InvalidNumber {
                    span: self.span_from(start, self.line, self.column),
                    text,
                })
        }
    }

    fn lex_string(&mut self, start: usize) -> Result<TokenKind, LexError> {
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(LexError::UnterminatedString {
                        span: self.span_from(start, self.line, self.column),
                    });
                }
                Some('"') => break,
                Some('\\') => {
                    let esc_start = self.pos;
                    let esc = self.bump().ok_or_else(|| LexError::UnterminatedString {
                        span: self.span_from(start, self.line, self.column),
                    })?;
                    match esc {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '\\' => out.push('\\'),
                        '"' => out.push('"'),
                        '\'' => out.push('\''),
                        '0' => out.push('\0'),
                        'x' => {
                            let hi = self.bump();
                            let lo = self.bump();
                            let (Some(hi), Some(lo)) = (hi, lo) else {
                                return Err(LexError::BadEscape {
                                    span: self.span_from(esc_start, self.line, self.column),
                                    escape: "x".into(),
                                });
                            };
                            let code = u8::from_str_radix(&format!("{hi}{lo}"), 16).map_err(|_| LexError::BadEscape {
                                span: self.span_from(esc_start, self.line, self.column),
                                escape: format!("x{hi}{lo}"),
                            })?;
                            out.push(code as char);
                        }
                        'u' => {
                            let mut digits = String::new();
                            for _ in 0..4 {
                                match self.bump() {
                                    Some(c) => digits.push(c),
                                    None => {
                                        return Err(LexError::BadEscape {
                                            span: self.span_from(esc_start, self.line, self.column),
                                            escape: format!("u{digits}"),
                                        });
                                    }
                                }
                            }
                            let code = u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32).ok_or_else(
                                || LexError::BadEscape {
                                    span: self.span_from(esc_start, self.line, self.column),
                                    escape: format!("u{digits}"),
                                },
                            )?;
                            out.push(code);
                        }
                        other => {
                            return Err(LexError::BadEscape {
                                span: self.span_from(esc_start, self.line, self.column),
                                escape: other.to_string(),
                            });
                        }
                    }
                }
                Some(c) => out.push(c),
            }
        }
        Ok(TokenKind::Str(out))
    }

    fn lex_ident(&mut self) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            self.bump();
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if text == "_" {
            return TokenKind::Underscore;
        }
        match Keyword::from_ident(&text) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Ident(text),
        }
    }

    fn lex_operator(&mut self, start: usize) -> Result<TokenKind, LexError> {
        let ch = self.bump().expect("checked by caller");
        let next = self.peek();
        let kind = match (ch, next) {
            ('=', Some('=')) => {
                self.bump();
                TokenKind::EqEq
            }
            ('!', Some('=')) => {
                self.bump();
                TokenKind::NotEq
            }
            ('<', Some('=')) => {
                self.bump();
                TokenKind::Le
            }
            ('>', Some('=')) => {
                self.bump();
                TokenKind::Ge
            }
            ('-', Some('>')) => {
                self.bump();
                TokenKind::Arrow
            }
            ('=', Some('>')) => {
                self.bump();
                TokenKind::FatArrow
            }
            ('+', Some('+')) => {
                self.bump();
                TokenKind::PlusPlus
            }
            ('&', Some('&')) => {
                self.bump();
                TokenKind::AndAnd
            }
            ('|', Some('|')) => {
                self.bump();
                TokenKind::OrOr
            }
            ('.', Some('.')) => {
                self.bump();
                TokenKind::DotDot
            }
            ('(', _) => TokenKind::LParen,
            (')', _) => TokenKind::RParen,
            ('{', _) => TokenKind::LBrace,
            ('}', _) => TokenKind::RBrace,
            ('[', _) => TokenKind::LBracket,
            (']', _) => TokenKind::RBracket,
            (',', _) => TokenKind::Comma,
            ('.', _) => TokenKind::Dot,
            (':', _) => TokenKind::Colon,
            (';', _) => TokenKind::Semicolon,
            ('|', _) => TokenKind::Pipe,
            ('!', _) => TokenKind::Bang,
            ('=', _) => TokenKind::Eq,
            ('<', _) => TokenKind::Lt,
            ('>', _) => TokenKind::Gt,
            ('+', _) => TokenKind::Plus,
            ('-', _) => TokenKind::Minus,
            ('*', _) => TokenKind::Star,
            ('/', _) => TokenKind::Slash,
            ('%', _) => TokenKind::Percent,
            ('\\', _) => TokenKind::Backslash,
            (other, _) => {
                return Err(LexError::UnexpectedChar {
                    span: self.span_from(start, self.line, self.column),
                    ch: other,
                });
            }
        };
        Ok(kind)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Convenience entry point matching the spec's `lex(source, filename)` contract.
pub fn lex(source: &str, filename: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source, filename).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src, "<test>").unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_integers_and_floats() {
        assert_eq!(kinds("42"), vec![TokenKind::Int(42), TokenKind::Eof]);
        assert_eq!(kinds("3.14"), vec![TokenKind::Float(3.14), TokenKind::Eof]);
        assert_eq!(kinds("1_000"), vec![TokenKind::Int(1000), TokenKind::Eof]);
    }

    #[test]
    fn lexes_string_escapes() {
        assert_eq!(
            kinds(r#""a\nb""#),
            vec![TokenKind::Str("a\nb".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn unterminated_string_errors() {
        assert!(matches!(
            Lexer::new("\"abc", "<test>").tokenize(),
            Err(LexError::UnterminatedString { .. })
        ));
    }

    #[test]
    fn lexes_multi_char_operators() {
        assert_eq!(
            kinds("== != <= >= -> => ++ && ||"),
            vec![
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::Arrow,
                TokenKind::FatArrow,
                TokenKind::PlusPlus,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn recognizes_keywords_vs_identifiers() {
        assert_eq!(
            kinds("let letx"),
            vec![
                TokenKind::Keyword(Keyword::Let),
                TokenKind::Ident("letx".into()),
                TokenKind::Eof,
            ]
        );
    }
}
