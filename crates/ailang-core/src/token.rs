//! Token kinds produced by the lexer.

use std::fmt;

use crate::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Keyword(Keyword),

    // punctuation / operators
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    DotDot,
    Colon,
    Semicolon,
    Pipe,
    Bang,
    Arrow,   // ->
    FatArrow, // =>
    Eq,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    PlusPlus,
    Minus,
    Star,
    Slash,
    Percent,
    AndAnd,
    OrOr,
    Backslash,
    Underscore,

    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Keyword {
    Module,
    Import,
    Export,
    Let,
    Letrec,
    Func,
    If,
    Then,
    Else,
    Match,
    With,
    Type,
    Of,
    In,
    True,
    False,
}

impl Keyword {
    #[must_use]
    pub fn from_ident(ident: &str) -> Option<Self> {
        use std::str::FromStr as _;
        Self::from_str(ident).ok()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Ident(s) => write!(f, "{s}"),
            Self::Keyword(k) => write!(f, "{k}"),
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
            Self::LBrace => f.write_str("{"),
            Self::RBrace => f.write_str("}"),
            Self::LBracket => f.write_str("["),
            Self::RBracket => f.write_str("]"),
            Self::Comma => f.write_str(","),
            Self::Dot => f.write_str("."),
            Self::DotDot => f.write_str(".."),
            Self::Colon => f.write_str(":"),
            Self::Semicolon => f.write_str(";"),
            Self::Pipe => f.write_str("|"),
            Self::Bang => f.write_str("!"),
            Self::Arrow => f.write_str("->"),
            Self::FatArrow => f.write_str("=>"),
            Self::Eq => f.write_str("="),
            Self::EqEq => f.write_str("=="),
            Self::NotEq => f.write_str("!="),
            Self::Lt => f.write_str("<"),
            Self::Le => f.write_str("<="),
            Self::Gt => f.write_str(">"),
            Self::Ge => f.write_str(">="),
            Self::Plus => f.write_str("+"),
            Self::PlusPlus => f.write_str("++"),
            Self::Minus => f.write_str("-"),
            Self::Star => f.write_str("*"),
            Self::Slash => f.write_str("/"),
            Self::Percent => f.write_str("%"),
            Self::AndAnd => f.write_str("&&"),
            Self::OrOr => f.write_str("||"),
            Self::Backslash => f.write_str("\\"),
            Self::Underscore => f.write_str("_"),
            Self::Eof => f.write_str("<eof>"),
        }
    }
}
