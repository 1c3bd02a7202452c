//! Structured diagnostics shared by every phase.
//!
//! Each phase keeps its own error enum (mirrors the teacher's split between
//! `ParseError`, `CompileError`, `Exception`, `ResourceError`); [`AilangError`]
//! is the umbrella `From`-chained type, and [`Diagnostic`] is the stable,
//! serializable shape every error is converted to at the `ailang.error/v1`
//! boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::span::Span;

/// One entry in the `ailang.error/v1` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub schema: &'static str,
    pub code: &'static str,
    pub message: String,
    pub span: SpanJson,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<RelatedSpan>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanJson {
    pub file: String,
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedSpan {
    pub span: SpanJson,
    pub message: String,
}

impl From<&Span> for SpanJson {
    fn from(span: &Span) -> Self {
        Self {
            file: span.file.to_string(),
            start: span.start,
            end: span.end,
        }
    }
}

impl Diagnostic {
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>, span: &Span) -> Self {
        Self {
            schema: "ailang.error/v1",
            code,
            message: message.into(),
            span: span.into(),
            fix: None,
            related: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = Some(fix.into());
        self
    }

    #[must_use]
    pub fn with_related(mut self, span: &Span, message: impl Into<String>) -> Self {
        self.related.push(RelatedSpan {
            span: span.into(),
            message: message.into(),
        });
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] at {}:{}", self.message, self.code, self.span.file, self.span.start)?;
        if let Some(fix) = &self.fix {
            write!(f, " (fix: {fix})")?;
        }
        Ok(())
    }
}

/// Lexical errors (`LEX_*`).
#[derive(Debug, Clone)]
pub enum LexError {
    BadEscape { span: Span, escape: String },
    UnterminatedString { span: Span },
    InvalidNumber { span: Span, text: String },
    UnexpectedChar { span: Span, ch: char },
}

impl LexError {
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::BadEscape { span, escape } => {
                Diagnostic::new("LEX_STRING", format!("invalid escape sequence '\\{escape}'"), span)
            }
            Self::UnterminatedString { span } => Diagnostic::new("LEX_STRING", "unterminated string literal", span),
            Self::InvalidNumber { span, text } => {
                Diagnostic::new("LEX_NUMBER", format!("invalid numeric literal '{text}'"), span)
            }
            Self::UnexpectedChar { span, ch } => {
                Diagnostic::new("LEX_CHAR", format!("unexpected character '{ch}'"), span)
            }
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_diagnostic())
    }
}

impl std::error::Error for LexError {}

/// Parse errors (`PAR_*`).
#[derive(Debug, Clone)]
pub struct ParseError {
    pub code: &'static str,
    pub message: String,
    pub span: Span,
}

impl ParseError {
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            message: message.into(),
            span,
        }
    }

    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(self.code, self.message.clone(), &self.span)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_diagnostic())
    }
}

impl std::error::Error for ParseError {}

/// Elaboration errors (`ELB_*`).
#[derive(Debug, Clone)]
pub struct ElabError {
    pub code: &'static str,
    pub message: String,
    pub span: Span,
}

impl ElabError {
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            message: message.into(),
            span,
        }
    }

    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(self.code, self.message.clone(), &self.span)
    }
}

impl fmt::Display for ElabError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_diagnostic())
    }
}

impl std::error::Error for ElabError {}

/// Module loader errors (`LDR_*`).
#[derive(Debug, Clone)]
pub enum LoaderError {
    NotFound { path: String, from: Span },
    Cycle { members: Vec<String> },
    DuplicatePath { path: String },
}

impl LoaderError {
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::NotFound { path, from } => {
                Diagnostic::new("LDR_NOT_FOUND", format!("module '{path}' not found"), from)
            }
            Self::Cycle { members } => Diagnostic::new(
                "LDR_CYCLE",
                format!("import cycle: {}", members.join(" -> ")),
                &Span::unknown(),
            ),
            Self::DuplicatePath { path } => {
                Diagnostic::new("LDR_DUPLICATE", format!("duplicate module path '{path}'"), &Span::unknown())
            }
        }
    }
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_diagnostic())
    }
}

impl std::error::Error for LoaderError {}

/// Pattern-compiler diagnostics (`PAT_*`); non-exhaustiveness is a warning by
/// default, promotable to an error by caller policy.
#[derive(Debug, Clone)]
pub struct PatternWarning {
    pub code: &'static str,
    pub message: String,
    pub span: Span,
    pub witnesses: Vec<String>,
}

impl PatternWarning {
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut d = Diagnostic::new(self.code, self.message.clone(), &self.span);
        if !self.witnesses.is_empty() {
            d = d.with_fix(format!("uncovered cases: {}", self.witnesses.join(", ")));
        }
        d
    }
}

/// Runtime errors (`RUN_*`) and effect errors (`EFFECT_*`).
#[derive(Debug, Clone)]
pub enum RuntimeError {
    DivisionByZero { span: Span },
    NonExhaustiveMatch { span: Span, value: String },
    StackOverflow { span: Span },
    DictionaryNotFound { span: Span, key: String },
    MalformedValue { span: Span, message: String },
    CapabilityMissing { span: Span, label: String },
    EffectFailure { span: Span, effect: String, op: String, message: String },
    UnboundVariable { span: Span, name: String },
    ArityMismatch { span: Span, expected: usize, found: usize },
    TypeMismatch { span: Span, expected: &'static str, found: &'static str },
}

impl RuntimeError {
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::DivisionByZero { span } => Diagnostic::new("RUN_DIV_ZERO", "division by zero", span),
            Self::NonExhaustiveMatch { span, value } => Diagnostic::new(
                "RUN_NON_EXHAUSTIVE",
                format!("no pattern matched value {value}"),
                span,
            ),
            Self::StackOverflow { span } => {
                Diagnostic::new("RUNTIME_STACK_OVERFLOW", "recursion depth limit exceeded", span)
            }
            Self::DictionaryNotFound { span, key } => {
                Diagnostic::new("RUN_NO_DICT", format!("no dictionary found for '{key}'"), span)
            }
            Self::MalformedValue { span, message } => Diagnostic::new("RUN_MALFORMED", message.clone(), span),
            Self::CapabilityMissing { span, label } => Diagnostic::new(
                "EFFECT_CAP_MISSING",
                format!("capability '{label}' is required but was not granted"),
                span,
            )
            .with_fix(format!("--caps {label}")),
            Self::EffectFailure { span, effect, op, message } => {
                Diagnostic::new("EFFECT_FAILURE", format!("{effect}.{op}: {message}"), span)
            }
            Self::UnboundVariable { span, name } => {
                Diagnostic::new("RUN_UNBOUND", format!("unbound variable '{name}'"), span)
            }
            Self::ArityMismatch { span, expected, found } => Diagnostic::new(
                "RUN_ARITY",
                format!("expected {expected} argument(s), found {found}"),
                span,
            ),
            Self::TypeMismatch { span, expected, found } => Diagnostic::new(
                "RUN_TYPE",
                format!("expected a {expected} value, found {found}"),
                span,
            ),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_diagnostic())
    }
}

impl std::error::Error for RuntimeError {}

/// Umbrella error chaining every phase, mirroring the teacher's `ReplError`.
#[derive(Debug, Clone)]
pub enum AilangError {
    Lex(LexError),
    Parse(ParseError),
    Elab(ElabError),
    Loader(LoaderError),
    Runtime(RuntimeError),
    /// Boxed to keep this variant from inflating every other variant's size
    /// the way an inline `ailang_typecheck::TypeError` would (that crate
    /// depends on this one, not the reverse, so the payload is carried as
    /// an already-rendered diagnostic rather than the concrete type).
    TypeCheck(Box<Diagnostic>),
}

impl AilangError {
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Lex(e) => e.to_diagnostic(),
            Self::Parse(e) => e.to_diagnostic(),
            Self::Elab(e) => e.to_diagnostic(),
            Self::Loader(e) => e.to_diagnostic(),
            Self::Runtime(e) => e.to_diagnostic(),
            Self::TypeCheck(d) => (**d).clone(),
        }
    }

    #[must_use]
    pub fn from_diagnostic(diagnostic: Diagnostic) -> Self {
        Self::TypeCheck(Box::new(diagnostic))
    }
}

impl fmt::Display for AilangError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_diagnostic())
    }
}

impl std::error::Error for AilangError {}

impl From<LexError> for AilangError {
    fn from(e: LexError) -> Self {
        Self::Lex(e)
    }
}
impl From<ParseError> for AilangError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}
impl From<ElabError> for AilangError {
    fn from(e: ElabError) -> Self {
        Self::Elab(e)
    }
}
impl From<LoaderError> for AilangError {
    fn from(e: LoaderError) -> Self {
        Self::Loader(e)
    }
}
impl From<RuntimeError> for AilangError {
    fn from(e: RuntimeError) -> Self {
        Self::Runtime(e)
    }
}
