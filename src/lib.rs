//! tinylisp - an embeddable interpreter for a small Scheme-like language
//!
//! This crate provides a reader, an environment model and an evaluator for a
//! minimal prefix-syntax expression language with integers, floats, text and
//! booleans, plus a fixed library of arithmetic, list and floating-point builtins.
//!
//! ```scheme
//! (+ 2 2.0)                            ; 4.0, integers promote to floats
//! (+ "ab" "cd")                        ; abcd, text concatenates
//! (define square (lambda (x) (* x x)))
//! (square 12)                          ; 144
//! (append (quote (1 2)) (quote (3 4))) ; (1 2 3 4)
//! ```
//!
//! The core surface is three functions:
//!
//! ```
//! use tinylisp::{evaluate, parse, render};
//! use tinylisp::evaluator::create_global_env;
//!
//! let env = create_global_env();
//! let expr = parse("(cdr (quote (1 2 3)))").unwrap();
//! let value = evaluate(&expr, &env).unwrap();
//! assert_eq!(render(&value), "(2 3)");
//! ```
//!
//! ## Numeric Coercion
//!
//! Binary arithmetic and comparison builtins never coerce across kinds except
//! integer to float:
//! - integer with integer stays integer (overflow is an error, never wraparound)
//! - any float operand promotes the other integer operand to float
//! - text only works with `+` (concatenation) and the comparison operators
//!
//! ## Modules
//!
//! - `scheme`: tokenizer and recursive-descent reader
//! - `ast`: the `Expression` and `Value` types and their surface-syntax rendering
//! - `environment`: shared, mutable binding frames
//! - `evaluator`: special forms and procedure application
//! - `builtinops`: the builtin procedure registry
//! - `interpreter`: an interpreter instance owning its own global environment

use std::fmt;

use thiserror::Error;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErrorKind {
    /// Input ended before the expression was complete (empty input, unclosed parens)
    Incomplete,
    /// A `)` appeared with no matching open form
    UnexpectedClose,
    /// Extra tokens found after a complete expression
    TrailingContent,
    /// Expression nesting exceeded the configured maximum depth
    TooDeeplyNested,
    /// The tokenizer could not consume the input
    UnrecognizedInput,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Tokens surrounding the failure point, joined by spaces (max 100 chars)
    pub context: Option<String>,
    /// The problematic token encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a simple ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError with context taken from the tokens around `position`
    pub fn with_token_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        tokens: &[&str],
        position: usize,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let start = position.saturating_sub(5);
        let end = (position + 5).min(tokens.len());
        let window = tokens.get(start..end).unwrap_or_default();

        let mut context: String = window.join(" ").chars().take(MAX_CONTEXT).collect();
        if start > 0 {
            context.insert_str(0, "[...] ");
        }
        if end < tokens.len() {
            context.push_str(" [...]");
        }

        let found = tokens.get(position).map(|token| (*token).to_owned());
        Self::new(kind, message, Some(context), found)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(found) = &self.found {
            write!(f, "\nFound: {found}")?;
        }
        if let Some(context) = &self.context {
            write!(f, "\nContext: {context}")?;
        }
        Ok(())
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Malformed token stream, only ever produced by the reader
    #[error("SyntaxError: {0}")]
    Syntax(ParseError),
    /// No binding in the lookup chain, or no existing binding to mutate
    #[error("Unbound symbol: {0}")]
    UnboundSymbol(String),
    /// Wrong arity, wrong operand kind or operand outside a procedure's domain
    #[error("InvalidProcedureInput: {0}")]
    InvalidProcedureInput(String),
    /// Evaluation nested deeper than the configured limit
    #[error("Evaluation depth limit exceeded (max: {0})")]
    DepthLimitExceeded(usize),
}

/// Error classification independent of the message text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    UnboundSymbol,
    InvalidProcedureInput,
    DepthLimitExceeded,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Syntax(_) => ErrorKind::Syntax,
            Error::UnboundSymbol(_) => ErrorKind::UnboundSymbol,
            Error::InvalidProcedureInput(_) => ErrorKind::InvalidProcedureInput,
            Error::DepthLimitExceeded(_) => ErrorKind::DepthLimitExceeded,
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidProcedureInput(message.into())
    }

    /// Argument count mismatch, reported as invalid procedure input
    pub fn arity_error(expected: impl fmt::Display, got: usize) -> Self {
        Error::InvalidProcedureInput(format!("expected {expected} arguments, got {got}"))
    }
}

impl From<ParseError> for Error {
    fn from(error: ParseError) -> Self {
        Error::Syntax(error)
    }
}

pub mod ast;
pub mod builtinops;
pub mod environment;
pub mod evaluator;
pub mod interpreter;
pub mod scheme;

pub use ast::{Expression, Value};
pub use environment::Environment;
pub use evaluator::eval as evaluate;
pub use interpreter::{Interpreter, InterpreterConfig};
pub use scheme::{ParseConfig, parse_scheme as parse};

/// Render a value back into surface syntax
pub fn render(value: &Value) -> String {
    value.to_string()
}
