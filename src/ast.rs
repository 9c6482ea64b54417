//! This module defines the two tree types shared by the reader and the evaluator.
//! [`Expression`] is what the parser produces: atoms (integer, float, text, boolean)
//! and nested lists. [`Value`] is what evaluation produces: the same scalar kinds,
//! lists, and procedures (native host functions or closures). The `Display` impls
//! here are the printer: they reconstruct surface syntax that the parser accepts
//! again, so quoted data round-trips exactly.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::Error;
use crate::environment::Environment;
use crate::evaluator::intooperation::OperationFn;

/// Type alias for integer values in the interpreter
pub type NumberType = i64;

/// Returns the contents of a string literal token (`"abc"` gives `abc`),
/// or `None` when the text is a symbol reference.
pub(crate) fn string_literal(text: &str) -> Option<&str> {
    if text.len() < 2 {
        return None;
    }
    text.strip_prefix('"')?.strip_suffix('"')
}

/// Parsed source form. Immutable once produced by the reader.
///
/// `Text` holds both string literals (token kept with its surrounding double
/// quotes) and symbol references; the evaluator tells them apart.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Integer(NumberType),
    Float(f64),
    Text(String),
    Boolean(bool),
    List(Vec<Expression>),
}

impl Expression {
    /// The symbol name, if this expression is a symbol reference
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Expression::Text(text) if string_literal(text).is_none() => Some(text),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Expression::List(list) if list.is_empty())
    }
}

/// Runtime result of evaluation
#[derive(Clone)]
pub enum Value {
    Integer(NumberType),
    Float(f64),
    Text(String),
    Boolean(bool),
    /// Lists (the empty list is the nil value)
    List(Vec<Value>),
    Procedure(Procedure),
}

/// A callable value
#[derive(Clone)]
pub enum Procedure {
    /// Host-implemented function. Receives evaluated arguments and the calling
    /// environment. Equality compares names, not function pointers.
    Native {
        name: String,
        func: Arc<OperationFn>,
    },
    /// User-defined function closing over its defining environment
    Closure(Rc<Closure>),
}

/// Parameters and body of a `lambda`, plus the environment it was created in
pub struct Closure {
    pub(crate) params: Vec<String>,
    pub(crate) body: Expression,
    pub(crate) env: Environment,
}

impl Closure {
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn body(&self) -> &Expression {
        &self.body
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }
}

impl Procedure {
    pub fn name(&self) -> Option<&str> {
        match self {
            Procedure::Native { name, .. } => Some(name),
            Procedure::Closure(_) => None,
        }
    }
}

impl PartialEq for Procedure {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Procedure::Native { name: n1, .. }, Procedure::Native { name: n2, .. }) => n1 == n2,
            (Procedure::Closure(c1), Procedure::Closure(c2)) => Rc::ptr_eq(c1, c2),
            _ => false,
        }
    }
}

impl Value {
    /// Kind name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Boolean(_) => "boolean",
            Value::List(_) => "list",
            Value::Procedure(_) => "procedure",
        }
    }

    /// Everything except `#f` counts as true
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Check if a value represents nil (empty list)
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::List(list) if list.is_empty())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Procedure(a), Value::Procedure(b)) => a == b,
            _ => false, // Different variants are never equal, 1 and 1.0 included
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "Integer({n})"),
            Value::Float(x) => write!(f, "Float({x:?})"),
            Value::Text(s) => write!(f, "Text({s:?})"),
            Value::Boolean(b) => write!(f, "Boolean({b})"),
            Value::List(list) => {
                write!(f, "List(")?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                write!(f, ")")
            }
            Value::Procedure(Procedure::Native { name, .. }) => write!(f, "Native({name})"),
            Value::Procedure(Procedure::Closure(closure)) => {
                write!(
                    f,
                    "Closure(params={:?}, body={})",
                    closure.params, closure.body
                )
            }
        }
    }
}

// Quoting turns an expression into data without evaluating anything.
impl From<&Expression> for Value {
    fn from(expr: &Expression) -> Self {
        match expr {
            Expression::Integer(n) => Value::Integer(*n),
            Expression::Float(x) => Value::Float(*x),
            Expression::Text(s) => Value::Text(s.clone()),
            Expression::Boolean(b) => Value::Boolean(*b),
            Expression::List(items) => Value::List(items.iter().map(Value::from).collect()),
        }
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Integer(NumberType::from(n))
            }
        }

        impl From<$int_type> for Expression {
            fn from(n: $int_type) -> Self {
                Expression::Integer(NumberType::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(NumberType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl From<f64> for Expression {
    fn from(x: f64) -> Self {
        Expression::Float(x)
    }
}

impl From<bool> for Expression {
    fn from(b: bool) -> Self {
        Expression::Boolean(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::List(arr.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Expression>> From<Vec<T>> for Expression {
    fn from(v: Vec<T>) -> Self {
        Expression::List(v.into_iter().map(Into::into).collect())
    }
}

// Fallible conversions from `Value` back into primitive Rust types.

impl TryFrom<Value> for NumberType {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Error> {
        match value {
            Value::Integer(n) => Ok(n),
            other => Err(Error::invalid_input(format!(
                "expected integer, got {}",
                other.type_name()
            ))),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Error> {
        match value {
            Value::Float(x) => Ok(x),
            other => Err(Error::invalid_input(format!(
                "expected float, got {}",
                other.type_name()
            ))),
        }
    }
}

/// Helper function for creating symbol expressions in tests
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn sym<S: AsRef<str>>(name: S) -> Expression {
    Expression::Text(name.as_ref().to_owned())
}

/// Helper function for creating Values - works great in mixed lists!
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for creating the empty list
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn nil() -> Value {
    Value::List(vec![])
}

/// Floats always carry a decimal point so they read back as floats.
fn write_float(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    if x.is_nan() {
        write!(f, "NaN")
    } else if x.is_infinite() {
        write!(f, "{}", if x > 0.0 { "inf" } else { "-inf" })
    } else {
        let digits = x.to_string();
        if digits.contains('.') {
            write!(f, "{digits}")
        } else {
            write!(f, "{digits}.0")
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, elements: &[T]) -> fmt::Result {
    write!(f, "(")?;
    for (i, elem) in elements.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{elem}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(x) => write_float(f, *x),
            Value::Text(s) => write!(f, "{s}"),
            Value::Boolean(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::List(elements) => write_list(f, elements),
            Value::Procedure(Procedure::Native { name, .. }) => write!(f, "#<builtin:{name}>"),
            Value::Procedure(Procedure::Closure(_)) => write!(f, "#<lambda>"),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Integer(n) => write!(f, "{n}"),
            Expression::Float(x) => write_float(f, *x),
            Expression::Text(s) => write!(f, "{s}"),
            Expression::Boolean(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Expression::List(elements) => write_list(f, elements),
        }
    }
}
