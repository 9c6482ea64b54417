use std::sync::Arc;

use crate::Error;
use crate::ast::{NumberType, Value};
use crate::environment::Environment;

// NOTE: This module is the adapter layer that turns strongly-typed Rust
// functions into the erased `OperationFn` stored in `Procedure::Native`.
// Arity is checked by the adapters; kind checks live in `FromParam`.

/// Canonical erased builtin function type used by the evaluator.
///
/// Builtins receive ownership of their evaluated arguments and a handle to
/// the calling environment.
pub type OperationFn = dyn Fn(Vec<Value>, &Environment) -> Result<Value, Error> + Send + Sync;

/// A numeric operand: the two machine number kinds, kept distinct.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(NumberType),
    Float(f64),
}

impl Number {
    /// Promote to float regardless of kind
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(n) => n as f64,
            Number::Float(x) => x,
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Integer(n) => Value::Integer(n),
            Number::Float(x) => Value::Float(x),
        }
    }
}

/// Owned iterator over the elements of a list argument
pub type ValueIter = std::vec::IntoIter<Value>;

/// Conversion of one evaluated argument into a typed parameter.
///
/// Kinds are strict: `i64` accepts only integers and `f64` only floats.
/// Use `Number` to accept either.
pub trait FromParam: Sized {
    fn from_arg(value: Value) -> Result<Self, Error>;
}

impl FromParam for Value {
    fn from_arg(value: Value) -> Result<Self, Error> {
        Ok(value)
    }
}

impl FromParam for NumberType {
    fn from_arg(value: Value) -> Result<Self, Error> {
        NumberType::try_from(value)
    }
}

impl FromParam for f64 {
    fn from_arg(value: Value) -> Result<Self, Error> {
        f64::try_from(value)
    }
}

impl FromParam for Number {
    fn from_arg(value: Value) -> Result<Self, Error> {
        match value {
            Value::Integer(n) => Ok(Number::Integer(n)),
            Value::Float(x) => Ok(Number::Float(x)),
            other => Err(Error::invalid_input(format!(
                "expected number, got {}",
                other.type_name()
            ))),
        }
    }
}

impl FromParam for ValueIter {
    fn from_arg(value: Value) -> Result<Self, Error> {
        match value {
            Value::List(items) => Ok(items.into_iter()),
            other => Err(Error::invalid_input(format!(
                "expected list, got {}",
                other.type_name()
            ))),
        }
    }
}

// =====================================================================
// Return-type adaptation for builtin functions
// =====================================================================

/// Normalizes builtin return types to the canonical `Result<Value, Error>`.
pub trait IntoValueResult {
    fn into_value_result(self) -> Result<Value, Error>;
}

impl<T> IntoValueResult for Result<T, Error>
where
    T: Into<Value>,
{
    fn into_value_result(self) -> Result<Value, Error> {
        self.map(Into::into)
    }
}

impl<T> IntoValueResult for T
where
    T: Into<Value>,
{
    fn into_value_result(self) -> Result<Value, Error> {
        Ok(self.into())
    }
}

/// Converts a strongly-typed Rust function into the erased [`OperationFn`],
/// parameterized by its argument tuple type and return type.
pub trait IntoOperation<Args, R> {
    fn into_operation(self) -> Arc<OperationFn>;
}

/// Converts a function taking every argument as one [`ValueIter`] into the
/// erased [`OperationFn`]. Arity is checked by the registry, not here.
pub trait IntoVariadicOperation<R> {
    fn into_variadic_operation(self) -> Arc<OperationFn>;
}

impl<F, R> IntoVariadicOperation<R> for F
where
    F: Fn(ValueIter) -> R + Send + Sync + 'static,
    R: IntoValueResult,
{
    fn into_variadic_operation(self) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<Value>, _env: &Environment| {
            (self)(args.into_iter()).into_value_result()
        })
    }
}

// =====================================================================
// Fixed-arity adapters
// =====================================================================

// 0-arg functions / closures
impl<F, R> IntoOperation<(), R> for F
where
    F: Fn() -> R + Send + Sync + 'static,
    R: IntoValueResult,
{
    fn into_operation(self) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<Value>, _env: &Environment| {
            if !args.is_empty() {
                return Err(Error::arity_error(0, args.len()));
            }
            (self)().into_value_result()
        })
    }
}

/// Implements `IntoOperation` for one fixed arity. The argument vector is
/// destructured up front, so arity is checked before any kind conversion.
macro_rules! impl_into_operation_for_arity {
    ($arity:expr, $( $v:ident : $A:ident ),+ ) => {
        impl<F, R, $( $A ),+> IntoOperation<( $( $A, )+ ), R> for F
        where
            F: Fn( $( $A ),+ ) -> R + Send + Sync + 'static,
            $( $A: FromParam, )+
            R: IntoValueResult,
        {
            fn into_operation(self) -> Arc<OperationFn> {
                Arc::new(move |args: Vec<Value>, _env: &Environment| {
                    let len = args.len();
                    let Ok([ $( $v ),+ ]) = <[Value; $arity]>::try_from(args) else {
                        return Err(Error::arity_error($arity, len));
                    };
                    (self)( $( <$A as FromParam>::from_arg($v)? ),+ ).into_value_result()
                })
            }
        }
    };
}

impl_into_operation_for_arity!(1, v0: A1);
impl_into_operation_for_arity!(2, v0: A1, v1: A2);
impl_into_operation_for_arity!(3, v0: A1, v1: A2, v2: A3);
impl_into_operation_for_arity!(4, v0: A1, v1: A2, v2: A3, v3: A4);
