//! Built-in operations registry.
//!
//! One table lists every special-form keyword and every native procedure the
//! root environment starts with. The evaluator consults it for keywords before
//! symbol lookup; `create_global_env` installs the procedures.
//!
//! ## Functions vs Special Forms
//!
//! - **Functions**: Evaluate all arguments before application (e.g., `+`, `car`, `fsum`)
//! - **Special Forms**: Control evaluation of arguments (e.g., `quote`, `if`, `lambda`)
//!
//! ## Numeric Coercion
//!
//! The binary operators `+ - * / % > < >= <= =` classify both operands first:
//!
//! - integer with integer stays integer, with overflow reported as an error
//! - float with float, or a mix of integer and float, is computed in float
//! - text with text is allowed for `+` (concatenation) and the comparisons
//! - every other pairing is `InvalidProcedureInput`
//!
//! The floating-point library (`ceil`, `floor`, `fabs`, `trunc`, `fmod`, `frexp`,
//! `ldexp`, `isinf`) requires float operands and rejects integers.
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** with typed parameters (`i64`, `f64`, `Number`,
//!    `Value`, `ValueIter`) and a return type convertible into `Value`
//! 2. **Add it to BUILTIN_OPS** with its identifier and arity
//! 3. **Add tests** covering edge cases and error conditions

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::Error;
use crate::ast::{Expression, NumberType, Value};
use crate::environment::Environment;
use crate::evaluator::intooperation::{
    FromParam, IntoOperation, IntoVariadicOperation, Number, OperationFn, ValueIter,
};
use crate::evaluator::{
    Depth, eval_and, eval_begin, eval_define, eval_if, eval_lambda, eval_let, eval_or,
    eval_quote, eval_set,
};

/// Signature of a special form: unevaluated arguments, the current
/// environment and the current evaluation depth.
pub type SpecialFormFn = fn(&[Expression], &Environment, Depth) -> Result<Value, Error>;

/// Represents the implementation of a built-in expression (function or special form)
#[derive(Clone)]
pub enum OpKind {
    /// Regular function that takes evaluated arguments and returns a value
    Function(Arc<OperationFn>),
    /// Special form that receives its arguments unevaluated
    SpecialForm(SpecialFormFn),
}

impl fmt::Debug for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// Accepted argument counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    /// Inclusive bounds
    Range(usize, usize),
    Any,
}

impl Arity {
    pub fn validate(self, arg_count: usize) -> Result<(), Error> {
        let ok = match self {
            Arity::Exact(n) => arg_count == n,
            Arity::AtLeast(n) => arg_count >= n,
            Arity::Range(min, max) => (min..=max).contains(&arg_count),
            Arity::Any => true,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::arity_error(self, arg_count))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Range(min, max) => write!(f, "{min} to {max}"),
            Arity::Any => write!(f, "any number of"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// The identifier this operation is bound to
    pub scheme_id: &'static str,
    /// The implementation of this operation (function or special form)
    pub op_kind: OpKind,
    /// Expected number of arguments
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.scheme_id == other.scheme_id
    }
}

impl BuiltinOp {
    pub fn is_special_form(&self) -> bool {
        matches!(self.op_kind, OpKind::SpecialForm(_))
    }

    pub(crate) fn validate_arity(&self, arg_count: usize) -> Result<(), Error> {
        self.arity.validate(arg_count)
    }
}

//
// Numeric coercion
//

/// Operand pair after applying the promotion rules
enum Operands {
    Integers(NumberType, NumberType),
    Floats(f64, f64),
    Texts(String, String),
}

fn coerce(op: &str, left: Value, right: Value) -> Result<Operands, Error> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Ok(Operands::Integers(a, b)),
        (Value::Float(a), Value::Float(b)) => Ok(Operands::Floats(a, b)),
        (Value::Integer(a), Value::Float(b)) => Ok(Operands::Floats(a as f64, b)),
        (Value::Float(a), Value::Integer(b)) => Ok(Operands::Floats(a, b as f64)),
        (Value::Text(a), Value::Text(b)) => Ok(Operands::Texts(a, b)),
        (a, b) => Err(Error::invalid_input(format!(
            "'{op}' cannot combine {} with {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn overflow(operation: &str) -> Error {
    Error::invalid_input(format!("integer overflow in {operation}"))
}

fn compare_numbers(a: Number, b: Number) -> Option<Ordering> {
    match (a, b) {
        (Number::Integer(x), Number::Integer(y)) => Some(x.cmp(&y)),
        _ => a.as_f64().partial_cmp(&b.as_f64()),
    }
}

//
// Builtin Function Implementations
//

fn builtin_add(left: Value, right: Value) -> Result<Value, Error> {
    match coerce("+", left, right)? {
        Operands::Integers(a, b) => a
            .checked_add(b)
            .map(Value::Integer)
            .ok_or_else(|| overflow("addition")),
        Operands::Floats(a, b) => Ok(Value::Float(a + b)),
        Operands::Texts(mut a, b) => {
            a.push_str(&b);
            Ok(Value::Text(a))
        }
    }
}

// Macro to generate numeric-only arithmetic (text operands are rejected)
macro_rules! numeric_arithmetic {
    ($name:ident, $op_str:literal, $checked:ident, $op:tt, $what:literal) => {
        fn $name(left: Value, right: Value) -> Result<Value, Error> {
            match coerce($op_str, left, right)? {
                Operands::Integers(a, b) => {
                    a.$checked(b).map(Value::Integer).ok_or_else(|| overflow($what))
                }
                Operands::Floats(a, b) => Ok(Value::Float(a $op b)),
                Operands::Texts(..) => Err(Error::invalid_input(concat!(
                    "'",
                    $op_str,
                    "' is not defined for text"
                ))),
            }
        }
    };
}

numeric_arithmetic!(builtin_sub, "-", checked_sub, -, "subtraction");
numeric_arithmetic!(builtin_mul, "*", checked_mul, *, "multiplication");

fn builtin_div(left: Value, right: Value) -> Result<Value, Error> {
    match coerce("/", left, right)? {
        Operands::Integers(_, 0) => Err(Error::invalid_input("integer division by zero")),
        Operands::Integers(a, b) => a
            .checked_div(b)
            .map(Value::Integer)
            .ok_or_else(|| overflow("division")),
        Operands::Floats(a, b) => Ok(Value::Float(a / b)),
        Operands::Texts(..) => Err(Error::invalid_input("'/' is not defined for text")),
    }
}

fn builtin_mod(a: NumberType, b: NumberType) -> Result<NumberType, Error> {
    if b == 0 {
        return Err(Error::invalid_input("integer modulo by zero"));
    }
    a.checked_rem(b).ok_or_else(|| overflow("modulo"))
}

// Macro to generate comparison functions; text compares lexicographically
macro_rules! comparison {
    ($name:ident, $op:tt, $op_str:expr) => {
        fn $name(left: Value, right: Value) -> Result<bool, Error> {
            Ok(match coerce($op_str, left, right)? {
                Operands::Integers(a, b) => a $op b,
                Operands::Floats(a, b) => a $op b,
                Operands::Texts(a, b) => a $op b,
            })
        }
    };
}

comparison!(builtin_eq, ==, "=");
comparison!(builtin_lt, <, "<");
comparison!(builtin_gt, >, ">");
comparison!(builtin_le, <=, "<=");
comparison!(builtin_ge, >=, ">=");

fn builtin_abs(n: Number) -> Result<Number, Error> {
    match n {
        Number::Integer(i) => i
            .checked_abs()
            .map(Number::Integer)
            .ok_or_else(|| overflow("abs")),
        Number::Float(x) => Ok(Number::Float(x.abs())),
    }
}

fn builtin_factorial(n: NumberType) -> Result<NumberType, Error> {
    if n < 0 {
        return Err(Error::invalid_input(format!(
            "factorial of negative number {n}"
        )));
    }
    (2..=n)
        .try_fold(1 as NumberType, |acc, k| acc.checked_mul(k))
        .ok_or_else(|| overflow("factorial"))
}

fn builtin_ceil(x: f64) -> f64 {
    x.ceil()
}

fn builtin_floor(x: f64) -> f64 {
    x.floor()
}

fn builtin_fabs(x: f64) -> f64 {
    x.abs()
}

fn builtin_trunc(x: f64) -> f64 {
    x.trunc()
}

// Remainder truncated toward zero, sign of the dividend
fn builtin_fmod(x: f64, y: f64) -> f64 {
    x % y
}

/// Split into a mantissa in `[0.5, 1)` and a power of two.
/// Zero, infinities and NaN come back unchanged with exponent 0.
fn frexp(x: f64) -> (f64, NumberType) {
    const EXPONENT_MASK: u64 = 0x7ff << 52;

    if x == 0.0 || !x.is_finite() {
        return (x, 0);
    }
    let bits = x.to_bits();
    let biased = ((bits & EXPONENT_MASK) >> 52) as NumberType;
    if biased == 0 {
        // Subnormal: scale into the normal range first
        let (mantissa, exponent) = frexp(x * 2f64.powi(54));
        return (mantissa, exponent - 54);
    }
    let mantissa = f64::from_bits((bits & !EXPONENT_MASK) | (1022 << 52));
    (mantissa, biased - 1022)
}

fn builtin_frexp(x: f64) -> Value {
    let (mantissa, exponent) = frexp(x);
    Value::List(vec![Value::Float(mantissa), Value::Integer(exponent)])
}

/// `x * 2^exp`, scaled in steps so large exponents neither overflow `powi`
/// nor lose subnormal results.
fn builtin_ldexp(mut x: f64, mut exp: NumberType) -> f64 {
    const STEP: NumberType = 1000;

    while exp > STEP && x.is_finite() && x != 0.0 {
        x *= 2f64.powi(STEP as i32);
        exp -= STEP;
    }
    while exp < -STEP && x.is_finite() && x != 0.0 {
        x *= 2f64.powi(-STEP as i32);
        exp += STEP;
    }
    let exp = exp.clamp(-STEP, STEP) as i32;
    x * 2f64.powi(exp)
}

// Integer result only when both operands are integers
fn builtin_copysign(magnitude: Number, sign: Number) -> Result<Number, Error> {
    match (magnitude, sign) {
        (Number::Integer(m), Number::Integer(s)) => {
            let m = m.checked_abs().ok_or_else(|| overflow("copysign"))?;
            Ok(Number::Integer(if s < 0 { -m } else { m }))
        }
        (m, s) => Ok(Number::Float(m.as_f64().copysign(s.as_f64()))),
    }
}

fn builtin_isinf(x: f64) -> bool {
    x.is_infinite()
}

// True for anything that is not a number; numbers, NaN included, give false
fn builtin_isnan(value: Value) -> bool {
    !value.is_numeric()
}

fn builtin_fsum(items: ValueIter) -> Result<Value, Error> {
    let mut sum: Option<Value> = None;
    for item in items {
        if !matches!(item, Value::Integer(_) | Value::Float(_) | Value::Text(_)) {
            return Err(Error::invalid_input(format!(
                "fsum cannot add {}",
                item.type_name()
            )));
        }
        sum = Some(match sum {
            None => item,
            Some(acc) => builtin_add(acc, item)?,
        });
    }
    Ok(sum.unwrap_or(Value::Integer(0)))
}

fn builtin_car(mut list: ValueIter) -> Result<Value, Error> {
    list.next()
        .ok_or_else(|| Error::invalid_input("car of empty list"))
}

fn builtin_cdr(mut list: ValueIter) -> Result<Value, Error> {
    let Some(_) = list.next() else {
        return Err(Error::invalid_input("cdr of empty list"));
    };
    Ok(Value::List(list.collect()))
}

fn builtin_append(first: ValueIter, second: ValueIter) -> Value {
    Value::List(first.chain(second).collect())
}

fn builtin_cons(first: Value, rest: ValueIter) -> Value {
    let mut list = Vec::with_capacity(rest.len() + 1);
    list.push(first);
    list.extend(rest);
    Value::List(list)
}

fn builtin_list(args: ValueIter) -> Value {
    Value::List(args.collect())
}

fn builtin_null(value: Value) -> bool {
    value.is_nil()
}

fn builtin_not(value: Value) -> bool {
    !value.is_truthy()
}

/// Shared fold for `max`/`min`: numeric operands only, float result as soon
/// as any operand is a float.
fn extremum(
    args: ValueIter,
    replace: fn(Option<Ordering>) -> bool,
) -> Result<Value, Error> {
    let mut best: Option<Number> = None;
    let mut saw_float = false;
    for arg in args {
        let candidate = Number::from_arg(arg)?;
        saw_float |= matches!(candidate, Number::Float(_));
        best = match best {
            Some(current) if !replace(compare_numbers(candidate, current)) => Some(current),
            _ => Some(candidate),
        };
    }
    let best = best.ok_or_else(|| Error::arity_error(Arity::AtLeast(1), 0))?;
    Ok(if saw_float {
        Value::Float(best.as_f64())
    } else {
        best.into()
    })
}

fn builtin_max(args: ValueIter) -> Result<Value, Error> {
    extremum(args, |ord| ord == Some(Ordering::Greater))
}

fn builtin_min(args: ValueIter) -> Result<Value, Error> {
    extremum(args, |ord| ord == Some(Ordering::Less))
}

/// Global registry of all built-in operations.
///
/// Kept as a single contiguous collection for ease of auditing. Typed builtin
/// implementations are wrapped through the adapter layer once, at first use.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    fn builtin_fixed<Args, R, F>(f: F) -> OpKind
    where
        F: IntoOperation<Args, R>,
    {
        OpKind::Function(f.into_operation())
    }

    // Variadic adapters do not know their arity; check it before the call
    fn builtin_variadic<R, F>(arity: Arity, f: F) -> OpKind
    where
        F: IntoVariadicOperation<R>,
    {
        let inner = f.into_variadic_operation();
        OpKind::Function(Arc::new(move |args: Vec<Value>, env: &Environment| {
            arity.validate(args.len())?;
            inner(args, env)
        }))
    }

    fn op(scheme_id: &'static str, arity: Arity, op_kind: OpKind) -> BuiltinOp {
        BuiltinOp {
            scheme_id,
            op_kind,
            arity,
        }
    }

    use Arity::{Any, AtLeast, Exact};

    vec![
        // Special forms
        op("quote", Exact(1), OpKind::SpecialForm(eval_quote)),
        op("if", Exact(3), OpKind::SpecialForm(eval_if)),
        op("define", AtLeast(2), OpKind::SpecialForm(eval_define)),
        op("set!", Exact(2), OpKind::SpecialForm(eval_set)),
        op("lambda", AtLeast(2), OpKind::SpecialForm(eval_lambda)),
        op("begin", Any, OpKind::SpecialForm(eval_begin)),
        op("let", AtLeast(2), OpKind::SpecialForm(eval_let)),
        op("and", Any, OpKind::SpecialForm(eval_and)),
        op("or", Any, OpKind::SpecialForm(eval_or)),
        // Arithmetic
        op("+", Exact(2), builtin_fixed::<(Value, Value), _, _>(builtin_add)),
        op("-", Exact(2), builtin_fixed::<(Value, Value), _, _>(builtin_sub)),
        op("*", Exact(2), builtin_fixed::<(Value, Value), _, _>(builtin_mul)),
        op("/", Exact(2), builtin_fixed::<(Value, Value), _, _>(builtin_div)),
        op("%", Exact(2), builtin_fixed::<(NumberType, NumberType), _, _>(builtin_mod)),
        op("abs", Exact(1), builtin_fixed::<(Number,), _, _>(builtin_abs)),
        op("factorial", Exact(1), builtin_fixed::<(NumberType,), _, _>(builtin_factorial)),
        op("max", AtLeast(1), builtin_variadic(AtLeast(1), builtin_max)),
        op("min", AtLeast(1), builtin_variadic(AtLeast(1), builtin_min)),
        // Comparison
        op("=", Exact(2), builtin_fixed::<(Value, Value), _, _>(builtin_eq)),
        op("<", Exact(2), builtin_fixed::<(Value, Value), _, _>(builtin_lt)),
        op(">", Exact(2), builtin_fixed::<(Value, Value), _, _>(builtin_gt)),
        op("<=", Exact(2), builtin_fixed::<(Value, Value), _, _>(builtin_le)),
        op(">=", Exact(2), builtin_fixed::<(Value, Value), _, _>(builtin_ge)),
        op("not", Exact(1), builtin_fixed::<(Value,), _, _>(builtin_not)),
        // Floating point
        op("ceil", Exact(1), builtin_fixed::<(f64,), _, _>(builtin_ceil)),
        op("floor", Exact(1), builtin_fixed::<(f64,), _, _>(builtin_floor)),
        op("fabs", Exact(1), builtin_fixed::<(f64,), _, _>(builtin_fabs)),
        op("trunc", Exact(1), builtin_fixed::<(f64,), _, _>(builtin_trunc)),
        op("fmod", Exact(2), builtin_fixed::<(f64, f64), _, _>(builtin_fmod)),
        op("frexp", Exact(1), builtin_fixed::<(f64,), _, _>(builtin_frexp)),
        op("ldexp", Exact(2), builtin_fixed::<(f64, NumberType), _, _>(builtin_ldexp)),
        op("copysign", Exact(2), builtin_fixed::<(Number, Number), _, _>(builtin_copysign)),
        op("isinf", Exact(1), builtin_fixed::<(f64,), _, _>(builtin_isinf)),
        op("isnan", Exact(1), builtin_fixed::<(Value,), _, _>(builtin_isnan)),
        op("fsum", Exact(1), builtin_fixed::<(ValueIter,), _, _>(builtin_fsum)),
        // Lists
        op("car", Exact(1), builtin_fixed::<(ValueIter,), _, _>(builtin_car)),
        op("cdr", Exact(1), builtin_fixed::<(ValueIter,), _, _>(builtin_cdr)),
        op("append", Exact(2), builtin_fixed::<(ValueIter, ValueIter), _, _>(builtin_append)),
        op("cons", Exact(2), builtin_fixed::<(Value, ValueIter), _, _>(builtin_cons)),
        op("list", Any, builtin_variadic(Any, builtin_list)),
        op("null?", Exact(1), builtin_fixed::<(Value,), _, _>(builtin_null)),
    ]
});

/// Lazy static map from scheme_id to BuiltinOp (private - use find_scheme_op)
static BUILTIN_SCHEME: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.scheme_id, op)).collect()
});

/// All builtin operations, special forms included
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by its identifier
pub fn find_scheme_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_SCHEME.get(id).copied()
}
