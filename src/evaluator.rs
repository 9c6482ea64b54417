use std::rc::Rc;
use std::sync::Arc;

use crate::Error;
use crate::ast::{Closure, Expression, Procedure, Value, string_literal};
use crate::builtinops::{OpKind, find_scheme_op, get_builtin_ops};
use crate::environment::Environment;

pub mod intooperation;

/// Constants bound in every root environment
const CONSTANTS: [(&str, f64); 5] = [
    ("pi", std::f64::consts::PI),
    ("π", std::f64::consts::PI),
    ("e", std::f64::consts::E),
    ("𝑒", std::f64::consts::E),
    ("inf", f64::INFINITY),
];

/// Evaluation depth, carried by value through recursive calls.
///
/// Every nested list evaluation and every closure body goes one level
/// deeper; the limit, when present, turns runaway recursion into
/// `DepthLimitExceeded` instead of a native stack overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Depth {
    current: usize,
    limit: Option<usize>,
}

impl Depth {
    pub(crate) fn unbounded() -> Self {
        Depth {
            current: 0,
            limit: None,
        }
    }

    pub(crate) fn limited(max_depth: usize) -> Self {
        Depth {
            current: 0,
            limit: Some(max_depth),
        }
    }

    fn deeper(self) -> Self {
        Depth {
            current: self.current + 1,
            ..self
        }
    }

    fn check(self) -> Result<(), Error> {
        match self.limit {
            Some(limit) if self.current > limit => Err(Error::DepthLimitExceeded(limit)),
            _ => Ok(()),
        }
    }
}

/// Create a root environment with the constants and every builtin procedure.
///
/// Special forms are not bound here; the evaluator recognizes them by keyword.
pub fn create_global_env() -> Environment {
    let env = Environment::new();

    for (name, value) in CONSTANTS {
        env.define(name, Value::Float(value));
    }

    let mut installed = 0;
    for op in get_builtin_ops() {
        if let OpKind::Function(func) = &op.op_kind {
            env.define(
                op.scheme_id,
                Value::Procedure(Procedure::Native {
                    name: op.scheme_id.to_owned(),
                    func: Arc::clone(func),
                }),
            );
            installed += 1;
        }
    }

    log::debug!(
        "created global environment with {installed} builtins and {} constants",
        CONSTANTS.len()
    );
    env
}

/// Evaluate an expression with no depth limit
pub fn eval(expr: &Expression, env: &Environment) -> Result<Value, Error> {
    eval_with_depth_tracking(expr, env, Depth::unbounded())
}

/// Evaluate an expression, failing once nesting exceeds `max_depth`
pub fn eval_with_limit(
    expr: &Expression,
    env: &Environment,
    max_depth: usize,
) -> Result<Value, Error> {
    eval_with_depth_tracking(expr, env, Depth::limited(max_depth))
}

/// Apply an already-evaluated procedure to already-evaluated arguments.
///
/// A non-procedure applied to no arguments evaluates to itself, so `(pi)`
/// and `(5)` are values rather than errors.
pub fn apply(func: &Value, args: Vec<Value>, env: &Environment) -> Result<Value, Error> {
    apply_with_depth(func, args, env, Depth::unbounded())
}

pub(crate) fn eval_with_depth_tracking(
    expr: &Expression,
    env: &Environment,
    depth: Depth,
) -> Result<Value, Error> {
    depth.check()?;

    match expr {
        Expression::Integer(n) => Ok(Value::Integer(*n)),
        Expression::Float(x) => Ok(Value::Float(*x)),
        Expression::Boolean(b) => Ok(Value::Boolean(*b)),
        Expression::Text(text) => match string_literal(text) {
            Some(contents) => Ok(Value::Text(contents.to_owned())),
            None => env.lookup(text),
        },
        Expression::List(elements) => {
            eval_list(elements, env, depth).map_err(|err| add_context(err, expr))
        }
    }
}

/// Attach the innermost failing form to procedure-input errors
fn add_context(error: Error, expr: &Expression) -> Error {
    const MARKER: &str = "\n  while evaluating: ";

    match error {
        Error::InvalidProcedureInput(message) if !message.contains(MARKER) => {
            Error::InvalidProcedureInput(format!("{message}{MARKER}{expr}"))
        }
        other => other,
    }
}

fn eval_list(elements: &[Expression], env: &Environment, depth: Depth) -> Result<Value, Error> {
    let [head, arg_exprs @ ..] = elements else {
        return Ok(Value::List(Vec::new()));
    };

    // Keywords win over bindings of the same name
    if let Some(keyword) = head.as_symbol()
        && let Some(op) = find_scheme_op(keyword)
        && let &OpKind::SpecialForm(special_form) = &op.op_kind
    {
        op.validate_arity(arg_exprs.len())?;
        return special_form(arg_exprs, env, depth);
    }

    let func = eval_with_depth_tracking(head, env, depth.deeper())?;
    let args = arg_exprs
        .iter()
        .map(|arg| eval_with_depth_tracking(arg, env, depth.deeper()))
        .collect::<Result<Vec<_>, _>>()?;

    apply_with_depth(&func, args, env, depth)
}

fn apply_with_depth(
    func: &Value,
    args: Vec<Value>,
    env: &Environment,
    depth: Depth,
) -> Result<Value, Error> {
    match func {
        Value::Procedure(Procedure::Native { func, .. }) => func(args, env),
        Value::Procedure(Procedure::Closure(closure)) => {
            let params = closure.params();
            if params.len() != args.len() {
                return Err(Error::arity_error(params.len(), args.len()));
            }
            log::trace!("applying closure ({}) to {} args", params.join(" "), args.len());
            let frame = closure.env().child(params.iter().cloned().zip(args));
            eval_with_depth_tracking(closure.body(), &frame, depth.deeper())
        }
        value if args.is_empty() => Ok(value.clone()),
        value => Err(Error::invalid_input(format!(
            "{} is not a procedure",
            value.type_name()
        ))),
    }
}

/// Evaluate a sequence of forms in `env`, returning the last value or `()`
fn eval_sequence(body: &[Expression], env: &Environment, depth: Depth) -> Result<Value, Error> {
    let mut result = Value::List(Vec::new());
    for expr in body {
        result = eval_with_depth_tracking(expr, env, depth.deeper())?;
    }
    Ok(result)
}

fn expect_symbol<'a>(expr: &'a Expression, form: &str) -> Result<&'a str, Error> {
    expr.as_symbol().ok_or_else(|| {
        Error::invalid_input(format!("{form} requires a symbol, got {expr}"))
    })
}

/// Build a closure over `env`. Several body forms behave as one `begin`.
fn make_closure(
    params: &[Expression],
    body: &[Expression],
    env: &Environment,
) -> Result<Value, Error> {
    let mut names: Vec<String> = Vec::with_capacity(params.len());
    for param in params {
        let name = expect_symbol(param, "lambda parameter")?;
        if names.iter().any(|existing| existing == name) {
            return Err(Error::invalid_input(format!(
                "duplicate lambda parameter: {name}"
            )));
        }
        names.push(name.to_owned());
    }

    let body = match body {
        [single] => single.clone(),
        forms => {
            let mut sequence = Vec::with_capacity(forms.len() + 1);
            sequence.push(Expression::Text("begin".to_owned()));
            sequence.extend_from_slice(forms);
            Expression::List(sequence)
        }
    };

    Ok(Value::Procedure(Procedure::Closure(Rc::new(Closure {
        params: names,
        body,
        env: env.clone(),
    }))))
}

//
// Special forms
//
// Arity has already been validated against the registry when these run.
//

/// `(quote expr)`: the expression itself as a value, unevaluated
pub(crate) fn eval_quote(args: &[Expression], _env: &Environment, _depth: Depth) -> Result<Value, Error> {
    match args {
        [expr] => Ok(Value::from(expr)),
        _ => Err(Error::arity_error(1, args.len())),
    }
}

/// `(if test consequent alternative)`: only `#f` selects the alternative
pub(crate) fn eval_if(args: &[Expression], env: &Environment, depth: Depth) -> Result<Value, Error> {
    let [test, consequent, alternative] = args else {
        return Err(Error::arity_error(3, args.len()));
    };
    let branch = if eval_with_depth_tracking(test, env, depth.deeper())?.is_truthy() {
        consequent
    } else {
        alternative
    };
    eval_with_depth_tracking(branch, env, depth.deeper())
}

/// `(define name expr)` or `(define (name params...) body...)`.
/// Binds in the current frame and returns the bound value.
pub(crate) fn eval_define(args: &[Expression], env: &Environment, depth: Depth) -> Result<Value, Error> {
    let (name, value) = match args {
        [Expression::List(signature), body @ ..] => {
            let [name_expr, params @ ..] = signature.as_slice() else {
                return Err(Error::invalid_input("define requires a procedure name"));
            };
            let name = expect_symbol(name_expr, "define")?;
            (name, make_closure(params, body, env)?)
        }
        [target, value_expr] => {
            let name = expect_symbol(target, "define")?;
            (name, eval_with_depth_tracking(value_expr, env, depth.deeper())?)
        }
        _ => {
            return Err(Error::invalid_input(
                "define requires a symbol and exactly one expression",
            ));
        }
    };

    log::debug!("define {name} = {value}");
    env.define(name, value.clone());
    Ok(value)
}

/// `(set! name expr)`: rebinds the nearest existing binding
pub(crate) fn eval_set(args: &[Expression], env: &Environment, depth: Depth) -> Result<Value, Error> {
    let [target, value_expr] = args else {
        return Err(Error::arity_error(2, args.len()));
    };
    let name = expect_symbol(target, "set!")?;
    let value = eval_with_depth_tracking(value_expr, env, depth.deeper())?;
    env.set(name, value.clone())?;
    log::debug!("set! {name} = {value}");
    Ok(value)
}

pub(crate) fn eval_lambda(args: &[Expression], env: &Environment, _depth: Depth) -> Result<Value, Error> {
    match args {
        [Expression::List(params), body @ ..] if !body.is_empty() => {
            make_closure(params, body, env)
        }
        [Expression::List(_)] => Err(Error::invalid_input("lambda requires a body")),
        _ => Err(Error::invalid_input("lambda parameters must be a list")),
    }
}

pub(crate) fn eval_begin(args: &[Expression], env: &Environment, depth: Depth) -> Result<Value, Error> {
    eval_sequence(args, env, depth)
}

/// `(let ((name expr)...) body...)`: initializers see the outer scope only
pub(crate) fn eval_let(args: &[Expression], env: &Environment, depth: Depth) -> Result<Value, Error> {
    let [Expression::List(binding_exprs), body @ ..] = args else {
        return Err(Error::invalid_input("let bindings must be a list"));
    };

    let mut bindings: Vec<(String, Value)> = Vec::with_capacity(binding_exprs.len());
    for binding in binding_exprs {
        let Expression::List(pair) = binding else {
            return Err(Error::invalid_input(format!(
                "let binding must be (name expr), got {binding}"
            )));
        };
        let [name_expr, init] = pair.as_slice() else {
            return Err(Error::invalid_input(format!(
                "let binding must be (name expr), got {binding}"
            )));
        };
        let name = expect_symbol(name_expr, "let")?;
        if bindings.iter().any(|(existing, _)| existing == name) {
            return Err(Error::invalid_input(format!("duplicate let binding: {name}")));
        }
        let value = eval_with_depth_tracking(init, env, depth.deeper())?;
        bindings.push((name.to_owned(), value));
    }

    eval_sequence(body, &env.child(bindings), depth)
}

// Macro for short-circuiting boolean forms: stop at the first value whose
// truthiness equals `$stop_when` and return it unchanged.
macro_rules! boolean_logic_op {
    ($name:ident, $empty:expr, $stop_when:expr) => {
        pub(crate) fn $name(
            args: &[Expression],
            env: &Environment,
            depth: Depth,
        ) -> Result<Value, Error> {
            let mut result = Value::Boolean($empty);
            for arg in args {
                result = eval_with_depth_tracking(arg, env, depth.deeper())?;
                if result.is_truthy() == $stop_when {
                    break;
                }
            }
            Ok(result)
        }
    };
}

boolean_logic_op!(eval_and, true, false);
boolean_logic_op!(eval_or, false, true);
