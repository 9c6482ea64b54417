use crate::Error;
use crate::ast::{Expression, Value};
use crate::environment::Environment;
use crate::evaluator::{create_global_env, eval, eval_with_limit};
use crate::scheme::{ParseConfig, Reader};

/// Settings for one interpreter instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterpreterConfig {
    pub parse: ParseConfig,
    /// Evaluation nesting limit; `None` for unlimited
    pub max_eval_depth: Option<usize>,
}

/// An interpreter owning its own global environment.
///
/// Definitions persist across calls on the same instance. Separate instances
/// never share bindings.
///
/// ```
/// use tinylisp::{Interpreter, Value};
///
/// let interpreter = Interpreter::new();
/// interpreter.eval_source("(define (double x) (* x 2))").unwrap();
/// assert_eq!(interpreter.eval_source("(double 21)").unwrap(), Value::Integer(42));
/// ```
#[derive(Debug)]
pub struct Interpreter {
    env: Environment,
    config: InterpreterConfig,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        log::debug!("creating interpreter with {config:?}");
        Interpreter {
            env: create_global_env(),
            config,
        }
    }

    pub fn global_env(&self) -> &Environment {
        &self.env
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Evaluate one parsed expression in the global environment
    pub fn eval(&self, expr: &Expression) -> Result<Value, Error> {
        match self.config.max_eval_depth {
            Some(max_depth) => eval_with_limit(expr, &self.env, max_depth),
            None => eval(expr, &self.env),
        }
    }

    /// Read and evaluate every form in `source`, returning the last value.
    /// Empty source evaluates to `()`. Stops at the first error; forms
    /// evaluated before it keep their effects.
    pub fn eval_source(&self, source: &str) -> Result<Value, Error> {
        let mut last = Value::List(Vec::new());
        for form in Reader::with_config(source, self.config.parse)? {
            last = self.eval(&form?)?;
        }
        Ok(last)
    }

    /// Discard every definition and start over from a fresh global environment
    pub fn reset(&mut self) {
        log::debug!("resetting interpreter environment");
        self.env = create_global_env();
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::ast::{nil, val};

    #[test]
    fn test_definitions_persist_across_calls() {
        let interpreter = Interpreter::new();
        interpreter.eval_source("(define x 40)").unwrap();
        assert_eq!(interpreter.eval_source("(+ x 2)").unwrap(), val(42));
        assert_eq!(interpreter.eval_source("").unwrap(), nil());
        assert_eq!(
            interpreter.eval_source("(define y 1) (set! y 5) (* y y)").unwrap(),
            val(25)
        );
    }

    #[test]
    fn test_instances_are_isolated() {
        let first = Interpreter::new();
        let second = Interpreter::default();
        first.eval_source("(define secret 1)").unwrap();
        assert_eq!(
            second.eval_source("secret").unwrap_err().kind(),
            ErrorKind::UnboundSymbol
        );
    }

    #[test]
    fn test_errors_keep_earlier_effects() {
        let interpreter = Interpreter::new();
        let err = interpreter
            .eval_source("(define a 1) (car 5) (define b 2)")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidProcedureInput);
        assert_eq!(interpreter.eval_source("a").unwrap(), val(1));
        assert!(interpreter.eval_source("b").is_err());

        let err = interpreter.eval_source("(define c 3) (").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(interpreter.eval_source("c").unwrap(), val(3));
    }

    #[test]
    fn test_config_is_applied() {
        let interpreter = Interpreter::with_config(InterpreterConfig {
            parse: ParseConfig {
                handle_comments: true,
                max_depth: None,
            },
            max_eval_depth: Some(100),
        });
        assert_eq!(
            interpreter.eval_source("(+ 1 2) ; three").unwrap(),
            val(3)
        );
        // A carriage return ends a comment like a newline does
        assert_eq!(
            interpreter
                .eval_source("(define z 4) ; four\r(* z z)")
                .unwrap(),
            val(16)
        );
        interpreter
            .eval_source("(define (down n) (if (= n 0) 0 (down (- n 1))))")
            .unwrap();
        assert_eq!(interpreter.eval_source("(down 5)").unwrap(), val(0));
        assert_eq!(
            interpreter.eval_source("(down 1000)").unwrap_err(),
            Error::DepthLimitExceeded(100)
        );
    }

    #[test]
    fn test_reset() {
        let mut interpreter = Interpreter::new();
        interpreter.eval_source("(define temp 1)").unwrap();
        interpreter.reset();
        assert!(interpreter.eval_source("temp").is_err());
        assert_eq!(interpreter.eval_source("(abs -3)").unwrap(), val(3));
    }
}
