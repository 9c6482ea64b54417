use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::Error;
use crate::ast::{Procedure, Value};
use crate::evaluator::intooperation::{IntoOperation, OperationFn};

struct Frame {
    bindings: HashMap<String, Value>,
    parent: Option<Environment>,
}

/// Handle to one frame of the lexical scope chain.
///
/// Cloning the handle shares the frame: a closure's captured environment and
/// the call site see the same bindings, so `set!` through either is visible to
/// both. The parent link is fixed when the frame is created.
#[derive(Clone)]
pub struct Environment(Rc<RefCell<Frame>>);

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// A root frame with no bindings and no parent
    pub fn new() -> Self {
        Environment(Rc::new(RefCell::new(Frame {
            bindings: HashMap::new(),
            parent: None,
        })))
    }

    /// A new frame whose parent is this one, pre-populated with `bindings`
    pub fn child<I>(&self, bindings: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        Environment(Rc::new(RefCell::new(Frame {
            bindings: bindings.into_iter().collect(),
            parent: Some(self.clone()),
        })))
    }

    /// Insert or overwrite a binding in this frame only
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().bindings.insert(name.into(), value);
    }

    /// Resolve a symbol in this frame or the nearest ancestor that binds it
    pub fn lookup(&self, name: &str) -> Result<Value, Error> {
        let mut frame = self.clone();
        loop {
            let parent = {
                let current = frame.0.borrow();
                if let Some(value) = current.bindings.get(name) {
                    return Ok(value.clone());
                }
                current.parent.clone()
            };
            match parent {
                Some(parent) => frame = parent,
                None => return Err(Error::UnboundSymbol(name.to_owned())),
            }
        }
    }

    /// Mutate the binding in the nearest frame where `name` already exists
    pub fn set(&self, name: &str, value: Value) -> Result<(), Error> {
        let mut frame = self.clone();
        loop {
            let parent = {
                let mut current = frame.0.borrow_mut();
                if let Some(slot) = current.bindings.get_mut(name) {
                    *slot = value;
                    return Ok(());
                }
                current.parent.clone()
            };
            match parent {
                Some(parent) => frame = parent,
                None => return Err(Error::UnboundSymbol(name.to_owned())),
            }
        }
    }

    /// True if `name` is bound in this frame itself, ignoring ancestors
    pub fn is_bound_locally(&self, name: &str) -> bool {
        self.0.borrow().bindings.contains_key(name)
    }

    pub fn parent(&self) -> Option<Environment> {
        self.0.borrow().parent.clone()
    }

    /// Register a custom builtin function.
    ///
    /// This is the low-level API: the function receives the evaluated argument
    /// slice and the calling environment and checks arity and kinds itself.
    ///
    /// # Example
    /// ```
    /// use tinylisp::{Environment, Error, Value, evaluate, parse};
    /// use tinylisp::evaluator::create_global_env;
    ///
    /// fn count_args(args: &[Value], _env: &Environment) -> Result<Value, Error> {
    ///     Ok(Value::Integer(args.len() as i64))
    /// }
    ///
    /// let env = create_global_env();
    /// env.register_builtin_function("count-args", count_args);
    /// let expr = parse("(count-args 1 2 3)").unwrap();
    /// assert_eq!(evaluate(&expr, &env).unwrap(), Value::Integer(3));
    /// ```
    pub fn register_builtin_function(
        &self,
        name: &str,
        func: fn(&[Value], &Environment) -> Result<Value, Error>,
    ) {
        let wrapped: Arc<OperationFn> =
            Arc::new(move |args: Vec<Value>, env: &Environment| func(&args, env));
        self.install_native(name, wrapped);
    }

    /// Register a strongly-typed Rust function as a builtin, with automatic
    /// argument extraction and result conversion.
    ///
    /// ```
    /// use tinylisp::{Value, evaluate, parse};
    /// use tinylisp::evaluator::create_global_env;
    ///
    /// fn hypot(a: f64, b: f64) -> f64 {
    ///     a.hypot(b)
    /// }
    ///
    /// let env = create_global_env();
    /// env.register_builtin_operation::<_, (f64, f64), f64>("hypot", hypot);
    /// let expr = parse("(hypot 3.0 4.0)").unwrap();
    /// assert_eq!(evaluate(&expr, &env).unwrap(), Value::Float(5.0));
    /// ```
    ///
    /// Supported parameter types: `i64` (integers only), `f64` (floats only),
    /// `Number` (either), `Value` (anything) and `ValueIter` (a list argument,
    /// iterated by value). Return types: anything `Into<Value>`, or
    /// `Result<R, Error>` of such.
    ///
    /// Arity is enforced automatically; conversion failures and arity
    /// mismatches are `InvalidProcedureInput`.
    pub fn register_builtin_operation<F, Args, R>(&self, name: &str, func: F)
    where
        F: IntoOperation<Args, R> + 'static,
    {
        self.install_native(name, func.into_operation());
    }

    pub(crate) fn install_native(&self, name: &str, func: Arc<OperationFn>) {
        log::debug!("registering builtin `{name}`");
        self.define(
            name,
            Value::Procedure(Procedure::Native {
                name: name.to_owned(),
                func,
            }),
        );
    }

    /// Get all bindings visible from this frame, sorted by name.
    /// Inner frames shadow outer ones.
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut bindings = HashMap::new();

        if let Some(parent) = self.parent() {
            bindings.extend(parent.get_all_bindings());
        }

        for (name, value) in &self.0.borrow().bindings {
            bindings.insert(name.clone(), value.clone());
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    /// Whether two handles refer to the same frame
    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

// Frames can reach themselves through closures, so only names are printed.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frame = self.0.borrow();
        let mut names: Vec<&String> = frame.bindings.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("bindings", &names)
            .field("has_parent", &frame.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::ast::val;

    #[test]
    fn test_define_and_lookup() {
        let env = Environment::new();
        env.define("x", val(1));
        assert_eq!(env.lookup("x").unwrap(), val(1));

        // Redefinition overwrites in the same frame
        env.define("x", val("one"));
        assert_eq!(env.lookup("x").unwrap(), val("one"));

        let err = env.lookup("y").unwrap_err();
        assert_eq!(err, Error::UnboundSymbol("y".into()));
    }

    #[test]
    fn test_child_lookup_walks_outward() {
        let global = Environment::new();
        global.define("a", val(1));
        global.define("b", val(2));

        let child = global.child([("b".to_owned(), val(20))]);
        assert_eq!(child.lookup("a").unwrap(), val(1));
        assert_eq!(child.lookup("b").unwrap(), val(20));
        assert_eq!(global.lookup("b").unwrap(), val(2));
        assert!(child.parent().unwrap().ptr_eq(&global));
    }

    #[test]
    fn test_define_targets_current_frame_only() {
        let global = Environment::new();
        let child = global.child([]);
        child.define("local", val(true));

        assert!(child.is_bound_locally("local"));
        assert_eq!(
            global.lookup("local").unwrap_err().kind(),
            ErrorKind::UnboundSymbol
        );
    }

    #[test]
    fn test_set_mutates_nearest_binding() {
        let global = Environment::new();
        global.define("x", val(1));
        let middle = global.child([]);
        let inner = middle.child([]);

        inner.set("x", val(2)).unwrap();
        assert_eq!(global.lookup("x").unwrap(), val(2));
        assert!(!inner.is_bound_locally("x"));

        middle.define("x", val(10));
        inner.set("x", val(11)).unwrap();
        assert_eq!(middle.lookup("x").unwrap(), val(11));
        assert_eq!(global.lookup("x").unwrap(), val(2));
    }

    #[test]
    fn test_set_unbound_fails() {
        let env = Environment::new().child([]);
        assert_eq!(
            env.set("missing", val(1)).unwrap_err(),
            Error::UnboundSymbol("missing".into())
        );
    }

    #[test]
    fn test_shared_frames_see_mutation() {
        let global = Environment::new();
        global.define("counter", val(0));
        let alias = global.clone();
        alias.set("counter", val(5)).unwrap();
        assert_eq!(global.lookup("counter").unwrap(), val(5));
        assert_eq!(global, alias);
    }

    #[test]
    fn test_get_all_bindings_applies_shadowing() {
        let global = Environment::new();
        global.define("b", val(1));
        global.define("a", val(2));
        let child = global.child([("b".to_owned(), val(3))]);

        let bindings = child.get_all_bindings();
        assert_eq!(
            bindings,
            vec![("a".to_owned(), val(2)), ("b".to_owned(), val(3))]
        );
    }

    #[test]
    fn test_debug_lists_names() {
        let env = Environment::new();
        env.define("z", val(1));
        env.define("y", val(2));
        assert_eq!(
            format!("{env:?}"),
            "Environment { bindings: [\"y\", \"z\"], has_parent: false }"
        );
    }
}
