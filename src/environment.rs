use crate::core;
use crate::evaluator::{self, EVAL};
use crate::reader;
use crate::types::{Name, NativeFn, PrimitiveEval, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

#[derive(Debug)]
pub struct UnknownSymbol(pub String);

impl fmt::Display for UnknownSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not found: '{}'", self.0)
    }
}

/// One frame of a lexical scope chain.
///
/// Frames are shared: every closure created inside a frame keeps it (and
/// everything outside it) alive for as long as the closure lives.
pub struct Environment {
    data: RefCell<HashMap<Name, Value>>,
    outer: Option<Rc<Environment>>,
}

impl Environment {
    pub fn new(outer: Option<&Rc<Environment>>) -> Rc<Self> {
        Rc::new(Self {
            data: RefCell::new(HashMap::new()),
            outer: outer.cloned(),
        })
    }

    /// A child of `outer` with `params[i]` bound to `args[i]`.
    ///
    /// Callers check arity first; mismatched lengths are a bug in the caller.
    pub fn bind(outer: &Rc<Environment>, params: &[Name], args: &[Value]) -> Rc<Self> {
        assert_eq!(
            params.len(),
            args.len(),
            "Environment::bind: parameter and argument counts differ"
        );
        let env = Self::new(Some(outer));
        for (key, value) in params.iter().zip(args) {
            env.set(key.clone(), value.clone());
        }
        env
    }

    pub fn set(&self, key: Name, value: Value) -> Option<Value> {
        self.data.borrow_mut().insert(key, value)
    }

    pub fn find(&self, key: &Name) -> Option<Value> {
        let mut env = self;
        loop {
            if let Some(value) = env.data.borrow().get(key) {
                return Some(value.clone());
            }
            match &env.outer {
                Some(outer) => env = outer.as_ref(),
                None => return None,
            }
        }
    }

    pub fn get(&self, key: &Name) -> Result<Value, UnknownSymbol> {
        self.find(key)
            .ok_or_else(|| UnknownSymbol(key.as_str().to_owned()))
    }

    fn depth(&self) -> usize {
        let mut depth = 0;
        let mut env = self;
        while let Some(outer) = &env.outer {
            depth += 1;
            env = outer.as_ref();
        }
        depth
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<env depth {} with {} bindings>",
            self.depth(),
            self.data.borrow().len()
        )
    }
}

/// The root environment: every builtin plus `eval`, which evaluates against
/// this environment.
pub fn root() -> Rc<Environment> {
    let env = Environment::new(None);
    for func in core::CORE {
        env.set(Name::from(func.name), Value::Native(NativeFn::Primitive(func)));
    }
    add_eval(&env);
    env
}

fn add_eval(env: &Rc<Environment>) {
    let eval = PrimitiveEval {
        env: Rc::downgrade(env),
    };
    env.set(Name::from("eval"), Value::Native(NativeFn::Eval(eval)));
}

const PRELUDE: &str = include_str!("prelude.mal");

/// Evaluate the bootstrap definitions into `env`, stopping at the first failure.
pub fn read_prelude(env: &Rc<Environment>) -> evaluator::Result<()> {
    let forms = reader::read_all(PRELUDE).map_err(evaluator::Error::Syntax)?;
    for form in forms {
        log::debug!("prelude: {}", form);
        EVAL(&form, env)?;
    }
    Ok(())
}
