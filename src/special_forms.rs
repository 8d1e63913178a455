use crate::environment::Environment;
use crate::evaluator::{EvalContext, Result, EVAL};
use crate::types::{
    Arity, BadArgCount, BadClosureParameters, Closure, ClosureParameters, Name, Value,
};
use itertools::Itertools;
use std::fmt;
use std::rc::Rc;

/// A special form whose operands have the wrong shape.
#[derive(Debug)]
pub enum FormError {
    KeyNotASymbol(&'static str),
    BindingsNotAList,
    BindingsOddLength(usize),
    BindToNonSymbol,
    ParametersNotAList,
    ParameterNotASymbol,
    BadVariadic(BadClosureParameters),
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormError::KeyNotASymbol(form) => {
                write!(f, "{}: first parameter must be a symbol", form)
            }
            FormError::BindingsNotAList => write!(f, "let*: bindings must be a list"),
            FormError::BindingsOddLength(n) => {
                write!(f, "let*: bindings must come in pairs; found {}", n)
            }
            FormError::BindToNonSymbol => {
                write!(f, "let*: left-hand side of a binding must be a symbol")
            }
            FormError::ParametersNotAList => write!(f, "fn*: parameters must be a list"),
            FormError::ParameterNotASymbol => write!(f, "fn*: parameters must be symbols"),
            FormError::BadVariadic(e) => write!(f, "fn*: {}", e),
        }
    }
}

pub fn apply_def(args: &[Value], env: &Rc<Environment>, make_macro: bool) -> Result {
    let form = if make_macro { "defmacro!" } else { "def!" };
    Arity::exactly(2).validate_for(args.len(), form)?;
    let key = args[0]
        .as_symbol()
        .map_err(|_| FormError::KeyNotASymbol(form))?;
    let value = EVAL(&args[1], env)?;
    let value = match make_macro {
        true => {
            let mut macro_closure = value.as_closure()?.clone();
            macro_closure.is_macro = true;
            Value::Closure(Rc::new(macro_closure))
        }
        false => value,
    };
    log::debug!("define {} as {}", key, value);
    env.set(key.clone(), value.clone());
    Ok(value)
}

/// Build the `let*` environment; the body is left for the caller to evaluate
/// in tail position.
pub fn apply_let(args: &[Value], env: &Rc<Environment>) -> Result<EvalContext> {
    Arity::exactly(2).validate_for(args.len(), "let*")?;
    let bindings = args[0]
        .as_list()
        .map_err(|_| FormError::BindingsNotAList)?;
    if bindings.len() % 2 != 0 {
        return Err(FormError::BindingsOddLength(bindings.len()).into());
    }

    let child = Environment::new(Some(env));
    for (key, value) in bindings.iter().tuples() {
        let key = key.as_symbol().map_err(|_| FormError::BindToNonSymbol)?;
        // Evaluate in the child so that later bindings can refer to earlier ones
        let value = EVAL(value, &child)?;
        child.set(key.clone(), value);
    }
    Ok((args[1].clone(), child))
}

/// Evaluate all but the last form, which is returned unevaluated.
pub fn apply_do(args: &[Value], env: &Rc<Environment>) -> Result {
    Arity::at_least(1).validate_for(args.len(), "do")?;
    let last = args.len() - 1;
    for obj in &args[..last] {
        EVAL(obj, env)?;
    }
    Ok(args[last].clone())
}

/// The branch to continue with, if there is one.
pub fn apply_if(args: &[Value], env: &Rc<Environment>) -> Result<Option<Value>> {
    Arity::Between(1..=3).validate_for(args.len(), "if")?;
    let condition = EVAL(&args[0], env)?;
    let branch = if condition.truthy() {
        args.get(1)
    } else {
        args.get(2)
    };
    Ok(branch.cloned())
}

pub fn apply_fn(args: &[Value], env: &Rc<Environment>) -> Result {
    // We expect exactly two arguments. The first, a parameters list, should be
    // a list of symbols. The second, the body of the function we're defining,
    // can be anything.
    Arity::exactly(2).validate_for(args.len(), "fn*")?;
    let parameters = args[0]
        .as_list()
        .map_err(|_| FormError::ParametersNotAList)?;
    let parameters: std::result::Result<Vec<Name>, _> = parameters
        .iter()
        .map(|obj| obj.as_symbol().map(Name::clone))
        .collect();
    let parameters = parameters.map_err(|_| FormError::ParameterNotASymbol)?;

    let closure = Closure {
        parameters: ClosureParameters::new(parameters).map_err(FormError::BadVariadic)?,
        body: args[1].clone(),
        env: env.clone(),
        is_macro: false,
    };
    Ok(Value::Closure(Rc::new(closure)))
}

/// Rewrite a quasiquoted template into the `cons`/`concat`/`quote` calls that
/// build it.
pub(crate) fn apply_quasiquote(ast: &Value) -> std::result::Result<Value, BadArgCount> {
    match ast {
        Value::List(list) if !list.is_empty() => quasiquote_list(list),
        _ => Ok(quote(ast.clone())),
    }
}

fn quote(obj: Value) -> Value {
    Value::wrap_list(vec![Value::new_symbol("quote"), obj])
}

fn quasiquote_list(ast: &[Value]) -> std::result::Result<Value, BadArgCount> {
    if ast[0].is_symbol_named("unquote") {
        Arity::exactly(2).validate_for(ast.len(), "unquote")?;
        return Ok(ast[1].clone());
    }

    let rest = match &ast[1..] {
        [] => quote(Value::new_list()),
        rest => quasiquote_list(rest)?,
    };
    match &ast[0] {
        Value::List(head)
            if head
                .first()
                .map_or(false, |obj| obj.is_symbol_named("splice-unquote")) =>
        {
            Arity::exactly(2).validate_for(head.len(), "splice-unquote")?;
            Ok(Value::wrap_list(vec![
                Value::new_symbol("concat"),
                head[1].clone(),
                rest,
            ]))
        }
        head => Ok(Value::wrap_list(vec![
            Value::new_symbol("cons"),
            apply_quasiquote(head)?,
            rest,
        ])),
    }
}
