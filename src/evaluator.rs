use crate::environment::{Environment, UnknownSymbol};
use crate::special_forms::{self, FormError};
use crate::types::{
    Arity, BadArgCount, Closure, Int, NativeFn, PrimitiveEval, PrimitiveFn, TypeMismatch, Value,
};
use crate::{printer, reader};
use itertools::Itertools;
use std::fmt;
use std::rc::Rc;

pub type Result<T = Value> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Syntax(reader::Error),
    UnknownSymbol(UnknownSymbol),
    BadArgCount(BadArgCount),
    TypeMismatch(TypeMismatch),
    BadForm(FormError),
    BadIndex(Int, usize),
    NegativeIndex(Int),
    DivideByZero,
    DetachedEval,
    Io(std::io::Error),
    UserException(Value),
}

/// The broad class an [`Error`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Binding,
    Arity,
    Type,
    Io,
    User,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Syntax(_) => ErrorKind::Syntax,
            Error::UnknownSymbol(_) => ErrorKind::Binding,
            Error::BadArgCount(_) => ErrorKind::Arity,
            Error::TypeMismatch(_)
            | Error::BadForm(_)
            | Error::BadIndex(..)
            | Error::NegativeIndex(_)
            | Error::DivideByZero
            | Error::DetachedEval => ErrorKind::Type,
            Error::Io(_) => ErrorKind::Io,
            Error::UserException(_) => ErrorKind::User,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Syntax(e) => write!(f, "{}", e),
            Error::UnknownSymbol(e) => write!(f, "{}", e),
            Error::BadArgCount(e) => write!(f, "{}", e),
            Error::TypeMismatch(e) => write!(f, "{}", e),
            Error::BadForm(e) => write!(f, "{}", e),
            Error::BadIndex(i, len) => {
                write!(f, "nth: index {} out of bounds for length {}", i, len)
            }
            Error::NegativeIndex(i) => write!(f, "nth: negative index {}", i),
            Error::DivideByZero => write!(f, "cannot divide by zero"),
            Error::DetachedEval => write!(f, "eval: root environment no longer exists"),
            Error::Io(e) => write!(f, "io error: {}", e),
            Error::UserException(obj) => {
                write!(f, "{}", printer::pr_str(obj, printer::PrintMode::Directly))
            }
        }
    }
}

impl From<TypeMismatch> for Error {
    fn from(t: TypeMismatch) -> Self {
        Self::TypeMismatch(t)
    }
}

impl From<BadArgCount> for Error {
    fn from(e: BadArgCount) -> Self {
        Self::BadArgCount(e)
    }
}

impl From<FormError> for Error {
    fn from(e: FormError) -> Self {
        Self::BadForm(e)
    }
}

impl From<UnknownSymbol> for Error {
    fn from(e: UnknownSymbol) -> Self {
        Self::UnknownSymbol(e)
    }
}

impl From<reader::Error> for Error {
    fn from(e: reader::Error) -> Self {
        Self::Syntax(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<&Error> for Value {
    fn from(e: &Error) -> Self {
        match e {
            Error::UserException(obj) => obj.clone(),
            _ => Value::String(format!("{}", e)),
        }
    }
}

pub type EvalContext = (Value, Rc<Environment>);

/// Evaluate `orig_ast` in `orig_env`.
///
/// Tail positions (`let*` and `do` bodies, `if` branches, `quasiquote`
/// expansions and closure bodies) reassign `ast`/`env` and go round the loop
/// again instead of recursing, so tail calls run in constant stack space.
/// Everything else (operands, conditions, bindings, native calls) recurses.
#[allow(non_snake_case)]
pub fn EVAL(orig_ast: &Value, orig_env: &Rc<Environment>) -> Result {
    let mut ast = orig_ast.clone();
    let mut env = orig_env.clone();
    loop {
        let form = match &ast {
            Value::List(form) => form.clone(),
            _ => return evaluate_ast(&ast, &env),
        };
        if form.is_empty() {
            return Ok(ast);
        }

        if form[0].is_symbol() && expand_macros(&mut ast, &env)? {
            log::trace!("macroexpand produced {}", ast);
            continue;
        }

        log::trace!("apply {}", ast);
        let args = &form[1..];
        if let Value::Symbol(name) = &form[0] {
            match name.as_str() {
                "quote" => {
                    Arity::exactly(1).validate_for(args.len(), "quote")?;
                    return Ok(args[0].clone());
                }
                "quasiquote" => {
                    Arity::exactly(1).validate_for(args.len(), "quasiquote")?;
                    ast = special_forms::apply_quasiquote(&args[0])?;
                    continue;
                }
                "macroexpand" => {
                    Arity::exactly(1).validate_for(args.len(), "macroexpand")?;
                    return macroexpand(&args[0], &env);
                }
                "def!" => return special_forms::apply_def(args, &env, false),
                "defmacro!" => return special_forms::apply_def(args, &env, true),
                "let*" => {
                    let (new_ast, new_env) = special_forms::apply_let(args, &env)?;
                    ast = new_ast;
                    env = new_env;
                    continue;
                }
                "do" => {
                    ast = special_forms::apply_do(args, &env)?;
                    continue;
                }
                "if" => match special_forms::apply_if(args, &env)? {
                    Some(branch) => {
                        ast = branch;
                        continue;
                    }
                    None => return Ok(Value::Nil),
                },
                "fn*" => return special_forms::apply_fn(args, &env),
                // Any other initial symbol will be interpreted as a function
                // call and handled below
                _ => (),
            }
        }

        let evaluated = evaluate_sequence_elementwise(&form, &env)?;
        let (callable, args) = match evaluated.split_first() {
            Some(split) => split,
            None => return Ok(Value::new_list()),
        };
        match apply(callable, args)? {
            ApplyOutcome::Finished(obj) => return Ok(obj),
            ApplyOutcome::EvaluateFurther(next_ast, next_env) => {
                ast = next_ast;
                env = next_env;
            }
        }
    }
}

// Applying a closure only binds its arguments; evaluating the body is left to
// whoever asked. EVAL loops on it (that's the tail call), everyone else goes
// through apply_fully.
pub(crate) enum ApplyOutcome {
    Finished(Value),
    EvaluateFurther(Value, Rc<Environment>),
}

pub(crate) fn apply_fully(callable: &Value, args: &[Value]) -> Result {
    apply(callable, args).and_then(|outcome| match outcome {
        ApplyOutcome::Finished(obj) => Ok(obj),
        ApplyOutcome::EvaluateFurther(ast, env) => EVAL(&ast, &env),
    })
}

pub(crate) fn apply(callable: &Value, args: &[Value]) -> Result<ApplyOutcome> {
    match callable {
        Value::Native(native) => {
            log::trace!("apply native {}", native.name());
            let result = match native {
                NativeFn::Primitive(f) => call_primitive(f, args),
                NativeFn::Eval(eval) => call_eval(eval, args),
            };
            result.map(ApplyOutcome::Finished)
        }
        Value::Closure(f) => {
            let ast = f.body.clone();
            let env = make_closure_env(f, args)?;
            Ok(ApplyOutcome::EvaluateFurther(ast, env))
        }
        _ => Err(Error::TypeMismatch(TypeMismatch::NotCallable)),
    }
}

pub(crate) fn evaluate_ast(ast: &Value, env: &Rc<Environment>) -> Result {
    log::trace!("evaluate_ast {}", ast);
    match ast {
        Value::Symbol(s) => env.get(s).map_err(Error::UnknownSymbol),
        Value::List(list) => evaluate_sequence_elementwise(list, env).map(Value::wrap_list),
        _ => Ok(ast.clone()),
    }
}

/// Evaluate left to right, stopping at the first error.
pub fn evaluate_sequence_elementwise(seq: &[Value], env: &Rc<Environment>) -> Result<Vec<Value>> {
    seq.iter().map(|obj| EVAL(obj, env)).collect()
}

pub(crate) fn pretty_print_args(args: &[Value]) -> String {
    match args.len() {
        0 => "no args".into(),
        1 => args[0].to_string(),
        _ => format!("\n\t{}", args.iter().join("\n\t")),
    }
}

pub fn call_primitive(func: &PrimitiveFn, args: &[Value]) -> Result {
    func.arity.validate_for(args.len(), func.name)?;
    log::trace!("Call {} with {}", func.name, pretty_print_args(args));
    let result = (func.fn_ptr)(args);
    match &result {
        Ok(val) => log::trace!("Call to {} resulted in {}", func.name, val),
        Err(e) => log::trace!("Call to {} failed: {}", func.name, e),
    }
    result
}

// eval is a native call like any other, so it gets a fresh EVAL rather than
// continuing the caller's loop.
fn call_eval(eval: &PrimitiveEval, args: &[Value]) -> Result {
    Arity::exactly(1).validate_for(args.len(), "eval")?;
    let env = eval.env.upgrade().ok_or(Error::DetachedEval)?;
    log::info!("Call to EVAL with {}", args[0]);
    EVAL(&args[0], &env)
}

fn make_closure_env(func: &Closure, args: &[Value]) -> Result<Rc<Environment>> {
    log::trace!("Call {} with {}", func, pretty_print_args(args));
    func.parameters.arity().validate_for(args.len(), "fn*")?;

    let (positional, rest) = args.split_at(func.parameters.positional.len());
    let env = Environment::bind(&func.env, &func.parameters.positional, positional);
    if let Some(rest_key) = &func.parameters.variadic {
        env.set(rest_key.clone(), Value::wrap_list(rest.to_vec()));
    }
    Ok(env)
}

fn macro_for_call(ast: &Value, env: &Environment) -> Option<Rc<Closure>> {
    let symbol = match ast {
        Value::List(list) => list.first()?.as_symbol().ok()?,
        _ => return None,
    };
    match env.find(symbol)? {
        Value::Closure(c) if c.is_macro => Some(c),
        _ => None,
    }
}

/// Expand `ast` in place while its head names a macro. Reports whether
/// anything changed.
fn expand_macros(ast: &mut Value, env: &Rc<Environment>) -> Result<bool> {
    let mut expanded = false;
    while let Some(closure) = macro_for_call(ast, env) {
        log::trace!("macroexpand {} with env {}", ast, env);
        let next = match &*ast {
            Value::List(list) => {
                let env = make_closure_env(&closure, &list[1..])?;
                EVAL(&closure.body, &env)?
            }
            _ => break,
        };
        *ast = next;
        expanded = true;
    }
    Ok(expanded)
}

pub fn macroexpand(ast: &Value, env: &Rc<Environment>) -> Result {
    let mut ast = ast.clone();
    expand_macros(&mut ast, env)?;
    Ok(ast)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_str;

    fn eval_in(src: &str, env: &Rc<Environment>) -> Result {
        EVAL(&read_str(src).unwrap(), env)
    }

    fn eval(src: &str) -> Result {
        eval_in(src, &crate::environment::root())
    }

    fn shown(src: &str) -> String {
        eval(src).unwrap().to_string()
    }

    #[test]
    fn self_evaluating_forms() {
        assert_eq!(shown("7"), "7");
        assert_eq!(shown("\"s\""), "\"s\"");
        assert_eq!(shown("()"), "()");
        assert_eq!(shown("nil"), "nil");
    }

    #[test]
    fn arithmetic() {
        assert_eq!(shown("(+ 1 2)"), "3");
        assert_eq!(shown("(* (- 10 4) (/ 9 3))"), "18");
    }

    #[test]
    fn quote_returns_operand_unevaluated() {
        assert_eq!(shown("(quote (a b))"), "(a b)");
        assert_eq!(shown("'undefined-symbol"), "undefined-symbol");
    }

    #[test]
    fn let_bindings_see_earlier_ones() {
        assert_eq!(shown("(let* (x 2 y (+ x 1)) (+ x y))"), "5");
        assert_eq!(shown("(let* () 4)"), "4");
    }

    #[test]
    fn let_errors() {
        let err = eval("(let* (x) x)").unwrap_err();
        assert!(err.to_string().contains("bindings must come in pairs"));
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(eval("(let* (1 2) 3)").unwrap_err().kind(), ErrorKind::Type);
        assert_eq!(eval("(let* x 3)").unwrap_err().kind(), ErrorKind::Type);
    }

    #[test]
    fn let_does_not_leak_bindings() {
        let env = crate::environment::root();
        eval_in("(let* (leak 1) leak)", &env).unwrap();
        assert_eq!(
            eval_in("leak", &env).unwrap_err().kind(),
            ErrorKind::Binding
        );
    }

    #[test]
    fn if_branches() {
        assert_eq!(shown("(if true 1 2)"), "1");
        assert_eq!(shown("(if false 1 2)"), "2");
        assert_eq!(shown("(if nil 1 2)"), "2");
        assert_eq!(shown("(if 0 1 2)"), "1");
        assert_eq!(shown("(if () 1 2)"), "1");
        assert_eq!(shown("(if false 1)"), "nil");
        assert_eq!(shown("(if true)"), "nil");
    }

    #[test]
    fn do_evaluates_in_order_and_returns_last() {
        let env = crate::environment::root();
        assert_eq!(
            eval_in("(do (def! a 1) (def! a (+ a 1)) a)", &env)
                .unwrap()
                .to_string(),
            "2"
        );
        assert_eq!(eval("(do)").unwrap_err().kind(), ErrorKind::Arity);
    }

    #[test]
    fn def_binds_and_returns_value() {
        let env = crate::environment::root();
        assert_eq!(eval_in("(def! x 5)", &env).unwrap().to_string(), "5");
        assert_eq!(eval_in("(+ x 1)", &env).unwrap().to_string(), "6");
        assert_eq!(eval_in("(def! 1 2)", &env).unwrap_err().kind(), ErrorKind::Type);
    }

    #[test]
    fn closures_capture_their_environment() {
        let env = crate::environment::root();
        eval_in("(def! adder (fn* (n) (fn* (x) (+ x n))))", &env).unwrap();
        eval_in("(def! add5 (adder 5))", &env).unwrap();
        assert_eq!(eval_in("(add5 10)", &env).unwrap().to_string(), "15");
    }

    #[test]
    fn variadic_parameters() {
        assert_eq!(shown("((fn* (a & rest) rest) 1 2 3)"), "(2 3)");
        assert_eq!(shown("((fn* (a & rest) rest) 1)"), "()");
        assert_eq!(shown("((fn* (& xs) xs))"), "()");
    }

    #[test]
    fn surplus_arguments_are_ignored() {
        assert_eq!(shown("((fn* (a) a) 1 2 3)"), "1");
    }

    #[test]
    fn too_few_arguments_is_an_arity_error() {
        let err = eval("((fn* (a b) a) 1)").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Arity);
    }

    #[test]
    fn bad_parameter_lists() {
        assert_eq!(eval("(fn* (a &) a)").unwrap_err().kind(), ErrorKind::Type);
        assert_eq!(eval("(fn* (& a b) a)").unwrap_err().kind(), ErrorKind::Type);
        assert_eq!(eval("(fn* (1) 1)").unwrap_err().kind(), ErrorKind::Type);
        assert_eq!(eval("(fn* x 1)").unwrap_err().kind(), ErrorKind::Type);
    }

    #[test]
    fn calling_a_non_function() {
        let err = eval("(1 2)").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(err.to_string(), "cannot call non-function");
    }

    #[test]
    fn unknown_symbol() {
        let err = eval("(foo)").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Binding);
        assert_eq!(err.to_string(), "not found: 'foo'");
    }

    #[test]
    fn operands_stop_at_first_error() {
        let env = crate::environment::root();
        eval_in("(def! a (atom 0))", &env).unwrap();
        let result = eval_in("(list (reset! a 1) undefined (reset! a 2))", &env);
        assert!(result.is_err());
        assert_eq!(eval_in("(deref a)", &env).unwrap().to_string(), "1");
    }

    #[test]
    fn quasiquote_evaluates_unquotes() {
        let env = crate::environment::root();
        eval_in("(def! xs (list 2 3))", &env).unwrap();
        assert_eq!(
            eval_in("`(1 ~(+ 1 1) ~@xs 4)", &env).unwrap().to_string(),
            "(1 2 2 3 4)"
        );
        assert_eq!(eval_in("`xs", &env).unwrap().to_string(), "xs");
        assert_eq!(eval_in("`~xs", &env).unwrap().to_string(), "(2 3)");
    }

    #[test]
    fn macros_rewrite_before_evaluation() {
        let env = crate::environment::root();
        eval_in("(defmacro! unless (fn* (p a b) `(if ~p ~b ~a)))", &env).unwrap();
        assert_eq!(eval_in("(unless false 7 8)", &env).unwrap().to_string(), "7");
        assert_eq!(eval_in("(unless true 7 8)", &env).unwrap().to_string(), "8");
        assert_eq!(
            eval_in("(macroexpand (unless c 7 8))", &env)
                .unwrap()
                .to_string(),
            "(if c 8 7)"
        );
    }

    #[test]
    fn macro_expanding_to_an_atom() {
        let env = crate::environment::root();
        eval_in("(defmacro! seven (fn* () 7))", &env).unwrap();
        assert_eq!(eval_in("(seven)", &env).unwrap().to_string(), "7");
        eval_in("(defmacro! the-list (fn* () (list 'list 1 2)))", &env).unwrap();
        assert_eq!(eval_in("(the-list)", &env).unwrap().to_string(), "(1 2)");
    }

    #[test]
    fn defmacro_requires_a_closure() {
        let err = eval("(defmacro! m 5)").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn errors_inside_macros_propagate() {
        let env = crate::environment::root();
        eval_in("(defmacro! broken (fn* () (undefined-thing)))", &env).unwrap();
        let err = eval_in("(broken)", &env).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Binding);
    }

    #[test]
    fn tail_calls_do_not_grow_the_stack() {
        let env = crate::environment::root();
        eval_in(
            "(def! count-up (fn* (n) (if (= n 100000) n (do (count-up (+ n 1))))))",
            &env,
        )
        .unwrap();
        assert_eq!(eval_in("(count-up 0)", &env).unwrap().to_string(), "100000");
    }

    #[test]
    fn eval_reenters_at_the_root() {
        let env = crate::environment::root();
        eval_in("(def! x 1)", &env).unwrap();
        assert_eq!(
            eval_in("(let* (x 2) (eval 'x))", &env).unwrap().to_string(),
            "1"
        );
        assert_eq!(
            eval_in("(eval (list + 1 2))", &env).unwrap().to_string(),
            "3"
        );
        assert_eq!(
            eval_in("(eval '(nope))", &env).unwrap_err().kind(),
            ErrorKind::Binding
        );
    }

    #[test]
    fn user_exceptions_carry_their_value() {
        let err = eval("(throw (list 1 2))").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::User);
        assert_eq!(Value::from(&err).to_string(), "(1 2)");
        let other = eval("(nope)").unwrap_err();
        assert_eq!(Value::from(&other).to_string(), "\"not found: 'nope'\"");
    }
}
