extern crate derive_more;
use crate::environment::Environment;
use crate::{evaluator, printer};
use derive_more::{Deref, DerefMut};
use itertools::Itertools;
use std::cell::{Ref, RefCell};
use std::fmt::Formatter;
use std::ops::{RangeFrom, RangeInclusive};
use std::rc::Rc;
use std::{fmt, rc};

pub type Int = i64;

#[derive(Deref, DerefMut, Debug, Default)]
pub struct ValueList(pub Vec<Value>);

#[derive(Deref, Debug, PartialEq, Eq, Hash, Clone)]
pub struct Name(pub String);

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name(s.to_owned())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum Arity {
    Between(RangeInclusive<usize>),
    AtLeast(RangeFrom<usize>),
}

#[derive(Debug)]
pub struct BadArgCount {
    name: &'static str,
    expected: Arity,
    got: usize,
}

impl fmt::Display for BadArgCount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "when evaluating {} expected {} arguments, but received {}",
            self.name, self.expected, self.got
        )
    }
}

impl Arity {
    pub(crate) const fn exactly(n: usize) -> Self {
        Self::Between(n..=n)
    }

    pub(crate) const fn at_least(n: usize) -> Self {
        Self::AtLeast(n..)
    }

    pub(crate) fn contains(&self, n: usize) -> bool {
        match self {
            Self::Between(range) => range.contains(&n),
            Self::AtLeast(range) => range.contains(&n),
        }
    }

    pub(crate) fn validate_for(&self, n: usize, name: &'static str) -> Result<(), BadArgCount> {
        match self.contains(n) {
            true => Ok(()),
            false => Err(BadArgCount {
                name,
                expected: self.clone(),
                got: n,
            }),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Between(r) => {
                if r.start() == r.end() {
                    write!(f, "exactly {}", r.start())
                } else {
                    write!(f, "from {} to {}", r.start(), r.end())
                }
            }
            Arity::AtLeast(r) => write!(f, "at least {}", r.start),
        }
    }
}

pub struct PrimitiveFn {
    pub name: &'static str,
    pub arity: Arity,
    pub fn_ptr: fn(&[Value]) -> evaluator::Result,
}

impl fmt::Debug for PrimitiveFn {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "primitive function #<{}>", self.name)
    }
}

/// The `eval` builtin. It holds the root environment weakly: the root
/// environment owns this value, so a strong link would never be freed.
#[derive(Clone)]
pub struct PrimitiveEval {
    pub env: rc::Weak<Environment>,
}

impl fmt::Debug for PrimitiveEval {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "PrimitiveEval")
    }
}

#[derive(Clone, Debug)]
pub enum NativeFn {
    Primitive(&'static PrimitiveFn),
    Eval(PrimitiveEval),
}

impl NativeFn {
    pub fn name(&self) -> &'static str {
        match self {
            NativeFn::Primitive(f) => f.name,
            NativeFn::Eval(_) => "eval",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClosureParameters {
    pub positional: Vec<Name>,
    pub variadic: Option<Name>,
}

impl fmt::Display for ClosureParameters {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.positional.iter().join(" "))?;
        if let Some(rest) = &self.variadic {
            if !self.positional.is_empty() {
                write!(f, " ")?;
            }
            write!(f, "& {}", rest)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum BadClosureParameters {
    TooManyAmpersands(usize),
    TooShortForAmpersand,
    AmpersandPositionNotPenultimate,
}

impl fmt::Display for BadClosureParameters {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BadClosureParameters::TooManyAmpersands(n) => {
                write!(f, "expected at most one '&' in parameters, found {}", n)
            }
            BadClosureParameters::TooShortForAmpersand => {
                write!(f, "'&' must be followed by a parameter name")
            }
            BadClosureParameters::AmpersandPositionNotPenultimate => {
                write!(f, "exactly one parameter must follow '&'")
            }
        }
    }
}

impl ClosureParameters {
    pub fn new(mut names: Vec<Name>) -> Result<Self, BadClosureParameters> {
        let is_ampersand = |s: &&Name| s.as_str() == "&";
        let ampersand_count = names.iter().filter(is_ampersand).count();

        match ampersand_count {
            0 => Ok(ClosureParameters {
                positional: names,
                variadic: None,
            }),
            1 => {
                if names.len() < 2 {
                    return Err(BadClosureParameters::TooShortForAmpersand);
                }
                if !is_ampersand(&&names[names.len() - 2]) {
                    return Err(BadClosureParameters::AmpersandPositionNotPenultimate);
                }
                let variadic = names.pop();
                let _ampersand = names.pop();
                Ok(ClosureParameters {
                    positional: names,
                    variadic,
                })
            }
            _ => Err(BadClosureParameters::TooManyAmpersands(ampersand_count)),
        }
    }

    // Surplus arguments are dropped when there is no variadic parameter, so
    // only a lower bound is ever enforced.
    pub fn arity(&self) -> Arity {
        Arity::at_least(self.positional.len())
    }
}

#[derive(Clone)]
pub struct Closure {
    pub parameters: ClosureParameters,
    pub body: Value,
    pub env: Rc<Environment>,
    pub is_macro: bool,
}

impl fmt::Debug for Closure {
    // Not derived because we want to skip the env: the env may well contain this Closure!
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Closure{{parameters: {:?}, body: {:?}, is_macro: {:?}}}",
            self.parameters, self.body, self.is_macro
        )
    }
}

impl fmt::Display for Closure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let form = if self.is_macro { "macro" } else { "fn*" };
        write!(f, "({} ({}) {})", form, self.parameters, self.body)
    }
}

#[derive(Debug, Clone)]
pub struct Atom {
    cell: Rc<RefCell<Value>>,
}

impl Atom {
    pub(crate) fn new(obj: &Value) -> Self {
        Self {
            cell: Rc::new(RefCell::new(obj.clone())),
        }
    }

    pub(crate) fn borrow_payload(&self) -> Ref<Value> {
        self.cell.borrow()
    }

    pub(crate) fn clone_payload(&self) -> Value {
        self.cell.borrow().clone()
    }

    pub(crate) fn replace(&self, obj: &Value) {
        self.cell.replace(obj.clone());
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    List(Rc<ValueList>),
    String(String),
    Symbol(Name),
    Number(Int),
    Nil,
    True,
    False,
    Closure(Rc<Closure>),
    Native(NativeFn),
    Atom(Atom),
}

#[derive(Debug)]
pub enum TypeMismatch {
    NotANumber,
    NotAList,
    NotASymbol,
    NotAString,
    NotAnAtom,
    NotCallable,
    NotAClosure,
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let message = match self {
            TypeMismatch::NotANumber => "expected a number",
            TypeMismatch::NotAList => "expected a list",
            TypeMismatch::NotASymbol => "expected a symbol",
            TypeMismatch::NotAString => "expected a string",
            TypeMismatch::NotAnAtom => "expected an atom",
            TypeMismatch::NotCallable => "cannot call non-function",
            TypeMismatch::NotAClosure => "expected a closure",
        };
        write!(f, "{}", message)
    }
}

impl Value {
    pub(crate) fn as_int(&self) -> Result<Int, TypeMismatch> {
        match self {
            Value::Number(x) => Ok(*x),
            _ => Err(TypeMismatch::NotANumber),
        }
    }

    pub(crate) fn as_list(&self) -> Result<&ValueList, TypeMismatch> {
        match self {
            Value::List(x) => Ok(x),
            _ => Err(TypeMismatch::NotAList),
        }
    }

    pub(crate) fn as_symbol(&self) -> Result<&Name, TypeMismatch> {
        match self {
            Value::Symbol(s) => Ok(s),
            _ => Err(TypeMismatch::NotASymbol),
        }
    }

    pub(crate) fn as_string(&self) -> Result<&str, TypeMismatch> {
        match self {
            Value::String(s) => Ok(s),
            _ => Err(TypeMismatch::NotAString),
        }
    }

    pub(crate) fn as_atom(&self) -> Result<&Atom, TypeMismatch> {
        match self {
            Value::Atom(a) => Ok(a),
            _ => Err(TypeMismatch::NotAnAtom),
        }
    }

    pub(crate) fn as_closure(&self) -> Result<&Closure, TypeMismatch> {
        match self {
            Value::Closure(c) => Ok(c),
            _ => Err(TypeMismatch::NotAClosure),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, Value::Symbol(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    pub fn is_atom(&self) -> bool {
        matches!(self, Value::Atom(_))
    }

    pub fn is_macro(&self) -> bool {
        matches!(self, Value::Closure(c) if c.is_macro)
    }

    pub fn is_symbol_named(&self, name: &str) -> bool {
        matches!(self, Value::Symbol(s) if s.as_str() == name)
    }

    /// Only `false` and `nil` are falsy.
    pub fn truthy(&self) -> bool {
        !matches!(self, Value::False | Value::Nil)
    }

    pub fn callable(&self) -> bool {
        use Value::*;
        match self {
            Native(_) | Closure(_) => true,
            List(_) | String(_) | Symbol(_) | Number(_) | Nil | True | False | Atom(_) => false,
        }
    }
}

impl Value {
    pub fn new_list() -> Self {
        Self::List(Rc::new(ValueList::default()))
    }
    pub fn wrap_list(elements: Vec<Value>) -> Self {
        Self::List(Rc::new(ValueList(elements)))
    }
    pub fn new_symbol(name: &str) -> Self {
        Self::Symbol(Name::from(name))
    }
    pub fn from_bool(b: bool) -> Self {
        match b {
            true => Self::True,
            false => Self::False,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::from_bool(b)
    }
}

impl From<Int> for Value {
    fn from(n: Int) -> Self {
        Value::Number(n)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (List(x), List(y)) => equal_sequences(x, y),
            (Number(x), Number(y)) => x == y,
            (String(x), String(y)) => x == y,
            (Symbol(x), Symbol(y)) => x == y,
            (Nil, Nil) | (True, True) | (False, False) => true,
            (Closure(x), Closure(y)) => Rc::ptr_eq(x, y),
            // Natives never compare equal, not even to themselves. Atoms are
            // not compared either.
            (Native(_), Native(_)) => false,
            (_, _) => false,
        }
    }
}

fn equal_sequences(xs: &[Value], ys: &[Value]) -> bool {
    xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| x == y)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            printer::pr_str(self, printer::PrintMode::ReadableRepresentation)
        )
    }
}
