use crate::evaluator::{self, Error};
use crate::types::{Arity, Atom, Int, PrimitiveFn, TypeMismatch, Value};
use crate::{printer, reader};
use itertools::Itertools;
use std::convert::TryFrom;
use std::fs::read_to_string;

fn grab_ints(args: &[Value]) -> evaluator::Result<Vec<Int>> {
    let type_check: Result<Vec<_>, _> = args.iter().map(|o| o.as_int()).collect();
    type_check.map_err(Error::TypeMismatch)
}

fn binary_int_op(args: &[Value], op: fn(Int, Int) -> evaluator::Result) -> evaluator::Result {
    match grab_ints(args)?.as_slice() {
        [x, y] => op(*x, *y),
        _ => Err(TypeMismatch::NotANumber.into()),
    }
}

const SUM: PrimitiveFn = PrimitiveFn {
    name: "+",
    fn_ptr: |args| binary_int_op(args, |x, y| Ok(Value::Number(x.wrapping_add(y)))),
    arity: Arity::exactly(2),
};

const SUB: PrimitiveFn = PrimitiveFn {
    name: "-",
    fn_ptr: |args| binary_int_op(args, |x, y| Ok(Value::Number(x.wrapping_sub(y)))),
    arity: Arity::exactly(2),
};

const MUL: PrimitiveFn = PrimitiveFn {
    name: "*",
    fn_ptr: |args| binary_int_op(args, |x, y| Ok(Value::Number(x.wrapping_mul(y)))),
    arity: Arity::exactly(2),
};

const DIV: PrimitiveFn = PrimitiveFn {
    name: "/",
    fn_ptr: div_,
    arity: Arity::exactly(2),
};

fn div_(args: &[Value]) -> evaluator::Result {
    binary_int_op(args, |x, y| match y {
        0 => Err(Error::DivideByZero),
        _ => Ok(Value::Number(x.wrapping_div(y))),
    })
}

fn comparison_(args: &[Value], comp: fn(&Int, &Int) -> bool) -> evaluator::Result {
    match grab_ints(args)?.as_slice() {
        [x, y] => Ok(Value::from_bool(comp(x, y))),
        _ => Err(TypeMismatch::NotANumber.into()),
    }
}

macro_rules! comparison_primitive {
    ($SYMBOL:tt, $NAME:ident) => {
        paste::item! {
            const $NAME: PrimitiveFn = PrimitiveFn {
                name: stringify!($SYMBOL),
                fn_ptr: |args: &[Value]| comparison_(args, Int:: [<$NAME:lower>]),
                arity: Arity::exactly(2),
            };
        }
    };
}

comparison_primitive!(<, LT);
comparison_primitive!(<=, LE);
comparison_primitive!(>, GT);
comparison_primitive!(>=, GE);

const EQUAL: PrimitiveFn = PrimitiveFn {
    name: "=",
    fn_ptr: |args| Ok(Value::from_bool(args[0] == args[1])),
    arity: Arity::exactly(2),
};

const LIST: PrimitiveFn = PrimitiveFn {
    name: "list",
    fn_ptr: |args| Ok(Value::wrap_list(args.to_vec())),
    arity: Arity::at_least(0),
};

const LIST_TEST: PrimitiveFn = PrimitiveFn {
    name: "list?",
    fn_ptr: |args| Ok(Value::from_bool(args[0].is_list())),
    arity: Arity::exactly(1),
};

const EMPTY_TEST: PrimitiveFn = PrimitiveFn {
    name: "empty?",
    fn_ptr: empty_test_,
    arity: Arity::exactly(1),
};

fn empty_test_(args: &[Value]) -> evaluator::Result {
    let list = args[0].as_list()?;
    Ok(Value::from_bool(list.is_empty()))
}

const COUNT: PrimitiveFn = PrimitiveFn {
    name: "count",
    fn_ptr: count_,
    arity: Arity::exactly(1),
};

fn count_(args: &[Value]) -> evaluator::Result {
    let count = match &args[0] {
        Value::List(list) => list.len() as Int,
        Value::Nil => 0,
        _ => return Err(Error::TypeMismatch(TypeMismatch::NotAList)),
    };
    Ok(Value::Number(count))
}

const CONS: PrimitiveFn = PrimitiveFn {
    name: "cons",
    fn_ptr: cons_,
    arity: Arity::exactly(2),
};

fn cons_(args: &[Value]) -> evaluator::Result {
    let tail = args[1].as_list()?;
    let mut elements = Vec::with_capacity(tail.len() + 1);
    elements.push(args[0].clone());
    elements.extend(tail.iter().cloned());
    Ok(Value::wrap_list(elements))
}

const CONCAT: PrimitiveFn = PrimitiveFn {
    name: "concat",
    fn_ptr: concat_,
    arity: Arity::at_least(0),
};

fn concat_(args: &[Value]) -> evaluator::Result {
    let mut output = Vec::new();
    for arg in args {
        output.extend(arg.as_list()?.iter().cloned());
    }
    Ok(Value::wrap_list(output))
}

const NTH: PrimitiveFn = PrimitiveFn {
    name: "nth",
    fn_ptr: nth_,
    arity: Arity::exactly(2),
};

fn nth_(args: &[Value]) -> evaluator::Result {
    let list = args[0].as_list()?;
    let index = args[1].as_int()?;
    nth_internal(list, index)
}

// Only the upper bound is a bounds error; a negative index is refused on its
// own terms.
fn nth_internal(list: &[Value], orig_index: Int) -> evaluator::Result {
    let index = usize::try_from(orig_index).map_err(|_| Error::NegativeIndex(orig_index))?;
    list.get(index)
        .cloned()
        .ok_or(Error::BadIndex(orig_index, list.len()))
}

const FIRST: PrimitiveFn = PrimitiveFn {
    name: "first",
    fn_ptr: first_,
    arity: Arity::exactly(1),
};

fn first_(args: &[Value]) -> evaluator::Result {
    if args[0].is_nil() {
        return Ok(Value::Nil);
    }
    let list = args[0].as_list()?;
    Ok(list.first().cloned().unwrap_or(Value::Nil))
}

const REST: PrimitiveFn = PrimitiveFn {
    name: "rest",
    fn_ptr: rest_,
    arity: Arity::exactly(1),
};

fn rest_(args: &[Value]) -> evaluator::Result {
    if args[0].is_nil() {
        return Ok(Value::new_list());
    }
    let list = args[0].as_list()?;
    match list.split_first() {
        Some((_, rest)) => Ok(Value::wrap_list(rest.to_vec())),
        None => Ok(Value::new_list()),
    }
}

const APPLY: PrimitiveFn = PrimitiveFn {
    name: "apply",
    fn_ptr: apply_,
    arity: Arity::at_least(2),
};

fn apply_(args: &[Value]) -> evaluator::Result {
    let (last, init) = match args.split_last() {
        Some(split) => split,
        None => return Err(TypeMismatch::NotAList.into()),
    };
    let mut concatenated = init[1..].to_vec();
    concatenated.extend_from_slice(last.as_list()?);
    evaluator::apply_fully(&args[0], &concatenated)
}

const MAP: PrimitiveFn = PrimitiveFn {
    name: "map",
    fn_ptr: map_,
    arity: Arity::exactly(2),
};

fn map_(args: &[Value]) -> evaluator::Result {
    let result: Result<Vec<_>, _> = args[1]
        .as_list()?
        .iter()
        .map(|obj| evaluator::apply_fully(&args[0], std::slice::from_ref(obj)))
        .collect();
    Ok(Value::wrap_list(result?))
}

fn print_string_internal(
    args: &[Value],
    mode: printer::PrintMode,
    sep: &'static str,
    to_screen: bool,
) -> evaluator::Result {
    let text = args.iter().map(|arg| printer::pr_str(arg, mode)).join(sep);
    if to_screen {
        println!("{}", text);
        Ok(Value::Nil)
    } else {
        Ok(Value::String(text))
    }
}

const PR_STR: PrimitiveFn = PrimitiveFn {
    name: "pr-str",
    fn_ptr: |args| {
        print_string_internal(args, printer::PrintMode::ReadableRepresentation, " ", false)
    },
    arity: Arity::at_least(0),
};

const STR: PrimitiveFn = PrimitiveFn {
    name: "str",
    fn_ptr: |args| print_string_internal(args, printer::PrintMode::Directly, "", false),
    arity: Arity::at_least(0),
};

const PRN: PrimitiveFn = PrimitiveFn {
    name: "prn",
    fn_ptr: |args| {
        print_string_internal(args, printer::PrintMode::ReadableRepresentation, " ", true)
    },
    arity: Arity::at_least(0),
};

const PRINTLN: PrimitiveFn = PrimitiveFn {
    name: "println",
    fn_ptr: |args| print_string_internal(args, printer::PrintMode::Directly, " ", true),
    arity: Arity::at_least(0),
};

const READ_STRING: PrimitiveFn = PrimitiveFn {
    name: "read-string",
    fn_ptr: read_string_,
    arity: Arity::exactly(1),
};

fn read_string_(args: &[Value]) -> evaluator::Result {
    let string = args[0].as_string()?;
    reader::read_str(string).map_err(Error::Syntax)
}

const SLURP: PrimitiveFn = PrimitiveFn {
    name: "slurp",
    fn_ptr: slurp_,
    arity: Arity::exactly(1),
};

fn slurp_(args: &[Value]) -> evaluator::Result {
    let path = args[0].as_string()?;
    log::info!("slurp {}", path);
    Ok(Value::String(read_to_string(path)?))
}

const ATOM: PrimitiveFn = PrimitiveFn {
    name: "atom",
    fn_ptr: |args| Ok(Value::Atom(Atom::new(&args[0]))),
    arity: Arity::exactly(1),
};

const ATOM_TEST: PrimitiveFn = PrimitiveFn {
    name: "atom?",
    fn_ptr: |args| Ok(Value::from_bool(args[0].is_atom())),
    arity: Arity::exactly(1),
};

const DEREF: PrimitiveFn = PrimitiveFn {
    name: "deref",
    fn_ptr: |args| Ok(args[0].as_atom()?.clone_payload()),
    arity: Arity::exactly(1),
};

const RESET: PrimitiveFn = PrimitiveFn {
    name: "reset!",
    fn_ptr: reset_,
    arity: Arity::exactly(2),
};

fn reset_(args: &[Value]) -> evaluator::Result {
    let atom = args[0].as_atom()?;
    atom.replace(&args[1]);
    Ok(args[1].clone())
}

const SWAP: PrimitiveFn = PrimitiveFn {
    name: "swap!",
    fn_ptr: swap_,
    arity: Arity::at_least(2),
};

fn swap_(swap_args: &[Value]) -> evaluator::Result {
    let atom = swap_args[0].as_atom()?;

    let f = &swap_args[1];
    if !f.callable() {
        return Err(Error::TypeMismatch(TypeMismatch::NotCallable));
    }
    let mut args = Vec::with_capacity(swap_args.len() - 1);
    args.push(atom.clone_payload());
    args.extend_from_slice(&swap_args[2..]);

    let obj = evaluator::apply_fully(f, &args)?;
    atom.replace(&obj);
    Ok(obj)
}

const NIL_TEST: PrimitiveFn = PrimitiveFn {
    name: "nil?",
    fn_ptr: |args| Ok(Value::from_bool(args[0].is_nil())),
    arity: Arity::exactly(1),
};

const TRUE_TEST: PrimitiveFn = PrimitiveFn {
    name: "true?",
    fn_ptr: |args| Ok(Value::from_bool(matches!(args[0], Value::True))),
    arity: Arity::exactly(1),
};

const FALSE_TEST: PrimitiveFn = PrimitiveFn {
    name: "false?",
    fn_ptr: |args| Ok(Value::from_bool(matches!(args[0], Value::False))),
    arity: Arity::exactly(1),
};

const SYMBOL: PrimitiveFn = PrimitiveFn {
    name: "symbol",
    fn_ptr: |args| Ok(Value::new_symbol(args[0].as_string()?)),
    arity: Arity::exactly(1),
};

const SYMBOL_TEST: PrimitiveFn = PrimitiveFn {
    name: "symbol?",
    fn_ptr: |args| Ok(Value::from_bool(args[0].is_symbol())),
    arity: Arity::exactly(1),
};

const STRING_TEST: PrimitiveFn = PrimitiveFn {
    name: "string?",
    fn_ptr: |args| Ok(Value::from_bool(args[0].is_string())),
    arity: Arity::exactly(1),
};

const NUMBER_TEST: PrimitiveFn = PrimitiveFn {
    name: "number?",
    fn_ptr: |args| Ok(Value::from_bool(args[0].is_number())),
    arity: Arity::exactly(1),
};

const FUNCTION_TEST: PrimitiveFn = PrimitiveFn {
    name: "fn?",
    fn_ptr: |args| Ok(Value::from_bool(args[0].callable() && !args[0].is_macro())),
    arity: Arity::exactly(1),
};

const MACRO_TEST: PrimitiveFn = PrimitiveFn {
    name: "macro?",
    fn_ptr: |args| Ok(Value::from_bool(args[0].is_macro())),
    arity: Arity::exactly(1),
};

const THROW: PrimitiveFn = PrimitiveFn {
    name: "throw",
    fn_ptr: |args| Err(Error::UserException(args[0].clone())),
    arity: Arity::exactly(1),
};

/// Every builtin except `eval`, which needs an environment and is added by
/// [`crate::environment::root`].
pub static CORE: &[PrimitiveFn] = &[
    // Arithmetic
    SUM,
    SUB,
    MUL,
    DIV,
    // Comparisons
    EQUAL,
    LT,
    LE,
    GT,
    GE,
    // Working with strings
    PR_STR,
    STR,
    PRN,
    PRINTLN,
    READ_STRING,
    SLURP,
    // Working with lists
    LIST,
    LIST_TEST,
    EMPTY_TEST,
    COUNT,
    CONS,
    CONCAT,
    NTH,
    FIRST,
    REST,
    APPLY,
    MAP,
    // Working with atoms
    ATOM,
    ATOM_TEST,
    DEREF,
    RESET,
    SWAP,
    // Casting and testing
    NIL_TEST,
    TRUE_TEST,
    FALSE_TEST,
    SYMBOL,
    SYMBOL_TEST,
    STRING_TEST,
    NUMBER_TEST,
    FUNCTION_TEST,
    MACRO_TEST,
    // Exceptions
    THROW,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment;
    use crate::evaluator::{ErrorKind, EVAL};
    use crate::reader::read_str;
    use std::rc::Rc;

    fn run(env: &Rc<environment::Environment>, src: &str) -> evaluator::Result {
        EVAL(&read_str(src).unwrap(), env)
    }

    fn shown(src: &str) -> String {
        run(&environment::root(), src).unwrap().to_string()
    }

    fn kind(src: &str) -> ErrorKind {
        run(&environment::root(), src).unwrap_err().kind()
    }

    #[test]
    fn names_are_unique() {
        let names: Vec<_> = CORE.iter().map(|f| f.name).collect();
        assert_eq!(names.len(), names.iter().unique().count());
    }

    #[test]
    fn arithmetic_takes_exactly_two_numbers() {
        assert_eq!(shown("(- 10 3)"), "7");
        assert_eq!(shown("(/ 7 2)"), "3");
        assert_eq!(shown("(/ -7 2)"), "-3");
        assert_eq!(kind("(+ 1 2 3)"), ErrorKind::Arity);
        assert_eq!(kind("(+ 1)"), ErrorKind::Arity);
        assert_eq!(kind("(+ 1 \"2\")"), ErrorKind::Type);
        assert_eq!(kind("(/ 1 0)"), ErrorKind::Type);
    }

    #[test]
    fn comparisons() {
        assert_eq!(shown("(< 1 2)"), "true");
        assert_eq!(shown("(<= 2 2)"), "true");
        assert_eq!(shown("(> 1 2)"), "false");
        assert_eq!(shown("(>= 1 2)"), "false");
        assert_eq!(kind("(< 1 nil)"), ErrorKind::Type);
    }

    #[test]
    fn equality() {
        assert_eq!(shown("(= (list 1 (list 2)) (list 1 (list 2)))"), "true");
        assert_eq!(shown("(= (list 1 2) (list 1))"), "false");
        assert_eq!(shown("(= \"a\" \"a\")"), "true");
        assert_eq!(shown("(= 'a 'a)"), "true");
        assert_eq!(shown("(= nil nil)"), "true");
        assert_eq!(shown("(= nil false)"), "false");
        assert_eq!(shown("(= nil (list))"), "false");
        assert_eq!(shown("(= 1 \"1\")"), "false");
    }

    #[test]
    fn closures_are_equal_only_to_themselves() {
        let env = environment::root();
        run(&env, "(def! f (fn* (x) x))").unwrap();
        assert_eq!(run(&env, "(= f f)").unwrap().to_string(), "true");
        assert_eq!(
            run(&env, "(= f (fn* (x) x))").unwrap().to_string(),
            "false"
        );
    }

    #[test]
    fn natives_are_never_equal() {
        assert_eq!(shown("(= + +)"), "false");
        assert_eq!(shown("(= + -)"), "false");
    }

    #[test]
    fn list_predicates_and_counts() {
        assert_eq!(shown("(list? (list))"), "true");
        assert_eq!(shown("(list? nil)"), "false");
        assert_eq!(shown("(empty? (list))"), "true");
        assert_eq!(shown("(empty? (list 1))"), "false");
        assert_eq!(kind("(empty? nil)"), ErrorKind::Type);
        assert_eq!(shown("(count nil)"), "0");
        assert_eq!(shown("(count (list 1 2 3))"), "3");
        assert_eq!(kind("(count 1)"), ErrorKind::Type);
    }

    #[test]
    fn cons_and_concat() {
        assert_eq!(shown("(cons 1 (list 2 3))"), "(1 2 3)");
        assert_eq!(shown("(cons (list 1) (list))"), "((1))");
        assert_eq!(kind("(cons 1 2)"), ErrorKind::Type);
        assert_eq!(shown("(concat (list 1) (list 2 3))"), "(1 2 3)");
        assert_eq!(shown("(concat)"), "()");
        assert_eq!(kind("(concat (list 1) 2)"), ErrorKind::Type);
    }

    #[test]
    fn nth_checks_upper_bound() {
        assert_eq!(shown("(nth (list 1 2 3) 2)"), "3");
        let err = run(&environment::root(), "(nth (list 1 2 3) 3)").unwrap_err();
        assert!(matches!(err, Error::BadIndex(3, 3)));
    }

    #[test]
    fn nth_refuses_negative_indices_separately() {
        let err = run(&environment::root(), "(nth (list 1 2 3) -1)").unwrap_err();
        assert!(matches!(err, Error::NegativeIndex(-1)));
    }

    #[test]
    fn first_and_rest() {
        assert_eq!(shown("(first (list 1 2))"), "1");
        assert_eq!(shown("(first (list))"), "nil");
        assert_eq!(shown("(first nil)"), "nil");
        assert_eq!(shown("(rest (list 1 2))"), "(2)");
        assert_eq!(shown("(rest (list))"), "()");
        assert_eq!(shown("(rest nil)"), "()");
        assert_eq!(kind("(first 1)"), ErrorKind::Type);
    }

    #[test]
    fn apply_and_map() {
        assert_eq!(shown("(apply + 1 (list 2))"), "3");
        assert_eq!(shown("(apply list (list))"), "()");
        assert_eq!(shown("(map (fn* (x) (* x x)) (list 1 2 3))"), "(1 4 9)");
    }

    #[test]
    fn strings() {
        assert_eq!(shown(r#"(pr-str "a" 1 (list "b"))"#), r#""\"a\" 1 (\"b\")""#);
        assert_eq!(shown(r#"(str "a" 1 (list "b"))"#), r#""a1(b)""#);
        assert_eq!(shown(r#"(str)"#), r#""""#);
        assert_eq!(shown(r#"(prn "x")"#), "nil");
        assert_eq!(shown(r#"(println "x")"#), "nil");
    }

    #[test]
    fn read_string_reads_one_form() {
        assert_eq!(shown(r#"(read-string "(1 2 (3))")"#), "(1 2 (3))");
        assert_eq!(shown(r#"(read-string "7 8")"#), "7");
        assert_eq!(kind(r#"(read-string "(1")"#), ErrorKind::Syntax);
    }

    #[test]
    fn slurp_reads_files() {
        let path = std::env::temp_dir().join("malt-core-slurp-test.txt");
        std::fs::write(&path, "hello\nworld").unwrap();
        let src = format!("(slurp {:?})", path.to_str().unwrap());
        assert_eq!(shown(&src), r#""hello\nworld""#);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(kind(r#"(slurp "/definitely/not/here")"#), ErrorKind::Io);
    }

    #[test]
    fn atoms() {
        let env = environment::root();
        run(&env, "(def! a (atom 1))").unwrap();
        run(&env, "(def! b a)").unwrap();
        assert_eq!(run(&env, "(atom? a)").unwrap().to_string(), "true");
        assert_eq!(run(&env, "(atom? 1)").unwrap().to_string(), "false");
        run(&env, "(swap! a (fn* (x) (+ x 1)))").unwrap();
        assert_eq!(run(&env, "(deref a)").unwrap().to_string(), "2");
        assert_eq!(run(&env, "(deref b)").unwrap().to_string(), "2");
        assert_eq!(run(&env, "(swap! b + 10)").unwrap().to_string(), "12");
        assert_eq!(run(&env, "(reset! a 5)").unwrap().to_string(), "5");
        assert_eq!(run(&env, "@b").unwrap().to_string(), "5");
        assert_eq!(run(&env, "(swap! a 1)").unwrap_err().kind(), ErrorKind::Type);
        assert_eq!(run(&env, "(deref 1)").unwrap_err().kind(), ErrorKind::Type);
    }

    #[test]
    fn atoms_are_not_equal() {
        let env = environment::root();
        run(&env, "(def! a (atom 1))").unwrap();
        assert_eq!(run(&env, "(= a a)").unwrap().to_string(), "false");
    }

    #[test]
    fn predicates() {
        assert_eq!(shown("(nil? nil)"), "true");
        assert_eq!(shown("(true? true)"), "true");
        assert_eq!(shown("(true? 1)"), "false");
        assert_eq!(shown("(false? false)"), "true");
        assert_eq!(shown("(false? nil)"), "false");
        assert_eq!(shown("(symbol? 'a)"), "true");
        assert_eq!(shown("(symbol \"abc\")"), "abc");
        assert_eq!(shown("(string? \"\")"), "true");
        assert_eq!(shown("(number? 1)"), "true");
        assert_eq!(shown("(fn? +)"), "true");
        assert_eq!(shown("(fn? (fn* () 1))"), "true");
        assert_eq!(shown("(macro? +)"), "false");
    }

    #[test]
    fn throw_raises_a_user_error() {
        let err = run(&environment::root(), "(throw \"boom\")").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::User);
        assert_eq!(err.to_string(), "boom");
    }
}
