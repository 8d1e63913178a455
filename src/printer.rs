use crate::strings;
use crate::types::{NativeFn, Value};
use itertools::Itertools;

pub type Result = std::result::Result<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintMode {
    /// Strings are quoted and escaped so the output reads back the same.
    ReadableRepresentation,
    /// Strings are written as they are.
    Directly,
}

pub fn pr_str(object: &Value, mode: PrintMode) -> String {
    match object {
        Value::List(elements) => format!(
            "({})",
            elements.iter().map(|obj| pr_str(obj, mode)).join(" ")
        ),
        Value::String(s) => match mode {
            PrintMode::ReadableRepresentation => strings::string_repr(s),
            PrintMode::Directly => s.clone(),
        },
        Value::Symbol(name) => name.as_str().to_owned(),
        Value::Number(value) => value.to_string(),
        Value::Nil => String::from("nil"),
        Value::True => String::from("true"),
        Value::False => String::from("false"),
        Value::Closure(c) if c.is_macro => String::from("#<macro>"),
        Value::Closure(_) => String::from("#<function>"),
        Value::Native(NativeFn::Primitive(_)) | Value::Native(NativeFn::Eval(_)) => {
            String::from("<native function>")
        }
        Value::Atom(a) => format!("(atom {})", pr_str(&a.borrow_payload(), mode)),
    }
}
