use crate::environment::Environment;
use crate::evaluator::{self, EVAL};
use crate::printer::{self, PrintMode};
use crate::reader;
use crate::types::Value;
use std::rc::Rc;

/// Read every form in `line` and evaluate them in order.
///
/// Yields the last value, or `None` when `line` holds no forms at all.
pub fn read_eval(line: &str, env: &Rc<Environment>) -> evaluator::Result<Option<Value>> {
    let forms = reader::read_all(line)?;
    let mut last = None;
    for form in forms {
        last = Some(EVAL(&form, env)?);
    }
    Ok(last)
}

pub fn print(result: &evaluator::Result<Option<Value>>) -> printer::Result {
    match result {
        Ok(Some(obj)) => Ok(printer::pr_str(obj, PrintMode::ReadableRepresentation)),
        Ok(None) => Ok(String::new()),
        Err(e) => Err(format!("Error: {}", e)),
    }
}

pub fn rep(line: &str, env: &Rc<Environment>) -> printer::Result {
    let result = read_eval(line, env);
    if let Err(e) = &result {
        log::debug!("request failed ({:?}): {}", e.kind(), e);
    }
    print(&result)
}
