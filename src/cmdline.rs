use crate::environment::Environment;
use crate::evaluator::{self, EVAL};
use crate::interpreter;
use crate::printer;
use crate::types::{Name, Value};
use ansi_term::Colour::Red;
use linefeed::{DefaultTerminal, Interface, ReadResult, Terminal};
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Script(evaluator::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "terminal error: {}", e),
            Error::Script(e) => write!(f, "{}", e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub fn setup() -> std::io::Result<Interface<DefaultTerminal>> {
    let interface = linefeed::Interface::new("malt")?;
    interface.set_prompt("user> ")?;
    if let Some(path) = history_path() {
        interface.load_history(path).ok();
    };
    Ok(interface)
}

fn history_path() -> Option<PathBuf> {
    dirs::data_dir().map(|mut path| {
        path.push(".malt_history");
        path
    })
}

pub fn save_history<T: Terminal>(interface: &Interface<T>) -> std::io::Result<()> {
    match history_path() {
        Some(path) => interface.save_history(path),
        None => Ok(()),
    }
}

pub fn repl<T: Terminal>(interface: &Interface<T>, mut processor: impl FnMut(&str) -> printer::Result) {
    let colour = atty::is(atty::Stream::Stdout);
    loop {
        match interface.read_line() {
            Ok(ReadResult::Eof) => break,
            Ok(ReadResult::Signal(sig)) => {
                writeln!(interface, "Received signal {:?}", sig).ok();
            }
            Ok(ReadResult::Input(line)) => {
                interface.add_history_unique(line.clone());
                match processor(&line) {
                    Ok(output) if output.is_empty() => (),
                    Ok(output) => {
                        writeln!(interface, "{}", output).ok();
                    }
                    Err(message) if colour => {
                        writeln!(interface, "{}", Red.paint(message)).ok();
                    }
                    Err(message) => {
                        writeln!(interface, "{}", message).ok();
                    }
                }
            }
            Err(e) => {
                writeln!(interface, "Error: {}", e).ok();
                break;
            }
        }
    }
}

/// `args` as handed to the process, program name first.
///
/// With no further arguments this runs the REPL. Otherwise the first one
/// names a file to load and the rest become `*ARGV*`.
pub fn launch(args: Vec<String>, env: &Rc<Environment>) -> Result<(), Error> {
    let mut args = args.into_iter().skip(1);
    match args.next() {
        None => {
            let interface = setup()?;
            repl(&interface, |line| interpreter::rep(line, env));
            save_history(&interface)?;
            Ok(())
        }
        Some(path) => run_file(&path, args.collect(), env),
    }
}

fn run_file(path: &str, argv: Vec<String>, env: &Rc<Environment>) -> Result<(), Error> {
    let argv = Value::wrap_list(argv.into_iter().map(Value::String).collect());
    env.set(Name::from("*ARGV*"), argv);

    log::info!("load-file {}", path);
    let command = Value::wrap_list(vec![
        Value::new_symbol("load-file"),
        Value::String(path.to_owned()),
    ]);
    EVAL(&command, env).map(|_| ()).map_err(Error::Script)
}
