use crate::tokens::{tokenize, SpecialChar, Token, TokenizerError};
use crate::types::{Int, Value};
use std::fmt;
use std::iter::Peekable;
use std::vec;

pub type Result<T = Value> = std::result::Result<T, Error>;

#[derive(Debug, PartialEq)]
pub enum Error {
    Tokenizer(TokenizerError),
    NoMoreTokens,
    UnclosedList,
    UnexpectedCloseBracket,
    BadInteger(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Tokenizer(e) => write!(f, "{}", e),
            Error::NoMoreTokens => write!(f, "expected form, got end of input"),
            Error::UnclosedList => write!(f, "expected ')', got end of input"),
            Error::UnexpectedCloseBracket => write!(f, "unexpected ')'"),
            Error::BadInteger(s) => write!(f, "malformed number: '{}'", s),
        }
    }
}

impl From<TokenizerError> for Error {
    fn from(e: TokenizerError) -> Self {
        Error::Tokenizer(e)
    }
}

/// A stream of forms over one tokenized input.
pub struct Reader<'a> {
    tokens: Peekable<vec::IntoIter<Token<'a>>>,
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a str) -> Result<Self> {
        let tokens = tokenize(input)?;
        Ok(Self {
            tokens: tokens.into_iter().peekable(),
        })
    }

    pub fn is_exhausted(&mut self) -> bool {
        self.tokens.peek().is_none()
    }

    pub fn read_form(&mut self) -> Result {
        use SpecialChar::*;
        match self.tokens.next() {
            None => Err(Error::NoMoreTokens),
            Some(Token::SpecialChar(Quote)) => self.read_wrapped("quote"),
            Some(Token::SpecialChar(Backtick)) => self.read_wrapped("quasiquote"),
            Some(Token::SpecialChar(Tilde)) => self.read_wrapped("unquote"),
            Some(Token::SpliceUnquote) => self.read_wrapped("splice-unquote"),
            Some(Token::SpecialChar(AtSign)) => self.read_wrapped("deref"),
            Some(Token::SpecialChar(OpenRoundBracket)) => self.read_list(),
            Some(Token::SpecialChar(CloseRoundBracket)) => Err(Error::UnexpectedCloseBracket),
            Some(Token::SpecialChar(other)) => {
                Ok(Value::new_symbol(other.as_char().encode_utf8(&mut [0; 4])))
            }
            Some(Token::StringLiteral(s)) => Ok(Value::String(s)),
            Some(Token::PlainChars(chars)) => read_atom(chars),
        }
    }

    fn read_wrapped(&mut self, wrapper: &str) -> Result {
        let next = self.read_form()?;
        Ok(Value::wrap_list(vec![Value::new_symbol(wrapper), next]))
    }

    fn read_list(&mut self) -> Result {
        let mut elements = Vec::new();
        loop {
            match self.tokens.peek() {
                None => return Err(Error::UnclosedList),
                Some(Token::SpecialChar(SpecialChar::CloseRoundBracket)) => {
                    self.tokens.next();
                    break;
                }
                Some(_) => elements.push(self.read_form()?),
            }
        }
        Ok(Value::wrap_list(elements))
    }
}

fn read_atom(chars: &str) -> Result {
    match chars.as_bytes() {
        [b'0'..=b'9', ..] | [b'-', b'0'..=b'9', ..] => chars
            .parse::<Int>()
            .map(Value::Number)
            .map_err(|_| Error::BadInteger(String::from(chars))),
        _ => Ok(match chars {
            "nil" => Value::Nil,
            "true" => Value::True,
            "false" => Value::False,
            _ => Value::new_symbol(chars),
        }),
    }
}

/// Read the first form of `input`, ignoring anything after it.
pub fn read_str(input: &str) -> Result {
    Reader::new(input)?.read_form()
}

/// Read every form of `input` in order.
pub fn read_all(input: &str) -> Result<Vec<Value>> {
    let mut reader = Reader::new(input)?;
    let mut forms = Vec::new();
    while !reader.is_exhausted() {
        forms.push(reader.read_form()?);
    }
    Ok(forms)
}
