use crate::strings;
use regex::Regex;
use std::fmt;

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum SpecialChar {
    OpenSquareBracket,
    CloseSquareBracket,
    OpenBraceBracket,
    CloseBraceBracket,
    OpenRoundBracket,
    CloseRoundBracket,
    Quote,
    Backtick,
    Tilde,
    Caret,
    AtSign,
}

impl SpecialChar {
    fn from_byte(byte: u8) -> Option<Self> {
        use SpecialChar::*;
        let special = match byte {
            b'[' => OpenSquareBracket,
            b']' => CloseSquareBracket,
            b'{' => OpenBraceBracket,
            b'}' => CloseBraceBracket,
            b'(' => OpenRoundBracket,
            b')' => CloseRoundBracket,
            b'\'' => Quote,
            b'`' => Backtick,
            b'~' => Tilde,
            b'^' => Caret,
            b'@' => AtSign,
            _ => return None,
        };
        Some(special)
    }

    pub fn as_char(self) -> char {
        use SpecialChar::*;
        match self {
            OpenSquareBracket => '[',
            CloseSquareBracket => ']',
            OpenBraceBracket => '{',
            CloseBraceBracket => '}',
            OpenRoundBracket => '(',
            CloseRoundBracket => ')',
            Quote => '\'',
            Backtick => '`',
            Tilde => '~',
            Caret => '^',
            AtSign => '@',
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum Token<'a> {
    SpliceUnquote,
    SpecialChar(SpecialChar),
    /// Contents of a string literal, escapes already resolved.
    StringLiteral(String),
    PlainChars(&'a str),
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::SpliceUnquote => write!(f, "~@"),
            Token::SpecialChar(c) => write!(f, "{}", c.as_char()),
            Token::StringLiteral(s) => write!(f, "{}", strings::string_repr(s)),
            Token::PlainChars(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum TokenizerError {
    UnbalancedString,
    NoCapture(String),
}

impl fmt::Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenizerError::UnbalancedString => {
                write!(f, "expected closing quote, got end of input")
            }
            TokenizerError::NoCapture(rest) => write!(f, "could not tokenize '{}'", rest),
        }
    }
}

fn create_token(captured: &str, closed: bool) -> Result<Token, TokenizerError> {
    let bytes = captured.as_bytes();
    match bytes {
        [b'~', b'@'] => Ok(Token::SpliceUnquote),
        // The quotes are ASCII so slicing them off on bytes is safe.
        [b'"', ..] => match closed {
            true => Ok(Token::StringLiteral(strings::build_string(
                &captured[1..captured.len() - 1],
            ))),
            false => Err(TokenizerError::UnbalancedString),
        },
        [byte] => match SpecialChar::from_byte(*byte) {
            Some(special) => Ok(Token::SpecialChar(special)),
            None => Ok(Token::PlainChars(captured)),
        },
        _ => Ok(Token::PlainChars(captured)),
    }
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, TokenizerError> {
    lazy_static! {
        static ref TOKEN_RE: Regex = Regex::new(
            r##"(?xs)                          # ignore whitespace in this pattern, let . match \n
                ^[\x20\t\r\n,]*                # whitespace or commas, ignored
                (?:
                    (?P<token>
                        ~@                     # literal splice-unquote
                        |[\[\]{}()'`~^@]       # single special characters
                        |"(?:                  # string literal. its contents include:
                            \\.                #    escapes
                            |[^\\"]            #    anything which isn't a backslash or a quote
                          )*
                          (?P<close>")?        #    possibly missing a closing quote
                        |[^\x20\t\r\n\[\]{}()'"`,;~^@]+  # one or more plain characters
                    )
                    |;[^\n]*                   # comments, dropped
                )?
                [\x20\t\r\n,]*                 # whitespace or commas, ignored
            "##
        )
        .unwrap();
    }
    let mut input = input;
    let mut tokens = Vec::new();
    while !input.is_empty() {
        let caps = TOKEN_RE
            .captures(input)
            .ok_or_else(|| TokenizerError::NoCapture(String::from(input)))?;
        let consumed = caps.get(0).map_or(0, |m| m.end());
        if consumed == 0 {
            return Err(TokenizerError::NoCapture(String::from(input)));
        }
        if let Some(token) = caps.name("token") {
            tokens.push(create_token(token.as_str(), caps.name("close").is_some())?);
        }
        input = &input[consumed..];
    }
    Ok(tokens)
}
