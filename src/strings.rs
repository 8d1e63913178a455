// String literals only know the escapes \n, \" and \\. Any other escaped
// character stands for itself, so "\a" reads as "a".

use bimap::BiMap;
use std::str::Chars;

lazy_static! {
    static ref ESCAPES: BiMap<char, char> = {
        let mut m = BiMap::new();
        m.insert('\\', '\\');
        m.insert('"', '"');
        m.insert('n', '\n');
        m
    };
}

struct StringBuilder<'a> {
    chars: Chars<'a>,
}

impl<'a> StringBuilder<'a> {
    fn new(src: &'a str) -> Self {
        Self { chars: src.chars() }
    }
}

impl Iterator for StringBuilder<'_> {
    type Item = char;

    fn next(&mut self) -> Option<Self::Item> {
        let c = match self.chars.next()? {
            // The tokenizer never hands us a dangling backslash, but if one
            // turns up keep it.
            '\\' => match self.chars.next() {
                None => '\\',
                Some(c) => ESCAPES.get_by_left(&c).copied().unwrap_or(c),
            },
            c => c,
        };
        Some(c)
    }
}

/// Unescape the body of a string literal (without its surrounding quotes).
pub(crate) fn build_string(src: &str) -> String {
    StringBuilder::new(src).collect()
}

struct StringPrinter<'a> {
    chars: Chars<'a>,
}

impl<'a> StringPrinter<'a> {
    fn new(src: &'a str) -> Self {
        Self { chars: src.chars() }
    }
}

impl Iterator for StringPrinter<'_> {
    type Item = (char, Option<char>);

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.chars.next()?;
        let charseq = match ESCAPES.get_by_right(&next) {
            Some(&l) => ('\\', Some(l)),
            None => (next, None),
        };
        Some(charseq)
    }
}

pub(crate) fn string_repr(src: &str) -> String {
    let mut output = String::with_capacity(src.len() + 2);
    output.push('"');
    for (char1, char2) in StringPrinter::new(src) {
        output.push(char1);
        if let Some(char2) = char2 {
            output.push(char2)
        };
    }
    output.push('"');
    output
}
