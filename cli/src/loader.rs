//! Reading program images.
//!
//! An image is text holding one octal word per line.  A `#` starts a
//! comment which runs to the end of the line, and lines which are
//! blank once the comment is removed are ignored.
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::io;
use std::path::Path;

use base::prelude::*;

#[derive(Debug)]
pub enum LoadError {
    Io(io::Error),
    /// A line is not an octal number.
    BadWord { line: usize, text: String },
    /// A line holds an octal number wider than 36 bits.
    TooLarge { line: usize, text: String },
    Empty,
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            LoadError::Io(e) => write!(f, "failed to read image: {e}"),
            LoadError::BadWord { line, text } => {
                write!(f, "line {line}: '{text}' is not an octal word")
            }
            LoadError::TooLarge { line, text } => {
                write!(f, "line {line}: {text} does not fit in 36 bits")
            }
            LoadError::Empty => f.write_str("image contains no words"),
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LoadError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for LoadError {
    fn from(e: io::Error) -> LoadError {
        LoadError::Io(e)
    }
}

/// Parse an octal number, allowing `_` as a digit separator.
pub fn parse_octal(text: &str) -> Result<u64, std::num::ParseIntError> {
    let digits: String = text.chars().filter(|ch| *ch != '_').collect();
    u64::from_str_radix(digits.trim_start_matches("0o"), 8)
}

pub fn parse_image(text: &str) -> Result<Vec<Word36>, LoadError> {
    let mut words = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let content = match line.split_once('#') {
            Some((before, _)) => before,
            None => line,
        }
        .trim();
        if content.is_empty() {
            continue;
        }
        let value = parse_octal(content).map_err(|_| LoadError::BadWord {
            line: n + 1,
            text: content.to_owned(),
        })?;
        let word = Word36::try_from(value).map_err(|_| LoadError::TooLarge {
            line: n + 1,
            text: content.to_owned(),
        })?;
        words.push(word);
    }
    if words.is_empty() {
        return Err(LoadError::Empty);
    }
    Ok(words)
}

pub fn load_image(path: &Path) -> Result<Vec<Word36>, LoadError> {
    parse_image(&fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_image() {
        let text = "# a program\n010160_000000\n\n  0733 # with a comment\n";
        let words = parse_image(text).expect("image should parse");
        assert_eq!(words, vec![Word36::masked(0o010_160_000_000), Word36::masked(0o733)]);
    }

    #[test]
    fn test_parse_image_rejects_bad_digits() {
        match parse_image("17\n18\n") {
            Err(LoadError::BadWord { line: 2, text }) => assert_eq!(text, "18"),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_parse_image_rejects_wide_words() {
        assert!(matches!(
            parse_image("1_000_000_000_000"),
            Err(LoadError::TooLarge { line: 1, .. })
        ));
    }

    #[test]
    fn test_parse_image_rejects_empty() {
        assert!(matches!(parse_image("# nothing\n\n"), Err(LoadError::Empty)));
    }

    #[test]
    fn test_parse_octal() {
        assert_eq!(parse_octal("0o1000"), Ok(0o1000));
        assert_eq!(parse_octal("777_777"), Ok(0o777_777));
        assert!(parse_octal("9").is_err());
    }
}
