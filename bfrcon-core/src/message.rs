//! Exchange direction types and command arguments.
//!
//! An [`Argument`] is one command parameter before serialization:
//! numbers become decimal text, booleans the literals `true`/`false`,
//! and [`Argument::Omitted`] (from `None`) writes no word at all.

use std::fmt;

use crate::word::Word;

// ── Origin ───────────────────────────────────────────────────────

/// Which side started an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// The server numbered this exchange (events).
    Server,
    /// The client numbered this exchange (commands).
    Client,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Server => write!(f, "Server"),
            Origin::Client => write!(f, "Client"),
        }
    }
}

// ── MessageType ──────────────────────────────────────────────────

/// Distinguishes a request from its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Request,
    Response,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Request => write!(f, "Request"),
            MessageType::Response => write!(f, "Response"),
        }
    }
}

// ── Argument ─────────────────────────────────────────────────────

/// One command argument before it becomes a wire word.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// Left out of the command entirely.
    Omitted,
}

impl Argument {
    /// The wire word for this argument, or `None` when omitted.
    pub fn to_word(&self) -> Option<Word> {
        match self {
            Argument::Text(s) => Some(Word::from(s.as_str())),
            Argument::Integer(n) => Some(Word::from(n.to_string())),
            Argument::Float(n) => Some(Word::from(n.to_string())),
            Argument::Bool(true) => Some(Word::from("true")),
            Argument::Bool(false) => Some(Word::from("false")),
            Argument::Omitted => None,
        }
    }
}

/// Serialize a command name and its arguments into wire words.
pub fn command_words<I>(name: &str, args: I) -> Vec<Word>
where
    I: IntoIterator<Item = Argument>,
{
    std::iter::once(Word::from(name))
        .chain(args.into_iter().filter_map(|a| a.to_word()))
        .collect()
}

impl From<&str> for Argument {
    fn from(s: &str) -> Self {
        Argument::Text(s.to_string())
    }
}

impl From<String> for Argument {
    fn from(s: String) -> Self {
        Argument::Text(s)
    }
}

impl From<&String> for Argument {
    fn from(s: &String) -> Self {
        Argument::Text(s.clone())
    }
}

impl From<bool> for Argument {
    fn from(b: bool) -> Self {
        Argument::Bool(b)
    }
}

impl From<f64> for Argument {
    fn from(n: f64) -> Self {
        Argument::Float(n)
    }
}

macro_rules! integer_argument {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Argument {
                fn from(n: $ty) -> Self {
                    Argument::Integer(n as i64)
                }
            }
        )*
    };
}

integer_argument!(i8, i16, i32, i64, u8, u16, u32, usize);

impl<T: Into<Argument>> From<Option<T>> for Argument {
    fn from(value: Option<T>) -> Self {
        value.map_or(Argument::Omitted, Into::into)
    }
}

/// Build a `Vec<Argument>` from mixed values.
///
/// ```
/// use bfrcon_core::{args, Argument};
///
/// let a = args!["hello world", None::<&str>, true];
/// assert_eq!(a[1], Argument::Omitted);
/// ```
#[macro_export]
macro_rules! args {
    () => { ::std::vec::Vec::<$crate::Argument>::new() };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::Argument::from($arg)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::words_to_strings;

    #[test]
    fn say_example_omits_missing_argument() {
        let words = command_words("admin.say", args!["hello world", None::<&str>, true]);
        assert_eq!(
            words_to_strings(&words),
            vec!["admin.say", "hello world", "true"]
        );
    }

    #[test]
    fn number_and_bool_rendering() {
        let words = command_words("x", args![3, -7i64, 2.5, 2.0, false]);
        assert_eq!(words_to_strings(&words), vec!["x", "3", "-7", "2.5", "2", "false"]);
    }

    #[test]
    fn empty_string_is_not_omitted() {
        let words = command_words("vars.gamePassword", args![""]);
        assert_eq!(words.len(), 2);
        assert!(words[1].is_empty());
    }

    #[test]
    fn no_arguments() {
        let words = command_words("version", args![]);
        assert_eq!(words_to_strings(&words), vec!["version"]);
    }

    #[test]
    fn display_names() {
        assert_eq!(Origin::Client.to_string(), "Client");
        assert_eq!(MessageType::Response.to_string(), "Response");
    }
}
