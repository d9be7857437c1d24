use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub const START_MARKER: &str = "<START>";
pub const STOP_MARKER: &str = "<STOP>";

/// A normalized word or one of the two sentence brackets.
///
/// The brackets are their own variants, so no word can ever compare equal to
/// them. On disk they are spelled `<START>` and `<STOP>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Token {
    Start,
    Stop,
    Word(String),
}

impl Token {
    pub fn word(w: impl Into<String>) -> Self {
        Token::Word(w.into())
    }

    pub fn is_sentinel(&self) -> bool {
        !matches!(self, Token::Word(_))
    }

    pub fn as_word(&self) -> Option<&str> {
        match self {
            Token::Word(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Token::Start => START_MARKER,
            Token::Stop => STOP_MARKER,
            Token::Word(w) => w,
        }
    }

    /// Reads a token as written in a brain file: markers become sentinels,
    /// everything else is a word.
    pub fn from_marker_or_word(raw: &str) -> Self {
        match raw {
            START_MARKER => Token::Start,
            STOP_MARKER => Token::Stop,
            other => Token::Word(other.to_string()),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Token {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Token::from_marker_or_word(&raw))
    }
}

/// Two consecutive tokens, the key of the chain index.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Context(pub Token, pub Token);

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}
