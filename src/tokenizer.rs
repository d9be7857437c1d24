use rustc_hash::FxHashSet;
use std::fs;
use std::path::Path;

use crate::error::StoreError;
use crate::token::Token;

/// Characters trimmed from both ends of a word before it is compared or learned.
pub const STRIP_CHARS: &[char] = &[
    '\'', '"', '!', '@', '#', '$', '%', '^', '&', '*', '(', ')', '.', ',', '/', '\\', '+', '=',
    '<', '>', '?', ':', ';',
];

const SENTENCE_END: &[char] = &['.', '?', '!'];

/// Strip surrounding punctuation and uppercase. `None` when nothing is left.
pub fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim_matches(STRIP_CHARS);
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

/// Suffix check only: `"e.g"` does not end a sentence, `"done."` does.
fn ends_sentence(raw: &str) -> bool {
    raw.ends_with(SENTENCE_END)
}

/// Splits chat text into bracketed sentences, dropping ignored words.
#[derive(Clone, Debug, Default)]
pub struct Tokenizer {
    ignore: FxHashSet<String>,
}

impl Tokenizer {
    pub fn new<I, S>(ignore_words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ignore = ignore_words
            .into_iter()
            .filter_map(|w| normalize(w.as_ref()))
            .collect();
        Self { ignore }
    }

    /// Ignore list file: whitespace separated words, `#` starts a comment.
    pub fn load_ignore_file(path: &Path) -> Result<FxHashSet<String>, StoreError> {
        let content = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;

        let mut words = FxHashSet::default();
        for line in content.lines() {
            let raw = line.split('#').next().unwrap_or("");
            for token in raw.split_whitespace() {
                if let Some(word) = normalize(token) {
                    words.insert(word);
                }
            }
        }
        Ok(words)
    }

    pub fn extend_ignore<I: IntoIterator<Item = String>>(&mut self, words: I) {
        self.ignore.extend(words.into_iter().filter_map(|w| normalize(&w)));
    }

    pub fn is_ignored(&self, raw: &str) -> bool {
        match normalize(raw) {
            Some(word) => self.ignore.contains(&word),
            None => false,
        }
    }

    pub fn ignore_count(&self) -> usize {
        self.ignore.len()
    }

    /// Sentence segmentation before bracketing. Empty sentences are dropped.
    pub fn sentences(&self, text: &str) -> Vec<Vec<String>> {
        let mut sentences = Vec::new();
        let mut current: Vec<String> = Vec::new();

        for raw in text.split_whitespace() {
            if self.is_ignored(raw) {
                continue;
            }
            if let Some(word) = normalize(raw) {
                current.push(word);
            }
            if ends_sentence(raw) && !current.is_empty() {
                sentences.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            sentences.push(current);
        }
        sentences
    }

    /// `"Hello world. Bye!"` becomes `START HELLO WORLD STOP START BYE STOP`.
    /// Empty output means there is nothing to learn.
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        for sentence in self.sentences(text) {
            tokens.push(Token::Start);
            tokens.extend(sentence.into_iter().map(Token::Word));
            tokens.push(Token::Stop);
        }
        tokens
    }
}
