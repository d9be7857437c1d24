use crate::token::Token;
use crate::tokenizer::{normalize, Tokenizer};

/// The ordered token log the index is derived from.
///
/// Always canonical: a sequence of `START word.. STOP` sentences, none empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Corpus {
    tokens: Vec<Token>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonicalizes an arbitrary token stream: runs of words between markers
    /// become sentences, missing brackets are added and empty sentences dropped.
    /// Words are normalized the same way the tokenizer normalizes them.
    pub fn from_tokens<I: IntoIterator<Item = Token>>(tokens: I) -> Self {
        Self::from_tokens_filtered(tokens, &Tokenizer::default())
    }

    /// Like [`Corpus::from_tokens`], also dropping `tokenizer`'s ignored words.
    /// A word holding whitespace is split the way raw text would be, so the
    /// result reloads unchanged from any brain format.
    pub fn from_tokens_filtered<I>(tokens: I, tokenizer: &Tokenizer) -> Self
    where
        I: IntoIterator<Item = Token>,
    {
        let mut corpus = Self::new();
        let mut sentence: Vec<Token> = Vec::new();
        for token in tokens {
            match token {
                Token::Word(raw) => {
                    for piece in raw.split_whitespace() {
                        if tokenizer.is_ignored(piece) {
                            continue;
                        }
                        if let Some(word) = normalize(piece) {
                            sentence.push(Token::Word(word));
                        }
                    }
                }
                Token::Start | Token::Stop => corpus.push_sentence(std::mem::take(&mut sentence)),
            }
        }
        corpus.push_sentence(sentence);
        corpus
    }

    pub fn from_sentences<I>(sentences: I) -> Self
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let mut corpus = Self::new();
        for sentence in sentences {
            corpus.push_sentence(sentence.into_iter().map(Token::Word).collect());
        }
        corpus
    }

    fn push_sentence(&mut self, words: Vec<Token>) {
        if words.is_empty() {
            return;
        }
        self.tokens.push(Token::Start);
        self.tokens.extend(words);
        self.tokens.push(Token::Stop);
    }

    /// Appends an already bracketed sentence, as produced by the tokenizer.
    pub fn append(&mut self, bracketed: &[Token]) {
        debug_assert!(matches!(bracketed.first(), Some(Token::Start)));
        debug_assert!(matches!(bracketed.last(), Some(Token::Stop)));
        self.tokens.extend_from_slice(bracketed);
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Each sentence with its brackets.
    pub fn sentences(&self) -> impl Iterator<Item = &[Token]> + '_ {
        split_sentences(&self.tokens)
    }

    pub fn sentence_count(&self) -> usize {
        self.tokens.iter().filter(|t| **t == Token::Start).count()
    }
}

/// Splits a canonical stream into `START .. STOP` slices.
pub fn split_sentences(tokens: &[Token]) -> impl Iterator<Item = &[Token]> + '_ {
    tokens
        .split_inclusive(|t| *t == Token::Stop)
        .filter(|s| s.len() > 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(line: &str) -> Vec<Token> {
        line.split_whitespace().map(Token::from_marker_or_word).collect()
    }

    #[test]
    fn canonicalizes_loose_markers() {
        let corpus = Corpus::from_tokens(toks(
            "the cat <STOP> <STOP> <START> <START> sat. down <START> ... <STOP>",
        ));
        assert_eq!(
            corpus.tokens(),
            toks("<START> THE CAT <STOP> <START> SAT DOWN <STOP>").as_slice()
        );
        assert_eq!(corpus.sentence_count(), 2);
    }

    #[test]
    fn words_with_spaces_are_split_and_ignored_words_dropped() {
        let tokens = vec![
            Token::Start,
            Token::word("um"),
            Token::word("ok"),
            Token::Stop,
            Token::Start,
            Token::word("hello world"),
            Token::word("um"),
            Token::Stop,
            Token::Start,
            Token::word("um"),
            Token::Stop,
        ];
        let corpus = Corpus::from_tokens_filtered(tokens, &Tokenizer::new(["um"]));
        assert_eq!(
            corpus.tokens(),
            toks("<START> OK <STOP> <START> HELLO WORLD <STOP>").as_slice()
        );
    }

    #[test]
    fn canonical_input_is_unchanged() {
        let raw = toks("<START> THE CAT SAT <STOP>");
        assert_eq!(Corpus::from_tokens(raw.clone()).tokens(), raw.as_slice());
    }

    #[test]
    fn sentences_keep_brackets() {
        let corpus = Corpus::from_sentences(vec![
            vec!["A".to_string(), "B".to_string()],
            vec![],
            vec!["C".to_string()],
        ]);
        let sentences: Vec<_> = corpus.sentences().collect();
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[1], toks("<START> C <STOP>").as_slice());
    }

    #[test]
    fn append_extends_log() {
        let mut corpus = Corpus::from_tokens(toks("<START> A B <STOP>"));
        corpus.append(&toks("<START> C D <STOP>"));
        assert_eq!(corpus.len(), 8);
        assert_eq!(corpus.sentence_count(), 2);
    }
}
