use rand::Rng;
use tracing::warn;

use crate::error::MarkovError;
use crate::index::{ChainIndex, SuccessorSet};
use crate::token::{Context, Token};
use crate::tokenizer::normalize;

/// Upper bound on words per generated sentence.
pub const DEFAULT_MAX_WORDS: usize = 200;

/// Prompt words at the end of a message that are never used as seeds.
const SEED_TAIL_SKIP: usize = 2;

fn pick<'a>(set: &'a SuccessorSet, rng: &mut impl Rng) -> Option<&'a Token> {
    if set.is_empty() {
        return None;
    }
    set.get_index(rng.gen_range(0..set.len()))
}

/// Walks the chain from `seed` (or a random start word) until `STOP`.
///
/// A seed that is not a start word is ignored. The walk gives up after
/// `max_words` words and returns what it has.
pub fn generate(
    index: &ChainIndex,
    seed: Option<&Token>,
    max_words: usize,
    rng: &mut impl Rng,
) -> Result<String, MarkovError> {
    let mut w1 = match seed.filter(|s| index.is_start(s)) {
        Some(seed) => seed.clone(),
        None => pick(index.starts(), rng)
            .cloned()
            .ok_or(MarkovError::EmptyModel)?,
    };

    let mut w2 = index
        .heads_of(&w1)
        .and_then(|heads| pick(heads, rng))
        .cloned()
        .ok_or_else(|| MarkovError::CorruptIndex {
            context: w1.to_string(),
        })?;

    let mut words: Vec<Token> = Vec::new();
    loop {
        words.push(w1.clone());
        if w2 == Token::Stop {
            break;
        }
        if words.len() >= max_words {
            warn!(max_words, "chain never reached STOP, truncating");
            break;
        }

        let context = Context(w1, w2);
        let next = index
            .successors(&context)
            .and_then(|set| pick(set, rng))
            .cloned()
            .ok_or_else(|| MarkovError::CorruptIndex {
                context: context.to_string(),
            })?;
        w1 = context.1;
        w2 = next;
    }

    let words: Vec<&str> = words.iter().filter_map(Token::as_word).collect();
    Ok(words.join(" "))
}

/// Chooses a seed among the prompt's words, leaving out the last two.
/// Only words that can start a chain qualify.
pub fn pick_seed(index: &ChainIndex, prompt: &str, rng: &mut impl Rng) -> Option<Token> {
    let raw: Vec<&str> = prompt.split_whitespace().collect();
    let window = raw.len().saturating_sub(SEED_TAIL_SKIP);

    let candidates: Vec<Token> = raw[..window]
        .iter()
        .filter_map(|w| normalize(w))
        .map(Token::Word)
        .filter(|t| index.is_start(t))
        .collect();

    if candidates.is_empty() {
        return None;
    }
    let choice = rng.gen_range(0..candidates.len());
    candidates.into_iter().nth(choice)
}
