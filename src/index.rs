//! Word-pair transition index.
//!
//! The index has three tables:
//! - `starts`: words that may begin a generated chain,
//! - `heads`: for a start word, the words seen right after it,
//! - `contexts`: for a pair of consecutive words, every word seen after them.
//!
//! It is filled by scanning overlapping triples of a token stream. The scan
//! position (last two tokens, whether a new chain begins) lives in the index, so
//! feeding a stream in pieces gives the same tables as feeding it whole.

use indexmap::IndexSet;
use rustc_hash::{FxBuildHasher, FxHashMap};

use crate::error::MarkovError;
use crate::token::{Context, Token};

/// Insertion ordered, so a fixed rng walks the same path on every run.
pub type SuccessorSet = IndexSet<Token, FxBuildHasher>;

#[derive(Clone, Debug, Default)]
struct ScanState {
    prev: Option<Token>,
    last: Option<Token>,
    new_chain: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub starts: usize,
    pub heads: usize,
    pub contexts: usize,
    pub edges: usize,
}

#[derive(Clone, Debug)]
pub struct ChainIndex {
    starts: SuccessorSet,
    heads: FxHashMap<Token, SuccessorSet>,
    contexts: FxHashMap<Context, SuccessorSet>,
    scan: ScanState,
}

impl Default for ChainIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ChainIndex {
    fn eq(&self, other: &Self) -> bool {
        self.starts == other.starts
            && self.heads == other.heads
            && self.contexts == other.contexts
    }
}

impl Eq for ChainIndex {}

fn insert_successor<K: std::hash::Hash + Eq>(
    map: &mut FxHashMap<K, SuccessorSet>,
    key: K,
    value: Token,
) -> bool {
    map.entry(key).or_default().insert(value)
}

impl ChainIndex {
    pub fn new() -> Self {
        Self {
            starts: SuccessorSet::default(),
            heads: FxHashMap::default(),
            contexts: FxHashMap::default(),
            scan: ScanState {
                prev: None,
                last: None,
                new_chain: true,
            },
        }
    }

    pub fn build(tokens: &[Token]) -> Self {
        let mut index = Self::new();
        index.update(tokens);
        index
    }

    /// Continue the scan with `tokens`. Returns how many entries were added;
    /// zero means the tokens taught the index nothing new.
    pub fn update(&mut self, tokens: &[Token]) -> usize {
        let mut added = 0;
        for token in tokens {
            if let (Some(w1), Some(w2)) = (self.scan.prev.take(), self.scan.last.clone()) {
                added += self.absorb(w1, w2, token.clone());
            }
            self.scan.prev = self.scan.last.take();
            self.scan.last = Some(token.clone());
        }
        added
    }

    fn absorb(&mut self, w1: Token, w2: Token, w3: Token) -> usize {
        if w1.is_sentinel() || w2.is_sentinel() {
            self.scan.new_chain = true;
            return 0;
        }

        let mut added = 0;
        if self.scan.new_chain {
            added += usize::from(self.starts.insert(w1.clone()));
            added += usize::from(insert_successor(&mut self.heads, w1.clone(), w2.clone()));
            self.scan.new_chain = false;
        }

        // A chain never continues into a new sentence.
        let w3 = if w3 == Token::Start { Token::Stop } else { w3 };
        added += usize::from(insert_successor(&mut self.contexts, Context(w1, w2), w3));
        added
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    pub fn starts(&self) -> &SuccessorSet {
        &self.starts
    }

    pub fn is_start(&self, token: &Token) -> bool {
        self.starts.contains(token)
    }

    pub fn heads_of(&self, word: &Token) -> Option<&SuccessorSet> {
        self.heads.get(word)
    }

    pub fn successors(&self, context: &Context) -> Option<&SuccessorSet> {
        self.contexts.get(context)
    }

    #[cfg(test)]
    pub(crate) fn remove_context(&mut self, context: &Context) {
        self.contexts.remove(context);
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            starts: self.starts.len(),
            heads: self.heads.len(),
            contexts: self.contexts.len(),
            edges: self.contexts.values().map(|s| s.len()).sum(),
        }
    }

    /// Verifies the structural guarantees generation relies on: no empty set,
    /// no `Start` successor, and every start word can take at least one step.
    pub fn check(&self) -> Result<(), MarkovError> {
        let corrupt = |context: String| MarkovError::CorruptIndex { context };

        for start in &self.starts {
            let heads = self
                .heads
                .get(start)
                .ok_or_else(|| corrupt(start.to_string()))?;
            for second in heads {
                let pair = Context(start.clone(), second.clone());
                if !self.contexts.contains_key(&pair) {
                    return Err(corrupt(pair.to_string()));
                }
            }
        }

        for (word, set) in &self.heads {
            if set.is_empty() || set.iter().any(Token::is_sentinel) {
                return Err(corrupt(word.to_string()));
            }
        }

        for (context, set) in &self.contexts {
            if set.is_empty() || set.contains(&Token::Start) {
                return Err(corrupt(context.to_string()));
            }
        }
        Ok(())
    }
}
