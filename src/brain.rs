//! The shared brain: corpus and chain index behind one reader-writer lock.
//!
//! Responses take the read lock and never block each other. Learning takes the
//! write lock only for the in-memory update; the corpus snapshot it produces is
//! written to disk afterwards, inline or by the flush worker.

use rand::Rng;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info};

use crate::config::BrainConfig;
use crate::corpus::{split_sentences, Corpus};
use crate::error::{BrainError, MarkovError, StoreError};
use crate::generator::{generate, pick_seed, DEFAULT_MAX_WORDS};
use crate::index::{ChainIndex, IndexStats};
use crate::persist::{Persister, Snapshot};
use crate::store::{self, BrainStore};
use crate::token::Token;
use crate::tokenizer::{normalize, Tokenizer};

struct Model {
    corpus: Corpus,
    index: ChainIndex,
    generation: u64,
}

impl Model {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            generation: self.generation,
            tokens: self.corpus.tokens().to_vec(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrainStats {
    pub tokens: usize,
    pub sentences: usize,
    pub generation: u64,
    pub index: IndexStats,
}

pub struct Brain {
    tokenizer: Tokenizer,
    model: RwLock<Model>,
    persister: Persister,
    max_words: usize,
    dedupe: bool,
}

impl Brain {
    /// Loads the brain file named by `config`, builds the index and writes the
    /// starting corpus to the output file. Any failure here is fatal.
    pub fn open(config: &BrainConfig) -> Result<Self, BrainError> {
        let config = config.clone().validate()?;

        let mut tokenizer = Tokenizer::new(&config.ignore_words);
        if let Some(path) = &config.ignore_file {
            tokenizer.extend_ignore(Tokenizer::load_ignore_file(path)?);
        }

        let corpus = store::load(&config.brain, &tokenizer)?;
        let persister = Persister::new(BrainStore::new(&config.output), config.flush);
        let brain = Self::from_corpus(corpus, tokenizer, persister)
            .with_max_words(config.max_words)
            .with_dedupe(config.dedupe);

        {
            let model = brain.read_model();
            model.index.check()?;
            brain.persister.write_now(&model.snapshot())?;
        }

        let stats = brain.stats();
        info!(
            brain = %config.brain.display(),
            output = %brain.persister.store().path().display(),
            format = ?brain.persister.store().format(),
            flush = ?brain.persister.mode(),
            ignored = brain.tokenizer.ignore_count(),
            tokens = stats.tokens,
            starts = stats.index.starts,
            contexts = stats.index.contexts,
            "brain ready"
        );
        Ok(brain)
    }

    pub fn from_corpus(corpus: Corpus, tokenizer: Tokenizer, persister: Persister) -> Self {
        let index = ChainIndex::build(corpus.tokens());
        Self {
            tokenizer,
            model: RwLock::new(Model {
                corpus,
                index,
                generation: 0,
            }),
            persister,
            max_words: DEFAULT_MAX_WORDS,
            dedupe: true,
        }
    }

    pub fn with_max_words(mut self, max_words: usize) -> Self {
        self.max_words = max_words.max(1);
        self
    }

    pub fn with_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = dedupe;
        self
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    fn read_model(&self) -> RwLockReadGuard<'_, Model> {
        self.model.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_model(&self) -> RwLockWriteGuard<'_, Model> {
        self.model.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Generates a reply to `incoming`, seeded from its words when possible,
    /// then learns from it if asked. Learning happens even when no reply could
    /// be generated, so an empty brain can still be taught.
    pub fn respond(&self, incoming: &str, learn: bool) -> Result<String, MarkovError> {
        self.respond_with(incoming, learn, &mut rand::thread_rng())
    }

    pub fn respond_with(
        &self,
        incoming: &str,
        learn: bool,
        rng: &mut impl Rng,
    ) -> Result<String, MarkovError> {
        let reply = {
            let model = self.read_model();
            let seed = pick_seed(&model.index, incoming, rng);
            generate(&model.index, seed.as_ref(), self.max_words, rng)
        };
        if let Err(e @ MarkovError::CorruptIndex { .. }) = &reply {
            error!(error = %e, "reply suppressed");
        }

        if learn {
            self.learn(incoming);
        }
        reply
    }

    /// One unseeded sentence.
    pub fn generate(&self) -> Result<String, MarkovError> {
        self.generate_with(None, &mut rand::thread_rng())
    }

    /// One sentence starting at `seed` if it is a start word, anywhere otherwise.
    pub fn generate_with(
        &self,
        seed: Option<&str>,
        rng: &mut impl Rng,
    ) -> Result<String, MarkovError> {
        let seed = seed.and_then(normalize).map(Token::Word);
        let sentence = {
            let model = self.read_model();
            generate(&model.index, seed.as_ref(), self.max_words, rng)
        };
        if let Err(e @ MarkovError::CorruptIndex { .. }) = &sentence {
            error!(error = %e, "sentence suppressed");
        }
        sentence
    }

    /// Tokenizes `sentence` and merges it into the index and corpus. Returns the
    /// number of tokens appended to the corpus; zero means nothing was learned
    /// and nothing is flushed.
    pub fn learn(&self, sentence: &str) -> usize {
        let tokens = self.tokenizer.tokenize(sentence);
        if tokens.is_empty() {
            return 0;
        }

        let appended = {
            let mut model = self.write_model();
            let mut appended = 0;
            for bracketed in split_sentences(&tokens) {
                let added = model.index.update(bracketed);
                if added > 0 || !self.dedupe {
                    model.corpus.append(bracketed);
                    appended += bracketed.len();
                }
            }
            if appended == 0 {
                debug!("nothing new to learn");
                return 0;
            }
            model.generation += 1;
            appended
        };

        // Copied outside the write section; a learner that got in between
        // only makes the snapshot newer.
        let snapshot = self.read_model().snapshot();
        debug!(appended, generation = snapshot.generation, "learned");
        self.persister.submit(snapshot);
        appended
    }

    /// Replaces the index with one built from scratch from the corpus.
    pub fn rebuild_index(&self) -> IndexStats {
        let mut model = self.write_model();
        let index = ChainIndex::build(model.corpus.tokens());
        let stats = index.stats();
        model.index = index;
        info!(contexts = stats.contexts, starts = stats.starts, "index rebuilt");
        stats
    }

    /// Writes the current corpus on the calling thread.
    pub fn flush(&self) -> Result<(), StoreError> {
        let snapshot = self.read_model().snapshot();
        self.persister.write_now(&snapshot).map(|_| ())
    }

    pub fn corpus(&self) -> Corpus {
        self.read_model().corpus.clone()
    }

    pub fn index(&self) -> ChainIndex {
        self.read_model().index.clone()
    }

    pub fn stats(&self) -> BrainStats {
        let model = self.read_model();
        BrainStats {
            tokens: model.corpus.len(),
            sentences: model.corpus.sentence_count(),
            generation: model.generation,
            index: model.index.stats(),
        }
    }
}
