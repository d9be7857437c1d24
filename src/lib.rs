//! Incremental Markov-chain chat brain.
//!
//! Text is carved into `START word.. STOP` sentences, every word pair is mapped
//! to the words seen after it, and replies are random walks over that map. New
//! messages are merged in as they arrive and the whole corpus is written back to
//! the brain file after each change.

pub mod brain;
pub mod config;
pub mod corpus;
pub mod error;
pub mod generator;
pub mod index;
pub mod persist;
pub mod store;
pub mod token;
pub mod tokenizer;
pub mod usermap;

pub use brain::{Brain, BrainStats};
pub use config::BrainConfig;
pub use corpus::Corpus;
pub use error::{BrainError, ConfigError, MarkovError, StoreError};
pub use generator::{generate, pick_seed, DEFAULT_MAX_WORDS};
pub use index::{ChainIndex, IndexStats, SuccessorSet};
pub use persist::{FlushMode, Persister, Snapshot};
pub use store::{BrainFormat, BrainStore};
pub use token::{Context, Token};
pub use tokenizer::{normalize, Tokenizer};
pub use usermap::{Direction, UserMap};
