use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Deserialize;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

use crate::error::StoreError;
use crate::store::BrainStore;
use crate::token::Token;

/// Where corpus snapshots get written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushMode {
    /// The learning caller writes the file before `learn` returns.
    #[default]
    Sync,
    /// A worker thread writes; `learn` returns as soon as memory is updated.
    Background,
}

/// A full copy of the corpus at one generation.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub generation: u64,
    pub tokens: Vec<Token>,
}

/// Hands corpus snapshots to the brain store.
///
/// Persistence failures are logged and swallowed: the in-memory brain keeps
/// serving, and anything not yet flushed is lost if the process dies.
pub struct Persister {
    store: Arc<BrainStore>,
    queue: Option<Sender<Snapshot>>,
    worker: Option<JoinHandle<()>>,
}

impl Persister {
    pub fn new(store: BrainStore, mode: FlushMode) -> Self {
        let store = Arc::new(store);
        if mode == FlushMode::Sync {
            return Self {
                store,
                queue: None,
                worker: None,
            };
        }

        let (tx, rx) = unbounded::<Snapshot>();
        let worker_store = Arc::clone(&store);
        let worker = thread::Builder::new()
            .name("brain-flush".to_string())
            .spawn(move || flush_loop(worker_store, rx))
            .map_err(|e| error!(error = %e, "cannot spawn flush worker, flushing inline"))
            .ok();
        let queue = worker.as_ref().map(|_| tx);
        Self {
            store,
            queue,
            worker,
        }
    }

    pub fn store(&self) -> &BrainStore {
        &self.store
    }

    pub fn mode(&self) -> FlushMode {
        if self.queue.is_some() {
            FlushMode::Background
        } else {
            FlushMode::Sync
        }
    }

    /// Writes on the calling thread regardless of mode.
    pub fn write_now(&self, snapshot: &Snapshot) -> Result<bool, StoreError> {
        self.store.write(snapshot.generation, &snapshot.tokens)
    }

    /// Persists a snapshot according to the flush mode.
    pub fn submit(&self, snapshot: Snapshot) {
        let Some(queue) = &self.queue else {
            write_logged(&self.store, &snapshot);
            return;
        };
        if let Err(returned) = queue.send(snapshot) {
            error!("flush worker is gone, writing inline");
            write_logged(&self.store, &returned.into_inner());
        }
    }
}

impl Drop for Persister {
    fn drop(&mut self) {
        // Closing the queue lets the worker drain and exit.
        self.queue.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("flush worker panicked");
            }
        }
    }
}

fn write_logged(store: &BrainStore, snapshot: &Snapshot) {
    if let Err(e) = store.write(snapshot.generation, &snapshot.tokens) {
        error!(
            error = %e,
            generation = snapshot.generation,
            "brain flush failed, continuing from memory"
        );
    }
}

fn flush_loop(store: Arc<BrainStore>, rx: Receiver<Snapshot>) {
    info!(path = %store.path().display(), "flush worker started");
    while let Ok(mut snapshot) = rx.recv() {
        // Only the newest snapshot matters; older queued ones are superseded.
        let mut skipped = 0usize;
        for newer in rx.try_iter() {
            snapshot = newer;
            skipped += 1;
        }
        if skipped > 0 {
            debug!(skipped, "coalesced queued flushes");
        }
        write_logged(&store, &snapshot);
    }
    debug!("flush worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::load;
    use crate::tokenizer::Tokenizer;

    fn toks(line: &str) -> Vec<Token> {
        line.split_whitespace().map(Token::from_marker_or_word).collect()
    }

    fn snapshot(generation: u64, line: &str) -> Snapshot {
        Snapshot {
            generation,
            tokens: toks(line),
        }
    }

    #[test]
    fn sync_mode_writes_before_returning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.yaml");
        let persister = Persister::new(BrainStore::new(&path), FlushMode::Sync);
        persister.submit(snapshot(1, "<START> A B <STOP>"));
        let corpus = load(&path, &Tokenizer::default()).unwrap();
        assert_eq!(corpus.len(), 4);
    }

    #[test]
    fn background_mode_lands_last_snapshot_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let persister = Persister::new(BrainStore::new(&path), FlushMode::Background);
        assert_eq!(persister.mode(), FlushMode::Background);

        let mut tokens = Vec::new();
        for i in 0..25u64 {
            tokens.extend(toks(&format!("<START> WORD{i} NEXT <STOP>")));
            persister.submit(Snapshot {
                generation: i + 1,
                tokens: tokens.clone(),
            });
        }
        drop(persister);

        let corpus = load(&path, &Tokenizer::default()).unwrap();
        assert_eq!(corpus.sentence_count(), 25);
    }

    #[test]
    fn write_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.txt");
        let persister = Persister::new(BrainStore::new(&path), FlushMode::Sync);
        let snap = snapshot(1, "<START> A B <STOP>");
        persister.submit(snap.clone());
        assert!(persister.write_now(&snap).is_err());
    }
}
