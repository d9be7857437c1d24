//! Brain files on disk.
//!
//! The format follows the extension:
//! - `.yml` / `.yaml`: YAML list of tokens with `<START>`/`<STOP>` markers,
//! - `.bin`: zstd-compressed bincode token list,
//! - `.gz`: gzip-compressed raw text,
//! - anything else: raw text, one or more sentences per line.
//!
//! Writes always replace the whole file and are serialized through one mutex
//! per store.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::corpus::{split_sentences, Corpus};
use crate::error::StoreError;
use crate::token::Token;
use crate::tokenizer::Tokenizer;

const ZSTD_LEVEL: i32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrainFormat {
    Yaml,
    Binary,
    GzipText,
    Text,
}

impl BrainFormat {
    pub fn detect(path: &Path) -> Self {
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        if name.ends_with(".yml") || name.ends_with(".yaml") {
            BrainFormat::Yaml
        } else if name.ends_with(".bin") {
            BrainFormat::Binary
        } else if name.ends_with(".gz") {
            BrainFormat::GzipText
        } else {
            BrainFormat::Text
        }
    }
}

fn tokenize_lines(text: &str, tokenizer: &Tokenizer) -> Corpus {
    let lines: Vec<&str> = text.lines().collect();
    let sentences: Vec<Vec<String>> = lines
        .par_iter()
        .map(|line| tokenizer.sentences(line))
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect();
    Corpus::from_sentences(sentences)
}

fn render_lines(tokens: &[Token]) -> String {
    let mut out = String::new();
    for sentence in split_sentences(tokens) {
        let words: Vec<&str> = sentence.iter().filter_map(Token::as_word).collect();
        out.push_str(&words.join(" "));
        out.push('\n');
    }
    out
}

/// Reads a brain file into a canonical corpus.
pub fn load(path: &Path, tokenizer: &Tokenizer) -> Result<Corpus, StoreError> {
    let format = BrainFormat::detect(path);
    debug!(path = %path.display(), ?format, "reading brain");

    let corpus = match format {
        BrainFormat::Yaml => {
            let text = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
            let tokens: Vec<Token> =
                serde_yaml::from_str(&text).map_err(|source| StoreError::Yaml {
                    path: path.to_path_buf(),
                    source,
                })?;
            Corpus::from_tokens_filtered(tokens, tokenizer)
        }
        BrainFormat::Binary => {
            let compressed = fs::read(path).map_err(|e| StoreError::io(path, e))?;
            let serialized =
                zstd::decode_all(&compressed[..]).map_err(|e| StoreError::compressed(path, e))?;
            let tokens: Vec<Token> =
                bincode::deserialize(&serialized).map_err(|source| StoreError::Binary {
                    path: path.to_path_buf(),
                    source,
                })?;
            Corpus::from_tokens_filtered(tokens, tokenizer)
        }
        BrainFormat::GzipText => {
            let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
            let mut text = String::new();
            GzDecoder::new(file)
                .read_to_string(&mut text)
                .map_err(|e| StoreError::compressed(path, e))?;
            tokenize_lines(&text, tokenizer)
        }
        BrainFormat::Text => {
            let text = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
            tokenize_lines(&text, tokenizer)
        }
    };

    info!(
        path = %path.display(),
        tokens = corpus.len(),
        sentences = corpus.sentence_count(),
        "brain loaded"
    );
    Ok(corpus)
}

/// The output brain file. Every write is a full overwrite.
///
/// Writes carry the generation of the corpus they hold. The mutex serializes
/// writers and remembers the newest generation on disk, so a snapshot that lost
/// the race to a newer one is dropped instead of rolling the file back.
#[derive(Debug)]
pub struct BrainStore {
    path: PathBuf,
    format: BrainFormat,
    written: Mutex<Option<u64>>,
}

impl BrainStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = BrainFormat::detect(&path);
        Self {
            path,
            format,
            written: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> BrainFormat {
        self.format
    }

    fn encode(&self, tokens: &[Token]) -> Result<Vec<u8>, StoreError> {
        let io_err = |e| StoreError::io(&self.path, e);
        match self.format {
            BrainFormat::Yaml => serde_yaml::to_string(tokens)
                .map(String::into_bytes)
                .map_err(|source| StoreError::Yaml {
                    path: self.path.clone(),
                    source,
                }),
            BrainFormat::Binary => {
                let serialized =
                    bincode::serialize(tokens).map_err(|source| StoreError::Binary {
                        path: self.path.clone(),
                        source,
                    })?;
                zstd::encode_all(&serialized[..], ZSTD_LEVEL).map_err(io_err)
            }
            BrainFormat::GzipText => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder
                    .write_all(render_lines(tokens).as_bytes())
                    .map_err(io_err)?;
                encoder.finish().map_err(io_err)
            }
            BrainFormat::Text => Ok(render_lines(tokens).into_bytes()),
        }
    }

    /// Replaces the file with `tokens` unless a newer generation is already on
    /// disk. Returns whether the file was written.
    ///
    /// Encoding happens outside the lock; the bytes go to a temp file next to
    /// the target which is then renamed over it.
    pub fn write(&self, generation: u64, tokens: &[Token]) -> Result<bool, StoreError> {
        let bytes = self.encode(tokens)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut written = self
            .written
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if matches!(*written, Some(last) if last > generation) {
            debug!(generation, "stale brain snapshot skipped");
            return Ok(false);
        }

        let io_err = |e| StoreError::io(&self.path, e);
        let tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            writer.write_all(&bytes).map_err(io_err)?;
            writer.flush().map_err(io_err)?;
        }
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        *written = Some(generation);

        debug!(path = %self.path.display(), generation, bytes = bytes.len(), "brain written");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(line: &str) -> Vec<Token> {
        line.split_whitespace().map(Token::from_marker_or_word).collect()
    }

    #[test]
    fn detects_by_extension() {
        assert_eq!(BrainFormat::detect(Path::new("b.yaml")), BrainFormat::Yaml);
        assert_eq!(BrainFormat::detect(Path::new("b.YML")), BrainFormat::Yaml);
        assert_eq!(BrainFormat::detect(Path::new("b.bin")), BrainFormat::Binary);
        assert_eq!(BrainFormat::detect(Path::new("b.txt.gz")), BrainFormat::GzipText);
        assert_eq!(BrainFormat::detect(Path::new("b.txt")), BrainFormat::Text);
        assert_eq!(BrainFormat::detect(Path::new("brain")), BrainFormat::Text);
    }

    #[test]
    fn each_format_reloads_what_it_wrote() {
        let dir = tempfile::tempdir().unwrap();
        let tokens = toks("<START> THE CAT SAT <STOP> <START> A DOG <STOP>");
        let tokenizer = Tokenizer::default();

        for name in ["out.yaml", "out.bin", "out.txt.gz", "out.txt"] {
            let store = BrainStore::new(dir.path().join(name));
            store.write(1, &tokens).unwrap();
            let corpus = load(store.path(), &tokenizer).unwrap();
            assert_eq!(corpus.tokens(), tokens.as_slice(), "{name}");
        }
    }

    #[test]
    fn text_brain_is_one_sentence_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let store = BrainStore::new(dir.path().join("out.txt"));
        store
            .write(1, &toks("<START> THE CAT <STOP> <START> SAT <STOP>"))
            .unwrap();
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "THE CAT\nSAT\n");
    }

    #[test]
    fn raw_text_load_applies_ignore_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.txt");
        fs::write(&path, "The cat sat. Um ok\n\num\nThe dog ran!\n").unwrap();
        let corpus = load(&path, &Tokenizer::new(["um"])).unwrap();
        assert_eq!(
            corpus.tokens(),
            toks("<START> THE CAT SAT <STOP> <START> OK <STOP> <START> THE DOG RAN <STOP>")
                .as_slice()
        );
    }

    #[test]
    fn yaml_brain_drops_ignored_words() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.yaml");
        fs::write(&path, "[\"<START>\", \"um\", \"ok\", \"<STOP>\"]\n").unwrap();
        let corpus = load(&path, &Tokenizer::new(["um"])).unwrap();
        assert_eq!(corpus.tokens(), toks("<START> OK <STOP>").as_slice());
    }

    #[test]
    fn every_format_reloads_the_loaded_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("seed.yaml");
        fs::write(
            &seed,
            "[\"<START>\", \"um\", \"ok\", \"fine\", \"<STOP>\", \
             \"<START>\", \"hello world\", \"there\", \"<STOP>\"]\n",
        )
        .unwrap();
        let tokenizer = Tokenizer::new(["um"]);
        let corpus = load(&seed, &tokenizer).unwrap();

        for name in ["out.yaml", "out.bin", "out.txt.gz", "out.txt"] {
            let store = BrainStore::new(dir.path().join(name));
            store.write(1, corpus.tokens()).unwrap();
            let reloaded = load(store.path(), &tokenizer).unwrap();
            assert_eq!(reloaded, corpus, "{name}");
        }
    }

    #[test]
    fn corrupt_compressed_brain_is_reported_as_such() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["bad.bin", "bad.txt.gz"] {
            let path = dir.path().join(name);
            fs::write(&path, b"definitely not compressed").unwrap();
            assert!(
                matches!(
                    load(&path, &Tokenizer::default()),
                    Err(StoreError::Compressed { .. })
                ),
                "{name}"
            );
        }
    }

    #[test]
    fn older_generation_never_overwrites_newer() {
        let dir = tempfile::tempdir().unwrap();
        let store = BrainStore::new(dir.path().join("out.txt"));
        assert!(store.write(2, &toks("<START> NEW ONE <STOP>")).unwrap());
        assert!(!store.write(1, &toks("<START> OLD ONE <STOP>")).unwrap());
        assert!(store.write(2, &toks("<START> SAME GEN <STOP>")).unwrap());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "SAME GEN\n");
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "{ not: [a, list").unwrap();
        assert!(matches!(
            load(&path, &Tokenizer::default()),
            Err(StoreError::Yaml { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load(Path::new("/nonexistent/brain.txt"), &Tokenizer::default()).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
