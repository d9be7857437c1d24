use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::generator::DEFAULT_MAX_WORDS;
use crate::persist::FlushMode;

/// Brain settings, read from a YAML file and overridden from the command line.
///
/// ```yaml
/// brain: codebro.yaml
/// output: codebro.learned.yaml
/// name: codebro
/// ignore_words: [codebro, "@codebro"]
/// flush: background
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrainConfig {
    /// Brain file read at startup.
    pub brain: PathBuf,
    /// Brain file rewritten on every learn. Derived from `brain` when empty.
    pub output: PathBuf,
    /// Name the chat front end answers to.
    pub name: String,
    pub ignore_words: Vec<String>,
    pub ignore_file: Option<PathBuf>,
    pub user_map: Option<PathBuf>,
    pub flush: FlushMode,
    pub max_words: usize,
    /// Skip sentences that teach the index nothing new.
    pub dedupe: bool,
    pub learn: bool,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            brain: PathBuf::new(),
            output: PathBuf::new(),
            name: String::new(),
            ignore_words: Vec::new(),
            ignore_file: None,
            user_map: None,
            flush: FlushMode::Sync,
            max_words: DEFAULT_MAX_WORDS,
            dedupe: true,
            learn: true,
        }
    }
}

impl BrainConfig {
    pub fn new(brain: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            brain: brain.into(),
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Fills in the output path and rejects unusable combinations.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.brain.as_os_str().is_empty() {
            return Err(ConfigError::Missing("brain"));
        }
        if self.output.as_os_str().is_empty() {
            self.output = default_output(&self.brain);
        }
        if self.output == self.brain {
            return Err(ConfigError::SameFile(self.output));
        }
        if self.max_words == 0 {
            self.max_words = DEFAULT_MAX_WORDS;
        }
        Ok(self)
    }
}

/// `brains/codebro.yaml` -> `brains/codebro.learned.yaml`
fn default_output(brain: &Path) -> PathBuf {
    let stem = brain
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("brain");
    let name = match brain.extension().and_then(|s| s.to_str()) {
        Some(ext) => format!("{stem}.learned.{ext}"),
        None => format!("{stem}.learned"),
    };
    brain.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yaml_with_defaults() {
        let config: BrainConfig =
            serde_yaml::from_str("brain: seed.txt\nname: codebro\nflush: background\n").unwrap();
        assert_eq!(config.brain, PathBuf::from("seed.txt"));
        assert_eq!(config.flush, FlushMode::Background);
        assert_eq!(config.max_words, DEFAULT_MAX_WORDS);
        assert!(config.dedupe);
        assert!(config.learn);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(serde_yaml::from_str::<BrainConfig>("brian: seed.txt\n").is_err());
    }

    #[test]
    fn output_defaults_next_to_brain() {
        let config = BrainConfig::new("brains/codebro.yaml", "").validate().unwrap();
        assert_eq!(config.output, PathBuf::from("brains/codebro.learned.yaml"));
    }

    #[test]
    fn same_input_and_output_is_refused() {
        let err = BrainConfig::new("b.yaml", "b.yaml").validate().unwrap_err();
        assert!(matches!(err, ConfigError::SameFile(_)));
        let err = BrainConfig::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("brain")));
    }

    #[test]
    fn reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.yaml");
        fs::write(&path, "brain: a.txt\noutput: b.bin\nignore_words: [um, uh]\n").unwrap();
        let config = BrainConfig::from_file(&path).unwrap();
        assert_eq!(config.ignore_words, vec!["um", "uh"]);
        assert!(matches!(
            BrainConfig::from_file(&dir.path().join("none.yaml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
