use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::tokenizer::normalize;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+").expect("static regex"));
// Discord allows a `!` after the `@` in user mentions.
static DISCORD_MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<@!(\d+)>").expect("static regex"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Names in generated text become platform ids.
    ToPlatform,
    /// Platform ids become names.
    FromPlatform,
}

/// One-to-one substitution between display names and platform user ids,
/// applied by chat glue to text the brain produced.
#[derive(Clone, Debug, Default)]
pub struct UserMap {
    to_platform: FxHashMap<String, String>,
    from_platform: FxHashMap<String, String>,
}

impl UserMap {
    /// YAML mapping of `name: id`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let pairs: BTreeMap<String, String> =
            serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_pairs(pairs).map_err(|id| ConfigError::DuplicateUser {
            path: path.to_path_buf(),
            id,
        })
    }

    /// Fails with the offending key when the mapping is not one-to-one.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = Self::default();
        for (name, id) in pairs {
            let (name, id) = (name.into(), id.into());
            let name_key = normalize(&name).unwrap_or_else(|| name.clone());
            let id_key = normalize(&id).unwrap_or_else(|| id.clone());
            if map.to_platform.contains_key(&name_key) {
                return Err(name);
            }
            if map.from_platform.contains_key(&id_key) {
                return Err(id);
            }
            map.to_platform.insert(name_key, id.clone());
            map.from_platform.insert(id_key, name);
        }
        Ok(map)
    }

    pub fn len(&self) -> usize {
        self.to_platform.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_platform.is_empty()
    }

    /// Replaces whole words. Matching ignores case and surrounding punctuation.
    pub fn apply(&self, text: &str, direction: Direction) -> String {
        let table = match direction {
            Direction::ToPlatform => &self.to_platform,
            Direction::FromPlatform => &self.from_platform,
        };
        let text = DISCORD_MENTION.replace_all(text, "<@$1>");
        if table.is_empty() {
            return text.into_owned();
        }

        WORD.replace_all(&text, |caps: &Captures| {
            let word = &caps[0];
            normalize(word)
                .and_then(|key| table.get(&key))
                .cloned()
                .unwrap_or_else(|| word.to_string())
        })
        .into_owned()
    }
}
