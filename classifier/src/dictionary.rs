use alphabot_core::DictionaryError;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;
use tracing::info;

/// The set of words a comment has to mostly consist of.
///
/// Loaded once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Dictionary {
    words: HashSet<String>,
}

impl Dictionary {
    /// Reads a word list with one word per line. Blank lines are ignored.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DictionaryError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => DictionaryError::NotFound {
                path: path.display().to_string(),
            },
            _ => DictionaryError::Unreadable {
                path: path.display().to_string(),
                source,
            },
        })?;

        let dictionary = Self::from_words(raw.lines());
        if dictionary.is_empty() {
            return Err(DictionaryError::Empty {
                path: path.display().to_string(),
            });
        }

        info!(
            "Loaded {} dictionary words from {}",
            dictionary.len(),
            path.display()
        );
        Ok(dictionary)
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|word| word.as_ref().trim().to_string())
                .filter(|word| !word.is_empty())
                .collect(),
        }
    }

    pub fn recognized(&self, token: &str) -> bool {
        self.words.contains(token)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
