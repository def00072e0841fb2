//! Directory-backed catalog of language definitions
//!
//! Editors offer the dialects found in a definitions directory for
//! selection. Broken files are reported and skipped so one bad definition
//! does not hide the others.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::definition::{LanguageDefinition, LanguageError};

#[derive(Debug, Clone, Default)]
pub struct LanguageCatalog {
    languages: Vec<Arc<LanguageDefinition>>,
}

impl LanguageCatalog {
    /// Loads every `*.json` file in `dir`, sorted by language name.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, LanguageError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|source| LanguageError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut catalog = LanguageCatalog::default();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match LanguageDefinition::from_path(&path) {
                Ok(language) => catalog.insert(language),
                Err(e) => warn!("Skipping language definition {}: {}", path.display(), e),
            }
        }

        info!(
            "Loaded {} language definition(s) from {}",
            catalog.len(),
            dir.display()
        );
        Ok(catalog)
    }

    /// Adds a definition, replacing one with the same name.
    pub fn insert(&mut self, language: LanguageDefinition) {
        self.languages
            .retain(|existing| !existing.name().eq_ignore_ascii_case(language.name()));
        self.languages.push(Arc::new(language));
        self.languages.sort_by(|a, b| a.name().cmp(b.name()));
    }

    /// Case-insensitive lookup by language name.
    pub fn get(&self, name: &str) -> Option<Arc<LanguageDefinition>> {
        self.languages
            .iter()
            .find(|language| language.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.languages.iter().map(|language| language.name())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<LanguageDefinition>> {
        self.languages.iter()
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }
}
