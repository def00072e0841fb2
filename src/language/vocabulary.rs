//! Ordered vocabulary tables
//!
//! A vocabulary maps a canonical key (e.g. `"If"`) to the surface string a
//! dialect uses for it (e.g. `"wenn"`). Lookups during classification go by
//! surface string, aliasing between categories goes by key, and completion
//! walks the entries in the order the definition file lists them, so the
//! table keeps document order alongside two hash indexes.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Canonical-key to surface-string table preserving definition order.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    entries: Vec<(String, String)>,
    by_key: FxHashMap<String, usize>,
    by_surface: FxHashMap<String, usize>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the surface string for `key`.
    ///
    /// Returns the key that already owned `surface`, if it was a different key.
    /// The table is left unchanged in that case.
    pub fn insert(&mut self, key: impl Into<String>, surface: impl Into<String>) -> Option<String> {
        let key = key.into();
        let surface = surface.into();

        if let Some(&owner) = self.by_surface.get(&surface) {
            let (owner_key, _) = &self.entries[owner];
            if *owner_key != key {
                return Some(owner_key.clone());
            }
            return None;
        }

        match self.by_key.get(&key) {
            Some(&index) => {
                let previous = std::mem::replace(&mut self.entries[index].1, surface.clone());
                self.by_surface.remove(&previous);
                self.by_surface.insert(surface, index);
            }
            None => {
                let index = self.entries.len();
                self.by_key.insert(key.clone(), index);
                self.by_surface.insert(surface.clone(), index);
                self.entries.push((key, surface));
            }
        }
        None
    }

    /// Canonical key for a surface string.
    pub fn key_of(&self, surface: &str) -> Option<&str> {
        self.by_surface
            .get(surface)
            .map(|&index| self.entries[index].0.as_str())
    }

    /// Surface string for a canonical key.
    pub fn surface_of(&self, key: &str) -> Option<&str> {
        self.by_key
            .get(key)
            .map(|&index| self.entries[index].1.as_str())
    }

    pub fn contains_surface(&self, surface: &str) -> bool {
        self.by_surface.contains_key(surface)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// `(key, surface)` pairs in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, surface)| (key.as_str(), surface.as_str()))
    }

    /// Surface strings in definition order.
    pub fn surfaces(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, surface)| surface.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for Vocabulary {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for Vocabulary {}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Vocabulary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut vocabulary = Vocabulary::new();
        for (key, surface) in iter {
            vocabulary.insert(key, surface);
        }
        vocabulary
    }
}

impl Serialize for Vocabulary {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, surface) in &self.entries {
            map.serialize_entry(key, surface)?;
        }
        map.end()
    }
}

/// Reads a JSON object entry by entry so document order survives.
struct VocabularyVisitor;

impl<'de> Visitor<'de> for VocabularyVisitor {
    type Value = Vocabulary;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of canonical keys to surface strings")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut vocabulary = Vocabulary::new();
        while let Some((key, surface)) = access.next_entry::<String, String>()? {
            if surface.is_empty() {
                return Err(serde::de::Error::custom(format!(
                    "canonical key `{}` has an empty surface string",
                    key
                )));
            }
            if surface.chars().any(char::is_whitespace) {
                return Err(serde::de::Error::custom(format!(
                    "surface string `{}` for `{}` contains whitespace",
                    surface, key
                )));
            }
            if let Some(owner) = vocabulary.insert(key.clone(), surface.clone()) {
                return Err(serde::de::Error::custom(format!(
                    "surface string `{}` is used by both `{}` and `{}`",
                    surface, owner, key
                )));
            }
        }
        Ok(vocabulary)
    }
}

impl<'de> Deserialize<'de> for Vocabulary {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(VocabularyVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_keeps_document_order() {
        let vocabulary: Vocabulary =
            serde_json::from_str(r#"{"While": "while", "If": "if", "Else": "else"}"#).unwrap();

        let surfaces: Vec<&str> = vocabulary.surfaces().collect();
        assert_eq!(surfaces, vec!["while", "if", "else"]);
        assert_eq!(vocabulary.key_of("if"), Some("If"));
        assert_eq!(vocabulary.surface_of("Else"), Some("else"));
    }

    #[test]
    fn test_insert_rejects_surface_owned_by_other_key() {
        let mut vocabulary = Vocabulary::new();
        assert_eq!(vocabulary.insert("Plus", "+"), None);
        assert_eq!(vocabulary.insert("Add", "+"), Some("Plus".to_string()));
        assert_eq!(vocabulary.len(), 1);
    }

    #[test]
    fn test_insert_replaces_surface_for_existing_key() {
        let mut vocabulary = Vocabulary::new();
        vocabulary.insert("If", "if");
        vocabulary.insert("If", "wenn");

        assert_eq!(vocabulary.len(), 1);
        assert!(!vocabulary.contains_surface("if"));
        assert_eq!(vocabulary.key_of("wenn"), Some("If"));
    }

    #[test]
    fn test_deserialize_rejects_duplicate_surface() {
        let result: Result<Vocabulary, _> =
            serde_json::from_str(r#"{"Assign": "=", "Equal": "="}"#);
        let message = result.unwrap_err().to_string();
        assert!(message.contains("used by both"), "unexpected error: {}", message);
    }

    #[test]
    fn test_deserialize_rejects_whitespace_in_surface() {
        let result: Result<Vocabulary, _> = serde_json::from_str(r#"{"EndIf": "end if"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_round_trips_order() {
        let vocabulary: Vocabulary = [("B", "b"), ("A", "a")].into_iter().collect();
        let json = serde_json::to_string(&vocabulary).unwrap();
        assert_eq!(json, r#"{"B":"b","A":"a"}"#);
    }
}
