//! Language definitions
//!
//! A [`LanguageDefinition`] is the immutable, table-driven description of one
//! pseudocode dialect. It is read from a JSON resource, validated once, and
//! then shared (behind an `Arc`) by every classification, mistake search and
//! suggestion pass that runs against it.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use super::vocabulary::Vocabulary;

/// Message key of the only mistake the detector raises.
pub const NOT_DEFINED_MISTAKE: &str = "NotDefined";

const DEFAULT_NOT_DEFINED_TEMPLATE: &str = "'{0}' is not defined.";

/// Delimiter categories every definition must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelimiterCategory {
    String,
    Character,
    LineCommentary,
    BlockCommentary,
}

impl DelimiterCategory {
    pub const ALL: [DelimiterCategory; 4] = [
        DelimiterCategory::String,
        DelimiterCategory::Character,
        DelimiterCategory::LineCommentary,
        DelimiterCategory::BlockCommentary,
    ];

    /// Name used as the key in `startTokens` / `endTokens`.
    pub const fn as_str(self) -> &'static str {
        match self {
            DelimiterCategory::String => "String",
            DelimiterCategory::Character => "Character",
            DelimiterCategory::LineCommentary => "LineCommentary",
            DelimiterCategory::BlockCommentary => "BlockCommentary",
        }
    }
}

impl fmt::Display for DelimiterCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of a delimiter pair a load error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelimiterSide {
    Start,
    End,
}

impl fmt::Display for DelimiterSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelimiterSide::Start => f.write_str("start"),
            DelimiterSide::End => f.write_str("end"),
        }
    }
}

/// Errors raised while loading a language definition.
///
/// All of them are fatal for the definition: classification depends on every
/// delimiter category being present, so nothing is defaulted.
#[derive(Debug, thiserror::Error)]
pub enum LanguageError {
    #[error("failed to read language definition {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed language definition: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("language definition has an empty name")]
    EmptyName,

    #[error("language `{language}` defines no {side} token for {category}")]
    MissingDelimiter {
        language: String,
        category: DelimiterCategory,
        side: DelimiterSide,
    },

    #[error("language `{language}` defines an empty {side} token for {category}")]
    EmptyDelimiter {
        language: String,
        category: DelimiterCategory,
        side: DelimiterSide,
    },

    #[error("language `{language}` uses surface string `{surface}` for both {first} and {second}")]
    DuplicateSurface {
        language: String,
        surface: String,
        first: String,
        second: String,
    },
}

/// Start/end strings of one delimited construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiter {
    pub start: String,
    pub end: String,
}

impl Delimiter {
    /// True when `content` both opens and closes the construct on its own.
    pub fn encloses(&self, content: &str) -> bool {
        content.starts_with(&self.start)
            && content.len() >= self.start.len() + self.end.len()
            && content.ends_with(&self.end)
    }
}

/// The four required delimiter pairs, validated at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub string: Delimiter,
    pub character: Delimiter,
    pub line_commentary: Delimiter,
    pub block_commentary: Delimiter,
}

impl Delimiters {
    pub fn get(&self, category: DelimiterCategory) -> &Delimiter {
        match category {
            DelimiterCategory::String => &self.string,
            DelimiterCategory::Character => &self.character,
            DelimiterCategory::LineCommentary => &self.line_commentary,
            DelimiterCategory::BlockCommentary => &self.block_commentary,
        }
    }
}

/// Wire shape of the JSON resource.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLanguageDefinition {
    name: String,
    #[serde(default)]
    keywords: Vocabulary,
    #[serde(default)]
    value_types: Vocabulary,
    #[serde(default)]
    commands: Vocabulary,
    #[serde(default)]
    operators: Vocabulary,
    #[serde(default)]
    special_syntax: Vocabulary,
    start_tokens: HashMap<String, String>,
    end_tokens: HashMap<String, String>,
    #[serde(default)]
    mistake_descriptions: HashMap<String, String>,
    #[serde(default)]
    colors: HashMap<String, String>,
}

/// Immutable classification tables for one dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageDefinition {
    name: String,
    keywords: Vocabulary,
    value_types: Vocabulary,
    commands: Vocabulary,
    operators: Vocabulary,
    special_syntax: Vocabulary,
    delimiters: Delimiters,
    mistake_descriptions: HashMap<String, String>,
    colors: HashMap<String, String>,
}

impl LanguageDefinition {
    /// Parses and validates a definition from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, LanguageError> {
        let raw: RawLanguageDefinition = serde_json::from_str(json)?;
        Self::try_from(raw)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, LanguageError> {
        let raw: RawLanguageDefinition = serde_json::from_reader(reader)?;
        Self::try_from(raw)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LanguageError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LanguageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let definition = Self::from_json_str(&text)?;
        debug!(
            "Loaded language definition '{}' from {}",
            definition.name,
            path.display()
        );
        Ok(definition)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keywords(&self) -> &Vocabulary {
        &self.keywords
    }

    pub fn value_types(&self) -> &Vocabulary {
        &self.value_types
    }

    pub fn commands(&self) -> &Vocabulary {
        &self.commands
    }

    pub fn operators(&self) -> &Vocabulary {
        &self.operators
    }

    pub fn special_syntax(&self) -> &Vocabulary {
        &self.special_syntax
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    /// Color configured for a classification name (consumed by highlighters).
    pub fn color_for(&self, classification: &str) -> Option<&str> {
        self.colors.get(classification).map(String::as_str)
    }

    pub fn colors(&self) -> &HashMap<String, String> {
        &self.colors
    }

    /// Renders the description template for `key`, substituting `{0}` and
    /// `{token}` with the offending token content.
    pub fn describe_mistake(&self, key: &str, content: &str) -> String {
        let template = match self.mistake_descriptions.get(key) {
            Some(template) => template.as_str(),
            None if key == NOT_DEFINED_MISTAKE => DEFAULT_NOT_DEFINED_TEMPLATE,
            None => return format!("{}: {}", key, content),
        };
        template.replace("{0}", content).replace("{token}", content)
    }

    fn vocabularies(&self) -> [(&'static str, &Vocabulary); 5] {
        [
            ("keywords", &self.keywords),
            ("valueTypes", &self.value_types),
            ("commands", &self.commands),
            ("operators", &self.operators),
            ("specialSyntax", &self.special_syntax),
        ]
    }

    /// Surface strings must identify at most one semantic key across all five tables.
    fn check_unique_surfaces(&self) -> Result<(), LanguageError> {
        let mut owners: HashMap<&str, String> = HashMap::new();
        for (table, vocabulary) in self.vocabularies() {
            for (key, surface) in vocabulary.iter() {
                let owner = format!("{}.{}", table, key);
                if let Some(first) = owners.insert(surface, owner.clone()) {
                    return Err(LanguageError::DuplicateSurface {
                        language: self.name.clone(),
                        surface: surface.to_string(),
                        first,
                        second: owner,
                    });
                }
            }
        }
        Ok(())
    }
}

fn required_delimiter(
    language: &str,
    start_tokens: &HashMap<String, String>,
    end_tokens: &HashMap<String, String>,
    category: DelimiterCategory,
) -> Result<Delimiter, LanguageError> {
    let lookup = |tokens: &HashMap<String, String>, side: DelimiterSide| {
        match tokens.get(category.as_str()) {
            None => Err(LanguageError::MissingDelimiter {
                language: language.to_string(),
                category,
                side,
            }),
            Some(value) if value.is_empty() => Err(LanguageError::EmptyDelimiter {
                language: language.to_string(),
                category,
                side,
            }),
            Some(value) => Ok(value.clone()),
        }
    };

    Ok(Delimiter {
        start: lookup(start_tokens, DelimiterSide::Start)?,
        end: lookup(end_tokens, DelimiterSide::End)?,
    })
}

impl TryFrom<RawLanguageDefinition> for LanguageDefinition {
    type Error = LanguageError;

    fn try_from(raw: RawLanguageDefinition) -> Result<Self, Self::Error> {
        if raw.name.trim().is_empty() {
            return Err(LanguageError::EmptyName);
        }

        let delimiter = |category| {
            required_delimiter(&raw.name, &raw.start_tokens, &raw.end_tokens, category)
        };
        let delimiters = Delimiters {
            string: delimiter(DelimiterCategory::String)?,
            character: delimiter(DelimiterCategory::Character)?,
            line_commentary: delimiter(DelimiterCategory::LineCommentary)?,
            block_commentary: delimiter(DelimiterCategory::BlockCommentary)?,
        };

        let definition = LanguageDefinition {
            name: raw.name,
            keywords: raw.keywords,
            value_types: raw.value_types,
            commands: raw.commands,
            operators: raw.operators,
            special_syntax: raw.special_syntax,
            delimiters,
            mistake_descriptions: raw.mistake_descriptions,
            colors: raw.colors,
        };
        definition.check_unique_surfaces()?;
        Ok(definition)
    }
}
