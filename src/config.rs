use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

pub const MISTAKE_DEBOUNCE_ENV: &str = "PSEUDOCODE_MISTAKE_DEBOUNCE_MS";
pub const AUTO_MISTAKES_ENV: &str = "PSEUDOCODE_AUTO_MISTAKES";
pub const MAX_SUGGESTIONS_ENV: &str = "PSEUDOCODE_MAX_SUGGESTIONS";

/// Runtime configuration of an editor session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Quiet period after the last edit before an automatic mistake search.
    pub mistake_debounce: Duration,
    /// Run a mistake search automatically after edits.
    pub auto_mistake_search: bool,
    /// Upper bound on suggestions per request.
    pub max_suggestions: usize,
    /// Capacity of the command queue feeding the writer task.
    pub command_capacity: usize,
    /// Capacity of the session event broadcast channel.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mistake_debounce: Duration::from_millis(300),
            auto_mistake_search: false,
            max_suggestions: 50,
            command_capacity: 256,
            event_capacity: 128,
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by `PSEUDOCODE_*` environment variables.
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    /// name. Unparsable values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(millis) = parse_var::<u64>(&lookup, MISTAKE_DEBOUNCE_ENV) {
            config.mistake_debounce = Duration::from_millis(millis);
        }
        if let Some(raw) = lookup(AUTO_MISTAKES_ENV) {
            match parse_flag(&raw) {
                Some(enabled) => config.auto_mistake_search = enabled,
                None => warn!("Ignoring {}={:?}: expected a boolean", AUTO_MISTAKES_ENV, raw),
            }
        }
        if let Some(max) = parse_var::<usize>(&lookup, MAX_SUGGESTIONS_ENV) {
            config.max_suggestions = max;
        }

        config
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid number", name, raw);
            None
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_overrides() {
        assert_eq!(SessionConfig::from_lookup(lookup(&[])), SessionConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = SessionConfig::from_lookup(lookup(&[
            (MISTAKE_DEBOUNCE_ENV, "25"),
            (AUTO_MISTAKES_ENV, "on"),
            (MAX_SUGGESTIONS_ENV, " 7 "),
        ]));

        assert_eq!(config.mistake_debounce, Duration::from_millis(25));
        assert!(config.auto_mistake_search);
        assert_eq!(config.max_suggestions, 7);
    }

    #[test]
    fn test_invalid_values_are_ignored() {
        let config = SessionConfig::from_lookup(lookup(&[
            (MISTAKE_DEBOUNCE_ENV, "soon"),
            (AUTO_MISTAKES_ENV, "maybe"),
        ]));

        assert_eq!(config, SessionConfig::default());
    }
}
