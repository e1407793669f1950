//! Search intent extraction from transcribed speech
//!
//! Commands are matched in list order, case-insensitively, anywhere in the
//! transcript; the text after the first matching command becomes the query.
//! Longer commands must come before their prefixes ("search for" before
//! "search") or the short one would swallow part of the phrase.
//!
//! Transcripts without a recognizable command fall back to the whole
//! transcript as the query. Only a blank transcript, or a command with
//! nothing after it, yields no intent.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::search::SearchQuery;
use crate::{Error, Result};

/// Default command phrases (Portuguese and English), most specific first
pub const DEFAULT_COMMANDS: &[&str] = &[
    "look up information about",
    "look up information on",
    "search the web for",
    "search the internet for",
    "pesquise na internet sobre",
    "pesquisar na internet sobre",
    "pesquise sobre",
    "pesquisar sobre",
    "busque por",
    "buscar por",
    "procure por",
    "procurar por",
    "search for",
    "look up",
    "find me",
    "pesquise",
    "pesquisar",
    "busque",
    "buscar",
    "procure",
    "procurar",
    "search",
    "find",
];

static DEFAULT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    DEFAULT_COMMANDS
        .iter()
        .map(|c| command_regex(c).expect("valid command regex"))
        .collect()
});

/// Where the query came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentSource {
    /// Text following a recognized command
    Command,
    /// Whole transcript, no command recognized
    Fallback,
}

/// An extracted search intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub query: SearchQuery,
    pub source: IntentSource,
}

/// Extracts search queries from transcripts with an ordered pattern list
#[derive(Debug, Clone)]
pub struct IntentExtractor {
    patterns: Vec<Regex>,
}

impl Default for IntentExtractor {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS.clone(),
        }
    }
}

fn command_regex(command: &str) -> std::result::Result<Regex, regex::Error> {
    let words: Vec<String> = command.split_whitespace().map(regex::escape).collect();
    Regex::new(&format!(r"(?is)\b{}\b(.*)$", words.join(r"\s+")))
}

fn clean_remainder(text: &str) -> &str {
    text.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ':' | ',' | '-'))
        .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, '.' | '!' | '?' | ','))
}

impl IntentExtractor {
    /// Build an extractor from custom command phrases, in priority order
    ///
    /// # Errors
    ///
    /// Returns error if the list is empty or a phrase is blank
    pub fn with_commands<S: AsRef<str>>(commands: &[S]) -> Result<Self> {
        if commands.is_empty() {
            return Err(Error::Config("intent command list is empty".to_string()));
        }

        let patterns = commands
            .iter()
            .map(|c| {
                let c = c.as_ref();
                if c.trim().is_empty() {
                    return Err(Error::Config("blank intent command".to_string()));
                }
                command_regex(c).map_err(|e| Error::Config(format!("intent command '{c}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    /// Extract a query, or `None` when there is no intent
    #[must_use]
    pub fn extract(&self, text: &str) -> Option<SearchQuery> {
        self.extract_intent(text).map(|i| i.query)
    }

    /// Extract a query and report whether a command or the fallback produced it
    #[must_use]
    pub fn extract_intent(&self, text: &str) -> Option<Intent> {
        for pattern in &self.patterns {
            if let Some(caps) = pattern.captures(text) {
                let remainder = caps.get(1).map_or("", |m| m.as_str());
                let query = SearchQuery::new(clean_remainder(remainder));
                tracing::debug!(
                    command = pattern.as_str(),
                    query = ?query,
                    "search command recognized"
                );
                return query.map(|query| Intent {
                    query,
                    source: IntentSource::Command,
                });
            }
        }

        let query = SearchQuery::new(clean_remainder(text))?;
        tracing::debug!(query = %query, "no command recognized, using full transcript");
        Some(Intent {
            query,
            source: IntentSource::Fallback,
        })
    }
}
