//! Localized text values and their resolution.
//!
//! Content fields were written by the site's editors either as a bare
//! string or as a map of language-code keys, so the wire shape is
//! duck-typed. `LocalizedText` models both forms and `resolve` turns one
//! into display text without ever failing: exact language, then `en`,
//! then a caller-supplied fallback, then the stringified map.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const ENGLISH: &str = "en";

/// Language tabs offered by the admin editor, and the targets of the
/// assistant's translate helper.
pub const DEFAULT_LANGUAGES: &[&str] = &["en", "es", "fr", "de", "pt", "ja"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalizedText {
    Plain(String),
    Localized(BTreeMap<String, String>),
}

impl LocalizedText {
    pub fn plain(text: impl Into<String>) -> Self {
        LocalizedText::Plain(text.into())
    }

    /// Builds a `Localized` value from sparse admin form input. Entries
    /// that are empty after trimming are dropped rather than stored, and
    /// a non-empty `en` entry is required.
    pub fn from_sparse(entries: &BTreeMap<String, String>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for (lang, text) in entries {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            map.insert(lang.trim().to_string(), trimmed.to_string());
        }
        if !map.contains_key(ENGLISH) {
            bail!("missing a non-empty English entry");
        }
        Ok(LocalizedText::Localized(map))
    }

    pub fn resolve(&self, lang: &str) -> String {
        self.resolve_with(lang, None, &[])
    }

    pub fn resolve_or(&self, lang: &str, fallback: &str) -> String {
        self.resolve_with(lang, Some(fallback), &[])
    }

    /// Full resolution chain plus `{key}` interpolation. Tokens without a
    /// matching argument are left verbatim. Total: always returns a string.
    pub fn resolve_with(&self, lang: &str, fallback: Option<&str>, args: &[(&str, &str)]) -> String {
        let raw = match self {
            LocalizedText::Plain(text) => text.clone(),
            LocalizedText::Localized(map) => lookup(map, lang)
                .or_else(|| lookup(map, ENGLISH))
                .or_else(|| fallback.map(str::to_owned))
                // Stringifying the map signals a data-entry bug upstream
                // while still rendering something.
                .unwrap_or_else(|| {
                    serde_json::to_string(map).unwrap_or_else(|_| format!("{map:?}"))
                }),
        };
        interpolate(raw, args)
    }

    /// The stored language codes, in map order. `Plain` has none.
    pub fn languages(&self) -> Vec<String> {
        match self {
            LocalizedText::Plain(_) => Vec::new(),
            LocalizedText::Localized(map) => map.keys().cloned().collect(),
        }
    }

    pub fn get(&self, lang: &str) -> Option<&str> {
        match self {
            LocalizedText::Plain(_) => None,
            LocalizedText::Localized(map) => map.get(lang).map(String::as_str),
        }
    }
}

fn lookup(map: &BTreeMap<String, String>, lang: &str) -> Option<String> {
    map.get(lang).filter(|text| !text.is_empty()).cloned()
}

fn interpolate(mut text: String, args: &[(&str, &str)]) -> String {
    for (key, value) in args {
        let token = format!("{{{key}}}");
        if text.contains(&token) {
            text = text.replace(&token, value);
        }
    }
    text
}
