//! Topic keywords matched against message bodies

use crate::error::{GmailError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Ordered list of keywords; each matching keyword becomes a label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordList {
    keywords: Vec<String>,
}

/// Accepted keyword file layouts
#[derive(Deserialize)]
#[serde(untagged)]
enum KeywordFile {
    Object { labels_to_check: Vec<String> },
    List(Vec<String>),
}

impl KeywordList {
    /// Build from raw keywords, dropping blanks and case-insensitive repeats
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .filter(|k| seen.insert(k.to_lowercase()))
            .collect();
        Self { keywords }
    }

    /// Load from JSON: `{"labels_to_check": [...]}` or a bare array
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            GmailError::ConfigError(format!("Failed to read keywords file {:?}: {}", path, e))
        })?;

        let list = Self::parse_json(&content)?;
        info!("Loaded {} keywords from {:?}", list.len(), path);
        Ok(list)
    }

    pub fn parse_json(content: &str) -> Result<Self> {
        let file: KeywordFile = serde_json::from_str(content).map_err(|e| {
            GmailError::ConfigError(format!(
                "Keywords file must be a JSON array or an object with 'labels_to_check': {}",
                e
            ))
        })?;

        Ok(match file {
            KeywordFile::Object { labels_to_check } => Self::new(labels_to_check),
            KeywordFile::List(keywords) => Self::new(keywords),
        })
    }

    /// Keywords (configured spelling, list order) occurring in any body
    pub fn matches<'a, B>(&'a self, bodies: &[B]) -> Vec<&'a str>
    where
        B: AsRef<str>,
    {
        if self.keywords.is_empty() || bodies.is_empty() {
            return Vec::new();
        }

        let lowered: Vec<String> = bodies.iter().map(|b| b.as_ref().to_lowercase()).collect();
        self.keywords
            .iter()
            .filter(|keyword| {
                let needle = keyword.to_lowercase();
                lowered.iter().any(|body| body.contains(&needle))
            })
            .map(String::as_str)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}
