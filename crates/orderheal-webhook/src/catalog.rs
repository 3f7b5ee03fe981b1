//! Error solution catalog
//!
//! An ordered table of known POS error signatures. The first entry whose
//! signature matches wins, so specific entries must precede generic ones.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse catalog: {0}")]
    Parse(String),

    #[error("Invalid pattern for error code {code}: {reason}")]
    InvalidPattern { code: String, reason: String },

    #[error("Error code {0} has neither substrings nor a pattern to match on")]
    EmptySignature(String),
}

/// Catalog entry as supplied by operators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSolution {
    pub code: String,
    pub business_name: String,
    pub reason: String,
    pub solution: String,
    /// All of these must occur in the error text; takes precedence over the pattern
    #[serde(default)]
    pub contains: Vec<String>,
    /// Matches the error text and locates the offending product/attribute id
    #[serde(default)]
    pub extraction_pattern: Option<String>,
    #[serde(default)]
    pub send_to_telegram: bool,
    #[serde(default)]
    pub send_stop_list_status: bool,
}

#[derive(Debug, Clone)]
enum Matcher {
    Contains(Vec<String>),
    Pattern(Regex),
}

/// Compiled catalog entry
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    solution: ErrorSolution,
    matcher: Matcher,
    extractor: Option<Regex>,
}

impl CatalogEntry {
    fn compile(solution: ErrorSolution) -> Result<Self, CatalogError> {
        let extractor = match &solution.extraction_pattern {
            Some(pattern) => Some(Regex::new(pattern).map_err(|e| CatalogError::InvalidPattern {
                code: solution.code.clone(),
                reason: e.to_string(),
            })?),
            None => None,
        };

        let matcher = if !solution.contains.is_empty() {
            Matcher::Contains(solution.contains.clone())
        } else if let Some(regex) = &extractor {
            Matcher::Pattern(regex.clone())
        } else {
            return Err(CatalogError::EmptySignature(solution.code.clone()));
        };

        Ok(Self {
            solution,
            matcher,
            extractor,
        })
    }

    pub fn solution(&self) -> &ErrorSolution {
        &self.solution
    }

    pub fn matches(&self, text: &str) -> bool {
        match &self.matcher {
            Matcher::Contains(needles) => needles.iter().all(|n| text.contains(n.as_str())),
            Matcher::Pattern(regex) => regex.is_match(text),
        }
    }

    /// First capture group of the extraction pattern, or the whole match
    pub fn extract(&self, text: &str) -> Option<String> {
        let captures = self.extractor.as_ref()?.captures(text)?;
        captures
            .get(1)
            .or_else(|| captures.get(0))
            .map(|m| m.as_str().trim().to_string())
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "entry")]
    entries: Vec<ErrorSolution>,
}

/// Ordered, compiled error catalog
#[derive(Debug, Clone, Default)]
pub struct ErrorCatalog {
    entries: Vec<CatalogEntry>,
}

impl ErrorCatalog {
    pub fn new(solutions: Vec<ErrorSolution>) -> Result<Self, CatalogError> {
        let entries = solutions
            .into_iter()
            .map(CatalogEntry::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    /// Parse `[[entry]]` tables, keeping file order
    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            toml::from_str(content).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::new(file.entries)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn first_match(&self, text: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|entry| entry.matches(text))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.solution.code.as_str())
    }
}
