//! Failure-type extraction
//!
//! Descriptive exports bury the failure classification inside free text
//! ("Tipo da falha: Timeout de conexão"); ticketing exports carry it as the
//! head of a "<type> - <detail>" subject. Both yield a non-empty string,
//! falling back to the `Unidentified` sentinel.

use crate::error::ConfigError;
use incident_core::UNIDENTIFIED_FAILURE;
use regex::Regex;

#[derive(Debug, Clone)]
pub struct FailureExtractor {
    pattern: Regex,
}

impl FailureExtractor {
    /// Builds a case-insensitive matcher for `<label>:` followed by the value.
    /// Whitespace inside a label matches any whitespace run.
    pub fn new(labels: &[String]) -> Result<Self, ConfigError> {
        let alternatives: Vec<String> = labels
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| {
                l.split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+")
            })
            .collect();

        if alternatives.is_empty() {
            return Err(ConfigError::Invalid("no failure labels configured".to_string()));
        }

        let source = format!(r"(?i)(?:{})[ \t]*:\s*([^\n]*)", alternatives.join("|"));
        let pattern = Regex::new(&source)
            .map_err(|e| ConfigError::Invalid(format!("failure label pattern: {}", e)))?;
        Ok(Self { pattern })
    }

    /// First labelled value in `text`, trimmed; `None` when absent or blank
    pub fn extract(&self, text: &str) -> Option<String> {
        let caps = self.pattern.captures(text)?;
        let value = caps.get(1)?.as_str().trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }

    pub fn classify(&self, text: Option<&str>) -> String {
        text.and_then(|t| self.extract(t))
            .unwrap_or_else(|| UNIDENTIFIED_FAILURE.to_string())
    }
}

/// Head of a "<type> - <detail>" subject; the whole subject when there is no hyphen
pub fn failure_from_subject(subject: Option<&str>) -> String {
    let subject = subject.unwrap_or_default();
    let head = subject
        .split_once('-')
        .map_or(subject, |(head, _)| head)
        .trim();

    if head.is_empty() {
        UNIDENTIFIED_FAILURE.to_string()
    } else {
        head.to_string()
    }
}
