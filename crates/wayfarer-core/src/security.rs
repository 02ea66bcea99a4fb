//! Security gates
//!
//! Two cheap, deterministic gates run before any model call:
//! - Content validation (sanitization, length limit, topic blocklist)
//! - Scope classification (is this a travel/booking question)

pub mod scope;
pub mod validation;

pub use scope::{ScopeClassifier, ScopeReason, ScopeStage, ScopeVerdict, REFUSAL_MESSAGE};
pub use validation::{
    sanitize_input, ContentValidator, SecurityConfig, Severity, ValidationStage,
    ValidationVerdict,
};

use regex::Regex;

use crate::error::{Error, Result};

/// Compile an alternation of English terms into one case-insensitive,
/// word-bounded regex
///
/// Terms ending in an escaped symbol (`c\+\+`) only get a leading
/// boundary, since `\b` never matches between two non-word characters.
pub(crate) fn word_regex(terms: &[&str]) -> Result<Regex> {
    let (symbolic, words): (Vec<&str>, Vec<&str>) =
        terms.iter().copied().partition(|t| t.ends_with(r"\+") || t.ends_with('#'));

    let mut pattern = format!(r"(?i)\b(?:{})\b", words.join("|"));
    if !symbolic.is_empty() {
        pattern = format!(r"{pattern}|\b(?:{})", symbolic.join("|"));
    }
    Regex::new(&pattern).map_err(|e| Error::Configuration(format!("invalid pattern: {e}")))
}

/// Whether any Korean keyword occurs in the text
pub(crate) fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}
