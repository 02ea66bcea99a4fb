//! Common utilities for model providers

/// Sensitive patterns to filter from error messages
const SENSITIVE_PATTERNS: &[&str] = &[
    "api_key",
    "api-key",
    "apikey",
    "authorization",
    "bearer",
    "token",
    "secret",
    "password",
    "credential",
];

/// Sanitize an upstream error message before it leaves the provider
///
/// # Examples
/// ```
/// use wayfarer_llm::util::sanitize_api_error;
/// assert_eq!(
///     sanitize_api_error("invalid bearer token"),
///     "An API error occurred. Please try again."
/// );
/// assert_eq!(sanitize_api_error("model not loaded"), "model not loaded");
/// ```
#[must_use]
pub fn sanitize_api_error(error: &str) -> String {
    let lower = error.to_lowercase();

    if SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p)) {
        return "An API error occurred. Please try again.".to_string();
    }

    if lower.contains("/home") || lower.contains("/root") || lower.contains("/var") {
        return "An internal error occurred.".to_string();
    }

    if error.len() > 300 {
        format!("{}...(truncated)", truncate_safe(error, 300))
    } else {
        error.to_string()
    }
}

/// Truncate a string to at most `max_bytes`, respecting char boundaries
#[must_use]
pub fn truncate_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
