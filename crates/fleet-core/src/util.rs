//! Shared utility functions used across multiple modules.

use reqwest::StatusCode;
use serde::Deserialize;

/// Characters the remote tree does not accept inside a key.
const FORBIDDEN_KEY_CHARS: [char; 6] = ['/', '.', '#', '$', '[', ']'];

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Whether `key` can be used as a single path segment in the remote tree.
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
        && !key.chars().any(|c| FORBIDDEN_KEY_CHARS.contains(&c) || c.is_control())
}

/// Join two tree paths with exactly one separator.
pub fn join_path(base: &str, segment: &str) -> String {
    let base = base.trim_matches('/');
    let segment = segment.trim_matches('/');
    match (base.is_empty(), segment.is_empty()) {
        (true, _) => segment.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{base}/{segment}"),
    }
}

/// Split a tree path into its non-empty segments.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    msg: Option<String>,
}

/// Render an HTTP error body as `"<message> (<status>)"`.
///
/// JSON bodies with an `error`, `error_description`, `message` or `msg` field
/// use that field; anything else is truncated verbatim.
pub(crate) fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorResponse>(body) {
        if let Some(message) = payload
            .error
            .or(payload.error_description)
            .or(payload.message)
            .or(payload.msg)
        {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_option_rejects_empty() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some("   ".to_string())), None);
    }

    #[test]
    fn normalize_text_option_trims_value() {
        assert_eq!(
            normalize_text_option(Some(" https://example.com ".to_string())),
            Some("https://example.com".to_string())
        );
    }

    #[test]
    fn is_http_url_accepts_valid_schemes() {
        assert!(is_http_url("http://localhost"));
        assert!(is_http_url("https://example.com"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("example.com"));
    }

    #[test]
    fn is_valid_key_rejects_tree_metacharacters() {
        assert!(is_valid_key("VEH17000000000001234"));
        assert!(is_valid_key("-Nabc_123"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("  "));
        assert!(!is_valid_key("a/b"));
        assert!(!is_valid_key("a.b"));
        assert!(!is_valid_key("a#b"));
        assert!(!is_valid_key("$a"));
        assert!(!is_valid_key("a[0]"));
    }

    #[test]
    fn join_path_normalizes_separators() {
        assert_eq!(join_path("vehicles", "V1"), "vehicles/V1");
        assert_eq!(join_path("/vehicles/", "/V1"), "vehicles/V1");
        assert_eq!(join_path("", "V1"), "V1");
        assert_eq!(join_path("vehicles", ""), "vehicles");
    }

    #[test]
    fn path_segments_skips_empty_parts() {
        assert_eq!(
            path_segments("/settings//otpAttempts/"),
            vec!["settings", "otpAttempts"]
        );
        assert!(path_segments("/").is_empty());
    }
}
