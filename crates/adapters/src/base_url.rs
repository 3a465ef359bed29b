use once_cell::sync::Lazy;
use regex::Regex;

static VERSION_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/v\d+$").expect("valid version suffix regex"));

/// Normalizes an OpenAI-style base URL so it ends in an API version segment.
/// A trailing `#` opts out: the URL is used verbatim without the `#`.
pub fn check_base_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if trimmed.ends_with('#') {
        return trimmed.trim_end_matches('#').to_string();
    }

    let without_slash = trimmed.trim_end_matches('/');
    if VERSION_SUFFIX_RE.is_match(without_slash) || without_slash.contains("/v1/") {
        without_slash.to_string()
    } else {
        format!("{without_slash}/v1")
    }
}

/// Root of an Ollama server. The native API lives beside, not under, the
/// OpenAI-compatible `/v1` prefix, so a copied `/v1` suffix is removed.
pub fn ollama_base_url(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('#').trim_end_matches('/');
    trimmed
        .strip_suffix("/v1")
        .unwrap_or(trimmed)
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_base_url_appends_v1_when_missing() {
        assert_eq!(
            check_base_url("https://example.com"),
            "https://example.com/v1"
        );
        assert_eq!(
            check_base_url("http://localhost:1234/"),
            "http://localhost:1234/v1"
        );
    }

    #[test]
    fn check_base_url_keeps_existing_version() {
        assert_eq!(
            check_base_url("https://example.com/v2"),
            "https://example.com/v2"
        );
        assert_eq!(
            check_base_url("https://example.com/v1/"),
            "https://example.com/v1"
        );
    }

    #[test]
    fn check_base_url_respects_hash_suffix() {
        assert_eq!(
            check_base_url("https://example.com/custom#"),
            "https://example.com/custom"
        );
    }

    #[test]
    fn ollama_base_drops_openai_prefix() {
        assert_eq!(
            ollama_base_url("http://localhost:11434/v1/"),
            "http://localhost:11434"
        );
        assert_eq!(
            ollama_base_url("http://gpu-box:11434"),
            "http://gpu-box:11434"
        );
    }
}
