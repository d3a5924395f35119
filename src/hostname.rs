// Hostname Normalizer - free-form URL/domain strings to canonical hostnames
//
// Two tiers: structured URL parsing first, then a manual strip for inputs
// the parser rejects. Most malformed-but-plausible inputs still produce a
// usable hostname instead of failing outright.

use url::Url;

/// Normalize a URL-ish string into a lowercase hostname without scheme,
/// leading "www.", path, query, or fragment.
///
/// Returns None when the input is empty or nothing host-like remains.
pub fn normalize_hostname(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let lowered = trimmed.to_lowercase();
    let with_scheme = if lowered.starts_with("http://")
        || lowered.starts_with("https://")
        || trimmed.starts_with("//")
    {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    match Url::parse(&with_scheme) {
        Ok(url) => {
            let host = url.host_str().unwrap_or("").to_lowercase();
            let host = host.strip_prefix("www.").unwrap_or(&host);
            if host.is_empty() {
                None
            } else {
                Some(host.to_string())
            }
        }
        Err(_) => manual_strip(&with_scheme),
    }
}

/// Fallback for inputs the URL parser rejects: strip a leading scheme and
/// "www.", then truncate at the first path/query/fragment character.
fn manual_strip(input: &str) -> Option<String> {
    let mut rest = input;

    if let Some(pos) = rest.find("://") {
        if pos > 0 && rest[..pos].chars().all(|c| c.is_ascii_alphabetic()) {
            rest = &rest[pos + 3..];
        }
    }

    if rest.len() >= 4 && rest.as_bytes()[..4].eq_ignore_ascii_case(b"www.") {
        rest = &rest[4..];
    }

    let host = rest.split(&['/', '?', '#'][..]).next().unwrap_or("");
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_url_with_path_and_query() {
        assert_eq!(
            normalize_hostname("HTTPS://WWW.Example.com/path?x=1"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn test_bare_domain() {
        assert_eq!(
            normalize_hostname("acme.com"),
            Some("acme.com".to_string())
        );
    }

    #[test]
    fn test_www_prefix_stripped() {
        assert_eq!(
            normalize_hostname("www.acme.com"),
            Some("acme.com".to_string())
        );
        assert_eq!(
            normalize_hostname("http://www.acme.com/about"),
            Some("acme.com".to_string())
        );
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert_eq!(normalize_hostname(""), None);
        assert_eq!(normalize_hostname("   "), None);
    }

    #[test]
    fn test_malformed_input_best_effort() {
        let result = normalize_hostname("not a url at all###");
        let host = result.expect("best-effort hostname expected");
        assert!(!host.contains('/'));
        assert!(!host.contains('?'));
        assert!(!host.contains('#'));
        assert_eq!(host, "not a url at all");
    }

    #[test]
    fn test_manual_strip_removes_scheme_and_www() {
        // Spaces force the structured parser to fail
        assert_eq!(
            normalize_hostname("www.some site.com/path"),
            Some("some site.com".to_string())
        );
    }

    #[test]
    fn test_protocol_relative_without_host_yields_none() {
        // "//host" is relative for the parser and the fallback truncates at '/'
        assert_eq!(normalize_hostname("//"), None);
    }

    #[test]
    fn test_uppercase_host_lowercased() {
        assert_eq!(
            normalize_hostname("ACME.COM"),
            Some("acme.com".to_string())
        );
    }
}
