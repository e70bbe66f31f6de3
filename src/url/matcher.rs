use crate::url::domain::subdomain_of;

/// Checks if a host matches a wildcard pattern
///
/// 1. Exact match: "blog.example.com" matches only "blog.example.com"
/// 2. Wildcard match: "*.blog.example.com" matches the bare host and any
///    host beneath it
///
/// # Examples
///
/// ```
/// use site_strata::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "notexample.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Checks a host against one `allowed-subdomains` entry
///
/// An entry may be a bare label (`blog`, compared to the subdomain part of
/// the host), a full host (`blog.example.com`), or a wildcard
/// (`*.blog.example.com`). Comparison is case-insensitive.
pub fn matches_subdomain_entry(entry: &str, host: &str, root: &str) -> bool {
    let entry = entry.to_lowercase();
    let host = host.to_lowercase();

    if entry.starts_with("*.") {
        return matches_wildcard(&entry, &host);
    }

    if entry == host {
        return true;
    }

    subdomain_of(&host, root).is_some_and(|sub| sub == entry)
}
