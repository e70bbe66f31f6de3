use url::{Host, Url};

/// Second-level labels that act as part of a public suffix (`example.co.uk`)
const SECOND_LEVEL_SUFFIXES: &[&str] = &["ac", "co", "com", "edu", "gov", "ne", "net", "or", "org"];

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_strata::url::extract_domain;
///
/// let url = Url::parse("https://Blog.Example.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("blog.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if both URLs share scheme, host and port
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

/// Computes the registrable root domain of a host
///
/// This is a heuristic rather than a public-suffix lookup: the last two
/// labels, or the last three when the second-level label is a common
/// country-code suffix (`co.uk`, `com.au`). IP addresses and single-label
/// hosts are returned unchanged.
///
/// # Examples
///
/// ```
/// use site_strata::url::root_domain;
///
/// assert_eq!(root_domain("blog.example.com"), "example.com");
/// assert_eq!(root_domain("shop.example.co.uk"), "example.co.uk");
/// assert_eq!(root_domain("localhost"), "localhost");
/// ```
pub fn root_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_lowercase();

    if matches!(Host::parse(&host), Ok(Host::Ipv4(_)) | Ok(Host::Ipv6(_))) {
        return host;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return host;
    }

    let tld = labels[labels.len() - 1];
    let second = labels[labels.len() - 2];
    let keep = if tld.len() == 2 && SECOND_LEVEL_SUFFIXES.contains(&second) {
        3
    } else {
        2
    };

    labels[labels.len().saturating_sub(keep)..].join(".")
}

/// Returns the subdomain part of `host` relative to `root` (`blog` for
/// `blog.example.com`), or None when `host` is the root itself or unrelated
pub fn subdomain_of<'a>(host: &'a str, root: &str) -> Option<&'a str> {
    host.strip_suffix(root)
        .and_then(|prefix| prefix.strip_suffix('.'))
        .filter(|sub| !sub.is_empty())
}
