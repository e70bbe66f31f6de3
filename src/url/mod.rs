//! URL handling module for Site-Strata
//!
//! This module provides URL normalization, page ids, domain and subdomain
//! matching, path globs, URL patterns, and frontier classification.

mod domain;
mod glob;
mod matcher;
mod normalize;
mod pattern;

use crate::config::CrawlConfig;
use crate::ConfigError;
use regex::Regex;
use std::fmt;
use url::Url;

// Re-export main functions
pub use domain::{extract_domain, root_domain, same_origin, subdomain_of};
pub use glob::PathGlob;
pub use matcher::{matches_subdomain_entry, matches_wildcard};
pub use normalize::{normalize_url, normalize_with_base, page_id, to_id, ID_LENGTH};
pub use pattern::{
    classify_segment, common_pattern, is_placeholder, path_segments, pattern_extends,
    url_pattern, SegmentKind, SlugRules,
};

/// Why a URL was admitted to or kept out of the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifyReason {
    /// Same scheme, host and port as the base URL
    SameOrigin,
    /// Different host under the base URL's root domain, subdomains followed
    Subdomain,
    /// Not http or https
    UnsupportedScheme,
    /// Outside the base origin and not an admissible subdomain
    ExternalOrigin,
    /// Subdomain not present in `allowed-subdomains`
    SubdomainNotAllowed,
    /// Path matched the given `exclude-paths` glob
    ExcludedPath(String),
    /// URL matched the given `exclude` expression
    ExcludedPattern(String),
    /// `include` is non-empty and no expression matched
    NotIncluded,
}

impl fmt::Display for ClassifyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SameOrigin => write!(f, "same origin"),
            Self::Subdomain => write!(f, "allowed subdomain"),
            Self::UnsupportedScheme => write!(f, "unsupported scheme"),
            Self::ExternalOrigin => write!(f, "external origin"),
            Self::SubdomainNotAllowed => write!(f, "subdomain not allowed"),
            Self::ExcludedPath(glob) => write!(f, "excluded by path glob '{}'", glob),
            Self::ExcludedPattern(pattern) => write!(f, "excluded by pattern '{}'", pattern),
            Self::NotIncluded => write!(f, "no include pattern matched"),
        }
    }
}

/// Outcome of frontier classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub in_frontier: bool,
    pub reason: ClassifyReason,
}

impl Classification {
    fn admit(reason: ClassifyReason) -> Self {
        Self {
            in_frontier: true,
            reason,
        }
    }

    fn reject(reason: ClassifyReason) -> Self {
        Self {
            in_frontier: false,
            reason,
        }
    }
}

/// Compiled frontier membership rules for one crawl
///
/// Built once from the crawl configuration; classification itself never
/// allocates regexes.
#[derive(Debug, Clone)]
pub struct CrawlScope {
    base: Url,
    root: String,
    follow_subdomains: bool,
    allowed_subdomains: Vec<String>,
    exclude_paths: Vec<PathGlob>,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl CrawlScope {
    /// Compiles the scope rules of `config`
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the base URL, a glob or a regex is invalid
    pub fn new(config: &CrawlConfig) -> Result<Self, ConfigError> {
        let base = normalize_url(&config.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        Self::with_base(base, config)
    }

    fn with_base(base: Url, config: &CrawlConfig) -> Result<Self, ConfigError> {
        let root = base.host_str().map(root_domain).unwrap_or_default();

        let exclude_paths = config
            .exclude_paths
            .iter()
            .map(|p| PathGlob::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        let compile = |patterns: &[String]| -> Result<Vec<Regex>, ConfigError> {
            patterns
                .iter()
                .map(|p| {
                    Regex::new(p).map_err(|e| {
                        ConfigError::InvalidPattern(format!("Invalid URL pattern '{}': {}", p, e))
                    })
                })
                .collect()
        };

        Ok(Self {
            base,
            root,
            follow_subdomains: config.follow_subdomains,
            allowed_subdomains: config.allowed_subdomains.clone(),
            exclude_paths,
            include: compile(&config.include)?,
            exclude: compile(&config.exclude)?,
        })
    }

    /// The normalized base URL
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Decides whether `url` belongs to the crawl frontier
    ///
    /// Checks run in a fixed order and the first rejection wins: scheme,
    /// origin or subdomain, `exclude-paths`, `exclude`, then `include`.
    pub fn classify(&self, url: &Url) -> Classification {
        if url.scheme() != "http" && url.scheme() != "https" {
            return Classification::reject(ClassifyReason::UnsupportedScheme);
        }

        let origin_reason = if same_origin(url, &self.base) {
            ClassifyReason::SameOrigin
        } else {
            match self.subdomain_verdict(url) {
                Some(reason @ ClassifyReason::Subdomain) => reason,
                Some(reason) => return Classification::reject(reason),
                None => return Classification::reject(ClassifyReason::ExternalOrigin),
            }
        };

        let path = url.path();
        if let Some(glob) = self.exclude_paths.iter().find(|g| g.is_match(path)) {
            return Classification::reject(ClassifyReason::ExcludedPath(
                glob.pattern().to_string(),
            ));
        }

        let full = url.as_str();
        if let Some(pattern) = self.exclude.iter().find(|r| r.is_match(full)) {
            return Classification::reject(ClassifyReason::ExcludedPattern(
                pattern.as_str().to_string(),
            ));
        }

        if !self.include.is_empty() && !self.include.iter().any(|r| r.is_match(full)) {
            return Classification::reject(ClassifyReason::NotIncluded);
        }

        Classification::admit(origin_reason)
    }

    fn subdomain_verdict(&self, url: &Url) -> Option<ClassifyReason> {
        if !self.follow_subdomains || url.scheme() != self.base.scheme() {
            return None;
        }

        let host = extract_domain(url)?;
        if root_domain(&host) != self.root {
            return None;
        }

        if self.allowed_subdomains.is_empty()
            || self
                .allowed_subdomains
                .iter()
                .any(|entry| matches_subdomain_entry(entry, &host, &self.root))
        {
            Some(ClassifyReason::Subdomain)
        } else {
            Some(ClassifyReason::SubdomainNotAllowed)
        }
    }
}

/// Classifies `url` against `base` and the crawl configuration
///
/// Convenience wrapper that compiles a [`CrawlScope`] for a single call;
/// long-running callers should build the scope once.
///
/// # Examples
///
/// ```
/// use site_strata::config::CrawlConfig;
/// use site_strata::url::classify;
/// use url::Url;
///
/// let config = CrawlConfig::for_base_url("https://example.com/");
/// let base = Url::parse("https://example.com/").unwrap();
///
/// let inside = Url::parse("https://example.com/about").unwrap();
/// assert!(classify(&inside, &base, &config).unwrap().in_frontier);
///
/// let outside = Url::parse("https://other.org/").unwrap();
/// assert!(!classify(&outside, &base, &config).unwrap().in_frontier);
/// ```
pub fn classify(url: &Url, base: &Url, config: &CrawlConfig) -> Result<Classification, ConfigError> {
    Ok(CrawlScope::with_base(base.clone(), config)?.classify(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn create_test_config() -> CrawlConfig {
        CrawlConfig::for_base_url("https://example.com/")
    }

    fn scope(config: &CrawlConfig) -> CrawlScope {
        CrawlScope::new(config).unwrap()
    }

    #[test]
    fn test_same_origin_admitted() {
        let config = create_test_config();
        let c = scope(&config).classify(&url("https://example.com/blog/post"));
        assert!(c.in_frontier);
        assert_eq!(c.reason, ClassifyReason::SameOrigin);
    }

    #[test]
    fn test_unsupported_scheme() {
        let config = create_test_config();
        let c = scope(&config).classify(&url("ftp://example.com/file"));
        assert!(!c.in_frontier);
        assert_eq!(c.reason, ClassifyReason::UnsupportedScheme);
    }

    #[test]
    fn test_subdomain_rejected_by_default() {
        let config = create_test_config();
        let c = scope(&config).classify(&url("https://blog.example.com/"));
        assert!(!c.in_frontier);
        assert_eq!(c.reason, ClassifyReason::ExternalOrigin);
    }

    #[test]
    fn test_other_port_is_external() {
        let config = create_test_config();
        let c = scope(&config).classify(&url("https://example.com:8443/"));
        assert!(!c.in_frontier);
    }

    #[test]
    fn test_follow_subdomains_all() {
        let mut config = create_test_config();
        config.follow_subdomains = true;
        let s = scope(&config);

        assert!(s.classify(&url("https://blog.example.com/x")).in_frontier);
        assert!(s.classify(&url("https://a.b.example.com/")).in_frontier);
        assert_eq!(
            s.classify(&url("https://example.org/")).reason,
            ClassifyReason::ExternalOrigin
        );
    }

    #[test]
    fn test_follow_subdomains_allow_list() {
        let mut config = create_test_config();
        config.follow_subdomains = true;
        config.allowed_subdomains = vec!["blog".to_string(), "*.docs.example.com".to_string()];
        let s = scope(&config);

        assert!(s.classify(&url("https://blog.example.com/")).in_frontier);
        assert!(s.classify(&url("https://v2.docs.example.com/")).in_frontier);
        let shop = s.classify(&url("https://shop.example.com/"));
        assert!(!shop.in_frontier);
        assert_eq!(shop.reason, ClassifyReason::SubdomainNotAllowed);
    }

    #[test]
    fn test_exclude_paths() {
        let mut config = create_test_config();
        config.exclude_paths = vec!["/admin/*".to_string()];
        let s = scope(&config);

        let c = s.classify(&url("https://example.com/admin/users"));
        assert!(!c.in_frontier);
        assert_eq!(c.reason, ClassifyReason::ExcludedPath("/admin/*".to_string()));
        assert!(s.classify(&url("https://example.com/administrator")).in_frontier);
    }

    #[test]
    fn test_include_and_exclude_patterns() {
        let mut config = create_test_config();
        config.include = vec![r"/(blog|docs)/".to_string()];
        config.exclude = vec![r"\?print=".to_string()];
        let s = scope(&config);

        assert!(s.classify(&url("https://example.com/blog/a")).in_frontier);
        assert_eq!(
            s.classify(&url("https://example.com/shop/a")).reason,
            ClassifyReason::NotIncluded
        );
        assert!(matches!(
            s.classify(&url("https://example.com/blog/a?print=1")).reason,
            ClassifyReason::ExcludedPattern(_)
        ));
    }

    #[test]
    fn test_classify_free_function() {
        let config = create_test_config();
        let base = url("https://example.com/");
        let c = classify(&url("https://example.com/a"), &base, &config).unwrap();
        assert!(c.in_frontier);
    }

    #[test]
    fn test_invalid_regex_in_scope() {
        let mut config = create_test_config();
        config.include = vec!["(".to_string()];
        assert!(CrawlScope::new(&config).is_err());
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(
            ClassifyReason::ExcludedPath("/admin/*".into()).to_string(),
            "excluded by path glob '/admin/*'"
        );
    }
}
