use crate::config::types::{AnalysisConfig, Config, CrawlConfig, StoreConfig, UserAgentConfig};
use crate::url::PathGlob;
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_store_config(&config.store)?;
    validate_analysis_config(&config.analysis)?;
    Ok(())
}

/// Validates the crawl policy
pub fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url '{}': {}", config.base_url, e)))?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' must use http or https",
            config.base_url
        )));
    }

    if base.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' has no host",
            config.base_url
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.concurrency < 1 || config.concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 64, got {}",
            config.concurrency
        )));
    }

    if config.timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "timeout-ms must be >= 100ms, got {}ms",
            config.timeout_ms
        )));
    }

    for pattern in &config.exclude_paths {
        PathGlob::new(pattern)?;
    }

    for pattern in config.include.iter().chain(&config.exclude) {
        Regex::new(pattern).map_err(|e| {
            ConfigError::InvalidPattern(format!("Invalid URL pattern '{}': {}", pattern, e))
        })?;
    }

    for subdomain in &config.allowed_subdomains {
        validate_subdomain_entry(subdomain)?;
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    Ok(())
}

fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates the inference tuning knobs
pub fn validate_analysis_config(config: &AnalysisConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("cluster-threshold", config.cluster_threshold),
        ("nav-threshold", config.nav_threshold),
        ("relationship-threshold", config.relationship_threshold),
        ("object-similarity", config.object_similarity),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::Validation(format!(
                "{} must be within [0, 1], got {}",
                name, value
            )));
        }
    }

    if config.max_clusters < 1 {
        return Err(ConfigError::Validation(
            "max-clusters must be >= 1".to_string(),
        ));
    }

    if config.min_cluster_size < 1 {
        return Err(ConfigError::Validation(
            "min-cluster-size must be >= 1".to_string(),
        ));
    }

    if config.object_min_pages < 2 {
        return Err(ConfigError::Validation(format!(
            "object-min-pages must be >= 2, got {}",
            config.object_min_pages
        )));
    }

    Ok(())
}

/// Validates an allowed-subdomains entry
///
/// Accepts a bare label (`blog`), a full host (`blog.example.com`), or a
/// wildcard (`*.blog.example.com`).
fn validate_subdomain_entry(entry: &str) -> Result<(), ConfigError> {
    let host = entry.strip_prefix("*.").unwrap_or(entry);

    if host.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Subdomain entry cannot be empty".to_string(),
        ));
    }

    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Subdomain '{}' contains invalid characters",
            entry
        )));
    }

    if host.starts_with('.')
        || host.ends_with('.')
        || host.starts_with('-')
        || host.ends_with('-')
        || host.contains("..")
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Subdomain '{}' is malformed",
            entry
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crawl_config() -> CrawlConfig {
        CrawlConfig::for_base_url("https://example.com/")
    }

    #[test]
    fn test_default_crawl_config_is_valid() {
        assert!(validate_crawl_config(&crawl_config()).is_ok());
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = crawl_config();
        config.base_url = "not a url".to_string();
        assert!(matches!(
            validate_crawl_config(&config),
            Err(ConfigError::InvalidUrl(_))
        ));

        config.base_url = "ftp://example.com/".to_string();
        assert!(matches!(
            validate_crawl_config(&config),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_numeric_ranges() {
        let mut config = crawl_config();
        config.max_pages = 0;
        assert!(validate_crawl_config(&config).is_err());

        let mut config = crawl_config();
        config.concurrency = 65;
        assert!(validate_crawl_config(&config).is_err());

        let mut config = crawl_config();
        config.timeout_ms = 10;
        assert!(validate_crawl_config(&config).is_err());

        let mut config = crawl_config();
        config.throttle = 0;
        assert!(validate_crawl_config(&config).is_ok());
    }

    #[test]
    fn test_bad_regex_rejected() {
        let mut config = crawl_config();
        config.exclude = vec!["(unclosed".to_string()];
        assert!(matches!(
            validate_crawl_config(&config),
            Err(ConfigError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_subdomain_entries() {
        assert!(validate_subdomain_entry("blog").is_ok());
        assert!(validate_subdomain_entry("blog.example.com").is_ok());
        assert!(validate_subdomain_entry("*.example.com").is_ok());

        assert!(validate_subdomain_entry("").is_err());
        assert!(validate_subdomain_entry("*.").is_err());
        assert!(validate_subdomain_entry("bad host").is_err());
        assert!(validate_subdomain_entry(".blog").is_err());
        assert!(validate_subdomain_entry("a..b").is_err());
    }

    #[test]
    fn test_analysis_ranges() {
        assert!(validate_analysis_config(&AnalysisConfig::default()).is_ok());

        let config = AnalysisConfig {
            cluster_threshold: 1.5,
            ..AnalysisConfig::default()
        };
        assert!(validate_analysis_config(&config).is_err());

        let config = AnalysisConfig {
            max_clusters: 0,
            ..AnalysisConfig::default()
        };
        assert!(validate_analysis_config(&config).is_err());

        let config = AnalysisConfig {
            object_min_pages: 1,
            ..AnalysisConfig::default()
        };
        assert!(validate_analysis_config(&config).is_err());
    }
}
