use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Stored alongside crawl bookkeeping so a resumed crawl can tell whether
/// its policy changed since the pages were stored.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RenderMode, ScreenshotMode};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[crawl]
base-url = "https://example.com/"
max-pages = 50
max-depth = 3
exclude-paths = ["/admin/*"]
follow-subdomains = true
allowed-subdomains = ["blog"]
render-mode = "headless"
screenshots = "full-page"
throttle = 100
concurrency = 8
respect-robots = false

[user-agent]
crawler-name = "TestCrawler"
crawler-version = "1.0"
contact-url = "https://example.com/about"

[store]
database-path = "./test.db"

[analysis]
cluster-threshold = 0.8
max-clusters = 5
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawl.max_pages, 50);
        assert_eq!(config.crawl.max_depth, 3);
        assert_eq!(config.crawl.exclude_paths, vec!["/admin/*".to_string()]);
        assert!(config.crawl.follow_subdomains);
        assert_eq!(config.crawl.render_mode, RenderMode::Headless);
        assert_eq!(config.crawl.screenshots, ScreenshotMode::FullPage);
        assert!(!config.crawl.respect_robots);
        assert_eq!(config.user_agent.crawler_name, "TestCrawler");
        assert_eq!(config.analysis.max_clusters, 5);
        // unset analysis keys keep their defaults
        assert_eq!(config.analysis.min_cluster_size, 2);
    }

    #[test]
    fn test_defaults_for_optional_fields() {
        let config = parse_config(
            r#"
[crawl]
base-url = "https://example.com/"

[store]
database-path = "./test.db"
"#,
        )
        .unwrap();

        assert!(!config.crawl.follow_subdomains);
        assert!(config.crawl.allowed_subdomains.is_empty());
        assert!(config.crawl.respect_robots);
        assert_eq!(config.crawl.render_mode, RenderMode::Static);
        assert_eq!(config.crawl.screenshots, ScreenshotMode::Off);
        assert_eq!(config.crawl.concurrency, 4);
        assert_eq!(config.crawl.throttle, 250);
        assert_eq!(config.user_agent.crawler_name, "SiteStrata");
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/strata.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_render_mode_rejected() {
        let result = parse_config(
            r#"
[crawl]
base-url = "https://example.com/"
render-mode = "telepathic"

[store]
database-path = "./test.db"
"#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[crawl]
base-url = "https://example.com/"
concurrency = 0

[store]
database-path = "./test.db"
"#;

        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
