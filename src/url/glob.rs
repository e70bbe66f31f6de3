//! Path glob matching for `exclude-paths`

use crate::ConfigError;
use regex::Regex;

/// A compiled path glob
///
/// * `*` matches within one path segment
/// * `**` matches across segments
/// * `?` matches one non-separator character
///
/// Matching is case-insensitive and anchored to the whole path, with an
/// optional trailing sub-path: `/admin` matches `/admin` and `/admin/users`.
/// A trailing `/*` or `/**` also matches the bare prefix (`/admin/*`
/// matches `/admin`).
#[derive(Debug, Clone)]
pub struct PathGlob {
    pattern: String,
    regex: Regex,
}

impl PathGlob {
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(&glob_to_regex(pattern)).map_err(|e| {
            ConfigError::InvalidPattern(format!("Invalid path glob '{}': {}", pattern, e))
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

fn glob_to_regex(pattern: &str) -> String {
    let mut glob = pattern.trim().to_string();
    if !glob.starts_with('/') {
        glob.insert(0, '/');
    }

    let (body, tail) = if let Some(body) = glob.strip_suffix("/**") {
        (body.to_string(), "(?:/.*)?")
    } else if let Some(body) = glob.strip_suffix("/*") {
        (body.to_string(), "(?:/[^/]*)?")
    } else {
        (glob.trim_end_matches('/').to_string(), "")
    };

    let mut regex = String::from("(?i)^");
    let chars: Vec<char> = body.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            // `/**/` spans zero or more whole segments
            '/' if chars[i + 1..].starts_with(&['*', '*', '/']) => {
                regex.push_str("(?:/.*)?");
                i += 3;
                continue;
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                regex.push_str(".*");
                i += 1;
            }
            '*' => regex.push_str("[^/]*"),
            '?' => regex.push_str("[^/]"),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
        i += 1;
    }
    regex.push_str(tail);
    regex.push_str("(?:/.*)?$");
    regex
}
