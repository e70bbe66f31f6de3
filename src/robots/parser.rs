//! Robots.txt rules for one host
//!
//! Allow/disallow matching is delegated to the robotstxt crate; the
//! `Crawl-delay` extension it does not expose is read from the raw groups.

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// Parsed robots.txt data
#[derive(Debug, Clone, Default)]
pub struct ParsedRobots {
    /// Raw robots.txt content; empty means allow all
    content: String,
}

/// One `User-agent` group and the crawl delay declared in it
#[derive(Debug, Default)]
struct AgentGroup {
    agents: Vec<String>,
    crawl_delay: Option<f64>,
}

impl ParsedRobots {
    /// Wraps raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    /// Rules that allow every URL, used when robots.txt is unavailable
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Checks if `url` may be fetched by `user_agent`
    ///
    /// `url` may be absolute or a bare path.
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Gets the crawl delay that applies to `user_agent`
    ///
    /// A group naming the agent wins over the `*` group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        let agent = user_agent.to_lowercase();
        let groups = self.groups();

        let specific = groups
            .iter()
            .filter(|g| g.agents.iter().any(|a| a != "*" && agent.contains(a.as_str())))
            .find_map(|g| g.crawl_delay);
        let wildcard = groups
            .iter()
            .filter(|g| g.agents.iter().any(|a| a == "*"))
            .find_map(|g| g.crawl_delay);

        specific
            .or(wildcard)
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64)
    }

    fn groups(&self) -> Vec<AgentGroup> {
        let mut groups: Vec<AgentGroup> = Vec::new();
        let mut collecting_agents = false;

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    // Consecutive User-agent lines share one group
                    if !collecting_agents {
                        groups.push(AgentGroup::default());
                    }
                    collecting_agents = true;
                    if let Some(group) = groups.last_mut() {
                        group.agents.push(value.to_lowercase());
                    }
                }
                "crawl-delay" => {
                    collecting_agents = false;
                    if let (Some(group), Ok(delay)) = (groups.last_mut(), value.parse::<f64>()) {
                        group.crawl_delay.get_or_insert(delay);
                    }
                }
                _ => collecting_agents = false,
            }
        }

        groups
    }
}
