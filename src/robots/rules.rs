use crate::robots::RobotsChecker;
use robotstxt::DefaultMatcher;
use std::path::Path;
use url::Url;

/// Robots rules evaluated with the `robotstxt` matcher for one user agent
#[derive(Debug, Clone)]
pub struct RobotsTxtRules {
    content: String,
    user_agent: String,
}

impl RobotsTxtRules {
    /// Creates rules from raw robots.txt content
    ///
    /// `user_agent` is the full agent string; the matcher only uses its product
    /// token (`SEO-SaaS-Bot` for `SEO-SaaS-Bot/1.0`).
    pub fn from_content(content: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            user_agent: user_agent.into(),
        }
    }

    /// Reads robots.txt content from a local file
    pub fn from_file(path: &Path, user_agent: impl Into<String>) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_content(content, user_agent))
    }

    fn product_token(&self) -> &str {
        self.user_agent
            .split(|c: char| c == '/' || c.is_whitespace())
            .next()
            .unwrap_or(&self.user_agent)
    }
}

impl RobotsChecker for RobotsTxtRules {
    fn is_allowed(&self, url: &Url) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, self.product_token(), url.as_str())
    }
}
