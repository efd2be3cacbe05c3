//! Site identity passed to every tool: owner, repo and ref of the project,
//! plus the sidekick status payload when the host provides one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ref assumed when a GitHub URL does not name a branch.
pub const DEFAULT_REF: &str = "main";

/// Shown when a GitHub URL cannot be parsed.
pub const GITHUB_URL_USAGE: &str = "Invalid GitHub URL. Use https://github.com/{owner}/{repo} \
     or https://github.com/{owner}/{repo}/tree/{ref}, \
     e.g. https://github.com/adobe/helix-website/tree/main";

lazy_static::lazy_static! {
    static ref GITHUB_URL_FULL: regex::Regex =
        regex::Regex::new(r"^.*github\.com/([a-zA-Z0-9_-]+)/([a-zA-Z0-9_-]+)/tree/([a-zA-Z0-9_-]+)$")
            .unwrap();
    static ref GITHUB_URL_PARTIAL: regex::Regex =
        regex::Regex::new(r"^.*github\.com/([a-zA-Z0-9_-]+)/([a-zA-Z0-9_-]+)$").unwrap();
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteContext {
    pub owner: String,
    pub repo: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Latest `statusfetched` payload from the sidekick, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<serde_json::Value>,
}

impl SiteContext {
    pub fn new(owner: &str, repo: &str, git_ref: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            git_ref: git_ref.to_string(),
            status: None,
        }
    }

    /// True when owner, repo and ref are all non-empty.
    pub fn is_complete(&self) -> bool {
        !self.owner.is_empty() && !self.repo.is_empty() && !self.git_ref.is_empty()
    }

    /// `{ref}--{repo}--{owner}`, the host label used by preview and live domains.
    pub fn host_label(&self) -> String {
        format!("{}--{}--{}", self.git_ref, self.repo, self.owner)
    }

    pub fn preview_origin(&self) -> String {
        format!("https://{}.hlx.page", self.host_label())
    }

    pub fn live_origin(&self) -> String {
        format!("https://{}.hlx.live", self.host_label())
    }
}

impl fmt::Display for SiteContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.git_ref)
    }
}

/// Parse a GitHub repository URL into a site context.
///
/// Accepts `…github.com/{owner}/{repo}/tree/{ref}` and
/// `…github.com/{owner}/{repo}` (ref defaults to `main`).
pub fn parse_github_url(url: &str) -> Result<SiteContext, String> {
    let url = url.trim();
    if let Some(caps) = GITHUB_URL_FULL.captures(url) {
        return Ok(SiteContext::new(&caps[1], &caps[2], &caps[3]));
    }
    if let Some(caps) = GITHUB_URL_PARTIAL.captures(url) {
        return Ok(SiteContext::new(&caps[1], &caps[2], DEFAULT_REF));
    }
    Err(GITHUB_URL_USAGE.to_string())
}
