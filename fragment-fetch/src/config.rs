use std::time::Duration;

use crate::mirrors::UrlTemplate;

/// Tuning shared by the strip and BP engines, matching SPEC_FULL.md's
/// `[strip]` / `[http]` configuration sections.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub url_template: UrlTemplate,
    pub mirror_count: usize,
    pub strip_count: usize,
    pub retries: u32,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            url_template: UrlTemplate::production("ece252", 2520),
            mirror_count: 3,
            strip_count: 50,
            retries: 2,
            user_agent: "fragment-engine/0.1".to_owned(),
            timeout: Duration::from_secs(10),
        }
    }
}
