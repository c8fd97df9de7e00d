//! Optional `fragment.toml` tuning, read once at startup. CLI flags always
//! override whatever this file supplies; its absence is not an error.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use fragment_fetch::{FetchConfig, UrlTemplate};

const CONFIG_FILE: &str = "fragment.toml";

#[derive(Debug, Fail)]
pub enum ParsingError {
    #[fail(display = "error reading '{}': {}", file, why)]
    File { file: &'static str, why: io::Error },
    #[fail(display = "failed to parse TOML syntax in {}: {}", file, why)]
    Toml { file: &'static str, why: toml::de::Error },
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    http: Option<RawHttp>,
    strip: Option<RawStrip>,
    crawl: Option<RawCrawl>,
}

#[derive(Debug, Deserialize)]
struct RawHttp {
    timeout_secs: Option<u64>,
    user_agent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStrip {
    mirror_count: Option<usize>,
    strip_count: Option<usize>,
    retries: Option<u32>,
    host_prefix: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct RawCrawl {
    visited_capacity: Option<usize>,
}

/// Tuning read from `fragment.toml`, with spec-default values for anything
/// the file omits or that is itself absent.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub fetch: FetchConfig,
    pub visited_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            fetch: FetchConfig::default(),
            visited_capacity: 100_000,
        }
    }
}

/// Loads `fragment.toml` from the current directory if present, otherwise
/// returns the defaults that match the numbers named in the specification.
pub fn load() -> Result<AppConfig, ParsingError> {
    if !Path::new(CONFIG_FILE).exists() {
        return Ok(AppConfig::default());
    }

    let text = fs::read_to_string(CONFIG_FILE).map_err(|why| ParsingError::File {
        file: CONFIG_FILE,
        why,
    })?;
    let raw: RawConfig = toml::from_str(&text).map_err(|why| ParsingError::Toml {
        file: CONFIG_FILE,
        why,
    })?;

    let mut config = AppConfig::default();

    if let Some(http) = raw.http {
        if let Some(secs) = http.timeout_secs {
            config.fetch.timeout = Duration::from_secs(secs);
        }
        if let Some(agent) = http.user_agent {
            config.fetch.user_agent = agent;
        }
    }

    if let Some(strip) = raw.strip {
        if let Some(host) = strip.host_prefix {
            let port = strip.port.unwrap_or(2520);
            config.fetch.url_template = UrlTemplate::production(host, port);
        } else if let Some(port) = strip.port {
            config.fetch.url_template = UrlTemplate::production("ece252", port);
        }
        if let Some(n) = strip.mirror_count {
            config.fetch.mirror_count = n;
        }
        if let Some(n) = strip.strip_count {
            config.fetch.strip_count = n;
        }
        if let Some(n) = strip.retries {
            config.fetch.retries = n;
        }
    }

    if let Some(crawl) = raw.crawl {
        if let Some(capacity) = crawl.visited_capacity {
            config.visited_capacity = capacity;
        }
    }

    Ok(config)
}
