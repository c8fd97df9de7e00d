//! Configurable parallel web crawler, bounded by a target count of PNG
//! hits rather than by exhausting the whole link graph.
//!
//! # Example
//!
//! ```rust,no_run
//! extern crate url_crawler;
//! use url_crawler::*;
//!
//! pub fn main() {
//!     let crawler = Crawler::new("http://example.com/".to_owned())
//!         .threads(4)
//!         .target(10)
//!         .crawl();
//!
//!     for hit in crawler {
//!         println!("{}", hit.url);
//!     }
//! }
//! ```

#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate failure_derive;
extern crate crossbeam_channel;
extern crate failure;
extern crate http_fetch;
extern crate log;
extern crate png_codec;
extern crate reqwest;
extern crate select;

mod frontier;
mod links;
mod visited;

pub use reqwest::{header, Url};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel as channel;
use http_fetch::{build_client, fetch as http_get, FetchError};

use frontier::Frontier;
use visited::VisitedSet;

bitflags! {
    /// Flags for controlling the behavior of the crawler.
    pub struct Flags: u8 {
        /// Enable crawling across domains.
        const CROSS_DOMAIN = 1;
        /// Enable crawling outside of the specified directory.
        const CROSS_DIR = 2;
    }
}

pub type ErrorsCallback = Arc<dyn Fn(Error) -> bool + Send + Sync>;
pub type PreFetchCallback = Arc<dyn Fn(&Url) -> bool + Send + Sync>;

/// Defines whether to crawl from a single source, or from multiple sources.
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlerSource {
    Single(String),
    Multiple(Vec<String>),
}

impl From<String> for CrawlerSource {
    fn from(s: String) -> Self {
        CrawlerSource::Single(s)
    }
}

impl From<Vec<String>> for CrawlerSource {
    fn from(s: Vec<String>) -> Self {
        CrawlerSource::Multiple(s)
    }
}

/// A canonical URL whose GET returned PNG content and a valid signature.
#[derive(Debug, Clone)]
pub struct PngHit {
    pub url: Url,
}

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "error fetching a page: {}", why)]
    Request { why: FetchError },
    #[fail(display = "seed URL is not valid: {}", url)]
    InvalidSeed { url: String },
}

impl From<FetchError> for Error {
    fn from(why: FetchError) -> Error {
        Error::Request { why }
    }
}

/// A configurable parallel web crawler.
///
/// Crawling does not occur until this type is consumed by `crawl`.
pub struct Crawler {
    seeds: CrawlerSource,
    threads: usize,
    target: usize,
    flags: Flags,
    errors: ErrorsCallback,
    pre_fetch: PreFetchCallback,
    user_agent: String,
    timeout: Duration,
    output: Option<std::path::PathBuf>,
    visited_capacity: usize,
}

impl Crawler {
    pub fn new(source: impl Into<CrawlerSource>) -> Self {
        Crawler {
            seeds: source.into(),
            threads: 4,
            target: usize::max_value(),
            // Full link-graph exploration by default: a caller can narrow
            // this with `.flags(...)` to scope crawling to one domain/dir.
            flags: Flags::CROSS_DOMAIN | Flags::CROSS_DIR,
            errors: Arc::new(|_| true),
            pre_fetch: Arc::new(|_| true),
            user_agent: "url-crawler/0.4".to_owned(),
            timeout: Duration::from_secs(10),
            output: None,
            visited_capacity: 100_000,
        }
    }

    /// Pre-sizes the visited-set hash table; purely a tuning knob, not a
    /// correctness bound.
    pub fn visited_capacity(mut self, capacity: usize) -> Self {
        self.visited_capacity = capacity;
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = if threads == 0 { 1 } else { threads };
        self
    }

    /// Stop once this many PNG URLs have been collected.
    pub fn target(mut self, target: usize) -> Self {
        self.target = if target == 0 { 1 } else { target };
        self
    }

    pub fn flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    pub fn errors(mut self, errors: ErrorsCallback) -> Self {
        self.errors = errors;
        self
    }

    pub fn pre_fetch(mut self, pre_fetch: PreFetchCallback) -> Self {
        self.pre_fetch = pre_fetch;
        self
    }

    pub fn output(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Starts crawling in background threads and returns an iterator of
    /// collected `PngHit`s. Dropping the iterator stops the crawl.
    pub fn crawl(self) -> CrawlHandle {
        let client = build_client(&self.user_agent, self.timeout).expect("failed to build HTTP client");
        let frontier = Arc::new(Frontier::new(self.threads));
        let visited = Arc::new(VisitedSet::with_capacity(self.visited_capacity));
        let png_count = Arc::new(AtomicUsize::new(0));
        let (output_tx, output_rx) = channel::unbounded::<PngHit>();
        let collected: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let seeds: Vec<String> = match self.seeds {
            CrawlerSource::Single(url) => vec![url],
            CrawlerSource::Multiple(urls) => urls,
        };

        for seed in seeds {
            match Url::parse(&seed) {
                Ok(url) => {
                    if visited.insert_if_absent(url.as_str()) {
                        frontier.push(url);
                    }
                }
                Err(_) => {
                    (self.errors)(Error::InvalidSeed { url: seed });
                }
            }
        }

        let target = self.target;
        let mut handles = Vec::with_capacity(self.threads);
        for _ in 0..self.threads {
            let client = client.clone();
            let frontier = frontier.clone();
            let visited = visited.clone();
            let png_count = png_count.clone();
            let output_tx = output_tx.clone();
            let collected = collected.clone();
            let errors = self.errors.clone();
            let pre_fetch = self.pre_fetch.clone();
            let flags = self.flags;

            handles.push(thread::spawn(move || {
                worker_loop(
                    &client, &frontier, &visited, &png_count, target, &output_tx, &collected,
                    &errors, &pre_fetch, flags,
                );
            }));
        }

        // The channel is only kept alive by the workers' clones; drop ours
        // so the iterator's receiver closes once every worker has exited.
        drop(output_tx);

        CrawlHandle {
            recv: output_rx,
            frontier,
            handles: Some(handles),
            collected,
            output: self.output,
        }
    }
}

fn worker_loop(
    client: &reqwest::Client,
    frontier: &Frontier,
    visited: &VisitedSet,
    png_count: &AtomicUsize,
    target: usize,
    output_tx: &channel::Sender<PngHit>,
    collected: &Mutex<Vec<String>>,
    errors: &ErrorsCallback,
    pre_fetch: &PreFetchCallback,
    flags: Flags,
) {
    loop {
        let url = match frontier.pop(|| png_count.load(Ordering::SeqCst) >= target) {
            Some(url) => url,
            None => break,
        };

        if !pre_fetch(&url) {
            continue;
        }

        let result = match http_get(client, url.as_str()) {
            Ok(result) => result,
            Err(why) => {
                log::warn!("transient error fetching {}: {}", url, why);
                if !errors(Error::from(why)) {
                    frontier.stop();
                    break;
                }
                continue;
            }
        };

        let effective = Url::parse(&result.effective_url).unwrap_or_else(|_| url.clone());

        if result.is_html() {
            if let Ok(body) = String::from_utf8(result.body) {
                for link in links::extract_links(&effective, &body) {
                    if !flags.contains(Flags::CROSS_DOMAIN) && link.domain() != effective.domain() {
                        continue;
                    }
                    if !flags.contains(Flags::CROSS_DIR) && !link.path().starts_with(effective.path()) {
                        continue;
                    }
                    if visited.insert_if_absent(link.as_str()) {
                        frontier.push(link);
                    }
                }
            }
        } else if result.is_png() && result.body.starts_with(&png_codec::SIGNATURE) {
            // `png_count` is only ever incremented after a successful push,
            // so `len(result) <= target` holds even under a race between
            // two workers crossing the threshold in the same instant.
            let mut collected = collected.lock().expect("collected mutex poisoned");
            if collected.len() < target {
                collected.push(effective.to_string());
                let _ = output_tx.send(PngHit { url: effective });
                let new_count = png_count.fetch_add(1, Ordering::SeqCst) + 1;
                if new_count >= target {
                    frontier.stop();
                }
            }
        }
    }
}

/// Iterator that returns collected `PngHit`s as they are found. On drop,
/// the crawler's threads are signalled to stop and joined.
pub struct CrawlHandle {
    recv: channel::Receiver<PngHit>,
    frontier: Arc<Frontier>,
    handles: Option<Vec<thread::JoinHandle<()>>>,
    collected: Arc<Mutex<Vec<String>>>,
    output: Option<std::path::PathBuf>,
}

impl CrawlHandle {
    /// Drains every hit, joins the workers, and writes the collected URLs
    /// (one per line) to the configured output path, if any.
    pub fn finish(mut self) -> std::io::Result<Vec<String>> {
        while self.next().is_some() {}
        self.join();

        let urls = self.collected.lock().expect("collected mutex poisoned").clone();
        if let Some(path) = self.output.take() {
            use std::io::Write;
            let mut file = std::fs::File::create(path)?;
            for url in &urls {
                writeln!(file, "{}", url)?;
            }
        }
        Ok(urls)
    }

    fn join(&mut self) {
        if let Some(handles) = self.handles.take() {
            for handle in handles {
                let _ = handle.join();
            }
        }
    }
}

impl Iterator for CrawlHandle {
    type Item = PngHit;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv.recv().ok()
    }
}

impl Drop for CrawlHandle {
    fn drop(&mut self) {
        self.frontier.stop();
        self.join();
    }
}

impl fmt::Debug for CrawlHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CrawlHandle").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crawl_source_conversions() {
        let single: CrawlerSource = "url".to_owned().into();
        assert_eq!(single, CrawlerSource::Single("url".to_owned()));

        let multiple: CrawlerSource = vec!["a".to_owned(), "b".to_owned()].into();
        assert_eq!(
            multiple,
            CrawlerSource::Multiple(vec!["a".to_owned(), "b".to_owned()])
        );
    }

    #[test]
    fn single_seed_with_no_links_and_no_png_terminates() {
        let _m = mockito::mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body>no links here</body></html>")
            .create();

        let urls = Crawler::new(format!("{}/", mockito::server_url()))
            .threads(2)
            .target(5)
            .crawl()
            .finish()
            .unwrap();

        assert!(urls.is_empty());
    }

    #[test]
    fn a_404_page_is_dropped_without_polluting_the_visited_set() {
        let _seed = mockito::mock("GET", "/seed-404.html")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(r#"<html><body><a href="/missing-404.html">gone</a></body></html>"#)
            .create();
        let _missing = mockito::mock("GET", "/missing-404.html").with_status(404).create();

        let urls = Crawler::new(format!("{}/seed-404.html", mockito::server_url()))
            .threads(1)
            .target(5)
            .crawl()
            .finish()
            .unwrap();

        // The 404 link is still visited once (it was discovered and
        // dequeued), it just never produces a PNG hit or a retry.
        assert!(urls.is_empty());
    }

    #[test]
    fn stops_once_the_png_target_is_reached_short_of_the_full_graph() {
        // A root page links to 20 PNGs and 5 further HTML pages; the
        // crawl is bounded to 10 PNG hits, well short of exhausting the
        // graph, so termination must come from the target, not
        // starvation.
        let mut links = String::new();
        for i in 0..20 {
            links.push_str(&format!(r#"<a href="/graph-img{}.png">i</a>"#, i));
        }
        for i in 0..5 {
            links.push_str(&format!(r#"<a href="/graph-page{}.html">p</a>"#, i));
        }
        let _root = mockito::mock("GET", "/graph-root.html")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(format!("<html><body>{}</body></html>", links))
            .create();
        let _pages: Vec<_> = (0..5)
            .map(|i| {
                mockito::mock("GET", format!("/graph-page{}.html", i).as_str())
                    .with_status(200)
                    .with_header("content-type", "text/html")
                    .with_body("<html><body>no further links</body></html>")
                    .create()
            })
            .collect();
        let png_body = png_codec::assemble::encode_png(2, 1, &vec![0u8; 2 * 4 + 1]).unwrap();
        let _images: Vec<_> = (0..20)
            .map(|i| {
                mockito::mock("GET", format!("/graph-img{}.png", i).as_str())
                    .with_status(200)
                    .with_header("content-type", "image/png")
                    .with_body(png_body.clone())
                    .create()
            })
            .collect();

        let urls = Crawler::new(format!("{}/graph-root.html", mockito::server_url()))
            .threads(4)
            .target(10)
            .crawl()
            .finish()
            .unwrap();

        assert_eq!(urls.len(), 10);
    }

    #[test]
    fn follows_links_outside_the_seed_directory_by_default() {
        // The seed lives under /scoped/ and the only PNG it links to lives
        // under an unrelated /elsewhere/ directory. Full-graph crawling
        // (the default `Flags`) must still find it.
        let _seed = mockito::mock("GET", "/scoped/seed.html")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(r#"<html><body><a href="/elsewhere/outside.png">p</a></body></html>"#)
            .create();
        let png_body = png_codec::assemble::encode_png(2, 1, &vec![0u8; 2 * 4 + 1]).unwrap();
        let _png = mockito::mock("GET", "/elsewhere/outside.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(png_body)
            .create();

        let urls = Crawler::new(format!("{}/scoped/seed.html", mockito::server_url()))
            .threads(1)
            .target(1)
            .crawl()
            .finish()
            .unwrap();

        assert_eq!(urls.len(), 1);
        assert!(urls[0].ends_with("/elsewhere/outside.png"));
    }
}
