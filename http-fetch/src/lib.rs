//! Single-GET HTTP fetcher.
//!
//! One fetch, no retries, no redirects beyond what the client is configured
//! to follow. Retry policy lives one layer up, in the engines that know
//! which unit of work a failed fetch corresponds to.

#[macro_use]
extern crate failure_derive;
extern crate failure;
extern crate log;
extern crate reqwest;

use std::io::Read;
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, RedirectPolicy, StatusCode};

/// Buffer growth policy from the original fragment-fetching tools: start at
/// 1 MiB, grow by whichever is larger of 0.5 MiB or the incoming chunk size.
const BUF_SIZE: usize = 1024 * 1024;
const BUF_INC: usize = 512 * 1024;

const FRAGMENT_HEADER: &str = "X-Ece252-Fragment";

/// Result of one successful HTTP GET.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
    pub effective_url: String,
    pub fragment_seq: Option<u32>,
}

impl FetchResult {
    /// Content-Type substring match, per spec: caller classifies by
    /// substring, not exact match (servers append charsets etc).
    pub fn is_png(&self) -> bool {
        self.content_type.contains("image/png")
    }

    pub fn is_html(&self) -> bool {
        self.content_type.contains("text/html")
    }
}

#[derive(Debug, Fail)]
pub enum FetchError {
    #[fail(display = "transport error fetching '{}': {}", url, why)]
    Transport { url: String, why: reqwest::Error },
    #[fail(display = "'{}' returned status {}", url, status)]
    Status { url: String, status: u16 },
    #[fail(display = "failed to read body of '{}': {}", url, why)]
    BodyRead { url: String, why: std::io::Error },
}

impl FetchError {
    /// Non-2xx and transport failures are both treated as transient by
    /// callers in the fetch stages, per the corrected error-handling design:
    /// no response we get from a mirror should be trusted enough to
    /// permanently abandon the claimed work.
    pub fn is_transient(&self) -> bool {
        true
    }
}

/// Builds the shared client once per engine invocation. Redirects are
/// followed up to 5 hops, cookies are retained across the (rare) redirect
/// chain, and a fixed user agent is set because some mirrors reject
/// requests lacking one.
pub fn build_client(user_agent: &str, timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .cookie_store(true)
        .redirect(RedirectPolicy::limited(5))
        .timeout(timeout)
        .user_agent(user_agent.to_owned())
        .build()
}

/// Issues one GET and collects the full body into memory.
pub fn fetch(client: &Client, url: &str) -> Result<FetchResult, FetchError> {
    let mut response = client.get(url).send().map_err(|why| FetchError::Transport {
        url: url.to_owned(),
        why,
    })?;

    let status = response.status();
    if !status.is_success() && status != StatusCode::NOT_MODIFIED {
        return Err(FetchError::Status {
            url: url.to_owned(),
            status: status.as_u16(),
        });
    }

    let effective_url = response.url().as_str().to_owned();
    let content_type = content_type_of(response.headers());
    let fragment_seq = fragment_seq_of(response.headers());
    let body = read_growable(&mut response).map_err(|why| FetchError::BodyRead {
        url: url.to_owned(),
        why,
    })?;

    log::debug!(
        "fetched {} ({} bytes, status {}, fragment={:?})",
        effective_url,
        body.len(),
        status.as_u16(),
        fragment_seq
    );

    Ok(FetchResult {
        status: status.as_u16(),
        content_type,
        body,
        effective_url,
        fragment_seq,
    })
}

fn content_type_of(headers: &HeaderMap) -> String {
    headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_owned()
}

fn fragment_seq_of(headers: &HeaderMap) -> Option<u32> {
    headers
        .get(FRAGMENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Reads the whole response body, growing the buffer in the same pattern
/// as the original write callback: start at `BUF_SIZE`, and whenever a read
/// would overflow capacity, grow by `max(BUF_INC, chunk_len + 1)`.
fn read_growable<R: Read>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(BUF_SIZE);
    let mut chunk = [0u8; 64 * 1024];

    loop {
        let read = reader.read(&mut chunk)?;
        if read == 0 {
            break;
        }

        if buf.len() + read > buf.capacity() {
            let increment = BUF_INC.max(read + 1);
            buf.reserve(increment);
        }

        buf.extend_from_slice(&chunk[..read]);
    }

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_content_type_by_substring() {
        let result = FetchResult {
            status: 200,
            content_type: "image/png; charset=binary".into(),
            body: vec![],
            effective_url: "http://example.com/a.png".into(),
            fragment_seq: Some(3),
        };
        assert!(result.is_png());
        assert!(!result.is_html());
    }

    #[test]
    fn fetch_reads_body_and_fragment_header() {
        let _m = mockito::mock("GET", "/image")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_header("X-Ece252-Fragment", "7")
            .with_body(vec![0x89, b'P', b'N', b'G'])
            .create();

        let client = build_client("test-agent/1.0", Duration::from_secs(5)).unwrap();
        let result = fetch(&client, &format!("{}/image", mockito::server_url())).unwrap();

        assert_eq!(result.status, 200);
        assert!(result.is_png());
        assert_eq!(result.fragment_seq, Some(7));
        assert_eq!(result.body, vec![0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn non_2xx_status_is_an_error() {
        let _m = mockito::mock("GET", "/missing").with_status(404).create();

        let client = build_client("test-agent/1.0", Duration::from_secs(5)).unwrap();
        let err = fetch(&client, &format!("{}/missing", mockito::server_url())).unwrap_err();
        match err {
            FetchError::Status { status, .. } => assert_eq!(status, 404),
            other => panic!("expected Status error, got {:?}", other),
        }
    }
}
