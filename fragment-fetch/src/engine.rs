//! The Strip Engine: `workers` threads claim strip indices from a shared
//! counter, fetch and decode each one, and write it into the slot its
//! response header names — not the slot the worker happened to claim,
//! since a retried fetch can complete after a differently-indexed one.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel as channel;
use png_codec::{decode_strip, DecodedStrip, RawStrip};

use crate::claim::ClaimCounter;
use crate::config::FetchConfig;
use crate::error::EngineError;

pub fn run_strip_engine(
    workers: usize,
    image_id: u32,
    config: &FetchConfig,
) -> Result<Vec<DecodedStrip>, EngineError> {
    let client = http_fetch::build_client(&config.user_agent, config.timeout)
        .expect("failed to build HTTP client");

    let claim = Arc::new(ClaimCounter::new(config.strip_count));
    let slots: Arc<Mutex<Vec<Option<DecodedStrip>>>> =
        Arc::new(Mutex::new((0..config.strip_count).map(|_| None).collect()));
    let attempts: Arc<Vec<AtomicUsize>> =
        Arc::new((0..config.strip_count).map(|_| AtomicUsize::new(0)).collect());
    let (retry_tx, retry_rx) = channel::unbounded::<usize>();
    let fatal: Arc<Mutex<Option<EngineError>>> = Arc::new(Mutex::new(None));
    let stop = Arc::new(AtomicBool::new(false));

    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers.max(1) {
        let client = client.clone();
        let claim = claim.clone();
        let slots = slots.clone();
        let attempts = attempts.clone();
        let retry_tx = retry_tx.clone();
        let retry_rx = retry_rx.clone();
        let fatal = fatal.clone();
        let stop = stop.clone();
        let config = config.clone();

        handles.push(thread::spawn(move || {
            log::debug!("strip worker {} starting", worker_id);
            worker_body(
                &client, &claim, &slots, &attempts, &retry_tx, &retry_rx, &fatal, &stop, &config,
                image_id,
            );
            log::debug!("strip worker {} exiting", worker_id);
        }));
    }

    for handle in handles {
        let _ = handle.join();
    }

    if let Some(why) = fatal.lock().expect("fatal mutex poisoned").take() {
        return Err(why);
    }

    let slots = Arc::try_unwrap(slots)
        .unwrap_or_else(|arc| Mutex::new(arc.lock().expect("slots mutex poisoned").clone()))
        .into_inner()
        .expect("slots mutex poisoned");

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| slot.ok_or(EngineError::RetriesExhausted { index }))
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn worker_body(
    client: &reqwest::Client,
    claim: &ClaimCounter,
    slots: &Mutex<Vec<Option<DecodedStrip>>>,
    attempts: &[AtomicUsize],
    retry_tx: &channel::Sender<usize>,
    retry_rx: &channel::Receiver<usize>,
    fatal: &Mutex<Option<EngineError>>,
    stop: &AtomicBool,
    config: &FetchConfig,
    image_id: u32,
) {
    loop {
        if stop.load(Ordering::SeqCst) {
            return;
        }

        let index = match claim.claim().or_else(|| retry_rx.try_recv().ok()) {
            Some(index) => index,
            None => return,
        };

        let url = config.url_template.strip_url(config.mirror_count, index, image_id);

        match http_fetch::fetch(client, &url) {
            Ok(result) => {
                let seq = result.fragment_seq.map(|s| s as usize).unwrap_or(index);
                let raw = RawStrip {
                    index: seq,
                    bytes: result.body,
                };
                match decode_strip(&raw) {
                    Ok(decoded) => {
                        let mut guard = slots.lock().expect("slots mutex poisoned");
                        if seq < guard.len() && guard[seq].is_none() {
                            guard[seq] = Some(decoded);
                        }
                    }
                    Err(why) => {
                        log::error!("fatal decode error on strip {}: {}", seq, why);
                        *fatal.lock().expect("fatal mutex poisoned") =
                            Some(EngineError::Decode { index: seq, why });
                        stop.store(true, Ordering::SeqCst);
                        return;
                    }
                }
            }
            Err(why) => {
                log::warn!("transient error fetching strip {}: {}", index, why);
                let prior = attempts[index].fetch_add(1, Ordering::SeqCst) + 1;
                if prior as u32 <= config.retries {
                    let _ = retry_tx.send(index);
                } else {
                    *fatal.lock().expect("fatal mutex poisoned") =
                        Some(EngineError::RetriesExhausted { index });
                    stop.store(true, Ordering::SeqCst);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_body(index: usize, width: u32, height: u32, fill: u8) -> Vec<u8> {
        let row_len = width as usize * 4 + 1;
        let rows: Vec<u8> = (0..height as usize * row_len).map(|_| fill.wrapping_add(index as u8)).collect();
        png_codec::assemble::encode_png(width, height, &rows).unwrap()
    }

    #[test]
    fn assembles_all_strips_in_order_from_a_stub_server() {
        let strip_count = 4;
        let width = 4;
        let height = 2;

        let mocks: Vec<_> = (0..strip_count)
            .map(|i| {
                mockito::mock("GET", mockito::Matcher::Regex(format!(".*part={}.*", i)))
                    .with_status(200)
                    .with_header("content-type", "image/png")
                    .with_header("X-Ece252-Fragment", &i.to_string())
                    .with_body(png_body(i, width, height, 10))
                    .create()
            })
            .collect();

        let config = FetchConfig {
            url_template: crate::mirrors::UrlTemplate::single_host(&mockito::server_url()),
            mirror_count: 1,
            strip_count,
            retries: 1,
            user_agent: "test-agent/1.0".to_owned(),
            timeout: Duration::from_secs(5),
        };

        let result = run_strip_engine(4, 1, &config).unwrap();
        assert_eq!(result.len(), strip_count);
        for (i, strip) in result.iter().enumerate() {
            assert_eq!(strip.index, i);
        }

        for m in mocks {
            m.assert();
        }
    }

    #[test]
    fn worker_count_does_not_affect_the_assembled_bytes() {
        let strip_count = 8;
        let width = 3;
        let height = 2;

        // Each mock answers every matching request, so both engine runs
        // below (worker count only changes scheduling, not which mocks
        // exist) can hit it more than once.
        let _mocks: Vec<_> = (0..strip_count)
            .map(|i| {
                mockito::mock("GET", mockito::Matcher::Regex(format!(".*part={}.*", i)))
                    .with_status(200)
                    .with_header("content-type", "image/png")
                    .with_header("X-Ece252-Fragment", &i.to_string())
                    .with_body(png_body(i, width, height, 20))
                    .create()
            })
            .collect();

        let config = FetchConfig {
            url_template: crate::mirrors::UrlTemplate::single_host(&mockito::server_url()),
            mirror_count: 1,
            strip_count,
            retries: 1,
            user_agent: "test-agent/1.0".to_owned(),
            timeout: Duration::from_secs(5),
        };

        let one_worker = run_strip_engine(1, 1, &config).unwrap();
        let many_workers = run_strip_engine(8, 1, &config).unwrap();

        let one_worker_png = png_codec::assemble_image(&one_worker).unwrap();
        let many_workers_png = png_codec::assemble_image(&many_workers).unwrap();
        assert_eq!(one_worker_png, many_workers_png);
    }
}
