//! The BP Engine: a bounded-buffer producer/consumer pipeline.
//!
//! `producers` threads claim strip indices and fetch their raw PNG bytes,
//! pushing each onto a channel bounded at `buffer_capacity`; `consumers`
//! threads pop, decode, sleep `consumer_delay` (the deliberate pacing stub
//! that exercises back-pressure), and write into an index-addressed slot.
//! Capacity bounds the channel itself, so producers block on send exactly
//! as the original's `empty` semaphore blocked them.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel as channel;
use png_codec::{decode_strip, DecodedStrip, RawStrip};

use crate::claim::ClaimCounter;
use crate::config::FetchConfig;
use crate::error::EngineError;

#[allow(clippy::too_many_arguments)]
pub fn run_bp_engine(
    buffer_capacity: usize,
    producers: usize,
    consumers: usize,
    consumer_delay: Duration,
    image_id: u32,
    config: &FetchConfig,
) -> Result<Vec<DecodedStrip>, EngineError> {
    let client = http_fetch::build_client(&config.user_agent, config.timeout)
        .expect("failed to build HTTP client");

    let claim = Arc::new(ClaimCounter::new(config.strip_count));
    let attempts: Arc<Vec<AtomicUsize>> =
        Arc::new((0..config.strip_count).map(|_| AtomicUsize::new(0)).collect());
    let (retry_tx, retry_rx) = channel::unbounded::<usize>();
    let (strip_tx, strip_rx) = channel::bounded::<RawStrip>(buffer_capacity.max(1));
    let fatal: Arc<Mutex<Option<EngineError>>> = Arc::new(Mutex::new(None));
    let stop = Arc::new(AtomicBool::new(false));

    let mut producer_handles = Vec::with_capacity(producers);
    for producer_id in 0..producers.max(1) {
        let client = client.clone();
        let claim = claim.clone();
        let attempts = attempts.clone();
        let retry_tx = retry_tx.clone();
        let retry_rx = retry_rx.clone();
        let strip_tx = strip_tx.clone();
        let fatal = fatal.clone();
        let stop = stop.clone();
        let config = config.clone();

        producer_handles.push(thread::spawn(move || {
            log::debug!("bp producer {} starting", producer_id);
            producer_body(
                &client, &claim, &attempts, &retry_tx, &retry_rx, &strip_tx, &fatal, &stop,
                &config, image_id,
            );
            log::debug!("bp producer {} exiting", producer_id);
        }));
    }
    // Drop the engine's own senders so the channel closes once every
    // producer thread's clone has gone out of scope.
    drop(strip_tx);
    drop(retry_tx);

    let slots: Arc<Mutex<Vec<Option<DecodedStrip>>>> =
        Arc::new(Mutex::new((0..config.strip_count).map(|_| None).collect()));

    let mut consumer_handles = Vec::with_capacity(consumers);
    for consumer_id in 0..consumers.max(1) {
        let strip_rx = strip_rx.clone();
        let slots = slots.clone();
        let fatal = fatal.clone();
        let stop = stop.clone();
        consumer_handles.push(thread::spawn(move || {
            log::debug!("bp consumer {} starting", consumer_id);
            consumer_body(&strip_rx, &slots, consumer_delay, &fatal, &stop);
            log::debug!("bp consumer {} exiting", consumer_id);
        }));
    }
    drop(strip_rx);

    for handle in producer_handles {
        let _ = handle.join();
    }
    for handle in consumer_handles {
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
fn producer_body(
    client: &reqwest::Client,
    claim: &ClaimCounter,
    attempts: &[AtomicUsize],
    retry_tx: &channel::Sender<usize>,
    retry_rx: &channel::Receiver<usize>,
    strip_tx: &channel::Sender<RawStrip>,
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
                // Blocks (up to a poll interval) when the buffer is at
                // capacity, the back-pressure the bounded channel exists to
                // provide; re-checks `stop` between polls so a fatal error
                // downstream doesn't leave a producer stuck on a full
                // buffer forever.
                loop {
                    if stop.load(Ordering::SeqCst) {
                        return;
                    }
                    match strip_tx.send_timeout(raw.clone(), Duration::from_millis(50)) {
                        Ok(()) => break,
                        Err(channel::SendTimeoutError::Timeout(_)) => continue,
                        Err(channel::SendTimeoutError::Disconnected(_)) => return,
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

/// Keeps draining the channel even after a fatal error, so a producer
/// blocked on a full buffer's `send` is freed to observe `stop` and exit
/// instead of deadlocking against a consumer pool that quit early.
fn consumer_body(
    strip_rx: &channel::Receiver<RawStrip>,
    slots: &Mutex<Vec<Option<DecodedStrip>>>,
    consumer_delay: Duration,
    fatal: &Mutex<Option<EngineError>>,
    stop: &AtomicBool,
) {
    while let Ok(raw) = strip_rx.recv() {
        let index = raw.index;
        if stop.load(Ordering::SeqCst) {
            continue;
        }

        match decode_strip(&raw) {
            Ok(decoded) => {
                if !consumer_delay.is_zero() {
                    thread::sleep(consumer_delay);
                }
                let mut guard = slots.lock().expect("slots mutex poisoned");
                if index < guard.len() && guard[index].is_none() {
                    guard[index] = Some(decoded);
                }
            }
            Err(why) => {
                log::error!("fatal decode error on strip {} in bp consumer: {}", index, why);
                *fatal.lock().expect("fatal mutex poisoned") =
                    Some(EngineError::Decode { index, why });
                stop.store(true, Ordering::SeqCst);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_body(width: u32, height: u32, fill: u8) -> Vec<u8> {
        let row_len = width as usize * 4 + 1;
        let rows: Vec<u8> = (0..height as usize * row_len).map(|_| fill).collect();
        png_codec::assemble::encode_png(width, height, &rows).unwrap()
    }

    #[test]
    fn bounded_buffer_pipeline_assembles_all_strips() {
        let strip_count = 6;
        let width = 4;
        let height = 3;

        let mocks: Vec<_> = (0..strip_count)
            .map(|i| {
                mockito::mock("GET", mockito::Matcher::Regex(format!(".*part={}.*", i)))
                    .with_status(200)
                    .with_header("content-type", "image/png")
                    .with_header("X-Ece252-Fragment", &i.to_string())
                    .with_body(png_body(width, height, 5))
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

        let result = run_bp_engine(2, 3, 2, Duration::from_millis(1), 2, &config).unwrap();
        assert_eq!(result.len(), strip_count);
        for (i, strip) in result.iter().enumerate() {
            assert_eq!(strip.index, i);
        }

        for m in mocks {
            m.assert();
        }
    }
}
