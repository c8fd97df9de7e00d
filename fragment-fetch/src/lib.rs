//! Claim-counter work distribution for numbered PNG strip fragments.
//!
//! Two engines share the claim/mirror/config machinery in this crate:
//! the Strip Engine (`engine`), which races `T` workers directly against
//! the claim counter, and the BP Engine (`bp`), which fixes the producer
//! count and pipes claimed work through a bounded channel to a separate
//! consumer pool.

#[macro_use]
extern crate failure_derive;
extern crate crossbeam_channel;
extern crate failure;
extern crate http_fetch;
extern crate log;
extern crate png_codec;
extern crate reqwest;

pub mod bp;
pub mod claim;
pub mod config;
pub mod engine;
pub mod error;
pub mod mirrors;

pub use claim::ClaimCounter;
pub use config::FetchConfig;
pub use engine::run_strip_engine;
pub use error::EngineError;
pub use mirrors::UrlTemplate;

pub use bp::run_bp_engine;
