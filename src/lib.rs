//! Shared configuration and logging setup for the three fragment-engine
//! CLI front-ends (`strip-fetch`, `bp-fetch`, `png-crawl`).

#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate serde_derive;
extern crate failure;
extern crate fern;
extern crate log;
extern crate serde;
extern crate toml;

extern crate fragment_fetch;
extern crate http_fetch;
extern crate png_codec;
extern crate url_crawler;

pub mod config;
pub mod logging;
