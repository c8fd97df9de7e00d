//! `png-crawl -t <workers> -m <png_target> -v <output_file> <seed_url>`:
//! explores the link graph rooted at `seed_url`, collecting canonical PNG
//! URLs until `png_target` are found or the frontier is exhausted.

extern crate clap;
extern crate fragment_engine;
extern crate url_crawler;

use std::process::exit;

use clap::{App, Arg};
use fragment_engine::{config, logging};
use url_crawler::Crawler;

fn main() {
    let matches = App::new("png-crawl")
        .about("Crawls a link graph for PNG URLs, bounded by a target count")
        .arg(
            Arg::with_name("workers")
                .short("t")
                .takes_value(true)
                .required(true)
                .help("number of worker threads"),
        )
        .arg(
            Arg::with_name("target")
                .short("m")
                .takes_value(true)
                .required(true)
                .help("stop after this many PNG URLs are found"),
        )
        .arg(
            Arg::with_name("output")
                .short("v")
                .takes_value(true)
                .help("write one PNG URL per line to this file"),
        )
        .arg(Arg::with_name("seed").required(true).help("seed URL"))
        .get_matches();

    logging::setup_logger(false).expect("failed to start logger");

    let workers: usize = match matches.value_of("workers").unwrap().parse() {
        Ok(n) => n,
        Err(_) => {
            eprintln!("worker count must be a non-negative integer");
            exit(1);
        }
    };
    let target: usize = match matches.value_of("target").unwrap().parse() {
        Ok(n) => n,
        Err(_) => {
            eprintln!("png target must be a non-negative integer");
            exit(1);
        }
    };
    let seed = matches.value_of("seed").unwrap().to_owned();

    let app_config = config::load().unwrap_or_else(|why| {
        eprintln!("failed to read fragment.toml: {}", why);
        exit(1);
    });

    let mut crawler = Crawler::new(seed)
        .threads(workers)
        .target(target)
        .visited_capacity(app_config.visited_capacity);
    if let Some(output) = matches.value_of("output") {
        crawler = crawler.output(output);
    }

    match crawler.crawl().finish() {
        Ok(urls) => {
            log::info!("collected {} PNG URLs", urls.len());
            for url in urls {
                println!("{}", url);
            }
        }
        Err(why) => {
            eprintln!("failed to write crawl output: {}", why);
            exit(1);
        }
    }
}
