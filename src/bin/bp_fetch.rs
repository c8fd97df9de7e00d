//! `bp-fetch <B> <P> <C> <X> <N>`: the bounded-buffer producer/consumer
//! variant of strip-fetch. Positional: buffer capacity, producer count,
//! consumer count, consumer delay in milliseconds, target image id.

extern crate clap;
extern crate fragment_engine;
extern crate fragment_fetch;
extern crate png_codec;

use std::fs;
use std::process::exit;
use std::time::Duration;

use clap::{App, Arg};
use fragment_engine::{config, logging};
use fragment_fetch::run_bp_engine;

fn main() {
    let matches = App::new("bp-fetch")
        .about("Bounded-buffer producer/consumer variant of strip-fetch")
        .arg(Arg::with_name("B").required(true).help("buffer capacity"))
        .arg(Arg::with_name("P").required(true).help("producer count"))
        .arg(Arg::with_name("C").required(true).help("consumer count"))
        .arg(Arg::with_name("X").required(true).help("consumer delay, ms"))
        .arg(Arg::with_name("N").required(true).help("target image id"))
        .arg(Arg::with_name("verbose").short("v").multiple(true))
        .get_matches();

    logging::setup_logger(matches.occurrences_of("verbose") > 0).expect("failed to start logger");

    let parse_arg = |name: &str| -> usize {
        matches.value_of(name).unwrap().parse().unwrap_or_else(|_| {
            eprintln!("argument {} must be a non-negative integer", name);
            exit(1);
        })
    };

    let buffer_capacity = parse_arg("B");
    let producers = parse_arg("P");
    let consumers = parse_arg("C");
    let consumer_delay = Duration::from_millis(parse_arg("X") as u64);
    let image_id = parse_arg("N") as u32;

    let app_config = config::load().unwrap_or_else(|why| {
        eprintln!("failed to read fragment.toml: {}", why);
        exit(1);
    });

    match run_bp_engine(
        buffer_capacity,
        producers,
        consumers,
        consumer_delay,
        image_id,
        &app_config.fetch,
    ) {
        Ok(strips) => match png_codec::assemble_image(&strips) {
            Ok(png) => {
                if let Err(why) = fs::write("all.png", png) {
                    eprintln!("failed to write all.png: {}", why);
                    exit(1);
                }
                log::info!("wrote all.png from {} strips", strips.len());
            }
            Err(why) => {
                eprintln!("failed to assemble all.png: {}", why);
                exit(1);
            }
        },
        Err(why) => {
            eprintln!("bp engine failed: {}", why);
            exit(1);
        }
    }
}
