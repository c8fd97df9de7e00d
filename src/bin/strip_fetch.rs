//! `strip-fetch -t <worker_count> -n <image_id>`: fetches all strips of one
//! image via the claim-counter Strip Engine and writes `all.png`.

extern crate clap;
extern crate fragment_engine;
extern crate fragment_fetch;
extern crate png_codec;

use std::fs;
use std::process::exit;

use clap::{App, Arg};
use fragment_engine::{config, logging};
use fragment_fetch::run_strip_engine;

fn main() {
    let matches = App::new("strip-fetch")
        .about("Fetches the vertical strips of one target image and assembles all.png")
        .arg(
            Arg::with_name("workers")
                .short("t")
                .takes_value(true)
                .required(true)
                .help("number of worker threads (>0)"),
        )
        .arg(
            Arg::with_name("image_id")
                .short("n")
                .takes_value(true)
                .required(true)
                .help("target image id (1..3)"),
        )
        .arg(Arg::with_name("verbose").short("v").multiple(true))
        .get_matches();

    logging::setup_logger(matches.occurrences_of("verbose") > 0).expect("failed to start logger");

    let workers: usize = match matches.value_of("workers").unwrap().parse() {
        Ok(n) if n > 0 => n,
        _ => {
            eprintln!("worker count must be a positive integer");
            exit(1);
        }
    };
    let image_id: u32 = match matches.value_of("image_id").unwrap().parse() {
        Ok(n) => n,
        Err(_) => {
            eprintln!("image id must be a non-negative integer");
            exit(1);
        }
    };

    let app_config = config::load().unwrap_or_else(|why| {
        eprintln!("failed to read fragment.toml: {}", why);
        exit(1);
    });

    match run_strip_engine(workers, image_id, &app_config.fetch) {
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
            eprintln!("strip engine failed: {}", why);
            exit(1);
        }
    }
}
