//! Logging setup shared by all three CLI front-ends.

pub fn setup_logger(verbose: bool) -> Result<(), fern::InitError> {
    let third_party_level = if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Off
    };

    fern::Dispatch::new()
        .level(third_party_level)
        .level_for("fragment_engine", log::LevelFilter::Debug)
        .level_for("fragment_fetch", log::LevelFilter::Debug)
        .level_for("url_crawler", log::LevelFilter::Debug)
        .level_for("http_fetch", log::LevelFilter::Debug)
        .level_for("png_codec", log::LevelFilter::Debug)
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}] {}: {}",
                record.level(),
                {
                    let target = record.target();
                    target.find(':').map_or(target, |pos| &target[..pos])
                },
                message
            ))
        })
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}
