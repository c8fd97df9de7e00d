use png_codec::PngError;

#[derive(Debug, Fail)]
pub enum EngineError {
    #[fail(display = "failed to decode strip {}: {}", index, why)]
    Decode { index: usize, why: PngError },
    #[fail(display = "strip {} failed after exhausting its retry budget", index)]
    RetriesExhausted { index: usize },
}
