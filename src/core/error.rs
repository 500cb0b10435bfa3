use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("marker store I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("marker store JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no marker with id {0}")]
    MarkerNotFound(String),
    #[error("word index {index} is out of range for a marker with {word_count} words")]
    WordIndexOutOfRange { index: usize, word_count: usize },
    #[error("invalid segment [{start:.2}, {end:.2}]")]
    InvalidSegment { start: f64, end: f64 },
    #[error("playback rate {0} is not one of the configured speeds")]
    UnsupportedRate(f64),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type EngineResult<T> = Result<T, EngineError>;
