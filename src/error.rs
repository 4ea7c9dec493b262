use std::path::PathBuf;
use thiserror::Error;

/// Unrecoverable engine failures.
///
/// Recoverable conditions (dimension mismatches, degenerate crop rects,
/// out-of-range parameters) are corrected locally by the stage that
/// detects them and never reach this type.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("could not decode '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("could not encode '{path}': {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("i/o error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no image loaded")]
    NoImage,

    #[error("could not parse recipe '{path}': {source}")]
    Recipe {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
