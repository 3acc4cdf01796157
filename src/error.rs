use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings in {path}: {source}")]
    Settings {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown selector '{0}'")]
    UnknownSelector(String),

    #[error("no annotatable image '{0}'")]
    UnknownImage(String),

    #[error("annotation on '{0}' has no shape")]
    NoShape(String),

    #[error("image '{src}' has no size ({width}x{height})")]
    EmptyImage { src: String, width: f32, height: f32 },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
