/// Errors reported by a [`CaptureDevice`](crate::CaptureDevice).
///
/// The acquisition loop never propagates these: open and read failures are
/// logged and retried, [`EndOfStream`](Self::EndOfStream) ends acquisition.
#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("failed to open capture device: {0}")]
    Open(String),
    #[error("failed to read frame: {0}")]
    Read(String),
    #[error("failed to apply {setting}: {reason}")]
    Configure {
        setting: &'static str,
        reason: String,
    },
    #[error("end of stream")]
    EndOfStream,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from starting or stopping a background worker.
#[derive(thiserror::Error, Debug)]
pub enum WorkerError {
    #[error("failed to spawn {name} thread")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} thread panicked")]
    Panicked(&'static str),
    #[error("{0} worker state was lost by an earlier failure")]
    Lost(&'static str),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
