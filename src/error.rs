/// Error returned when a logger cannot be configured.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unrecognized level: {0:?}")]
    InvalidLevel(String),

    #[error("service name is mandatory")]
    EmptyServiceName,

    #[error("unknown output {0:?}, expected \"stdout\" or \"stderr\"")]
    InvalidOutput(String),

    #[error("unknown encoding {0:?}, expected \"stackdriver\" or \"json\"")]
    InvalidEncoding(String),
}

/// Error returned when a record cannot be serialized.
#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    #[error("failed to serialize entry: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to serialize field {key:?}: {source}")]
    Object {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Error returned by a [`LogSink`](crate::sink::LogSink).
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("delivery task is gone")]
    Closed,
}

/// Error returned by [`init_tracing_with_config`](crate::init::init_tracing_with_config).
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to install global subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}
