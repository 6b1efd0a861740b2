//! Error types for failures the profiler can name.

use thiserror::Error;

/// Oldest server version the profiler can talk to.
pub const MIN_SERVER_VERSION: (u32, u32) = (2, 6);

#[derive(Error, Debug)]
pub enum ProfilerError {
    /// The store could not be reached or refused authentication.
    #[error("could not connect to store at {target}: {source}")]
    Connectivity {
        target: String,
        #[source]
        source: redis::RedisError,
    },

    /// The store reports a version below [`MIN_SERVER_VERSION`].
    #[error("server version {found} is not supported; {required} or higher is required")]
    IncompatibleVersion { found: String, required: String },

    /// `INFO` did not carry a readable `redis_version`.
    #[error("could not read server version from '{0}'")]
    MalformedVersion(String),

    /// A command failed after the connection was established.
    #[error("store command failed: {0}")]
    Store(#[from] redis::RedisError),
}

pub type Result<T> = std::result::Result<T, ProfilerError>;
