use thiserror::Error;

/// Errors raised while loading or reloading Chronos configuration.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("missing required config key `{0}`")]
    MissingKey(&'static str),

    #[error("invalid value for `{key}`: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("cluster.localhost is not present in cluster.node")]
    LocalNodeNotInCluster,
}
