use thiserror::Error;

/// Errors raised while decoding or validating a timer record.
#[derive(Debug, Error)]
pub enum TypesError {
    #[error("malformed timer JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("timer is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("replica hash in URL does not match computed replica hash")]
    ReplicaHashMismatch,

    #[error("timer id in URL is not valid 16-digit hex")]
    BadTimerId,
}
