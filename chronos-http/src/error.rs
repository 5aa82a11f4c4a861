use thiserror::Error;

/// Errors raised while servicing one HTTP request (spec.md §4.9: "400 bad
/// request ... 404 unknown path; 405 wrong method on a known path").
#[derive(Debug, Error)]
pub enum HttpError {
    #[error(transparent)]
    Handler(#[from] chronos_handler::HandlerError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,
}
