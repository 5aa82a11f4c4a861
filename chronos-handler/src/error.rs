use thiserror::Error;

/// Errors raised by the handler (spec.md §7).
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Store(#[from] chronos_store::StoreError),

    #[error("timer store lock was poisoned")]
    LockPoisoned,

    /// The monotonic clock is unavailable — spec.md §7 `SystemClockFailure`,
    /// fatal: the pop loop cannot run without it.
    #[error("system monotonic clock unavailable (CL_CHRONOS_NO_SYSTEM_TIME)")]
    ClockUnavailable,
}
