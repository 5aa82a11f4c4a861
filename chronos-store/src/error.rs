use thiserror::Error;

/// Store-level errors (spec.md §7 `InternalInvariant`).
#[derive(Debug, Error)]
pub enum StoreError {
    /// An insert was attempted for an id already present in `id_index`.
    /// Spec.md §4.4: "All insertions go through the merge path... bypassing
    /// it is a logic error." Treated as fatal in debug builds via
    /// `debug_assert!`, logged-and-skipped in release (spec.md §7).
    #[error("timer {0} is already present in the store")]
    AlreadyPresent(u64),
}
