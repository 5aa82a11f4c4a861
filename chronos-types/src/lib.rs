//! Core data types shared across every Chronos crate: timer records, the
//! `id -> (active, information)` pair the store keys on, and the wire JSON
//! codec (spec.md §3, §6).

mod error;
mod ids;
mod timer;
mod wire;

pub use error::TypesError;
pub use ids::{NodeAddress, TimerId};
pub use timer::{overflow_less_than, Timer, TimerPair, TOMBSTONE_RETENTION_MS};
pub use wire::{
    CallbackJson, DeleteReferencesBody, HttpCallbackJson, ReliabilityJson, ReplicaReference,
    ResyncEntry, ResyncPage, TimerJson, TimingJson,
};
