//! Cluster membership and configuration for Chronos.
//!
//! Two concerns live here, mirroring the two config files Chronos reads
//! (spec.md §6): process-local options (`ChronosConfig`, from
//! `chronos.conf`) and cluster membership (`ClusterFileConfig` /
//! `ClusterView`, from `chronos_cluster.conf`). Membership is the one that
//! matters for correctness — it drives replica selection and resync — so
//! it's modeled as an explicit RCU'd snapshot (spec.md §9) rather than
//! ambient global state.

mod config;
mod error;
mod membership;

pub use config::{parse_ini, read_ini_file, ChronosConfig, ClusterFileConfig, Entry};
pub use error::ClusterError;
pub use membership::{ClusterMembership, ClusterView};
