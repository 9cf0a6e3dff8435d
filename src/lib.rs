//! In-memory cluster state engine of a kube-style scheduler: a continuously mutated `Cache`,
//! read-optimized `Snapshot`s refreshed from it, and score plugins reading those snapshots.

pub mod config;
pub mod core;
pub mod printer;
pub mod test_util;
