pub mod cache;
pub mod commonstores;
pub mod errors;
pub mod handler;
pub mod node_group;
pub mod node_info;
pub mod node_slices;
pub mod snapshot;
