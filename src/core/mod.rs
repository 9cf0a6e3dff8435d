pub mod cache;
pub mod common;
pub mod events;
pub mod node;
pub mod pod;
pub mod policy;
pub mod scheduler;
