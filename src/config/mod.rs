// src/config/mod.rs
pub mod consts;
pub mod options;
pub mod partitions;

pub use options::{FetchOptions, RunMode, RunOptions};
pub use partitions::Endpoints;
