// src/lib.rs
// #![allow(dead_code)]
// #![allow(unused)]

#[macro_use]
pub mod macros;
#[macro_use]
pub mod core;

pub mod config;
pub mod data;
pub mod error;
pub mod log;
pub mod specs;
pub mod store;

pub mod file;
pub mod progress;
pub mod runner;
pub mod scrape;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{Error, Result};
