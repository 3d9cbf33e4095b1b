// src/core/mod.rs

#[macro_use]
pub mod json;
pub mod net;
pub mod sanitize;

pub use net::{HttpTransport, Transport};
