// src/scrape/mod.rs
pub mod discovery;
pub mod engine;

pub use discovery::{ContestDiscovery, CoverageGap, Discovery, EntityDiscovery, GapKind, Stage};
pub use engine::{backoff_delay, CancelToken, FetchEngine, FetchRequest, FetchStats, FetchWatch};
