// src/specs/mod.rs
//! # Payload reading "specs"
//!
//! Each spec knows *where the ground truth lives* in one endpoint family's
//! JSON and how to read it tolerantly.
//!
//! ## What lives here
//! - **Pure payload parsing**: bytes in, canonical records out.
//! - **Path precedence** where the source moved a field over time
//!   (e.g. attendance under `gameInfo` or under the header competition).
//! - **The label table** mapping source statistic labels to canonical names.
//!
//! ## What does **not** live here
//! - **Fetching, caching, retries**: `scrape::engine` and `store`.
//! - **Deciding what to fetch**: `scrape::discovery`.
//! - **Writing records anywhere**: `file`.
//!
//! ## Conventions & invariants
//! - Absence is `None`, never zero or empty string.
//! - Ids are strings; numeric ids in the source are rendered as strings.
//! - Output ordering follows source ordering so repeated runs are identical.
//!
//! ## Current specs
//! - `teams`: entity-list pages and single-entity payloads.
//! - `schedule`: one entity's season schedule.
//! - `game`: contest summary to all contest record families.
//! - `labels`: statistic label table.
pub mod game;
pub mod labels;
pub mod schedule;
pub mod teams;

pub use game::normalize;
pub use labels::StatLabels;
