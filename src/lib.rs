//! metarc - a segmented, index-backed archival engine for meteorological
//! observation and forecast data
//!
//! Records ingested through format scanners are appended to flat segment
//! files, indexed per segment, and queried with typed match expressions.
//! The write path is transactional: segment append and index insert
//! become visible together or not at all.

pub mod codec;
pub mod config;
pub mod dataset;
pub mod grid;
pub mod index;
pub mod matcher;
pub mod metadata;
pub mod observability;
pub mod scan;
pub mod segment;
pub mod structured;
pub mod transaction;
pub mod types;
