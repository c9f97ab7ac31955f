//! Structured logging
//!
//! One JSON object per line, synchronous, with deterministic field
//! ordering so log output is diffable in tests and reproducible across
//! runs. Logging is strictly read-only with respect to the engine: a
//! failed write to the log sink is ignored, never propagated.

mod logger;

pub use logger::{Logger, Severity};
