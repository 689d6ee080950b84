//! Callstream is a single-process streaming engine which counts police service calls by call
//! type under an event-time watermark, ranks the counts and enriches them with reference data.
//!
//! The engine is broker agnostic: anything implementing [sources::BatchSource] can feed it.
pub mod aggregate;
pub mod context;
pub mod decode;
pub mod dedup;
pub mod errorhandling;
pub mod job;
pub mod join;
pub mod record;
pub mod sinks;
pub mod snapshot;
pub mod sources;
pub mod time;
pub mod watermark;

#[cfg(test)]
pub(crate) mod testing;
