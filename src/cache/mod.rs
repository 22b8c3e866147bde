//! Content-hash memoization of the pipeline.
//!
//! [`ContentHash`] fingerprints an input, [`marker`] embeds that fingerprint into the hook
//! assembly as an inert type, and [`CacheGate`] reads it back to decide whether an input can be
//! skipped.

pub mod gate;
pub mod hash;
pub mod marker;

pub use gate::{CacheGate, CacheMiss, CacheRecord, GateDecision};
pub use hash::ContentHash;
