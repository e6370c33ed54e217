//! Core computations over one region's feed tables.
//!
//! Stop events are normalized first ([`time`]); every other analyzer reads
//! the normalized events or the raw tables and returns plain values that the
//! orchestrator hands to the renderers.

pub mod aggregate;
pub mod exceptions;
pub mod geometry;
pub mod time;
pub mod travel_time;
pub mod types;
pub mod utility;
