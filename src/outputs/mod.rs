//! Output writers.
//!
//! - [`json`]: writes a [`FetchReport`](crate::models::FetchReport) as a
//!   pretty-printed JSON document

pub mod json;
