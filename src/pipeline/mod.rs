//! Pipeline stages for SVG-to-PDF merging.
//!
//! ```text
//! select ──▶ render (×N, concurrent) ──▶ merge ──▶ output file
//! ```
//!
//! 1. [`render`] turns one SVG into a standalone PDF fragment, either through
//!    an external tool or the embedded transcoder. Blocking; the driver runs
//!    it inside `spawn_blocking`.
//! 2. [`merge`] concatenates fragments, in input order, into one document.
//!
//! Ordering and concurrency live in [`crate::convert`]; the stages themselves
//! know nothing about either.

pub mod merge;
pub mod render;
