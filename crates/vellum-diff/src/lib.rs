//! Structural diffing for the Vellum revision engine.
//!
//! Compares a candidate document against its stored state and produces the
//! three-way field diff (`added` / `updated` / `removed`) that patch delta
//! records carry. The diff stores pre-change values for updated and removed
//! fields, so it can be applied in either direction; backward application is
//! the basis of point-in-time reconstruction.
//!
//! Pure functions only; no store access, no logging.
//!
//! # Key Types
//!
//! - [`FieldDiff`] — Three-way diff with forward/inverse application
//! - [`diff_fields`] — Compute the diff between two field sets

pub mod field_diff;

pub use field_diff::{diff_fields, FieldDiff};
