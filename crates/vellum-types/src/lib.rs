//! Foundation types for the Vellum revision engine.
//!
//! This crate provides the identifier, temporal, and structural types used
//! throughout the Vellum system. Every other Vellum crate depends on
//! `vellum-types`.
//!
//! # Key Types
//!
//! - [`RecordId`] — UUID v7 identifier for live and delta records
//! - [`Stamp`] — Hybrid logical timestamp assigned at write time
//! - [`VersionTag`] — Two-part (major.minor) revision version
//! - [`Fields`] — Schemaless document body (field name → JSON value)
//! - [`Filter`] — Equality filter over top-level document fields

pub mod fields;
pub mod id;
pub mod stamp;
pub mod version;

pub use fields::{Fields, Filter};
pub use id::RecordId;
pub use stamp::Stamp;
pub use version::VersionTag;
