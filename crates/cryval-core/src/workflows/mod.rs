//! # Workflows Module
//!
//! High-level entry points that run a complete procedure from input directory to output files.
//!
//! ## Overview
//!
//! Workflows load their resources, drive the engine, report progress and write results.
//! Callers supply a [`StructureParser`](crate::core::io::traits::StructureParser) and a
//! [`ValidationConfig`](crate::engine::config::ValidationConfig); everything else is derived
//! from the paths they are given.
//!
//! ## Architecture
//!
//! - **Validation Workflow** ([`validate`]) - Screens a batch of generated structures, routes
//!   each file to `validated_structures/` or `rejected_structures/`, and writes the report and
//!   the per-structure records table.
//! - **Reference Workflow** ([`reference`]) - Builds a reference table (id, reduced formula,
//!   space group) from a directory of known structures.

pub mod reference;
pub mod validate;
