//! # CRYVAL Core Library
//!
//! A validation engine for batches of machine-generated crystal structures. Every candidate
//! is screened for physical plausibility, deduplicated within its batch and compared against
//! a reference set to decide whether it is novel.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Structure`, `Lattice`, `Composition`),
//!   static element tables, and I/O (CIF reading, reference tables, output layout).
//!
//! - **[`engine`]: The Logic Core.** The individual validation stages (periodic geometry,
//!   charge neutrality, descriptors, symmetry, fingerprinting, deduplication, novelty), the
//!   immutable `ValidationConfig`, and the report aggregator. Parallel screening and the
//!   serialized, order-dependent fold are kept strictly apart.
//!
//! - **[`workflows`]: The Public API.** Complete procedures that tie `core` and `engine`
//!   together: validating a directory of structures end to end, and building a reference
//!   table from a directory of known structures.

pub mod core;
pub mod engine;
pub mod workflows;
