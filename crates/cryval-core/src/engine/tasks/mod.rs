//! Validation stages applied to each structure.
//!
//! The per-structure stages ([`geometry`], [`charge`], [`descriptors`], [`symmetry`] and
//! [`fingerprint`]) are pure functions of a structure and the run configuration, so they can
//! run in parallel. [`dedup`] and [`novelty`] depend on what the batch has already seen and
//! run inside the serialized fold.

pub mod charge;
pub mod dedup;
pub mod descriptors;
pub mod fingerprint;
pub mod geometry;
pub mod novelty;
pub mod symmetry;
