//! # Engine Module
//!
//! This module implements the validation engine: the individual checks a generated crystal
//! structure must pass, the configuration that parameterizes them, and the batch state that
//! turns per-structure results into a report.
//!
//! ## Overview
//!
//! Every structure moves through a fixed, fail-fast sequence of stages:
//!
//! ```text
//! Loaded -> GeometryChecked -> ChargeChecked -> DescriptorsComputed
//!        -> DuplicateChecked -> NoveltyChecked -> Accepted
//! ```
//!
//! The first failing stage decides the rejection reason. Stages up to fingerprinting are
//! independent per structure and may run in parallel; deduplication, novelty and report
//! aggregation happen in a sequential fold over structures sorted by id.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Immutable thresholds and policies for a run
//! - **Stages** ([`tasks`]) - Geometry, charge, descriptors, symmetry, fingerprint,
//!   deduplication and novelty
//! - **Pipeline** ([`pipeline`]) - Per-structure screening and the serialized [`pipeline::BatchState`]
//! - **Verdicts** ([`verdict`]) - Rejection reasons, suspicion flags and per-structure records
//! - **Reporting** ([`report`]) - Aggregated run statistics
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - Fatal, run-aborting errors

pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod tasks;
pub mod verdict;
