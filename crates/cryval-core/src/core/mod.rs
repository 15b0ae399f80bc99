//! # Core Module
//!
//! Fundamental building blocks shared by every validation stage.
//!
//! - **Crystal Representation** ([`models`]) - Lattices, sites, structures and compositions
//! - **Static Element Data** ([`elements`]) - Atomic masses, nominal oxidation states and
//!   the magnetic-element set
//! - **File I/O** ([`io`]) - CIF reading, input discovery, reference tables and output routing
//!
//! Nothing in this module holds run state; all types are plain values that can be shared
//! freely across worker threads.

pub mod elements;
pub mod io;
pub mod models;
