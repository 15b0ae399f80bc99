//! # Core Models Module
//!
//! Data structures describing a single crystal candidate.
//!
//! - [`lattice`] - The periodic cell and its metric quantities
//! - [`site`] - One atomic site in fractional coordinates
//! - [`structure`] - A validated structure built from parser output
//! - [`composition`] - Occupancy-weighted element amounts and reduced formulas
//!
//! ```ignore
//! use cryval::core::models::structure::Structure;
//!
//! let structure = Structure::from_parsed("gen/0001.cif", parsed)?;
//! println!("{} atoms, V = {:.2}", structure.num_sites(), structure.volume());
//! println!("{}", structure.composition().reduced_formula());
//! ```

pub mod composition;
pub mod lattice;
pub mod site;
pub mod structure;
