//! Input/output for crystal structure files and run artifacts.
//!
//! The [`traits::StructureParser`] capability decouples validation from any particular
//! file format; [`cif`] provides the bundled CIF reader. The remaining modules handle
//! input discovery, the reference table, and routing of results into the output tree.

pub mod cif;
pub mod discover;
pub mod output;
pub mod reference;
pub mod traits;
