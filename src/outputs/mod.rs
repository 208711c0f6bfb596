//! Output generation for finished runs.
//!
//! - [`json`]: writes the run snapshot as one JSON file per language
//!
//! The store is the primary output; these files are a bulk copy of the
//! latest run for consumers that prefer static files.

pub mod json;
