//! `parcel-recon`: property-sale reconciliation engine.
//!
//! Merges a land-title registry feed, a valuation register and a brokerage
//! transaction feed into one canonical sales table. The engine receives
//! pre-loaded tables and returns the reconciled result; `load` turns CSV
//! files into those tables.

pub mod address;
pub mod assessment;
pub mod classify;
pub mod config;
pub mod consolidate;
pub mod dedup;
pub mod engine;
pub mod enrich;
pub mod error;
pub mod fuzzy;
pub mod lexicon;
pub mod listing;
pub mod load;
pub mod matcher;
pub mod model;
pub mod prefilter;
pub mod register;
pub mod review;

pub use config::PipelineConfig;
pub use engine::{run, run_with_lexicon};
pub use error::ReconError;
pub use lexicon::Lexicon;
pub use model::{ReconInput, ReconResult};
