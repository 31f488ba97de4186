//! Transformation module.
//!
//! - Rules: value formatting and derivation (notional, commodity code)
//! - Mapping: source column → template field table
//! - Loader: source rows to typed trade records
//! - Pipeline: end-to-end run

pub mod loader;
pub mod mapping;
pub mod pipeline;
pub mod rules;

pub use loader::{load_records, transform_table, ColumnLayout, LoadedBatch};
pub use mapping::{CommodityCodeRule, FieldMapping, FieldRename, FieldSource, NotionalRule};
pub use pipeline::{run, run_at, to_field_values, RunReport};
