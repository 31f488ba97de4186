//! # EFS Writer - one filled EFS form per trade
//!
//! Reads a spreadsheet (or delimited text) of Exchange-for-Swap trades and
//! writes one filled copy of an AcroForm PDF template per row.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ XLSX / CSV  │────▶│   Parser    │────▶│   Loader    │────▶│  Generator  │──▶ base_1.pdf
//! │             │     │ (auto-fmt)  │     │ (derive +   │     │ (defaults + │──▶ base_2.pdf
//! │             │     │             │     │  rename)    │     │  AcroForm)  │──▶ ...
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use efs_writer::{run, AcroFormFiller, RunConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RunConfig::new("trades.xlsx", "Trade EFS Template.pdf", "out", "transaction");
//!     let report = run(&config, &AcroFormFiller)?;
//!     println!("Generated {} documents", report.files.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per layer
//! - [`models`] - Trade records and field values
//! - [`parser`] - Workbook and delimited-text reading with auto-detection
//! - [`transform`] - Field mapping, derivation rules, loading, and the run pipeline
//! - [`config`] - Run configuration and form constants
//! - [`pdf`] - AcroForm filling
//! - [`validation`] - Template field checks
//! - [`generator`] - Default fields, merging, and per-record output
//! - [`api`] - HTTP API server and run log

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Output
pub mod generator;
pub mod pdf;
pub mod validation;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, FillError, GenerateError, LoadError, PipelineError, ServerError, SourceError,
};

// =============================================================================
// Re-exports - Models & configuration
// =============================================================================

pub use config::{FormConstants, OverwritePolicy, RunConfig, UnfilledFieldPolicy, DEFAULT_TEMPLATE};
pub use models::{Checkbox, Derived, FieldValues, Side, TradeRecord};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, read_source, read_source_bytes, Cell,
    PreviewTable, SourceFormat, SourceTable,
};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    load_records, run, run_at, to_field_values, transform_table, FieldMapping, FieldSource,
    LoadedBatch, RunReport,
};

// =============================================================================
// Re-exports - Generation
// =============================================================================

pub use generator::{generate, DefaultFieldSet, FieldConflict, MergedRecord, DEFAULT_FIELD_KEYS};
pub use pdf::{AcroFormFiller, FormFiller};
pub use validation::{check_template, expected_fields, unfilled_fields};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, GenerateResponse, PreviewResponse};

// Server
pub mod server {
    pub use crate::api::server::{start_server, ServerOptions, ALLOWED_ORIGINS_ENV};
}
