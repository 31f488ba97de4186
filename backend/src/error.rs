//! Error types for the EFS generation pipeline.
//!
//! One enum per layer:
//!
//! - [`SourceError`] - reading the spreadsheet / delimited file
//! - [`LoadError`] - turning source rows into trade records
//! - [`ConfigError`] - run configuration problems
//! - [`FillError`] - the PDF form-filling primitive
//! - [`GenerateError`] - the per-record generation loop
//! - [`PipelineError`] - top-level orchestration
//! - [`ServerError`] - HTTP surface
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Source Reading Errors
// =============================================================================

/// Errors while reading the tabular input file.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// The workbook could not be opened or decoded.
    #[error("Invalid workbook: {0}")]
    WorkbookError(String),

    /// Invalid CSV format.
    #[error("Invalid CSV format: {0}")]
    ParseError(String),

    /// Workbook without any worksheet.
    #[error("Workbook has no worksheet")]
    NoWorksheet,

    /// Empty file.
    #[error("Input file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No header row found in input")]
    NoHeaders,
}

// =============================================================================
// Loading Errors
// =============================================================================

/// Errors while turning source rows into trade records.
///
/// Row numbers are spreadsheet rows: the header is row 1, the first record row 2.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The source file could not be read.
    #[error("{0}")]
    Source(#[from] SourceError),

    /// Required column absent from the header row.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// A date cell could not be parsed.
    #[error("Row {row}, column '{column}': cannot parse date from '{value}'")]
    InvalidDate {
        row: usize,
        column: String,
        value: String,
    },

    /// A numeric cell could not be parsed.
    #[error("Row {row}, column '{column}': cannot parse number from '{value}'")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },

    /// Transaction type other than Short / Long.
    #[error("Row {row}: transaction type must be 'Short' or 'Long', got '{value}'")]
    InvalidSide { row: usize, value: String },
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors in a [`crate::config::RunConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Input spreadsheet does not exist.
    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    /// Template PDF does not exist.
    #[error("Template file not found: {0}")]
    TemplateNotFound(PathBuf),

    /// Output directory missing or not a directory.
    #[error("Output directory not found: {0}")]
    OutputDirNotFound(PathBuf),

    /// Base output name is empty or contains path characters.
    #[error("Invalid output name '{0}': must be non-empty and contain no path separators")]
    InvalidBaseName(String),

    /// Extension is empty or not alphanumeric.
    #[error("Invalid output extension '{0}'")]
    InvalidExtension(String),

    /// Unknown policy string.
    #[error("Unknown {kind} policy '{value}'")]
    UnknownPolicy { kind: &'static str, value: String },
}

// =============================================================================
// Form Filling Errors
// =============================================================================

/// Errors from the form-filling primitive.
#[derive(Debug, Error)]
pub enum FillError {
    /// PDF could not be parsed or is structurally broken.
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// Document has no interactive form.
    #[error("Document has no AcroForm: {0}")]
    NoAcroForm(PathBuf),

    /// Failed to write the filled copy.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// Generation Errors
// =============================================================================

/// Errors from the per-record generation loop.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Default field set and a record share keys.
    #[error("Record {record}: default fields and record columns overlap on {keys:?}")]
    FieldConflict { record: usize, keys: Vec<String> },

    /// The template lacks fields the run needs to fill.
    #[error("Template is missing fields: {0:?}")]
    TemplateMissingFields(Vec<String>),

    /// Template fields left empty while the policy rejects that.
    #[error("Record {record}: template fields left unfilled: {fields:?}")]
    UnfilledFields { record: usize, fields: Vec<String> },

    /// Destination exists while the policy keeps existing files.
    #[error("Output file already exists: {0}")]
    OutputExists(PathBuf),

    /// The form-filling primitive failed.
    #[error("Form filling failed: {0}")]
    Fill(#[from] FillError),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the main error type returned by [`crate::transform::pipeline::run`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid run configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Input could not be loaded.
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// Generation aborted.
    #[error("Generation error: {0}")]
    Generate(#[from] GenerateError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for source reading.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for loading.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for form filling.
pub type FillResult<T> = Result<T, FillError>;

/// Result type for generation.
pub type GenerateResult<T> = Result<T, GenerateError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
