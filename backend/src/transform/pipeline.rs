//! End-to-end run: input file → trade records → one filled form per record.
//!
//! # Example
//!
//! ```rust,ignore
//! use efs_writer::{run, AcroFormFiller, RunConfig};
//!
//! let config = RunConfig::new("trades.xlsx", "Trade EFS Template.pdf", "out", "transaction");
//! let report = run(&config, &AcroFormFiller)?;
//! println!("Wrote {} files", report.files.len());
//! ```

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::path::PathBuf;

use crate::api::logs::{log_info, log_success, log_warning};
use crate::config::RunConfig;
use crate::error::PipelineResult;
use crate::generator::{generate, DefaultFieldSet};
use crate::models::FieldValues;
use crate::parser::SourceFormat;
use crate::pdf::FormFiller;

use super::loader::{load_records, LoadedBatch};
use super::mapping::{FieldMapping, COMMODITY_CODE, NOTIONAL};

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Timestamp written into the date fields.
    pub run_at: NaiveDateTime,
    pub row_count: usize,
    pub files: Vec<PathBuf>,
    pub headers: Vec<String>,
    pub format: SourceFormat,
    /// Optional columns that were absent and computed instead.
    pub computed: Vec<String>,
}

/// Run now.
pub fn run<F: FormFiller + ?Sized>(config: &RunConfig, filler: &F) -> PipelineResult<RunReport> {
    run_at(config, filler, Local::now().naive_local())
}

/// Run with a fixed timestamp for the default field set.
pub fn run_at<F: FormFiller + ?Sized>(
    config: &RunConfig,
    filler: &F,
    now: NaiveDateTime,
) -> PipelineResult<RunReport> {
    log_info("🔧 Checking run configuration...");
    config.validate()?;
    log_success(format!("Template: {}", config.template.display()));
    log_success(format!(
        "Output: {}",
        config
            .output_dir
            .join(format!("{}_N.{}", config.base_name, config.extension))
            .display()
    ));

    log_info(format!("📖 Reading {}...", config.input.display()));
    let batch = load_records(&config.input)?;
    log_source(&batch);

    let computed = computed_columns(&batch);
    for column in &computed {
        log_info(format!("{} column absent, computing it", column));
    }

    let records = to_field_values(&batch);
    if records.is_empty() {
        log_warning("No data rows, nothing to generate");
    }

    let defaults = DefaultFieldSet::new(&config.constants, now);
    let generated = generate(filler, config, &defaults, &records)?;
    log_success(format!("Generated {} documents", generated.files.len()));

    Ok(RunReport {
        run_at: now,
        row_count: batch.records.len(),
        files: generated.files,
        headers: batch.headers,
        format: batch.format,
        computed,
    })
}

/// Template field values of every loaded record, in row order.
pub fn to_field_values(batch: &LoadedBatch) -> Vec<FieldValues> {
    let mapping = FieldMapping::efs();
    batch.records.iter().map(|r| r.to_fields(&mapping)).collect()
}

fn computed_columns(batch: &LoadedBatch) -> Vec<String> {
    [NOTIONAL, COMMODITY_CODE]
        .into_iter()
        .filter(|c| !batch.headers.iter().any(|h| h == c))
        .map(String::from)
        .collect()
}

fn log_source(batch: &LoadedBatch) {
    match &batch.format {
        SourceFormat::Workbook => log_success("Detected workbook"),
        SourceFormat::Delimited { encoding, delimiter } => {
            log_success(format!("Detected encoding: {}", encoding));
            log_success(format!("Detected separator: '{}'", format_delimiter(*delimiter)));
        }
    }
    log_success(format!("Read {} rows", batch.records.len()));
    log_info(format!("📋 Input has {} columns:", batch.headers.len()));
    for (i, col) in batch.headers.iter().enumerate() {
        log_info(format!("[{:2}] {}", i + 1, col));
    }
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, GenerateError, LoadError, PipelineError};
    use crate::generator::DEFAULT_FIELD_KEYS;
    use crate::pdf::testing::{write_efs_template, write_template, TemplateField};
    use crate::pdf::AcroFormFiller;
    use chrono::NaiveDate;
    use std::path::Path;
    use tempfile::tempdir;

    const HEADER: &str = "Start Date;Expiry Date;Shipment;Rounded strike;Total Quantity (lots)";

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 7, 5)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn setup(dir: &Path, csv: &str) -> RunConfig {
        let input = dir.join("trades.csv");
        let template = dir.join("template.pdf");
        let out = dir.join("out");
        std::fs::write(&input, csv).unwrap();
        std::fs::create_dir(&out).unwrap();
        write_efs_template(&template);
        RunConfig::new(input, template, out, "transaction")
    }

    #[test]
    fn test_run_writes_one_file_per_row() {
        let dir = tempdir().unwrap();
        let config = setup(
            dir.path(),
            &format!(
                "{}\n2021-01-29;2021-08-31;2021-07-01;180.1;80\n2021-02-01;2021-09-30;2021-09-01;175;20\n",
                HEADER
            ),
        );

        let report = run_at(&config, &AcroFormFiller, now()).unwrap();

        assert_eq!(report.row_count, 2);
        assert_eq!(report.computed, vec!["Notional".to_string(), "Commodity Code".to_string()]);
        assert_eq!(
            report.files,
            vec![config.output_path(1), config.output_path(2)]
        );
        assert!(report.files.iter().all(|f| f.is_file()));
    }

    #[test]
    fn test_generated_fields_round_trip() {
        let dir = tempdir().unwrap();
        let config = setup(
            dir.path(),
            &format!(
                "{};Transaction Type\n2021-01-29;2021-08-31;2021-07-01;180.1;80;Short\n",
                HEADER
            ),
        );

        let report = run_at(&config, &AcroFormFiller, now()).unwrap();
        let fields = AcroFormFiller.form_fields(&report.files[0]).unwrap();

        assert_eq!(fields["undefined_12"], "29/01/2021");
        assert_eq!(fields["undefined_13"], "31/08/2021");
        assert_eq!(fields["undefined_4"], "180.1");
        assert_eq!(fields["undefined_14"], "180.1");
        assert_eq!(fields["undefined_3"], "80");
        assert_eq!(fields["undefined_2"], "JUL");
        assert_eq!(fields["undefined_16"], "720,400");
        assert_eq!(fields["Commodity Code  Contract Month"], "ORN21");
        assert_eq!(fields["Seller"], "On");
        assert_eq!(fields["Buyer"], "Off");

        let defaults = DefaultFieldSet::new(&config.constants, now());
        for key in DEFAULT_FIELD_KEYS {
            assert_eq!(Some(fields[key].as_str()), defaults.get(key), "{}", key);
        }
        assert_eq!(fields["Date  Time of EFP  EFS transaction"], "05/07/2021 at 09.30 AM");
    }

    #[test]
    fn test_bad_row_writes_nothing() {
        let dir = tempdir().unwrap();
        let config = setup(
            dir.path(),
            &format!(
                "{};Transaction Type\n2021-01-29;2021-08-31;2021-07-01;180.1;80;Short\n2021-01-29;2021-08-31;2021-07-01;180.1;80;Flat\n",
                HEADER
            ),
        );

        let err = run_at(&config, &AcroFormFiller, now()).unwrap_err();

        assert!(matches!(err, PipelineError::Load(LoadError::InvalidSide { row: 3, .. })));
        assert_eq!(std::fs::read_dir(&config.output_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_input_column_colliding_with_default_field() {
        let dir = tempdir().unwrap();
        let config = setup(
            dir.path(),
            &format!(
                "{};Member Code\n2021-01-29;2021-08-31;2021-07-01;180.1;80;XYZ\n",
                HEADER
            ),
        );

        let err = run_at(&config, &AcroFormFiller, now()).unwrap_err();

        match err {
            PipelineError::Generate(GenerateError::FieldConflict { record, keys }) => {
                assert_eq!(record, 1);
                assert_eq!(keys, vec!["Member Code".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(std::fs::read_dir(&config.output_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_template_fails_before_reading() {
        let dir = tempdir().unwrap();
        let mut config = setup(dir.path(), &format!("{}\n", HEADER));
        config.template = dir.path().join("missing.pdf");

        assert!(matches!(
            run_at(&config, &AcroFormFiller, now()),
            Err(PipelineError::Config(ConfigError::TemplateNotFound(_)))
        ));
    }

    #[test]
    fn test_template_without_mapped_fields() {
        let dir = tempdir().unwrap();
        let config = setup(
            dir.path(),
            &format!("{}\n2021-01-29;2021-08-31;2021-07-01;180.1;80\n", HEADER),
        );
        write_template(&config.template, &[TemplateField::Text("Date")]);

        let err = run_at(&config, &AcroFormFiller, now()).unwrap_err();
        match err {
            PipelineError::Generate(GenerateError::TemplateMissingFields(missing)) => {
                assert!(missing.contains(&"undefined_16".to_string()));
                assert!(!missing.contains(&"Date".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_header_only_input() {
        let dir = tempdir().unwrap();
        let config = setup(dir.path(), &format!("{}\n", HEADER));

        let report = run_at(&config, &AcroFormFiller, now()).unwrap();
        assert_eq!(report.row_count, 0);
        assert!(report.files.is_empty());
    }
}
