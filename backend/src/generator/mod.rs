//! Document generator.
//!
//! Merges every record with the default field set and writes one filled
//! form per record through a [`FormFiller`]. Everything that can be checked
//! up front (key conflicts, template fields, unfilled fields, existing
//! outputs) is checked for the whole batch before the first file is written.
//! Once writing starts there is no rollback: a failure on record `k` leaves
//! files `1..k-1` on disk.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::api::logs::{log_info, log_success, log_success_indent, log_warning};
use crate::config::{FormConstants, OverwritePolicy, RunConfig, UnfilledFieldPolicy};
use crate::error::{GenerateError, GenerateResult};
use crate::models::{Checkbox, FieldValues};
use crate::pdf::FormFiller;
use crate::transform::mapping::SELLER_FIELD;
use crate::transform::rules::format_date;
use crate::validation::{check_template, expected_fields, unfilled_fields};

/// Keys of the default field set, in form order.
pub const DEFAULT_FIELD_KEYS: [&str; 9] = [
    "Date",
    "Swaps",
    "Member Code",
    "Customer  Account Number",
    "Date  Time of EFP  EFS transaction",
    "undefined",
    "SWAPS",
    "Fixed Rate Payer  Floating Rate Receiver",
    "Fixed Rate Receiver  Floating Rate Payer",
];

/// Constant fields written into every document of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefaultFieldSet {
    fields: FieldValues,
}

impl DefaultFieldSet {
    /// Build the set for a run started at `timestamp`.
    pub fn new(constants: &FormConstants, timestamp: NaiveDateTime) -> Self {
        let date = format_date(&timestamp);
        let time = timestamp.format("%I.%M %p").to_string();

        let values = [
            date.clone(),
            Checkbox::On.as_str().to_string(),
            constants.member_code.clone(),
            constants.account_number.clone(),
            format!("{} at {}", date, time),
            constants.commodity_description.clone(),
            Checkbox::On.as_str().to_string(),
            constants.fixed_rate_payer.clone(),
            constants.fixed_rate_receiver.clone(),
        ];

        Self {
            fields: DEFAULT_FIELD_KEYS
                .iter()
                .map(|k| k.to_string())
                .zip(values)
                .collect(),
        }
    }

    pub fn fields(&self) -> &FieldValues {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Keys present in both the default field set and a record.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("default fields and record overlap on {keys:?}")]
pub struct FieldConflict {
    pub keys: Vec<String>,
}

/// Default fields plus one record's fields, with disjoint keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRecord {
    /// 1-based position in the batch; names the output file.
    pub index: usize,
    pub fields: FieldValues,
}

impl MergedRecord {
    /// Union of `defaults` and `record`, or the overlapping keys.
    pub fn merge(
        defaults: &DefaultFieldSet,
        record: &FieldValues,
        index: usize,
    ) -> Result<Self, FieldConflict> {
        let overlap: Vec<String> = record
            .keys()
            .filter(|k| defaults.fields.contains_key(*k))
            .cloned()
            .collect();
        if !overlap.is_empty() {
            return Err(FieldConflict { keys: overlap });
        }

        let mut fields = defaults.fields.clone();
        fields.extend(record.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(Self { index, fields })
    }
}

/// Merge a whole batch; the first conflicting record aborts.
pub fn merge_all(
    defaults: &DefaultFieldSet,
    records: &[FieldValues],
) -> GenerateResult<Vec<MergedRecord>> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            MergedRecord::merge(defaults, record, i + 1).map_err(|conflict| {
                GenerateError::FieldConflict {
                    record: i + 1,
                    keys: conflict.keys,
                }
            })
        })
        .collect()
}

/// Files written by a generation run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReport {
    pub files: Vec<PathBuf>,
}

/// Write one filled document per record.
pub fn generate<F: FormFiller + ?Sized>(
    filler: &F,
    config: &RunConfig,
    defaults: &DefaultFieldSet,
    records: &[FieldValues],
) -> GenerateResult<GenerationReport> {
    log_info("🧩 Merging default fields...");
    let merged = merge_all(defaults, records)?;

    log_info("🔎 Checking template fields...");
    let template_fields = filler.form_fields(&config.template)?;
    let with_side = records.iter().any(|r| r.contains_key(SELLER_FIELD));
    let missing = check_template(&template_fields, &expected_fields(with_side));
    if !missing.is_empty() {
        return Err(GenerateError::TemplateMissingFields(missing));
    }
    log_success(format!("Template exposes {} fields", template_fields.len()));

    check_unfilled(&template_fields, &merged, config.unfilled_fields)?;

    let destinations: Vec<PathBuf> = merged.iter().map(|m| config.output_path(m.index)).collect();
    if config.overwrite == OverwritePolicy::Keep {
        if let Some(existing) = destinations.iter().find(|p| p.exists()) {
            return Err(GenerateError::OutputExists(existing.clone()));
        }
    }

    log_info(format!("📝 Writing {} documents...", merged.len()));
    for (record, destination) in merged.iter().zip(&destinations) {
        filler.fill(&config.template, destination, &record.fields)?;
        log_success_indent(format!("{}", destination.display()), 1);
    }

    Ok(GenerationReport { files: destinations })
}

fn check_unfilled(
    template_fields: &FieldValues,
    merged: &[MergedRecord],
    policy: UnfilledFieldPolicy,
) -> GenerateResult<()> {
    if policy == UnfilledFieldPolicy::Allow {
        return Ok(());
    }
    for record in merged {
        let unfilled = unfilled_fields(template_fields, &record.fields);
        if unfilled.is_empty() {
            continue;
        }
        match policy {
            UnfilledFieldPolicy::Reject => {
                return Err(GenerateError::UnfilledFields {
                    record: record.index,
                    fields: unfilled,
                })
            }
            _ => log_warning(format!(
                "Record {}: {} template fields left blank: {}",
                record.index,
                unfilled.len(),
                unfilled.join(", ")
            )),
        }
    }
    Ok(())
}
