//! Run configuration.
//!
//! A [`RunConfig`] carries the five user inputs of a run (input file,
//! template, output directory, base name, extension) plus the behaviour
//! switches, and is validated before anything is read or written.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

/// Template looked up when none is given.
pub const DEFAULT_TEMPLATE: &str = "Trade EFS Template.pdf";

static BASE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^[^/\\:*?"<>|\x00-\x1f]+$"#).expect("valid regex"));
static EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("valid regex"));

/// What to do when a destination file already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    /// Replace existing files.
    #[default]
    Overwrite,
    /// Abort the run before writing if any destination exists.
    Keep,
}

impl FromStr for OverwritePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "keep" => Ok(Self::Keep),
            other => Err(ConfigError::UnknownPolicy {
                kind: "overwrite",
                value: other.to_string(),
            }),
        }
    }
}

/// What to do with template fields that receive no value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnfilledFieldPolicy {
    /// Leave them blank.
    #[default]
    Allow,
    /// Leave them blank and log each one.
    Warn,
    /// Abort the run before writing.
    Reject,
}

impl FromStr for UnfilledFieldPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "warn" => Ok(Self::Warn),
            "reject" => Ok(Self::Reject),
            other => Err(ConfigError::UnknownPolicy {
                kind: "unfilled field",
                value: other.to_string(),
            }),
        }
    }
}

/// Constant strings of the default field set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormConstants {
    pub member_code: String,
    pub account_number: String,
    pub commodity_description: String,
    pub fixed_rate_payer: String,
    pub fixed_rate_receiver: String,
}

impl Default for FormConstants {
    fn default() -> Self {
        Self {
            member_code: "S111".to_string(),
            account_number: "SRITRANG INTL / S72449G".to_string(),
            commodity_description: "Sicom TSR".to_string(),
            fixed_rate_payer: "SRITRANG".to_string(),
            fixed_rate_receiver: "BANK".to_string(),
        }
    }
}

impl FormConstants {
    /// Defaults overridden by `EFS_*` environment variables.
    pub fn from_env() -> Self {
        let mut constants = Self::default();
        let overrides: [(&str, &mut String); 5] = [
            ("EFS_MEMBER_CODE", &mut constants.member_code),
            ("EFS_ACCOUNT_NUMBER", &mut constants.account_number),
            ("EFS_COMMODITY_DESCRIPTION", &mut constants.commodity_description),
            ("EFS_FIXED_RATE_PAYER", &mut constants.fixed_rate_payer),
            ("EFS_FIXED_RATE_RECEIVER", &mut constants.fixed_rate_receiver),
        ];
        for (var, slot) in overrides {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    *slot = value;
                }
            }
        }
        constants
    }
}

/// Template path from `EFS_TEMPLATE`, else [`DEFAULT_TEMPLATE`].
pub fn default_template() -> PathBuf {
    std::env::var("EFS_TEMPLATE")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE))
}

fn default_extension() -> String {
    "pdf".to_string()
}

/// Everything one generation run needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    /// Spreadsheet or delimited file with one trade per row.
    pub input: PathBuf,
    /// Fillable PDF template.
    pub template: PathBuf,
    /// Directory receiving the generated files.
    pub output_dir: PathBuf,
    /// Files are named `{base_name}_{n}.{extension}`.
    pub base_name: String,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default)]
    pub overwrite: OverwritePolicy,
    #[serde(default)]
    pub unfilled_fields: UnfilledFieldPolicy,
    #[serde(default = "FormConstants::from_env")]
    pub constants: FormConstants,
}

impl RunConfig {
    pub fn new(
        input: impl Into<PathBuf>,
        template: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        base_name: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            template: template.into(),
            output_dir: output_dir.into(),
            base_name: base_name.into(),
            extension: default_extension(),
            overwrite: OverwritePolicy::default(),
            unfilled_fields: UnfilledFieldPolicy::default(),
            constants: FormConstants::default(),
        }
    }

    pub fn with_overwrite(mut self, policy: OverwritePolicy) -> Self {
        self.overwrite = policy;
        self
    }

    pub fn with_unfilled_fields(mut self, policy: UnfilledFieldPolicy) -> Self {
        self.unfilled_fields = policy;
        self
    }

    pub fn with_constants(mut self, constants: FormConstants) -> Self {
        self.constants = constants;
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Check paths and names before the run touches anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.input.is_file() {
            return Err(ConfigError::InputNotFound(self.input.clone()));
        }
        if !self.template.is_file() {
            return Err(ConfigError::TemplateNotFound(self.template.clone()));
        }
        if !self.output_dir.is_dir() {
            return Err(ConfigError::OutputDirNotFound(self.output_dir.clone()));
        }
        if !BASE_NAME.is_match(&self.base_name) || self.base_name.trim() != self.base_name {
            return Err(ConfigError::InvalidBaseName(self.base_name.clone()));
        }
        if !EXTENSION.is_match(&self.extension) {
            return Err(ConfigError::InvalidExtension(self.extension.clone()));
        }
        Ok(())
    }

    /// Destination of the `index`-th record (1-based).
    pub fn output_path(&self, index: usize) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.{}", self.base_name, index, self.extension))
    }
}
