//! Field mapping definition
//!
//! The mapping defines how source columns land in template fields. The
//! template's field names are mostly `undefined_N`, so the table is fixed.

use serde::Serialize;

pub const START_DATE: &str = "Start Date";
pub const EXPIRY_DATE: &str = "Expiry Date";
pub const SHIPMENT: &str = "Shipment";
pub const PRICE: &str = "Rounded strike";
pub const QUANTITY: &str = "Total Quantity (lots)";
pub const NOTIONAL: &str = "Notional";
pub const COMMODITY_CODE: &str = "Commodity Code";
pub const TRANSACTION_TYPE: &str = "Transaction Type";

/// Derived from `Shipment`.
pub const SHIPMENT_MONTH: &str = "Shipment Month";

/// Checkbox fields driven by the transaction type.
pub const SELLER_FIELD: &str = "Seller";
pub const BUYER_FIELD: &str = "Buyer";

/// Columns every input must carry.
pub const REQUIRED_COLUMNS: [&str; 5] = [START_DATE, EXPIRY_DATE, SHIPMENT, PRICE, QUANTITY];

/// Column → template field rename table.
const RENAMES: [(&str, &str); 7] = [
    (START_DATE, "undefined_12"),
    (EXPIRY_DATE, "undefined_13"),
    (PRICE, "undefined_4"),
    (QUANTITY, "undefined_3"),
    (SHIPMENT_MONTH, "undefined_2"),
    (NOTIONAL, "undefined_16"),
    (COMMODITY_CODE, "Commodity Code  Contract Month"),
];

/// Template fields that receive a copy of another field's value.
/// The price appears twice on the form (price and fixed rate).
const DUPLICATES: [(&str, &str); 1] = [("undefined_4", "undefined_14")];

/// A single rename entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldRename {
    pub source: String,
    pub target: String,
}

/// The complete rename table plus duplicated targets
#[derive(Debug, Clone, Serialize)]
pub struct FieldMapping {
    pub renames: Vec<FieldRename>,
    /// (existing target, extra target)
    pub duplicates: Vec<(String, String)>,
}

impl FieldMapping {
    /// The EFS template mapping.
    pub fn efs() -> Self {
        Self {
            renames: RENAMES
                .iter()
                .map(|(s, t)| FieldRename {
                    source: s.to_string(),
                    target: t.to_string(),
                })
                .collect(),
            duplicates: DUPLICATES
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }

    /// Template field for a logical column.
    pub fn target_for(&self, source: &str) -> Option<&str> {
        self.renames
            .iter()
            .find(|r| r.source == source)
            .map(|r| r.target.as_str())
    }

    /// All template fields the mapping writes, duplicates included.
    pub fn target_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self.renames.iter().map(|r| r.target.clone()).collect();
        fields.extend(self.duplicates.iter().map(|(_, to)| to.clone()));
        fields
    }

    /// Validate that all required source columns exist in the headers
    pub fn validate_headers(headers: &[String]) -> Result<(), Vec<String>> {
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|col| !headers.iter().any(|h| h == *col))
            .map(|col| col.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self::efs()
    }
}

/// Notional computed as `price × quantity × multiplier`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NotionalRule {
    pub multiplier: f64,
}

/// Commodity code computed as `prefix + month letter + 2-digit year` from
/// the shipment date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommodityCodeRule {
    pub prefix: &'static str,
}

/// Where a derivable field's value comes from, decided once per input.
/// `R` is the rule applied when the column is absent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldSource<R> {
    /// Column index in the source table.
    Provided(usize),
    Computed(R),
}

impl<R> FieldSource<R> {
    /// `Provided` when the header exists, else `Computed(rule)`.
    pub fn resolve(headers: &[String], column: &str, rule: R) -> Self {
        match headers.iter().position(|h| h == column) {
            Some(idx) => FieldSource::Provided(idx),
            None => FieldSource::Computed(rule),
        }
    }
}
