//! Domain models for the EFS generation pipeline.
//!
//! - [`TradeRecord`] - one typed input row, destined for one output form
//! - [`Side`] - Short / Long transaction type
//! - [`Checkbox`] - on/off state written into checkbox fields
//! - [`Derived`] - value either read from the input or computed

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::transform::mapping::{
    FieldMapping, COMMODITY_CODE, EXPIRY_DATE, NOTIONAL, PRICE, QUANTITY, SHIPMENT_MONTH,
    BUYER_FIELD, SELLER_FIELD, START_DATE,
};
use crate::transform::rules::{format_date, format_number, format_thousands, month_abbrev, short_year};

/// Template field name → value written into it.
pub type FieldValues = BTreeMap<String, String>;

// =============================================================================
// Checkbox / Side
// =============================================================================

/// Checkbox state as written into a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Checkbox {
    On,
    Off,
}

impl Checkbox {
    pub fn as_str(&self) -> &'static str {
        match self {
            Checkbox::On => "On",
            Checkbox::Off => "Off",
        }
    }
}

/// Direction of the trade from our side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    /// We sell: the "Seller" box is ticked.
    Short,
    /// We buy: the "Buyer" box is ticked.
    Long,
}

impl Side {
    /// Parse the `Transaction Type` cell. Exact, case-sensitive match.
    pub fn from_transaction_type(value: &str) -> Option<Self> {
        match value.trim() {
            "Short" => Some(Side::Short),
            "Long" => Some(Side::Long),
            _ => None,
        }
    }

    /// (seller, buyer); exactly one is on.
    pub fn checkboxes(&self) -> (Checkbox, Checkbox) {
        match self {
            Side::Short => (Checkbox::On, Checkbox::Off),
            Side::Long => (Checkbox::Off, Checkbox::On),
        }
    }
}

// =============================================================================
// Derived values
// =============================================================================

/// A value that was either present in the input or computed from other columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "origin", content = "value", rename_all = "lowercase")]
pub enum Derived<T> {
    Provided(T),
    Computed(T),
}

impl<T> Derived<T> {
    pub fn value(&self) -> &T {
        match self {
            Derived::Provided(v) | Derived::Computed(v) => v,
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, Derived::Computed(_))
    }
}

// =============================================================================
// Trade Record
// =============================================================================

/// One input row after parsing and derivation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    /// Spreadsheet row the record came from (header = row 1).
    pub row: usize,
    pub start_date: NaiveDateTime,
    pub expiry_date: NaiveDateTime,
    pub shipment: NaiveDateTime,
    pub price: f64,
    pub quantity: f64,
    pub notional: Derived<f64>,
    pub commodity_code: Derived<String>,
    pub side: Option<Side>,
    /// Columns not consumed above, passed through to the form as-is.
    pub extra: BTreeMap<String, String>,
}

impl TradeRecord {
    /// Uppercase shipment month, e.g. `JUL`.
    pub fn shipment_month(&self) -> String {
        month_abbrev(&self.shipment)
    }

    /// Two-digit shipment year, e.g. `21`.
    pub fn shipment_year(&self) -> String {
        short_year(&self.shipment)
    }

    /// Values keyed by template field name.
    ///
    /// Mapped columns use their template names, the price is duplicated,
    /// the side becomes the Seller/Buyer checkbox pair, and pass-through
    /// columns keep their source header as field name.
    pub fn to_fields(&self, mapping: &FieldMapping) -> FieldValues {
        let mut fields = FieldValues::new();

        for (key, value) in &self.extra {
            fields.insert(key.clone(), value.clone());
        }

        let logical = [
            (START_DATE, format_date(&self.start_date)),
            (EXPIRY_DATE, format_date(&self.expiry_date)),
            (PRICE, format_number(self.price)),
            (QUANTITY, format_number(self.quantity)),
            (SHIPMENT_MONTH, self.shipment_month()),
            (NOTIONAL, format_thousands(*self.notional.value())),
            (COMMODITY_CODE, self.commodity_code.value().clone()),
        ];
        for (column, value) in logical {
            let key = mapping.target_for(column).unwrap_or(column);
            fields.insert(key.to_string(), value);
        }

        for (from, to) in &mapping.duplicates {
            if let Some(value) = fields.get(from).cloned() {
                fields.insert(to.clone(), value);
            }
        }

        if let Some(side) = self.side {
            let (seller, buyer) = side.checkboxes();
            fields.insert(SELLER_FIELD.to_string(), seller.as_str().to_string());
            fields.insert(BUYER_FIELD.to_string(), buyer.as_str().to_string());
        }

        fields
    }
}
