//! Template validation.
//!
//! Compares what a run will write against the fields a template exposes
//! (as reported by [`crate::pdf::FormFiller::form_fields`]).
//!
//! # Example
//!
//! ```rust,ignore
//! use efs_writer::{AcroFormFiller, FormFiller, check_template, expected_fields};
//!
//! let fields = AcroFormFiller.form_fields("Trade EFS Template.pdf".as_ref())?;
//! let missing = check_template(&fields, &expected_fields(true));
//! assert!(missing.is_empty(), "template lacks {:?}", missing);
//! ```

use std::collections::BTreeSet;

use crate::generator::DEFAULT_FIELD_KEYS;
use crate::models::FieldValues;
use crate::transform::mapping::{FieldMapping, BUYER_FIELD, SELLER_FIELD};

/// Fields of the EFS template that are checkboxes.
pub const CHECKBOX_FIELDS: [&str; 4] = ["Swaps", "SWAPS", SELLER_FIELD, BUYER_FIELD];

/// Every template field a run fills: default keys, mapping targets and,
/// when the input carries a transaction type, the Seller/Buyer pair.
pub fn expected_fields(with_side: bool) -> Vec<String> {
    let mut fields: BTreeSet<String> = DEFAULT_FIELD_KEYS.iter().map(|k| k.to_string()).collect();
    fields.extend(FieldMapping::efs().target_fields());
    if with_side {
        fields.insert(SELLER_FIELD.to_string());
        fields.insert(BUYER_FIELD.to_string());
    }
    fields.into_iter().collect()
}

/// Expected fields absent from the template, sorted.
pub fn check_template(template_fields: &FieldValues, expected: &[String]) -> Vec<String> {
    let mut missing: Vec<String> = expected
        .iter()
        .filter(|name| !template_fields.contains_key(*name))
        .cloned()
        .collect();
    missing.sort();
    missing
}

/// Template fields that `values` leaves without content, sorted.
pub fn unfilled_fields(template_fields: &FieldValues, values: &FieldValues) -> Vec<String> {
    template_fields
        .keys()
        .filter(|name| values.get(*name).map_or(true, |v| v.is_empty()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(names: &[&str]) -> FieldValues {
        names.iter().map(|n| (n.to_string(), String::new())).collect()
    }

    #[test]
    fn test_expected_fields() {
        let base = expected_fields(false);
        let with_side = expected_fields(true);

        assert_eq!(base.len(), 9 + 8);
        assert_eq!(with_side.len(), base.len() + 2);
        assert!(base.contains(&"undefined_14".to_string()));
        assert!(base.contains(&"Customer  Account Number".to_string()));
        assert!(!base.contains(&"Seller".to_string()));
        assert!(with_side.contains(&"Buyer".to_string()));
    }

    #[test]
    fn test_check_template() {
        let template = fields(&["Date", "undefined_4", "Extra"]);
        let expected = vec!["undefined_4".to_string(), "Member Code".to_string(), "Date".to_string()];

        assert_eq!(check_template(&template, &expected), vec!["Member Code".to_string()]);
        assert!(check_template(&template, &expected[..1]).is_empty());
    }

    #[test]
    fn test_unfilled_fields() {
        let template = fields(&["Date", "Notes", "Remarks"]);
        let mut values = FieldValues::new();
        values.insert("Date".into(), "19/10/2026".into());
        values.insert("Notes".into(), String::new());

        assert_eq!(
            unfilled_fields(&template, &values),
            vec!["Notes".to_string(), "Remarks".to_string()]
        );
    }
}
