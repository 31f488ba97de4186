//! Derivation rules for EFS form values.
//!
//! Pure formatting and computation helpers used by the loader: date
//! reformatting, month/year extraction, notional and commodity code
//! derivation, number rendering.

use chrono::{Datelike, NaiveDateTime};

/// Lots × contract size × price unit factor.
pub const NOTIONAL_MULTIPLIER: f64 = 5.0 * 10.0;

/// Exchange product prefix of the commodity code.
pub const COMMODITY_PREFIX: &str = "OR";

/// Futures month codes keyed by uppercase month abbreviation.
pub const MONTH_CODES: [(&str, char); 12] = [
    ("JAN", 'F'),
    ("FEB", 'G'),
    ("MAR", 'H'),
    ("APR", 'J'),
    ("MAY", 'K'),
    ("JUN", 'M'),
    ("JUL", 'N'),
    ("AUG", 'Q'),
    ("SEP", 'U'),
    ("OCT", 'V'),
    ("NOV", 'X'),
    ("DEC", 'Z'),
];

/// `DD/MM/YYYY`
pub fn format_date(dt: &NaiveDateTime) -> String {
    dt.format("%d/%m/%Y").to_string()
}

/// Uppercase English month abbreviation, e.g. `JUL`.
pub fn month_abbrev(dt: &NaiveDateTime) -> String {
    dt.format("%b").to_string().to_uppercase()
}

/// Two-digit year, e.g. `21`.
pub fn short_year(dt: &NaiveDateTime) -> String {
    format!("{:02}", dt.year().rem_euclid(100))
}

/// Futures month letter for an uppercase month abbreviation.
pub fn month_code(abbrev: &str) -> Option<char> {
    MONTH_CODES
        .iter()
        .find(|(month, _)| *month == abbrev)
        .map(|(_, code)| *code)
}

/// Prefix + month letter + two-digit year, e.g. `ORN21`.
pub fn commodity_code(prefix: &str, month_abbrev: &str, year: &str) -> Option<String> {
    month_code(month_abbrev).map(|letter| format!("{}{}{}", prefix, letter, year))
}

/// Notional from price and quantity in lots; the EFS multiplier is
/// [`NOTIONAL_MULTIPLIER`].
pub fn notional(price: f64, quantity: f64, multiplier: f64) -> f64 {
    price * quantity * multiplier
}

/// Zero decimals with comma thousands separators, e.g. `720,400`.
pub fn format_thousands(value: f64) -> String {
    let rounded = format!("{:.0}", value);
    let (sign, digits) = match rounded.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rounded.as_str()),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if grouped == "0" {
        // no "-0"
        return grouped;
    }
    format!("{}{}", sign, grouped)
}

/// Integral values without decimals, others in shortest round-trip form.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(&dt(2021, 1, 29)), "29/01/2021");
        assert_eq!(format_date(&dt(2021, 8, 31)), "31/08/2021");
    }

    #[test]
    fn test_month_and_year() {
        let shipment = dt(2021, 7, 1);
        assert_eq!(month_abbrev(&shipment), "JUL");
        assert_eq!(short_year(&shipment), "21");
        assert_eq!(short_year(&dt(2005, 1, 1)), "05");
    }

    #[test]
    fn test_month_codes_cover_every_month() {
        for month in 1..=12 {
            let abbrev = month_abbrev(&dt(2021, month, 1));
            assert!(month_code(&abbrev).is_some(), "{}", abbrev);
        }
        assert_eq!(month_code("Jul"), None);
    }

    #[test]
    fn test_commodity_code() {
        assert_eq!(commodity_code(COMMODITY_PREFIX, "JUL", "21").as_deref(), Some("ORN21"));
        assert_eq!(commodity_code(COMMODITY_PREFIX, "JAN", "22").as_deref(), Some("ORF22"));
        assert_eq!(commodity_code(COMMODITY_PREFIX, "???", "22"), None);
    }

    #[test]
    fn test_notional() {
        assert_eq!(format_thousands(notional(180.1, 80.0, NOTIONAL_MULTIPLIER)), "720,400");
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0.0), "0");
        assert_eq!(format_thousands(999.4), "999");
        assert_eq!(format_thousands(1000.0), "1,000");
        assert_eq!(format_thousands(1234567.0), "1,234,567");
        assert_eq!(format_thousands(-98765.0), "-98,765");
        assert_eq!(format_thousands(-0.2), "0");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(80.0), "80");
        assert_eq!(format_number(180.1), "180.1");
        assert_eq!(format_number(-2.5), "-2.5");
    }
}
