//! Data loader
//!
//! Turns a parsed source table into typed trade records. The column layout
//! (which columns exist, which derivable fields must be computed) is resolved
//! once from the header row; every row then goes through the same layout.
//! The first bad row aborts the load.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{LoadError, LoadResult};
use crate::models::{Derived, Side, TradeRecord};
use crate::parser::{read_source, Cell, SourceFormat, SourceRow, SourceTable};

use super::mapping::{
    CommodityCodeRule, FieldMapping, FieldSource, NotionalRule, COMMODITY_CODE, EXPIRY_DATE,
    NOTIONAL, PRICE, QUANTITY, SHIPMENT, START_DATE, TRANSACTION_TYPE,
};
use super::rules::{
    commodity_code, month_abbrev, notional, short_year, COMMODITY_PREFIX, NOTIONAL_MULTIPLIER,
};

static EMPTY_CELL: Cell = Cell::Empty;

/// Column positions and derivation policies for one input.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    pub start_date: usize,
    pub expiry_date: usize,
    pub shipment: usize,
    pub price: usize,
    pub quantity: usize,
    pub notional: FieldSource<NotionalRule>,
    pub commodity_code: FieldSource<CommodityCodeRule>,
    pub side: Option<usize>,
    /// (index, header) of columns passed through untouched.
    pub extra: Vec<(usize, String)>,
}

impl ColumnLayout {
    /// Resolve the layout from a header row.
    pub fn resolve(headers: &[String]) -> LoadResult<Self> {
        if let Err(missing) = FieldMapping::validate_headers(headers) {
            // Report the first one, in required-column order.
            return Err(LoadError::MissingColumn(missing[0].clone()));
        }

        let index = |name: &str| headers.iter().position(|h| h == name);
        let required = |name: &str| index(name).ok_or_else(|| LoadError::MissingColumn(name.to_string()));

        let consumed = [
            START_DATE,
            EXPIRY_DATE,
            SHIPMENT,
            PRICE,
            QUANTITY,
            NOTIONAL,
            COMMODITY_CODE,
            TRANSACTION_TYPE,
        ];
        let extra = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.is_empty() && !consumed.contains(&h.as_str()))
            .map(|(i, h)| (i, h.clone()))
            .collect();

        Ok(Self {
            start_date: required(START_DATE)?,
            expiry_date: required(EXPIRY_DATE)?,
            shipment: required(SHIPMENT)?,
            price: required(PRICE)?,
            quantity: required(QUANTITY)?,
            notional: FieldSource::resolve(
                headers,
                NOTIONAL,
                NotionalRule {
                    multiplier: NOTIONAL_MULTIPLIER,
                },
            ),
            commodity_code: FieldSource::resolve(
                headers,
                COMMODITY_CODE,
                CommodityCodeRule {
                    prefix: COMMODITY_PREFIX,
                },
            ),
            side: index(TRANSACTION_TYPE),
            extra,
        })
    }
}

/// Records loaded from one input file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedBatch {
    pub headers: Vec<String>,
    pub format: SourceFormat,
    pub records: Vec<TradeRecord>,
}

/// Read and transform an input file.
pub fn load_records<P: AsRef<Path>>(path: P) -> LoadResult<LoadedBatch> {
    let table = read_source(path)?;
    let records = transform_table(&table)?;
    Ok(LoadedBatch {
        headers: table.headers,
        format: table.format,
        records,
    })
}

/// Transform every row of a parsed table.
pub fn transform_table(table: &SourceTable) -> LoadResult<Vec<TradeRecord>> {
    let layout = ColumnLayout::resolve(&table.headers)?;
    table
        .rows
        .iter()
        .map(|row| transform_row(row, &layout, &table.headers))
        .collect()
}

/// Transform a single row under a resolved layout.
pub fn transform_row(
    row: &SourceRow,
    layout: &ColumnLayout,
    headers: &[String],
) -> LoadResult<TradeRecord> {
    let cell = |idx: usize| row.cells.get(idx).unwrap_or(&EMPTY_CELL);
    let date = |idx: usize| parse_date(cell(idx), row.number, &headers[idx]);
    let number = |idx: usize| parse_number(cell(idx), row.number, &headers[idx]);

    let start_date = date(layout.start_date)?;
    let expiry_date = date(layout.expiry_date)?;
    let shipment = date(layout.shipment)?;
    let price = number(layout.price)?;
    let quantity = number(layout.quantity)?;

    let notional = match layout.notional {
        FieldSource::Provided(idx) => Derived::Provided(number(idx)?),
        FieldSource::Computed(NotionalRule { multiplier }) => {
            Derived::Computed(notional(price, quantity, multiplier))
        }
    };

    let commodity_code = match layout.commodity_code {
        FieldSource::Provided(idx) => Derived::Provided(cell(idx).display()),
        FieldSource::Computed(CommodityCodeRule { prefix }) => {
            let month = month_abbrev(&shipment);
            // unreachable with chrono's English month names
            let code = commodity_code(prefix, &month, &short_year(&shipment)).ok_or_else(|| {
                LoadError::InvalidDate {
                    row: row.number,
                    column: SHIPMENT.to_string(),
                    value: cell(layout.shipment).display(),
                }
            })?;
            Derived::Computed(code)
        }
    };

    let side = match layout.side {
        Some(idx) => {
            let raw = cell(idx).display();
            let side = Side::from_transaction_type(&raw).ok_or(LoadError::InvalidSide {
                row: row.number,
                value: raw,
            })?;
            Some(side)
        }
        None => None,
    };

    let extra: BTreeMap<String, String> = layout
        .extra
        .iter()
        .map(|(idx, header)| (header.clone(), cell(*idx).display()))
        .collect();

    Ok(TradeRecord {
        row: row.number,
        start_date,
        expiry_date,
        shipment,
        price,
        quantity,
        notional,
        commodity_code,
        side,
        extra,
    })
}

fn parse_date(cell: &Cell, row: usize, column: &str) -> LoadResult<NaiveDateTime> {
    cell.as_datetime().ok_or_else(|| LoadError::InvalidDate {
        row,
        column: column.to_string(),
        value: cell.display(),
    })
}

fn parse_number(cell: &Cell, row: usize, column: &str) -> LoadResult<f64> {
    cell.as_number().ok_or_else(|| LoadError::InvalidNumber {
        row,
        column: column.to_string(),
        value: cell.display(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldValues;
    use crate::parser::parse_delimited;
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

    const HEADER: &str = "Start Date;Expiry Date;Shipment;Rounded strike;Total Quantity (lots)";

    fn table(csv: &str) -> SourceTable {
        parse_delimited(csv, ';', "utf-8".into()).unwrap()
    }

    #[test]
    fn test_derives_missing_columns() {
        let t = table(&format!("{}\n2021-01-29;2021-08-31;2021-07-01;180.1;80", HEADER));
        let records = transform_table(&t).unwrap();

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.row, 2);
        assert_eq!(r.shipment_month(), "JUL");
        assert_eq!(r.shipment_year(), "21");
        assert!(r.notional.is_computed());
        assert!((r.notional.value() - 720_400.0).abs() < 1e-6);
        assert_eq!(r.commodity_code, Derived::Computed("ORN21".into()));
        assert_eq!(r.side, None);
    }

    #[test]
    fn test_provided_columns_win() {
        let csv = format!(
            "{};Notional;Commodity Code;Transaction Type\n\
             2021-01-29;2021-08-31;2021-07-01;180.1;80;\"1,000,000\";ORU21;Long",
            HEADER
        );
        let records = transform_table(&table(&csv)).unwrap();
        let r = &records[0];

        assert_eq!(r.notional, Derived::Provided(1_000_000.0));
        assert_eq!(r.commodity_code, Derived::Provided("ORU21".into()));
        assert_eq!(r.side, Some(Side::Long));
    }

    #[test]
    fn test_layout_resolved_once() {
        let headers: Vec<String> = format!("{};Trader", HEADER)
            .split(';')
            .map(String::from)
            .collect();
        let layout = ColumnLayout::resolve(&headers).unwrap();

        assert_eq!(layout.notional, FieldSource::Computed(NotionalRule { multiplier: 50.0 }));
        assert_eq!(layout.commodity_code, FieldSource::Computed(CommodityCodeRule { prefix: "OR" }));
        assert_eq!(layout.side, None);
        assert_eq!(layout.extra, vec![(5, "Trader".to_string())]);
    }

    #[test]
    fn test_missing_column_aborts() {
        let t = table("Start Date;Expiry Date;Shipment;Rounded strike\n2021-01-29;2021-08-31;2021-07-01;180.1");
        let err = transform_table(&t).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn(ref c) if c == "Total Quantity (lots)"));
    }

    #[test]
    fn test_bad_date_aborts_whole_load() {
        let csv = format!(
            "{}\n2021-01-29;2021-08-31;2021-07-01;180.1;80\nsoon;2021-08-31;2021-07-01;180.1;80",
            HEADER
        );
        let err = transform_table(&table(&csv)).unwrap_err();
        match err {
            LoadError::InvalidDate { row, column, value } => {
                assert_eq!(row, 3);
                assert_eq!(column, "Start Date");
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_number_aborts() {
        let csv = format!("{}\n2021-01-29;2021-08-31;2021-07-01;abc;80", HEADER);
        assert!(matches!(
            transform_table(&table(&csv)),
            Err(LoadError::InvalidNumber { row: 2, .. })
        ));
    }

    #[test]
    fn test_unknown_side_aborts() {
        let csv = format!(
            "{};Transaction Type\n2021-01-29;2021-08-31;2021-07-01;180.1;80;Flat",
            HEADER
        );
        assert!(matches!(
            transform_table(&table(&csv)),
            Err(LoadError::InvalidSide { row: 2, ref value }) if value == "Flat"
        ));
    }

    #[test]
    fn test_load_records_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.csv");
        std::fs::write(
            &path,
            format!("{}\n2021-01-29;2021-08-31;2021-07-01;180.1;80\n2021-02-01;2021-09-30;2021-09-01;175;20\n", HEADER),
        )
        .unwrap();

        let batch = load_records(&path).unwrap();
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[1].commodity_code.value(), "ORU21");
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            load_records("/definitely/not/here.xlsx"),
            Err(LoadError::Source(_))
        ));
    }

    /// xlsx with date-formatted cells; headers on 0-based sheet row `header_row`.
    /// Each trade is (shipment month, price, quantity, transaction type).
    fn write_trades_xlsx(path: &Path, header_row: u32, trades: &[(u8, f64, f64, &str)]) {
        let mut workbook = Workbook::new();
        let date = Format::new().set_num_format("yyyy-mm-dd");
        let sheet = workbook.add_worksheet();

        let headers = [START_DATE, EXPIRY_DATE, SHIPMENT, PRICE, QUANTITY, TRANSACTION_TYPE];
        for (col, header) in headers.iter().enumerate() {
            sheet.write_string(header_row, col as u16, *header).unwrap();
        }
        for (i, (month, price, quantity, side)) in trades.iter().enumerate() {
            let row = header_row + 1 + i as u32;
            let start = ExcelDateTime::from_ymd(2021, 1, 29).unwrap();
            let expiry = ExcelDateTime::from_ymd(2021, 8, 31).unwrap();
            let shipment = ExcelDateTime::from_ymd(2021, *month, 1).unwrap();
            sheet.write_datetime_with_format(row, 0, &start, &date).unwrap();
            sheet.write_datetime_with_format(row, 1, &expiry, &date).unwrap();
            sheet.write_datetime_with_format(row, 2, &shipment, &date).unwrap();
            sheet.write_number(row, 3, *price).unwrap();
            sheet.write_number(row, 4, *quantity).unwrap();
            sheet.write_string(row, 5, *side).unwrap();
        }
        workbook.save(path).unwrap();
    }

    #[test]
    fn test_load_records_from_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.xlsx");
        write_trades_xlsx(&path, 0, &[(7, 180.1, 80.0, "Short"), (9, 175.0, 20.0, "Long")]);

        let batch = load_records(&path).unwrap();
        assert_eq!(batch.format, SourceFormat::Workbook);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].row, 2);
        assert_eq!(batch.records[1].side, Some(Side::Long));

        let fields: FieldValues = batch.records[0].to_fields(&FieldMapping::efs());
        assert_eq!(fields["undefined_12"], "29/01/2021");
        assert_eq!(fields["undefined_13"], "31/08/2021");
        assert_eq!(fields["undefined_2"], "JUL");
        assert_eq!(fields["undefined_4"], "180.1");
        assert_eq!(fields["undefined_3"], "80");
        assert_eq!(fields["undefined_16"], "720,400");
        assert_eq!(fields["Commodity Code  Contract Month"], "ORN21");
        assert_eq!(fields["Seller"], "On");
        assert_eq!(fields["Buyer"], "Off");

        assert_eq!(batch.records[1].commodity_code.value(), "ORU21");
    }

    #[test]
    fn test_workbook_rows_numbered_from_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.xlsx");
        // headers on sheet row 3, data on rows 4 and 5
        write_trades_xlsx(&path, 2, &[(7, 180.1, 80.0, "Short"), (7, 180.1, 80.0, "Flat")]);

        assert!(matches!(
            load_records(&path),
            Err(LoadError::InvalidSide { row: 5, ref value }) if value == "Flat"
        ));
    }
}
