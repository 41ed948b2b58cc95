use super::query::views;
use crate::domain::Record;
use crate::error::{RefDataError, Result};

/// Fields the panel engine requires from a view's rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSchema {
    pub view: &'static str,
    pub required: &'static [&'static str],
}

impl ViewSchema {
    pub const INDEX_WEIGHT: ViewSchema = ViewSchema {
        view: views::INDEX_WEIGHT,
        required: &["symbol", "trade_date", "weight"],
    };

    pub const INDEX_CONS: ViewSchema = ViewSchema {
        view: views::INDEX_CONS,
        required: &["symbol", "in_date", "out_date"],
    };

    pub const SEC_INDUSTRY: ViewSchema = ViewSchema {
        view: views::SEC_INDUSTRY,
        required: &["symbol", "in_date"],
    };

    pub const SEC_ADJ_FACTOR: ViewSchema = ViewSchema {
        view: views::SEC_ADJ_FACTOR,
        required: &["symbol", "trade_date", "adjust_factor"],
    };

    /// Check every row carries the required fields.
    ///
    /// A missing field is a malformed record, reported with its row number.
    pub fn validate(&self, rows: &[Record]) -> Result<()> {
        for (row, record) in rows.iter().enumerate() {
            if let Some(field) = self.required.iter().find(|f| !record.contains(f)) {
                return Err(RefDataError::MalformedRecord {
                    view: self.view.to_string(),
                    row,
                    field: field.to_string(),
                    value: "<missing>".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Validate one extra, caller-chosen field (e.g. an industry level column).
    pub fn validate_with(&self, rows: &[Record], extra: &str) -> Result<()> {
        self.validate(rows)?;
        match rows.iter().position(|r| !r.contains(extra)) {
            Some(row) => Err(RefDataError::MalformedRecord {
                view: self.view.to_string(),
                row,
                field: extra.to_string(),
                value: "<missing>".to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_rows_with_required_fields() {
        let rows = vec![Record::new()
            .with("symbol", "A")
            .with("trade_date", 20200102i64)
            .with("weight", 0.5)];
        assert!(ViewSchema::INDEX_WEIGHT.validate(&rows).is_ok());
        assert!(ViewSchema::INDEX_WEIGHT.validate(&[]).is_ok());
    }

    #[test]
    fn missing_field_names_row_and_field() {
        let rows = vec![
            Record::new().with("symbol", "A").with("in_date", 20200101i64).with("out_date", ""),
            Record::new().with("symbol", "B").with("in_date", 20200101i64),
        ];
        match ViewSchema::INDEX_CONS.validate(&rows).unwrap_err() {
            RefDataError::MalformedRecord { row, field, .. } => {
                assert_eq!(row, 1);
                assert_eq!(field, "out_date");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn extra_field_is_checked() {
        let rows = vec![Record::new().with("symbol", "A").with("in_date", 20200101i64)];
        assert!(ViewSchema::SEC_INDUSTRY.validate_with(&rows, "industry1").is_err());
    }
}
