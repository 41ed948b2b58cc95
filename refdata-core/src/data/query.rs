//! Typed query builder.
//!
//! A [`Query`] names a view, a [`Filter`], a [`FieldList`] and an optional
//! ordering field. The filter renders to the opaque `k1=v1&k2=v2` expression
//! the record service understands; the panel engine never sees that string.

use crate::domain::{SymbolList, TradeTime, TradingDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// View names understood by the record service.
pub mod views {
    pub const DAILY: &str = "market.daily";
    pub const BAR: &str = "market.bar";
    pub const TICK: &str = "market.tick";
    pub const QUOTE: &str = "market.quote";
    pub const INDEX_WEIGHT: &str = "lb.indexWeight";
    pub const INDEX_CONS: &str = "lb.indexCons";
    pub const SEC_INDUSTRY: &str = "lb.secIndustry";
    pub const SEC_ADJ_FACTOR: &str = "lb.secAdjFactor";
    pub const SEC_DAILY_INDICATOR: &str = "lb.secDailyIndicator";
    pub const INCOME: &str = "lb.income";
    pub const CASH_FLOW: &str = "lb.cashFlow";
    pub const BALANCE_SHEET: &str = "lb.balanceSheet";
    pub const FIN_INDICATOR: &str = "lb.finIndicator";
    pub const INSTRUMENT_INFO: &str = "jz.instrumentInfo";
}

/// Ordered key/value filter conditions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Filter(Vec<(String, String)>);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a condition. Insertion order is kept in the rendered form.
    pub fn set(mut self, key: &str, value: impl fmt::Display) -> Self {
        let value = value.to_string();
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key.to_string(), value)),
        }
        self
    }

    pub fn symbols(self, symbols: &SymbolList) -> Self {
        self.set("symbol", symbols.joined())
    }

    pub fn date(self, key: &str, date: TradingDate) -> Self {
        self.set(key, date)
    }

    /// A date condition that renders as an empty value when absent.
    pub fn optional_date(self, key: &str, date: Option<TradingDate>) -> Self {
        match date {
            Some(d) => self.set(key, d),
            None => self.set(key, ""),
        }
    }

    pub fn time(self, key: &str, time: TradeTime) -> Self {
        self.set(key, time)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a rendered `k1=v1&k2=v2` expression back into conditions.
    pub fn parse(expr: &str) -> Self {
        expr.split('&')
            .filter(|part| !part.trim().is_empty())
            .fold(Filter::new(), |f, part| match part.split_once('=') {
                Some((k, v)) => f.set(k.trim(), v.trim()),
                None => f.set(part.trim(), ""),
            })
    }

    /// The opaque expression sent to the record service.
    pub fn render(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// Comma-separated field names. Empty means "all fields".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldList(Vec<String>);

impl FieldList {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn parse(list: &str) -> Self {
        Self(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    pub fn of(fields: &[&str]) -> Self {
        Self(fields.iter().map(|s| s.to_string()).collect())
    }

    pub fn is_all(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Append fields the caller needs regardless of what was requested.
    ///
    /// Has no effect on an "all fields" list.
    pub fn with_required(mut self, required: &[&str]) -> Self {
        if self.is_all() {
            return self;
        }
        for field in required {
            if !self.0.iter().any(|f| f == field) {
                self.0.push(field.to_string());
            }
        }
        self
    }

    pub fn render(&self) -> String {
        self.0.join(",")
    }
}

impl fmt::Display for FieldList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// A complete request against one view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub view: String,
    pub filter: Filter,
    pub fields: FieldList,
    pub order_by: Option<String>,
}

impl Query {
    pub fn new(view: &str) -> Self {
        Self {
            view: view.to_string(),
            filter: Filter::new(),
            fields: FieldList::all(),
            order_by: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn fields(mut self, fields: FieldList) -> Self {
        self.fields = fields;
        self
    }

    pub fn order_by(mut self, field: &str) -> Self {
        self.order_by = Some(field.to_string());
        self
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?{}", self.view, self.filter.render())?;
        if !self.fields.is_all() {
            write!(f, " fields={}", self.fields.render())?;
        }
        if let Some(order) = &self.order_by {
            write!(f, " order_by={order}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_renders_in_insertion_order() {
        let f = Filter::new()
            .set("index_code", "399300.SZ")
            .date("start_date", TradingDate::from_int(20200101).unwrap())
            .set("end_date", 20200301);
        assert_eq!(
            f.render(),
            "index_code=399300.SZ&start_date=20200101&end_date=20200301"
        );
    }

    #[test]
    fn filter_set_replaces_existing_key() {
        let f = Filter::new().set("symbol", "A").set("symbol", "B");
        assert_eq!(f.render(), "symbol=B");
    }

    #[test]
    fn filter_parse_inverts_render() {
        let f = Filter::parse("symbol=600030.SH,000001.SZ&start_date=20200101&end_date=");
        assert_eq!(f.get("symbol"), Some("600030.SH,000001.SZ"));
        assert_eq!(f.get("end_date"), Some(""));
        assert_eq!(Filter::parse(&f.render()), f);
    }

    #[test]
    fn field_list_empty_means_all() {
        assert!(FieldList::parse("").is_all());
        assert!(FieldList::parse(" , ").is_all());
        assert_eq!(FieldList::parse("open, close").render(), "open,close");
        assert!(FieldList::all().with_required(&["symbol"]).is_all());
        assert_eq!(
            FieldList::parse("close").with_required(&["symbol", "close"]).render(),
            "close,symbol"
        );
    }
}
