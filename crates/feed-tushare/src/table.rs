//! Accessors for Tushare's tabular payload (`fields` + `items`).

use chrono::NaiveDate;
use feed_core::{Symbol, time::parse_compact_date};
use serde::Deserialize;
use serde_json::Value;

/// Column names plus rows of positional values.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Table {
    pub(crate) fields: Vec<String>,
    pub(crate) items: Vec<Vec<Value>>,
}

impl Table {
    pub(crate) fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        self.items.iter().map(move |values| Row {
            fields: &self.fields,
            values,
        })
    }
}

/// One row, addressed by column name.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Row<'a> {
    fields: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    fn get(&self, name: &str) -> Option<&'a Value> {
        let index = self.fields.iter().position(|f| f == name)?;
        self.values.get(index)
    }

    /// Non-empty trimmed string cell.
    pub(crate) fn str(&self, name: &str) -> Option<&'a str> {
        self.get(name)?
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Numeric cell; numeric strings are accepted too.
    pub(crate) fn f64(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// `YYYYMMDD` date cell.
    pub(crate) fn date(&self, name: &str) -> Option<NaiveDate> {
        parse_compact_date(self.str(name)?)
    }

    /// `ts_code`-style symbol cell.
    pub(crate) fn symbol(&self, name: &str) -> Option<Symbol> {
        Symbol::parse(self.str(name)?).ok()
    }
}
