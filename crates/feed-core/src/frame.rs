//! DataFrame export for bar series.

use polars::prelude::*;

use crate::{
    error::{DataError, Result},
    symbol::Symbol,
    types::OhlcvBar,
};

/// Converts a bar series into a DataFrame.
///
/// Columns: symbol, timestamp (UTC milliseconds), open, high, low, close,
/// volume, amount.
pub fn bars_to_dataframe(symbol: &Symbol, bars: &[OhlcvBar]) -> Result<DataFrame> {
    let symbol_str = symbol.to_string();
    let symbols: Vec<&str> = vec![symbol_str.as_str(); bars.len()];
    let timestamps: Vec<i64> = bars.iter().map(|b| b.timestamp.timestamp_millis()).collect();

    let timestamp_col = Column::new("timestamp".into(), timestamps)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
        .map_err(|e| DataError::Other(e.to_string()))?;

    DataFrame::new(vec![
        Column::new("symbol".into(), symbols),
        timestamp_col,
        Column::new("open".into(), bars.iter().map(|b| b.open).collect::<Vec<_>>()),
        Column::new("high".into(), bars.iter().map(|b| b.high).collect::<Vec<_>>()),
        Column::new("low".into(), bars.iter().map(|b| b.low).collect::<Vec<_>>()),
        Column::new("close".into(), bars.iter().map(|b| b.close).collect::<Vec<_>>()),
        Column::new("volume".into(), bars.iter().map(|b| b.volume).collect::<Vec<_>>()),
        Column::new(
            "amount".into(),
            bars.iter().map(|b| b.amount).collect::<Vec<Option<f64>>>(),
        ),
    ])
    .map_err(|e| DataError::Other(e.to_string()))
}
