use crate::types::{FlatRow, TextColumn};
use chrono::Datelike;

/// Rows completed in (`year`, `month`) whose `column` equals `line`.
///
/// Rows without a parseable completion timestamp never match. Input order is
/// kept.
pub fn filter_by_year_month(
    rows: &[FlatRow],
    year: i32,
    month: u32,
    column: TextColumn,
    line: &str,
) -> Vec<FlatRow> {
    rows.iter()
        .filter(|r| match r.terminado {
            Some(done) => done.year() == year && done.month() == month,
            None => false,
        })
        .filter(|r| column.value(r) == line)
        .cloned()
        .collect()
}
