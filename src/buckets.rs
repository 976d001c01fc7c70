use crate::error::{ReportError, Result};
use crate::types::{AggregatedTable, BucketRow, Measure};
use crate::util::{ratio_or_zero, round2};

/// Sort and deduplicate user breakpoints; an empty list is a configuration error.
pub fn normalize_breakpoints(breakpoints: &[i64]) -> Result<Vec<i64>> {
    if breakpoints.is_empty() {
        return Err(ReportError::EmptyBreakpoints);
    }
    let mut sorted = breakpoints.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    Ok(sorted)
}

/// Labels for the N+1 bands induced by sorted breakpoints.
pub fn bucket_labels(sorted: &[i64]) -> Vec<String> {
    let mut labels = Vec::with_capacity(sorted.len() + 1);
    if let Some(first) = sorted.first() {
        labels.push(format!("<= {}", first));
    }
    for pair in sorted.windows(2) {
        labels.push(format!("{} < esp <= {}", pair[0], pair[1]));
    }
    if let Some(last) = sorted.last() {
        labels.push(format!("> {}", last));
    }
    labels
}

/// Index of the band holding `espesor`. Upper bounds are inclusive.
pub fn bucket_index(sorted: &[i64], espesor: f64) -> usize {
    sorted
        .iter()
        .position(|b| espesor <= *b as f64)
        .unwrap_or(sorted.len())
}

/// Sum aggregated rows into thickness bands.
///
/// `mm_total` is accumulated per row (espesor × perforaTotal) before the band
/// sum. Every band is present, empty ones with zero sums. `Costo mm` is left at
/// zero for the allocator to fill in.
pub fn bucketize(table: &AggregatedTable, breakpoints: &[i64]) -> Result<Vec<BucketRow>> {
    let sorted = normalize_breakpoints(breakpoints)?;
    let mut buckets: Vec<BucketRow> = bucket_labels(&sorted)
        .into_iter()
        .map(|label| BucketRow {
            label,
            rows: 0,
            kg: 0.0,
            tiempo: 0.0,
            tiempo_seteo: 0.0,
            placas: 0.0,
            process_minutes: 0.0,
            mm_total: 0.0,
            perforations: 0.0,
            cost_per_mm: 0.0,
        })
        .collect();

    for row in &table.rows {
        let perfora = row.get(Measure::PerforaTotal);
        let b = &mut buckets[bucket_index(&sorted, row.espesor)];
        b.rows += 1;
        b.kg += row.get(Measure::Kg);
        b.tiempo += row.get(Measure::Tiempo);
        b.tiempo_seteo += row.get(Measure::TiempoSeteo);
        b.placas += row.get(Measure::Placas);
        b.process_minutes += row.get(Measure::ProcessMinutes);
        b.mm_total += row.espesor * perfora;
        b.perforations += perfora;
    }
    Ok(buckets)
}

/// Perforation-weighted mean thickness, rounded to two decimals.
pub fn weighted_average_thickness(table: &AggregatedTable) -> f64 {
    let total = table.total(Measure::PerforaTotal);
    let weighted: f64 = table
        .rows
        .iter()
        .map(|r| r.espesor * r.get(Measure::PerforaTotal))
        .sum();
    round2(ratio_or_zero(weighted, total))
}
