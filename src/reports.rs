use crate::aggregate::filter_dedup_aggregate;
use crate::buckets::{bucketize, normalize_breakpoints, weighted_average_thickness};
use crate::config::{Selection, Settings};
use crate::cost::{allocate, traffic_shares};
use crate::error::Result;
use crate::filter::filter_by_year_month;
use crate::types::{
    AggregatedTable, DashboardReport, FlatRow, LineReport, LineSummary, Measure, Reductions,
    SummaryStats,
};
use tracing::{debug, info};

/// Run the full pipeline for every configured business line.
///
/// Breakpoints are checked before any work is done. A line with no rows in
/// the period still gets a report, with `has_data` unset and zero figures.
pub fn build_dashboard(
    rows: &[FlatRow],
    selection: &Selection,
    settings: &Settings,
) -> Result<DashboardReport> {
    selection.validate()?;
    normalize_breakpoints(&selection.breakpoints)?;

    let reductions = Reductions::default();
    let tables: Vec<AggregatedTable> = settings
        .business_lines
        .iter()
        .map(|line| {
            let period_rows = filter_by_year_month(
                rows,
                selection.year,
                selection.month,
                settings.line_column,
                line,
            );
            debug!(line = %line, rows = period_rows.len(), "rows in period");
            filter_dedup_aggregate(
                &period_rows,
                settings.progress_column,
                &settings.progress_value,
                &reductions,
            )
        })
        .collect();

    let totals: Vec<f64> = tables.iter().map(|t| t.total(Measure::PerforaTotal)).collect();
    let shares = traffic_shares(&totals);

    let mut lines = Vec::with_capacity(tables.len());
    for ((line, table), (perforations, share)) in settings
        .business_lines
        .iter()
        .zip(tables)
        .zip(totals.into_iter().zip(shares))
    {
        let report = line_report(line, table, perforations, share, selection)?;
        info!(
            line = %report.line,
            has_data = report.has_data,
            perforations = report.perforations,
            global_cost_per_mm = report.global_cost_per_mm,
            "line report built"
        );
        lines.push(report);
    }

    Ok(DashboardReport {
        year: selection.year,
        month: selection.month,
        budget: selection.budget,
        reference_cost: selection.reference_cost,
        lines,
    })
}

fn line_report(
    line: &str,
    table: AggregatedTable,
    perforations: f64,
    traffic_share: f64,
    selection: &Selection,
) -> Result<LineReport> {
    let buckets = bucketize(&table, &selection.breakpoints)?;
    let allocation = allocate(
        buckets,
        perforations,
        selection.budget,
        traffic_share,
        selection.reference_cost,
    );
    Ok(LineReport {
        line: line.to_string(),
        has_data: !table.is_empty(),
        traffic_share,
        avg_thickness: weighted_average_thickness(&table),
        mm_total: allocation.mm_total,
        global_cost_per_mm: allocation.global_cost_per_mm,
        margin: allocation.margin,
        perforations,
        buckets: allocation.buckets,
        aggregated: table,
    })
}

pub fn generate_summary(report: &DashboardReport) -> SummaryStats {
    SummaryStats {
        year: report.year,
        month: report.month,
        budget: report.budget,
        reference_cost: report.reference_cost,
        lines: report
            .lines
            .iter()
            .map(|l| LineSummary {
                line: l.line.clone(),
                has_data: l.has_data,
                traffic_share: l.traffic_share,
                avg_thickness: l.avg_thickness,
                mm_total: l.mm_total,
                global_cost_per_mm: l.global_cost_per_mm,
                margin: l.margin,
                perforations: l.perforations,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;
    use crate::flatten::flatten_records;
    use crate::flatten::tests::{progress, record};
    use crate::types::JobRecord;
    use approx::assert_abs_diff_eq;

    fn job(pv: &str, espesor: f64, placas: f64, per_plate: f64, line: &str) -> JobRecord {
        let mut r = record(pv, espesor, per_plate, vec![progress("Progreso", placas)]);
        r.negocio = line.to_string();
        r
    }

    fn selection(breakpoints: Vec<i64>) -> Selection {
        Selection::new(2024, 8, 1_000_000.0, 160.0, breakpoints).unwrap()
    }

    fn single_line_settings() -> Settings {
        Settings {
            business_lines: vec!["sabimet".to_string()],
            ..Settings::default()
        }
    }

    #[test]
    fn two_jobs_end_to_end() {
        let rows = flatten_records(&[
            job("A", 15.0, 2.0, 3.0, "sabimet"),
            job("B", 40.0, 1.0, 4.0, "sabimet"),
        ]);
        let report = build_dashboard(&rows, &selection(vec![20]), &single_line_settings()).unwrap();
        let line = &report.lines[0];

        assert!(line.has_data);
        assert_eq!(line.traffic_share, 1.0);
        assert_eq!(line.perforations, 10.0);
        assert_eq!(line.mm_total, 250.0);
        assert_eq!(line.global_cost_per_mm, 4000.0);
        assert_eq!(line.margin, -3840.0);

        let low = &line.buckets[0];
        assert_eq!(low.label, "<= 20");
        assert_eq!(low.mm_total, 90.0);
        assert_eq!(low.perforations, 6.0);
        assert_eq!(low.cost_per_mm, 6666.67);

        let high = &line.buckets[1];
        assert_eq!(high.label, "> 20");
        assert_eq!(high.mm_total, 160.0);
        assert_eq!(high.perforations, 4.0);
        assert_eq!(high.cost_per_mm, 2500.0);

        assert_eq!(line.avg_thickness, 25.0);
    }

    #[test]
    fn lines_split_traffic_share() {
        let rows = flatten_records(&[
            job("A", 15.0, 2.0, 3.0, "sabimet"),
            job("B", 40.0, 1.0, 4.0, "steelk"),
        ]);
        let report = build_dashboard(&rows, &selection(vec![20]), &Settings::default()).unwrap();
        let shares: Vec<f64> = report.lines.iter().map(|l| l.traffic_share).collect();
        assert_abs_diff_eq!(shares[0], 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(shares.iter().sum::<f64>(), 1.0, epsilon = 1e-12);

        let steelk = &report.lines[1];
        assert_eq!(steelk.line, "steelk");
        assert_eq!(steelk.perforations, 4.0);
        // 1,000,000 * 0.4 / 160
        assert_eq!(steelk.global_cost_per_mm, 2500.0);
    }

    #[test]
    fn empty_period_is_no_data_not_an_error() {
        let rows = flatten_records(&[job("A", 15.0, 2.0, 3.0, "sabimet")]);
        let sel = Selection::new(2023, 1, 1_000_000.0, 160.0, vec![12, 32]).unwrap();
        let report = build_dashboard(&rows, &sel, &Settings::default()).unwrap();
        for line in &report.lines {
            assert!(!line.has_data);
            assert_eq!(line.perforations, 0.0);
            assert_eq!(line.global_cost_per_mm, 0.0);
            assert_eq!(line.traffic_share, 0.0);
            assert_eq!(line.buckets.len(), 3);
            assert!(line.buckets.iter().all(|b| b.cost_per_mm == 0.0));
        }
    }

    #[test]
    fn non_progress_entries_are_ignored() {
        let mut r = record("A", 15.0, 3.0, vec![progress("Progreso", 2.0), progress("Corte", 5.0)]);
        r.negocio = "sabimet".to_string();
        let rows = flatten_records(&[r]);
        let report = build_dashboard(&rows, &selection(vec![20]), &single_line_settings()).unwrap();
        assert_eq!(report.lines[0].perforations, 6.0);
    }

    #[test]
    fn empty_breakpoints_block_computation() {
        let rows = flatten_records(&[job("A", 15.0, 2.0, 3.0, "sabimet")]);
        let sel = Selection {
            year: 2024,
            month: 8,
            budget: 1.0,
            reference_cost: 1.0,
            breakpoints: vec![],
        };
        let err = build_dashboard(&rows, &sel, &Settings::default()).unwrap_err();
        assert!(matches!(err, ReportError::EmptyBreakpoints));
    }

    #[test]
    fn summary_mirrors_line_reports() {
        let rows = flatten_records(&[job("A", 15.0, 2.0, 3.0, "sabimet")]);
        let report = build_dashboard(&rows, &selection(vec![20]), &Settings::default()).unwrap();
        let summary = generate_summary(&report);
        assert_eq!(summary.lines.len(), 2);
        assert_eq!(summary.lines[0].line, "sabimet");
        assert!(summary.lines[0].has_data);
        assert!(!summary.lines[1].has_data);
        assert_eq!(summary.month, 8);
    }
}
