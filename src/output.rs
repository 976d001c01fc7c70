use crate::error::Result;
use crate::types::{AggregatedTable, BucketDisplayRow, BucketRow, LineReport, MetricCard};
use crate::util::{format_number, round2};
use serde::Serialize;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize, P: AsRef<Path>>(path: P, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize, P: AsRef<Path>>(path: P, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Write the aggregated table with only its visible columns.
pub fn write_aggregated_csv<P: AsRef<Path>>(path: P, table: &AggregatedTable) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    let mut header = vec!["pv".to_string(), "espesor".to_string()];
    header.extend(table.columns.iter().map(|m| m.header().to_string()));
    wtr.write_record(&header)?;
    for row in &table.rows {
        let mut record = vec![row.pv.clone(), row.espesor.to_string()];
        record.extend(table.columns.iter().map(|m| row.get(*m).to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn metric_cards(report: &LineReport) -> Vec<MetricCard> {
    let card = |name: &str, value: String| MetricCard {
        name: name.to_string(),
        value,
    };
    vec![
        card("Espesor Promedio", format_number(report.avg_thickness, 2)),
        card("MM Total", format_number(report.mm_total, 2)),
        card("Costo Global/mm", format_number(report.global_cost_per_mm, 2)),
        card("Diferencia", format_number(round2(report.margin), 2)),
        card("Perforaciones", format_number(report.perforations, 0)),
    ]
}

pub fn bucket_display_rows(buckets: &[BucketRow]) -> Vec<BucketDisplayRow> {
    buckets
        .iter()
        .map(|b| BucketDisplayRow {
            label: b.label.clone(),
            kg: format_number(b.kg, 2),
            tiempo: format_number(b.tiempo, 2),
            tiempo_seteo: format_number(b.tiempo_seteo, 2),
            mm_total: format_number(b.mm_total, 2),
            perforations: format_number(b.perforations, 0),
            cost_per_mm: format_number(b.cost_per_mm, 2),
        })
        .collect()
}

pub fn render_table<T: Tabled>(rows: &[T]) -> String
where
    T: Clone,
{
    if rows.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(rows.to_vec()).with(Style::markdown()).to_string()
}

pub fn render_aggregated(table: &AggregatedTable, max_rows: usize) -> String {
    if table.rows.is_empty() {
        return "(no rows)".to_string();
    }
    let mut builder = Builder::default();
    let mut header = vec!["pv".to_string(), "espesor".to_string()];
    header.extend(table.columns.iter().map(|m| m.header().to_string()));
    builder.push_record(header);
    for row in table.rows.iter().take(max_rows) {
        let mut record = vec![row.pv.clone(), format_number(row.espesor, 2)];
        record.extend(table.columns.iter().map(|m| format_number(row.get(*m), 2)));
        builder.push_record(record);
    }
    builder.build().with(Style::markdown()).to_string()
}

/// Print one business line's section: cards and the thickness table, or an
/// explicit no-data notice.
pub fn print_line_section(report: &LineReport, reference_cost: f64) {
    println!("== {} ==\n", report.line);
    if !report.has_data {
        println!("No data for this period.\n");
        return;
    }
    println!("{}", render_table(&metric_cards(report)));
    println!(
        "(Diferencia: {}$ against {}$)\n",
        format_number(round2(report.margin), 2),
        format_number(reference_cost, 2)
    );
    println!("Espesores\n");
    println!("{}\n", render_table(&bucket_display_rows(&report.buckets)));
    let total = report.aggregated.rows.len();
    println!("Trabajos (first {} of {})\n", PREVIEW_ROWS.min(total), total);
    println!("{}\n", render_aggregated(&report.aggregated, PREVIEW_ROWS));
}

const PREVIEW_ROWS: usize = 5;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AggregatedRow, Measure};
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn table() -> AggregatedTable {
        let mut values = BTreeMap::new();
        values.insert(Measure::PerforaTotal, 6.0);
        values.insert(Measure::TiempoSeteo, 0.0);
        AggregatedTable {
            rows: vec![AggregatedRow {
                pv: "PV-1".to_string(),
                espesor: 15.0,
                values,
            }],
            columns: vec![Measure::PerforaTotal],
        }
    }

    #[test]
    fn aggregated_csv_only_has_visible_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("agg.csv");
        write_aggregated_csv(&path, &table()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["pv,espesor,perforaTotal", "PV-1,15,6"]);
    }

    #[test]
    fn bucket_csv_uses_report_headers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("buckets.csv");
        let rows = vec![BucketRow {
            label: "<= 12".to_string(),
            rows: 1,
            kg: 1.0,
            tiempo: 2.0,
            tiempo_seteo: 3.0,
            placas: 4.0,
            process_minutes: 5.0,
            mm_total: 6.0,
            perforations: 7.0,
            cost_per_mm: 8.5,
        }];
        write_csv(&path, &rows).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some(concat!(
                "Espesor,Trabajos,kg,tiempo,tiempo_seteo,placas,",
                "Tiempo Proceso (min),mm_total,Perforaciones,Costo mm"
            ))
        );
        assert_eq!(lines.next(), Some("<= 12,1,1.0,2.0,3.0,4.0,5.0,6.0,7.0,8.5"));
    }

    #[test]
    fn renders_markdown_tables() {
        let out = render_aggregated(&table(), 10);
        assert!(out.contains("perforaTotal"));
        assert!(!out.contains("tiempo_seteo"));
        assert_eq!(render_aggregated(&AggregatedTable::default(), 10), "(no rows)");
    }
}
