use crate::types::{AggregatedRow, AggregatedTable, FlatRow, Reduction, Reductions, TextColumn};
use crate::util::average;
use chrono::{DateTime, FixedOffset};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Filter, deduplicate, group by (pv, espesor), reduce, then hide all-zero
/// columns. This is the table the dashboard shows for one business line.
pub fn filter_dedup_aggregate(
    rows: &[FlatRow],
    column: TextColumn,
    value: &str,
    reductions: &Reductions,
) -> AggregatedTable {
    let mut table = aggregate(rows, column, value, reductions);
    drop_zero_columns(&mut table);
    table
}

/// Group rows by (pv, espesor) and reduce each group per `reductions`.
///
/// Only rows whose `column` equals `value` take part, and exact duplicate rows
/// are counted once. Groups come out ordered by pv, then espesor.
pub fn aggregate(
    rows: &[FlatRow],
    column: TextColumn,
    value: &str,
    reductions: &Reductions,
) -> AggregatedTable {
    let kept: Vec<&FlatRow> = rows.iter().filter(|r| column.value(r) == value).collect();
    let unique = dedup_rows(&kept);

    let mut index: HashMap<(String, u64), usize> = HashMap::new();
    let mut groups: Vec<(String, f64, Vec<&FlatRow>)> = Vec::new();
    for r in unique.iter().copied() {
        let key = (r.pv.clone(), float_key(r.espesor));
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push((r.pv.clone(), r.espesor, Vec::new()));
            groups.len() - 1
        });
        groups[slot].2.push(r);
    }
    groups.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
    });

    let out: Vec<AggregatedRow> = groups
        .into_iter()
        .map(|(pv, espesor, members)| {
            let values = reductions
                .0
                .iter()
                .map(|(measure, reduction)| {
                    let present: Vec<f64> =
                        members.iter().filter_map(|r| measure.value(r)).collect();
                    let reduced = match reduction {
                        Reduction::Sum => present.iter().sum(),
                        Reduction::Mean => average(&present),
                    };
                    (*measure, reduced)
                })
                .collect::<BTreeMap<_, _>>();
            AggregatedRow { pv, espesor, values }
        })
        .collect();

    debug!(
        kept = kept.len(),
        unique = unique.len(),
        groups = out.len(),
        "aggregated rows"
    );
    AggregatedTable {
        rows: out,
        columns: reductions.0.iter().map(|(m, _)| *m).collect(),
    }
}

/// Hide measure columns that are exactly zero in every row.
///
/// An empty table keeps its columns.
pub fn drop_zero_columns(table: &mut AggregatedTable) {
    if table.rows.is_empty() {
        return;
    }
    let rows = &table.rows;
    table
        .columns
        .retain(|m| rows.iter().any(|r| r.get(*m) != 0.0));
}

type RowKey = (
    String,
    Option<DateTime<FixedOffset>>,
    Option<DateTime<FixedOffset>>,
    [String; 6],
    [u64; 8],
    Option<u64>,
);

fn row_key(r: &FlatRow) -> RowKey {
    (
        r.pv.clone(),
        r.inicio,
        r.terminado,
        [
            r.tipo_mecanizado.clone(),
            r.progress_created_at.clone(),
            r.origen.clone(),
            r.maquina.clone(),
            r.hora_reporte.clone(),
            r.negocio.clone(),
        ],
        [
            float_key(r.cantidad_perforaciones_total),
            float_key(r.cantidad_perforaciones_placas),
            float_key(r.kg),
            float_key(r.placas),
            float_key(r.tiempo),
            float_key(r.tiempo_seteo),
            float_key(r.espesor),
            float_key(r.perfora_total),
        ],
        r.process_minutes.map(float_key),
    )
}

// 0.0 and -0.0 compare equal, so they must hash equal too.
fn float_key(x: f64) -> u64 {
    if x == 0.0 {
        0
    } else {
        x.to_bits()
    }
}

fn dedup_rows<'a>(rows: &[&'a FlatRow]) -> Vec<&'a FlatRow> {
    let mut seen = HashSet::new();
    rows.iter()
        .copied()
        .filter(|r| seen.insert(row_key(r)))
        .collect()
}
