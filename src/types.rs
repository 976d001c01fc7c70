use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tabled::Tabled;

/// One entry of a job's `progress` list, defaults already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEntry {
    pub created_at: String,
    pub origen: String,
    pub maquina: String,
    pub placas: f64,
    pub hora_reporte: String,
    pub tiempo: f64,
    pub tiempo_seteo: f64,
}

/// A validated job record as scanned from the record store.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub pv: String,
    pub created_at: String,
    pub completed_at: String,
    pub cantidad_perforaciones_total: f64,
    pub cantidad_perforaciones_placas: f64,
    pub kg: f64,
    pub tipo_mecanizado: String,
    pub espesor: f64,
    pub negocio: String,
    pub progress: Vec<ProgressEntry>,
}

/// One (job, progress entry) pair with the job fields broadcast onto it.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRow {
    pub pv: String,
    pub inicio: Option<DateTime<FixedOffset>>,
    pub cantidad_perforaciones_total: f64,
    pub terminado: Option<DateTime<FixedOffset>>,
    pub cantidad_perforaciones_placas: f64,
    pub kg: f64,
    pub tipo_mecanizado: String,
    pub progress_created_at: String,
    pub origen: String,
    pub maquina: String,
    pub placas: f64,
    pub hora_reporte: String,
    pub tiempo: f64,
    pub tiempo_seteo: f64,
    pub espesor: f64,
    pub negocio: String,
    pub perfora_total: f64,
    /// `None` when either timestamp failed to parse.
    pub process_minutes: Option<f64>,
}

/// Text columns of a [`FlatRow`] usable as an equality filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextColumn {
    #[serde(rename = "pv")]
    Pv,
    #[serde(rename = "tipoMecanizado")]
    TipoMecanizado,
    #[serde(rename = "progress_createdAt")]
    ProgressCreatedAt,
    #[serde(rename = "origen")]
    Origen,
    #[serde(rename = "maquina")]
    Maquina,
    #[serde(rename = "hora_reporte")]
    HoraReporte,
    #[serde(rename = "negocio")]
    Negocio,
}

impl TextColumn {
    pub fn value<'a>(&self, row: &'a FlatRow) -> &'a str {
        match self {
            TextColumn::Pv => &row.pv,
            TextColumn::TipoMecanizado => &row.tipo_mecanizado,
            TextColumn::ProgressCreatedAt => &row.progress_created_at,
            TextColumn::Origen => &row.origen,
            TextColumn::Maquina => &row.maquina,
            TextColumn::HoraReporte => &row.hora_reporte,
            TextColumn::Negocio => &row.negocio,
        }
    }
}

/// Numeric columns the aggregator knows how to reduce.
///
/// Declaration order is the column order of the aggregated table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Measure {
    CantidadPerforacionesTotal,
    CantidadPerforacionesPlacas,
    PerforaTotal,
    Kg,
    Placas,
    Tiempo,
    TiempoSeteo,
    ProcessMinutes,
}

impl Measure {
    pub fn header(&self) -> &'static str {
        match self {
            Measure::CantidadPerforacionesTotal => "cantidadPerforacionesTotal",
            Measure::CantidadPerforacionesPlacas => "cantidadPerforacionesPlacas",
            Measure::PerforaTotal => "perforaTotal",
            Measure::Kg => "kg",
            Measure::Placas => "placas",
            Measure::Tiempo => "tiempo",
            Measure::TiempoSeteo => "tiempo_seteo",
            Measure::ProcessMinutes => "Tiempo Proceso (min)",
        }
    }

    /// Value of this column on a flat row; only the process time can be missing.
    pub fn value(&self, row: &FlatRow) -> Option<f64> {
        match self {
            Measure::CantidadPerforacionesTotal => Some(row.cantidad_perforaciones_total),
            Measure::CantidadPerforacionesPlacas => Some(row.cantidad_perforaciones_placas),
            Measure::PerforaTotal => Some(row.perfora_total),
            Measure::Kg => Some(row.kg),
            Measure::Placas => Some(row.placas),
            Measure::Tiempo => Some(row.tiempo),
            Measure::TiempoSeteo => Some(row.tiempo_seteo),
            Measure::ProcessMinutes => row.process_minutes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Sum,
    Mean,
}

/// Per-column reduction policy. Columns not listed are dropped by aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct Reductions(pub Vec<(Measure, Reduction)>);

impl Default for Reductions {
    fn default() -> Self {
        Reductions(vec![
            (Measure::CantidadPerforacionesTotal, Reduction::Sum),
            (Measure::CantidadPerforacionesPlacas, Reduction::Sum),
            (Measure::PerforaTotal, Reduction::Sum),
            (Measure::Kg, Reduction::Mean),
            (Measure::Placas, Reduction::Sum),
            (Measure::Tiempo, Reduction::Mean),
            (Measure::TiempoSeteo, Reduction::Mean),
            (Measure::ProcessMinutes, Reduction::Sum),
        ])
    }
}

/// One (pv, espesor) group after reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRow {
    pub pv: String,
    pub espesor: f64,
    pub values: BTreeMap<Measure, f64>,
}

impl AggregatedRow {
    /// Reduced value of a column, zero if the column was not aggregated.
    pub fn get(&self, measure: Measure) -> f64 {
        self.values.get(&measure).copied().unwrap_or(0.0)
    }
}

/// Aggregated rows plus the measure columns that are shown to the user.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregatedTable {
    pub rows: Vec<AggregatedRow>,
    pub columns: Vec<Measure>,
}

impl AggregatedTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total(&self, measure: Measure) -> f64 {
        self.rows.iter().map(|r| r.get(measure)).sum()
    }
}

/// One thickness band with its summed columns and derived cost.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketRow {
    #[serde(rename = "Espesor")]
    pub label: String,
    #[serde(rename = "Trabajos")]
    pub rows: usize,
    #[serde(rename = "kg")]
    pub kg: f64,
    #[serde(rename = "tiempo")]
    pub tiempo: f64,
    #[serde(rename = "tiempo_seteo")]
    pub tiempo_seteo: f64,
    #[serde(rename = "placas")]
    pub placas: f64,
    #[serde(rename = "Tiempo Proceso (min)")]
    pub process_minutes: f64,
    #[serde(rename = "mm_total")]
    pub mm_total: f64,
    #[serde(rename = "Perforaciones")]
    pub perforations: f64,
    #[serde(rename = "Costo mm")]
    pub cost_per_mm: f64,
}

/// Console rendering of a [`BucketRow`].
#[derive(Debug, Clone, Tabled)]
pub struct BucketDisplayRow {
    #[tabled(rename = "Espesor")]
    pub label: String,
    #[tabled(rename = "kg")]
    pub kg: String,
    #[tabled(rename = "tiempo")]
    pub tiempo: String,
    #[tabled(rename = "tiempo_seteo")]
    pub tiempo_seteo: String,
    #[tabled(rename = "mm_total")]
    pub mm_total: String,
    #[tabled(rename = "Perforaciones")]
    pub perforations: String,
    #[tabled(rename = "Costo mm")]
    pub cost_per_mm: String,
}

/// Metric cards shown above each line's bucket table.
#[derive(Debug, Clone, Tabled)]
pub struct MetricCard {
    #[tabled(rename = "Metric")]
    pub name: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

/// Everything the front end shows for one business line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineReport {
    pub line: String,
    pub has_data: bool,
    pub traffic_share: f64,
    pub avg_thickness: f64,
    pub mm_total: f64,
    pub global_cost_per_mm: f64,
    pub margin: f64,
    pub perforations: f64,
    pub buckets: Vec<BucketRow>,
    pub aggregated: AggregatedTable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardReport {
    pub year: i32,
    pub month: u32,
    pub budget: f64,
    pub reference_cost: f64,
    pub lines: Vec<LineReport>,
}

#[derive(Debug, Serialize)]
pub struct LineSummary {
    pub line: String,
    pub has_data: bool,
    pub traffic_share: f64,
    pub avg_thickness: f64,
    pub mm_total: f64,
    pub global_cost_per_mm: f64,
    pub margin: f64,
    pub perforations: f64,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub year: i32,
    pub month: u32,
    pub budget: f64,
    pub reference_cost: f64,
    pub lines: Vec<LineSummary>,
}
