use crate::types::{FlatRow, JobRecord};
use crate::util::{minutes_between, parse_timestamp};
use tracing::debug;

/// Expand every record into one row per progress entry.
///
/// Records without progress contribute nothing.
pub fn flatten_records(records: &[JobRecord]) -> Vec<FlatRow> {
    let rows: Vec<FlatRow> = records.iter().flat_map(flatten_record).collect();
    debug!(records = records.len(), rows = rows.len(), "flattened records");
    rows
}

pub fn flatten_record(record: &JobRecord) -> Vec<FlatRow> {
    let inicio = parse_timestamp(&record.created_at);
    let terminado = parse_timestamp(&record.completed_at);
    let process_minutes = match (inicio, terminado) {
        (Some(start), Some(end)) => Some(minutes_between(start, end)),
        _ => None,
    };

    record
        .progress
        .iter()
        .map(|p| FlatRow {
            pv: record.pv.clone(),
            inicio,
            cantidad_perforaciones_total: record.cantidad_perforaciones_total,
            terminado,
            cantidad_perforaciones_placas: record.cantidad_perforaciones_placas,
            kg: record.kg,
            tipo_mecanizado: record.tipo_mecanizado.clone(),
            progress_created_at: p.created_at.clone(),
            origen: p.origen.clone(),
            maquina: p.maquina.clone(),
            placas: p.placas,
            hora_reporte: p.hora_reporte.clone(),
            tiempo: p.tiempo,
            tiempo_seteo: p.tiempo_seteo,
            espesor: record.espesor,
            negocio: record.negocio.clone(),
            perfora_total: p.placas * record.cantidad_perforaciones_placas,
            process_minutes,
        })
        .collect()
}
