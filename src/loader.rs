use crate::error::{ReportError, Result};
use crate::store::{scan_all, RecordStore};
use crate::types::{JobRecord, ProgressEntry};
use crate::util::{coerce_f64, coerce_text};
use serde_json::{Map, Value};
use tracing::{info, warn};

/// Business line assigned to records that carry no `negocio` tag.
pub const UNKNOWN_LINE: &str = "does not exist";

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub scanned_items: usize,
    pub records: usize,
    pub progress_entries: usize,
}

/// Drain `store` and validate every item into a [`JobRecord`].
///
/// A single malformed item aborts the load: a partial table would produce
/// silently wrong totals.
pub fn load_records<S: RecordStore + ?Sized>(
    store: &S,
) -> Result<(Vec<JobRecord>, LoadReport)> {
    let items = scan_all(store)?;
    let mut records = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        match parse_record(item) {
            Ok(r) => records.push(r),
            Err(e) => {
                warn!(index = idx, error = %e, "rejecting malformed record");
                return Err(e);
            }
        }
    }
    let progress_entries = records.iter().map(|r| r.progress.len()).sum();
    let report = LoadReport {
        scanned_items: items.len(),
        records: records.len(),
        progress_entries,
    };
    info!(
        scanned = report.scanned_items,
        progress = report.progress_entries,
        "records loaded"
    );
    Ok((records, report))
}

pub fn parse_record(item: &Value) -> Result<JobRecord> {
    let root = item
        .as_object()
        .ok_or_else(|| ReportError::invalid("?", "<item>", "not an object"))?;
    let pv = required_text(root, "?", "pv")?;
    let id = pv.as_str();
    let completed_at = required_text(root, id, "timestamp")?;

    let data = root
        .get("data")
        .ok_or_else(|| ReportError::missing(id, "data"))?
        .as_object()
        .ok_or_else(|| ReportError::invalid(id, "data", "not an object"))?;

    let progress = data
        .get("progress")
        .ok_or_else(|| ReportError::missing(id, "data.progress"))?
        .as_array()
        .ok_or_else(|| ReportError::invalid(id, "data.progress", "not a list"))?
        .iter()
        .map(|entry| parse_progress(id, entry))
        .collect::<Result<Vec<_>>>()?;

    Ok(JobRecord {
        created_at: required_text(data, id, "createdAt")?,
        cantidad_perforaciones_total: required_count(data, id, "cantidadPerforacionesTotal")?,
        cantidad_perforaciones_placas: required_count(data, id, "cantidadPerforacionesPlacas")?,
        kg: required_number(data, id, "kg")?,
        tipo_mecanizado: required_text(data, id, "tipoMecanizado")?,
        espesor: optional_number(data, id, "espesor")?.unwrap_or(0.0),
        negocio: optional_text(data, "negocio").unwrap_or_else(|| UNKNOWN_LINE.to_string()),
        progress,
        completed_at,
        pv,
    })
}

fn parse_progress(id: &str, entry: &Value) -> Result<ProgressEntry> {
    let obj = entry
        .as_object()
        .ok_or_else(|| ReportError::invalid(id, "data.progress[]", "not an object"))?;
    let text = |key: &str| optional_text(obj, key).unwrap_or_else(|| "0".to_string());
    Ok(ProgressEntry {
        created_at: text("createdAt"),
        origen: text("origen"),
        maquina: text("maquina"),
        hora_reporte: text("hora_reporte"),
        placas: optional_number(obj, id, "placas")?
            .map(|v| non_negative(id, "placas", v))
            .transpose()?
            .unwrap_or(0.0),
        tiempo: optional_number(obj, id, "tiempo")?.unwrap_or(0.0),
        tiempo_seteo: optional_number(obj, id, "tiempo_seteo")?.unwrap_or(0.0),
    })
}

fn required_text(obj: &Map<String, Value>, id: &str, key: &str) -> Result<String> {
    let v = obj.get(key).ok_or_else(|| ReportError::missing(id, key))?;
    coerce_text(v)
        .ok_or_else(|| ReportError::invalid(id, key, format!("expected text, got {}", v)))
}

fn required_number(obj: &Map<String, Value>, id: &str, key: &str) -> Result<f64> {
    let v = obj.get(key).ok_or_else(|| ReportError::missing(id, key))?;
    coerce_f64(v)
        .ok_or_else(|| ReportError::invalid(id, key, format!("expected a number, got {}", v)))
}

fn required_count(obj: &Map<String, Value>, id: &str, key: &str) -> Result<f64> {
    non_negative(id, key, required_number(obj, id, key)?)
}

// Counts feed `perforaTotal`, which must never go below zero.
fn non_negative(id: &str, key: &str, v: f64) -> Result<f64> {
    if v < 0.0 {
        return Err(ReportError::invalid(id, key, format!("must not be negative, got {}", v)));
    }
    Ok(v)
}

fn optional_text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(coerce_text)
}

// Present-but-garbage is still a shape error; only absence gets the default.
fn optional_number(obj: &Map<String, Value>, id: &str, key: &str) -> Result<Option<f64>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => coerce_f64(v)
            .map(Some)
            .ok_or_else(|| ReportError::invalid(id, key, format!("expected a number, got {}", v))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn item() -> Value {
        json!({
            "pv": "PV-100",
            "timestamp": "2024-08-20T15:00:00Z",
            "data": {
                "createdAt": "2024-08-20T10:00:00Z",
                "cantidadPerforacionesTotal": "24",
                "cantidadPerforacionesPlacas": 3,
                "kg": "150.5",
                "tipoMecanizado": "perforado",
                "espesor": "15",
                "negocio": "sabimet",
                "progress": [
                    {"origen": "Progreso", "placas": "2", "maquina": "CNC1", "tiempo": 30},
                    {}
                ]
            }
        })
    }

    #[test]
    fn parses_and_coerces_decimal_fields() {
        let r = parse_record(&item()).unwrap();
        assert_eq!(r.pv, "PV-100");
        assert_eq!(r.cantidad_perforaciones_total, 24.0);
        assert_eq!(r.kg, 150.5);
        assert_eq!(r.espesor, 15.0);
        assert_eq!(r.progress.len(), 2);
        assert_eq!(r.progress[0].placas, 2.0);
        assert_eq!(r.progress[0].tiempo, 30.0);
    }

    #[test]
    fn progress_defaults_apply() {
        let r = parse_record(&item()).unwrap();
        let empty = &r.progress[1];
        assert_eq!(empty.origen, "0");
        assert_eq!(empty.created_at, "0");
        assert_eq!(empty.hora_reporte, "0");
        assert_eq!(empty.placas, 0.0);
        assert_eq!(empty.tiempo_seteo, 0.0);
    }

    #[test]
    fn optional_job_fields_default() {
        let mut v = item();
        let data = v["data"].as_object_mut().unwrap();
        data.remove("espesor");
        data.remove("negocio");
        let r = parse_record(&v).unwrap();
        assert_eq!(r.espesor, 0.0);
        assert_eq!(r.negocio, UNKNOWN_LINE);
    }

    #[test]
    fn missing_required_field_is_fatal() {
        let mut v = item();
        v["data"].as_object_mut().unwrap().remove("kg");
        match parse_record(&v) {
            Err(ReportError::MissingField { record, field }) => {
                assert_eq!(record, "PV-100");
                assert_eq!(field, "kg");
            }
            other => panic!("expected missing field, got {:?}", other),
        }

        let mut v = item();
        v["data"].as_object_mut().unwrap().remove("progress");
        assert!(matches!(parse_record(&v), Err(ReportError::MissingField { .. })));
    }

    #[test]
    fn non_numeric_value_is_a_shape_error() {
        let mut v = item();
        v["data"]["kg"] = json!("heavy");
        assert!(matches!(parse_record(&v), Err(ReportError::InvalidField { .. })));
    }

    #[test]
    fn negative_counts_are_rejected() {
        let mut v = item();
        v["data"]["cantidadPerforacionesPlacas"] = json!(-3);
        match parse_record(&v) {
            Err(ReportError::InvalidField { field, .. }) => {
                assert_eq!(field, "cantidadPerforacionesPlacas")
            }
            other => panic!("expected invalid field, got {:?}", other),
        }

        let mut v = item();
        v["data"]["progress"][0]["placas"] = json!("-2");
        match parse_record(&v) {
            Err(ReportError::InvalidField { field, .. }) => assert_eq!(field, "placas"),
            other => panic!("expected invalid field, got {:?}", other),
        }

        let mut v = item();
        v["data"]["cantidadPerforacionesTotal"] = json!("-1");
        assert!(matches!(parse_record(&v), Err(ReportError::InvalidField { .. })));
    }

    #[test]
    fn zero_counts_are_accepted() {
        let mut v = item();
        v["data"]["progress"][0]["placas"] = json!(0);
        assert_eq!(parse_record(&v).unwrap().progress[0].placas, 0.0);
    }

    #[test]
    fn load_aborts_on_first_bad_record() {
        let mut bad = item();
        bad.as_object_mut().unwrap().remove("timestamp");
        let store = MemoryStore::new(vec![item(), bad], 1);
        let err = load_records(&store).unwrap_err();
        assert!(!err.is_configuration());
    }

    #[test]
    fn load_reports_counts() {
        let store = MemoryStore::new(vec![item(), item()], 1);
        let (records, report) = load_records(&store).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            report,
            LoadReport {
                scanned_items: 2,
                records: 2,
                progress_entries: 4
            }
        );
    }
}
