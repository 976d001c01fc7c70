// Record store boundary: paginated scans over job records.
//
// The production table is scanned page by page; every page must be drained
// before the pipeline runs. File exports use DynamoDB's JSON-lines layout.
use crate::error::{ReportError, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Opaque position to resume a scan from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken(String);

#[derive(Debug, Clone)]
pub struct ScanPage {
    pub items: Vec<Value>,
    pub next: Option<ContinuationToken>,
}

pub trait RecordStore {
    /// Fetch one page, starting at `start` or at the beginning of the table.
    fn scan_page(&self, start: Option<&ContinuationToken>) -> Result<ScanPage>;
}

/// Drain every page of `store`, in order.
pub fn scan_all<S: RecordStore + ?Sized>(store: &S) -> Result<Vec<Value>> {
    let mut page = store.scan_page(None)?;
    let mut items = std::mem::take(&mut page.items);
    let mut pages = 1usize;
    while let Some(token) = page.next.take() {
        page = store.scan_page(Some(&token))?;
        items.append(&mut page.items);
        pages += 1;
    }
    debug!(pages, items = items.len(), "scan drained");
    Ok(items)
}

/// Items held in memory, served in fixed-size pages.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    items: Vec<Value>,
    page_size: usize,
}

impl MemoryStore {
    pub fn new(items: Vec<Value>, page_size: usize) -> Self {
        Self {
            items,
            page_size: page_size.max(1),
        }
    }
}

impl RecordStore for MemoryStore {
    fn scan_page(&self, start: Option<&ContinuationToken>) -> Result<ScanPage> {
        let offset = match start {
            None => 0,
            Some(ContinuationToken(raw)) => raw.parse::<usize>().map_err(|_| {
                ReportError::Store(format!("bad continuation token `{}`", raw))
            })?,
        };
        let end = (offset + self.page_size).min(self.items.len());
        let items = self.items.get(offset..end).unwrap_or_default().to_vec();
        let next = if end < self.items.len() {
            Some(ContinuationToken(end.to_string()))
        } else {
            None
        };
        debug!(offset, returned = items.len(), "scan page");
        Ok(ScanPage { items, next })
    }
}

/// A table export with one item per line.
///
/// Lines are either plain JSON items or `{"Item": {...}}` in attribute-value
/// form (`{"S": ...}`, `{"N": ...}`, ...), which is unmarshalled on load.
#[derive(Debug, Clone)]
pub struct JsonLinesStore {
    inner: MemoryStore,
}

impl JsonLinesStore {
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let items = parse_export(&text)?;
        Ok(Self {
            inner: MemoryStore::new(items, page_size),
        })
    }
}

impl RecordStore for JsonLinesStore {
    fn scan_page(&self, start: Option<&ContinuationToken>) -> Result<ScanPage> {
        self.inner.scan_page(start)
    }
}

pub fn parse_export(text: &str) -> Result<Vec<Value>> {
    let mut items = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)?;
        let item = match value {
            Value::Object(mut obj) if obj.len() == 1 && obj.contains_key("Item") => {
                let raw = obj.remove("Item").unwrap_or(Value::Null);
                unmarshal_item(&raw)?
            }
            other => other,
        };
        items.push(item);
    }
    Ok(items)
}

/// Convert an attribute-value map (`{"pv": {"S": "1"}}`) to plain JSON.
pub fn unmarshal_item(item: &Value) -> Result<Value> {
    let obj = item
        .as_object()
        .ok_or_else(|| ReportError::Store("export item is not an object".to_string()))?;
    let mut out = Map::new();
    for (k, v) in obj {
        out.insert(k.clone(), unmarshal_attribute(v)?);
    }
    Ok(Value::Object(out))
}

fn unmarshal_attribute(attr: &Value) -> Result<Value> {
    let bad = || ReportError::Store(format!("unsupported attribute value: {}", attr));
    let obj = attr.as_object().filter(|o| o.len() == 1).ok_or_else(bad)?;
    let (tag, inner) = obj.iter().next().ok_or_else(bad)?;
    match tag.as_str() {
        // Numbers stay decimal text; ingestion coerces them once.
        "S" | "N" | "BOOL" => Ok(inner.clone()),
        "NULL" => Ok(Value::Null),
        "L" => {
            let list = inner.as_array().ok_or_else(bad)?;
            list.iter()
                .map(unmarshal_attribute)
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        "M" => unmarshal_item(inner),
        _ => Err(bad()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn scan_all_drains_every_page() {
        let items: Vec<Value> = (0..7).map(|i| json!({ "pv": i })).collect();
        let store = MemoryStore::new(items.clone(), 3);

        let first = store.scan_page(None).unwrap();
        assert_eq!(first.items.len(), 3);
        assert!(first.next.is_some());

        let all = scan_all(&store).unwrap();
        assert_eq!(all, items);
    }

    #[test]
    fn empty_store_scans_to_nothing() {
        let store = MemoryStore::new(vec![], 10);
        assert!(scan_all(&store).unwrap().is_empty());
    }

    #[test]
    fn unmarshals_attribute_values() {
        let raw = json!({
            "pv": {"S": "PV-1"},
            "data": {"M": {
                "kg": {"N": "12.5"},
                "progress": {"L": [{"M": {"placas": {"N": "2"}}}]},
                "flag": {"BOOL": true},
                "nothing": {"NULL": true}
            }}
        });
        let plain = unmarshal_item(&raw).unwrap();
        assert_eq!(
            plain,
            json!({
                "pv": "PV-1",
                "data": {
                    "kg": "12.5",
                    "progress": [{"placas": "2"}],
                    "flag": true,
                    "nothing": null
                }
            })
        );
    }

    #[test]
    fn rejects_unknown_attribute_tags() {
        let raw = json!({"pv": {"SS": ["a"]}});
        assert!(unmarshal_item(&raw).is_err());
    }

    #[test]
    fn json_lines_store_reads_mixed_export() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"pv": "A", "timestamp": "2024-08-01"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"Item": {{"pv": {{"S": "B"}}}}}}"#).unwrap();

        let store = JsonLinesStore::open(file.path(), 1).unwrap();
        let items = scan_all(&store).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1], json!({"pv": "B"}));
    }
}
