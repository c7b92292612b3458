use outage_domain::domain::{MetricPoint, OutageRecord};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::pipeline::{Envelope, PipelineError, SourceDocument, Transform};

const UNKNOWN_AREA: &str = "unknown";

/// Flat shape: `{"areas": [{"name", "affected", "total"}]}`.
#[derive(Deserialize)]
struct AreasDocument {
    areas: Vec<AreaEntry>,
}

#[derive(Deserialize)]
struct AreaEntry {
    #[serde(default, deserialize_with = "lenient_name")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    affected: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    total: u64,
}

/// Kubra thematic shape: `{"file_data": [{"desc": {"name", "cust_a": {"val"}, "cust_s"}}]}`.
#[derive(Deserialize)]
struct ThematicDocument {
    file_data: Vec<ThematicArea>,
}

#[derive(Deserialize)]
struct ThematicArea {
    #[serde(default)]
    desc: Option<ThematicDesc>,
}

#[derive(Deserialize)]
struct ThematicDesc {
    #[serde(default, deserialize_with = "lenient_name")]
    name: Option<String>,
    /// Customers affected. Usually `{"val": n}`, sometimes a bare number.
    #[serde(default, deserialize_with = "lenient_count")]
    cust_a: u64,
    /// Customers served.
    #[serde(default, deserialize_with = "lenient_count")]
    cust_s: u64,
}

/// Reads a customer count, treating anything unusable as zero.
///
/// Accepts non-negative integers, positive floats (rounded), numeric strings
/// and `{"val": ...}` wrappers. Null, negative, masked (`"<5"`) or otherwise
/// unexpected values count as zero.
fn count_from_value(v: &Value) -> u64 {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f > 0.0).map(|f| f.round() as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        Value::Object(map) => map.get("val").map(count_from_value).unwrap_or(0),
        _ => 0,
    }
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().map(count_from_value).unwrap_or(0))
}

fn lenient_name<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn record(level: &str, name: Option<String>, affected: u64, served: u64) -> OutageRecord {
    OutageRecord {
        level: level.to_string(),
        area: name.unwrap_or_else(|| UNKNOWN_AREA.to_string()),
        customers_affected: affected,
        customers_served: served,
    }
}

/// Decode an upstream document into outage records.
///
/// This is the only place the upstream shape is inspected. Absent counts
/// become zero, but a document with neither `areas` nor `file_data` at the
/// top level, or whose list entries are not objects, is rejected outright.
pub fn decode_records(level: &str, body: &Value) -> Result<Vec<OutageRecord>, PipelineError> {
    let obj = body
        .as_object()
        .ok_or_else(|| PipelineError::Schema(format!("expected a JSON object at top level, found {}", kind(body))))?;

    if obj.contains_key("areas") {
        let doc = AreasDocument::deserialize(body)
            .map_err(|e| PipelineError::Schema(format!("malformed `areas` document: {e}")))?;
        return Ok(doc
            .areas
            .into_iter()
            .map(|a| record(level, a.name, a.affected, a.total))
            .collect());
    }

    if obj.contains_key("file_data") {
        let doc = ThematicDocument::deserialize(body)
            .map_err(|e| PipelineError::Schema(format!("malformed `file_data` document: {e}")))?;
        return Ok(doc
            .file_data
            .into_iter()
            .map(|area| match area.desc {
                Some(d) => record(level, d.name, d.cust_a, d.cust_s),
                None => record(level, None, 0, 0),
            })
            .collect());
    }

    let keys: Vec<&str> = obj.keys().map(String::as_str).collect();
    Err(PipelineError::Schema(format!(
        "expected top-level `areas` or `file_data` key, found [{}]",
        keys.join(", ")
    )))
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Three gauges per record, all tagged `level:area`:
/// `<prefix>.affected`, `<prefix>.total` and `<prefix>.percentage`.
pub fn records_to_points(prefix: &str, records: &[OutageRecord]) -> Vec<MetricPoint> {
    let mut points = Vec::with_capacity(records.len() * 3);
    for r in records {
        let tag = r.area_tag();
        points.push(MetricPoint::new(
            format!("{prefix}.affected"),
            r.customers_affected as f64,
            [tag.clone()],
        ));
        points.push(MetricPoint::new(
            format!("{prefix}.total"),
            r.customers_served as f64,
            [tag.clone()],
        ));
        points.push(MetricPoint::new(
            format!("{prefix}.percentage"),
            r.percentage_affected(),
            [tag],
        ));
    }
    points
}

#[derive(Clone, Default)]
pub struct OutageTransform;

impl Transform<SourceDocument, Vec<MetricPoint>> for OutageTransform {
    fn apply(&self, input: Envelope<SourceDocument>) -> Result<Envelope<Vec<MetricPoint>>, PipelineError> {
        let doc = &input.payload;
        let records = match decode_records(&doc.level, &doc.body) {
            Ok(r) => r,
            Err(e) => {
                metrics::counter!("outage_schema_errors_total").increment(1);
                tracing::error!(url = %doc.url, error = %e, "upstream document failed schema check");
                return Err(e);
            }
        };

        let affected: u64 = records.iter().map(|r| r.customers_affected).sum();
        tracing::info!(
            level = %doc.level,
            areas = records.len(),
            customers_affected = affected,
            "extracted outage records"
        );

        Ok(Envelope {
            payload: records_to_points(&doc.metric_prefix, &records),
            received_at: input.received_at,
        })
    }
}
