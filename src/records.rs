use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One input row as delivered by the front end or the tabular parser, keyed by
/// header name (`Subject`, `Task`, `Period`, `MarkGotten`, `MaxMark`, `Grade`,
/// `Weight`).
pub type RawRow = serde_json::Map<String, Value>;

pub const PLACEHOLDER_TASK: &str = "Task";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalysisMode {
    /// Task records carrying marks and a weight.
    #[default]
    Weighted,
    /// Period-labelled grades.
    TimeSeries,
}

impl AnalysisMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisMode::Weighted => "weighted",
            AnalysisMode::TimeSeries => "timeSeries",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "weighted" => Some(AnalysisMode::Weighted),
            "timeSeries" | "time_series" | "timeseries" => Some(AnalysisMode::TimeSeries),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub subject: String,
    /// Task name in weighted mode, period in time-series mode.
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mark_gotten: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_mark: Option<f64>,
    pub grade: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl Record {
    /// The header-keyed row this record was validated from, with parsed
    /// numbers in place of the original cell text.
    pub fn to_raw_row(&self) -> RawRow {
        let mut row = RawRow::new();
        row.insert("Subject".into(), json!(self.subject));
        match (self.mark_gotten, self.max_mark) {
            (Some(got), Some(max)) => {
                row.insert("Task".into(), json!(self.label));
                row.insert("MarkGotten".into(), json!(got));
                row.insert("MaxMark".into(), json!(max));
            }
            _ => {
                row.insert("Period".into(), json!(self.label));
                row.insert("Grade".into(), json!(self.grade));
            }
        }
        if let Some(w) = self.weight {
            row.insert("Weight".into(), json!(w));
        }
        row
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub records: Vec<Record>,
    pub dropped: usize,
}

/// `maxMark > 0 ? got / max * 100 : 0`
pub fn derive_grade(mark_gotten: f64, max_mark: f64) -> f64 {
    if max_mark > 0.0 {
        (mark_gotten / max_mark) * 100.0
    } else {
        0.0
    }
}

/// Decimal parse of a cell. Anything that isn't a finite number comes back as
/// NaN, including the `inf`/`NaN` spellings `str::parse` would accept.
pub fn parse_number(v: Option<&Value>) -> f64 {
    let n = match v {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    };
    if n.is_finite() {
        n
    } else {
        f64::NAN
    }
}

fn text_field(row: &RawRow, key: &str) -> Option<String> {
    match row.get(key) {
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
    .filter(|s| !s.is_empty())
}

pub fn validate_row(row: &RawRow, mode: AnalysisMode) -> Option<Record> {
    let subject = text_field(row, "Subject")?;

    match mode {
        AnalysisMode::Weighted => {
            let mark_gotten = parse_number(row.get("MarkGotten"));
            let max_mark = parse_number(row.get("MaxMark"));
            let weight = parse_number(row.get("Weight"));
            if mark_gotten.is_nan() || max_mark.is_nan() || weight.is_nan() {
                return None;
            }
            if weight <= 0.0 {
                return None;
            }
            let label = text_field(row, "Task")
                .or_else(|| text_field(row, "Period"))
                .unwrap_or_else(|| PLACEHOLDER_TASK.to_string());
            Some(Record {
                subject,
                label,
                mark_gotten: Some(mark_gotten),
                max_mark: Some(max_mark),
                grade: derive_grade(mark_gotten, max_mark),
                weight: Some(weight),
            })
        }
        AnalysisMode::TimeSeries => {
            let label = text_field(row, "Period").or_else(|| text_field(row, "Task"))?;
            let mark_gotten = parse_number(row.get("MarkGotten"));
            let max_mark = parse_number(row.get("MaxMark"));
            let (grade, marks) = if !mark_gotten.is_nan() && !max_mark.is_nan() {
                (derive_grade(mark_gotten, max_mark), Some((mark_gotten, max_mark)))
            } else {
                (parse_number(row.get("Grade")), None)
            };
            if grade.is_nan() {
                return None;
            }
            Some(Record {
                subject,
                label,
                mark_gotten: marks.map(|m| m.0),
                max_mark: marks.map(|m| m.1),
                grade,
                weight: None,
            })
        }
    }
}

pub fn validate_rows(rows: &[RawRow], mode: AnalysisMode) -> ValidationOutcome {
    let records: Vec<Record> = rows.iter().filter_map(|r| validate_row(r, mode)).collect();
    let dropped = rows.len() - records.len();
    if dropped > 0 {
        log::debug!(
            "validation dropped {} of {} {} rows",
            dropped,
            rows.len(),
            mode.as_str()
        );
    }
    ValidationOutcome { records, dropped }
}

/// Reads `params.rows` style input: an array of objects.
pub fn rows_from_json(raw: &Value) -> Result<Vec<RawRow>, String> {
    let Some(items) = raw.as_array() else {
        return Err("rows must be an array".to_string());
    };
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let Some(obj) = item.as_object() else {
            return Err(format!("rows[{}] must be an object", i));
        };
        out.push(obj.clone());
    }
    Ok(out)
}
