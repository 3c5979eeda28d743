use crate::records::{AnalysisMode, Record};
use crate::stats::{self, GradeStats};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::cmp::Ordering;

pub const RANKED_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallSummary {
    pub stats: GradeStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weighted_average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_weight: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSummary {
    pub name: String,
    /// Insertion order, used for tables.
    pub records: Vec<Record>,
    pub stats: GradeStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weighted_average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<Vec<Record>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<Vec<Record>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chronological: Option<Vec<Record>>,
    /// Whether `chronological` was reordered by parsed dates.
    pub date_ordered: bool,
}

impl SubjectSummary {
    /// Headline figure: weighted average when weights exist, else the mean.
    pub fn average(&self) -> f64 {
        self.weighted_average.unwrap_or(self.stats.mean)
    }

    /// Records in the order charts and trends should follow.
    pub fn series(&self) -> &[Record] {
        self.chronological.as_deref().unwrap_or(&self.records)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub mode: AnalysisMode,
    pub record_count: usize,
    pub overall: OverallSummary,
    pub subjects: Vec<SubjectSummary>,
}

/// Groups by exact subject string, subjects in first-seen order.
pub fn group_by_subject(records: &[Record]) -> Vec<(String, Vec<Record>)> {
    let mut groups: Vec<(String, Vec<Record>)> = Vec::new();
    for r in records {
        match groups.iter_mut().find(|(name, _)| *name == r.subject) {
            Some((_, group)) => group.push(r.clone()),
            None => groups.push((r.subject.clone(), vec![r.clone()])),
        }
    }
    groups
}

/// Returns `(weighted average, total weight)`. Zero total weight gives 0.
pub fn weighted_average(records: &[Record]) -> (f64, f64) {
    let mut weighted_sum = 0.0_f64;
    let mut total_weight = 0.0_f64;
    for r in records {
        let w = r.weight.unwrap_or(0.0);
        weighted_sum += r.grade * w;
        total_weight += w;
    }
    let avg = if total_weight > 0.0 {
        weighted_sum / total_weight
    } else {
        0.0
    };
    (avg, total_weight)
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Best-effort date reading of a period label.
pub fn parse_period_date(raw: &str) -> Option<NaiveDateTime> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(t, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    // Month-only labels: "2024-03", "March 2024", "Mar 2024".
    let first_of_month = [
        (format!("{}-01", t), "%Y-%m-%d"),
        (format!("1 {}", t), "%d %B %Y"),
        (format!("1 {}", t), "%d %b %Y"),
    ];
    for (candidate, fmt) in first_of_month.iter() {
        if let Ok(d) = NaiveDate::parse_from_str(candidate, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Date order when every label parses, otherwise input order.
pub fn chronological_order(records: &[Record]) -> (Vec<Record>, bool) {
    let parsed: Option<Vec<NaiveDateTime>> =
        records.iter().map(|r| parse_period_date(&r.label)).collect();
    match parsed {
        Some(dates) if !records.is_empty() => {
            let mut keyed: Vec<(NaiveDateTime, Record)> =
                dates.into_iter().zip(records.iter().cloned()).collect();
            keyed.sort_by(|a, b| a.0.cmp(&b.0));
            (keyed.into_iter().map(|(_, r)| r).collect(), true)
        }
        _ => (records.to_vec(), false),
    }
}

/// Up to `limit` records by grade, stable on ties.
pub fn ranked(records: &[Record], limit: usize, descending: bool) -> Vec<Record> {
    let mut out = records.to_vec();
    out.sort_by(|a, b| {
        let ord = a.grade.partial_cmp(&b.grade).unwrap_or(Ordering::Equal);
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
    out.truncate(limit);
    out
}

fn grades(records: &[Record]) -> Vec<f64> {
    records.iter().map(|r| r.grade).collect()
}

fn summarize_subject(name: String, records: Vec<Record>, mode: AnalysisMode) -> SubjectSummary {
    match mode {
        AnalysisMode::Weighted => {
            let (avg, total) = weighted_average(&records);
            SubjectSummary {
                name,
                stats: stats::describe(&grades(&records)),
                weighted_average: Some(avg),
                total_weight: Some(total),
                top: None,
                bottom: None,
                chronological: None,
                date_ordered: false,
                records,
            }
        }
        AnalysisMode::TimeSeries => {
            let (chronological, date_ordered) = chronological_order(&records);
            SubjectSummary {
                name,
                stats: stats::describe(&grades(&chronological)),
                weighted_average: None,
                total_weight: None,
                top: Some(ranked(&records, RANKED_LIMIT, true)),
                bottom: Some(ranked(&records, RANKED_LIMIT, false)),
                chronological: Some(chronological),
                date_ordered,
                records,
            }
        }
    }
}

pub fn analyze(records: &[Record], mode: AnalysisMode) -> Result<AnalysisSummary, CalcError> {
    if records.is_empty() {
        return Err(CalcError::new("no_valid_data", "no valid data to analyze"));
    }

    let overall = match mode {
        AnalysisMode::Weighted => {
            let (avg, total) = weighted_average(records);
            OverallSummary {
                stats: stats::describe(&grades(records)),
                weighted_average: Some(avg),
                total_weight: Some(total),
            }
        }
        AnalysisMode::TimeSeries => OverallSummary {
            stats: stats::describe(&grades(records)),
            weighted_average: None,
            total_weight: None,
        },
    };

    let subjects: Vec<SubjectSummary> = group_by_subject(records)
        .into_iter()
        .map(|(name, group)| summarize_subject(name, group, mode))
        .collect();

    log::debug!(
        "analyzed {} records across {} subjects ({})",
        records.len(),
        subjects.len(),
        mode.as_str()
    );

    Ok(AnalysisSummary {
        mode,
        record_count: records.len(),
        overall,
        subjects,
    })
}
