//! Turns an [`AnalysisSummary`] into the label/number arrays the front end's
//! table renderer and chart library consume. Nothing here draws anything.

use crate::calc::{AnalysisSummary, SubjectSummary};
use crate::records::{AnalysisMode, Record};
use crate::stats::GradeStats;
use serde::Serialize;

pub const PALETTE: [&str; 9] = [
    "#7b61ff", "#ff6b6b", "#4ecdc4", "#feca57", "#48dbfb", "#ff9ff3", "#54a0ff", "#5f27cd",
    "#00d2d3",
];

pub const GRADE_DATASET_LABEL: &str = "Grade %";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GradeBand {
    Excellent,
    Good,
    Fair,
    Pass,
    Low,
}

pub fn grade_band(grade: f64) -> GradeBand {
    if grade >= 90.0 {
        GradeBand::Excellent
    } else if grade >= 80.0 {
        GradeBand::Good
    } else if grade >= 70.0 {
        GradeBand::Fair
    } else if grade >= 60.0 {
        GradeBand::Pass
    } else {
        GradeBand::Low
    }
}

pub fn subject_color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

/// Half-away-from-zero rounding to `places` decimals.
pub fn round_to(x: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (x * factor).round() / factor
}

/// `82.456` -> `"82.46%"` for `places = 2`.
pub fn percent_label(x: f64, places: usize) -> String {
    format!("{:.*}%", places, x)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartDataset {
    pub label: String,
    pub data: Vec<f64>,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartData {
    pub title: String,
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
}

impl ChartData {
    fn single(title: &str, series: ChartSeries, label: &str, color: &str) -> Self {
        ChartData {
            title: title.to_string(),
            labels: series.labels,
            datasets: vec![ChartDataset {
                label: label.to_string(),
                data: series.values,
                color: color.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    pub label: String,
    pub mark_gotten: Option<f64>,
    pub max_mark: Option<f64>,
    pub grade: f64,
    pub grade_label: String,
    pub weight: Option<f64>,
    /// grade * weight, shown as the "Contrib" column.
    pub contribution: Option<f64>,
    pub band: GradeBand,
}

impl From<&Record> for TableRow {
    fn from(r: &Record) -> Self {
        TableRow {
            label: r.label.clone(),
            mark_gotten: r.mark_gotten,
            max_mark: r.max_mark,
            grade: r.grade,
            grade_label: percent_label(r.grade, 1),
            weight: r.weight,
            contribution: r.weight.map(|w| round_to(r.grade * w, 2)),
            band: grade_band(r.grade),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectTable {
    pub name: String,
    pub color: String,
    pub average: f64,
    pub average_label: String,
    pub total_weight: Option<f64>,
    pub stats: GradeStats,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallCard {
    pub average: f64,
    pub average_label: String,
    pub total_weight: Option<f64>,
    pub band: GradeBand,
    pub stats: GradeStats,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Presentation {
    pub overall: OverallCard,
    pub tables: Vec<SubjectTable>,
    pub charts: Vec<ChartData>,
    pub comparison: ChartData,
}

pub fn subject_series(subject: &SubjectSummary) -> ChartSeries {
    let series = subject.series();
    ChartSeries {
        labels: series.iter().map(|r| r.label.clone()).collect(),
        values: series.iter().map(|r| r.grade).collect(),
    }
}

pub fn comparison_series(summary: &AnalysisSummary) -> ChartSeries {
    ChartSeries {
        labels: summary.subjects.iter().map(|s| s.name.clone()).collect(),
        values: summary.subjects.iter().map(|s| s.average()).collect(),
    }
}

pub fn present(summary: &AnalysisSummary) -> Presentation {
    let overall_average = summary
        .overall
        .weighted_average
        .unwrap_or(summary.overall.stats.mean);

    let tables = summary
        .subjects
        .iter()
        .enumerate()
        .map(|(i, s)| SubjectTable {
            name: s.name.clone(),
            color: subject_color(i).to_string(),
            average: s.average(),
            average_label: percent_label(s.average(), 2),
            total_weight: s.total_weight,
            stats: s.stats,
            rows: s.records.iter().map(TableRow::from).collect(),
        })
        .collect();

    let charts = summary
        .subjects
        .iter()
        .enumerate()
        .map(|(i, s)| {
            ChartData::single(
                &s.name,
                subject_series(s),
                GRADE_DATASET_LABEL,
                subject_color(i),
            )
        })
        .collect();

    let comparison_label = match summary.mode {
        AnalysisMode::Weighted => "Weighted Average",
        AnalysisMode::TimeSeries => "Average",
    };
    let comparison = ChartData {
        title: "Subject Comparison".to_string(),
        ..ChartData::single("", comparison_series(summary), comparison_label, PALETTE[0])
    };

    Presentation {
        overall: OverallCard {
            average: overall_average,
            average_label: percent_label(overall_average, 2),
            total_weight: summary.overall.total_weight,
            band: grade_band(overall_average),
            stats: summary.overall.stats,
        },
        tables,
        charts,
        comparison,
    }
}
