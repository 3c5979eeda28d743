use crate::records::{RawRow, Record};
use anyhow::{anyhow, Context};
use serde_json::Value;
use std::io::Read;
use std::path::Path;

pub const EXPORT_COLUMNS: [&str; 5] = ["Subject", "Task", "MarkGotten", "MaxMark", "Weight"];

/// Splits delimited text into header-keyed rows. Cells stay strings; numeric
/// interpretation is the validator's job.
pub fn read_rows<R: Read>(input: R) -> anyhow::Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers: Vec<String> = reader
        .headers()
        .context("failed to read header row")?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(anyhow!("missing header row"));
    }

    let mut rows = Vec::new();
    for (i, rec) in reader.records().enumerate() {
        let rec = rec.with_context(|| format!("malformed record {}", i + 1))?;
        if rec.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        let mut row = RawRow::new();
        for (key, cell) in headers.iter().zip(rec.iter()) {
            if key.is_empty() {
                continue;
            }
            row.insert(key.clone(), Value::String(cell.to_string()));
        }
        rows.push(row);
    }
    Ok(rows)
}

pub fn read_rows_from_path(path: &Path) -> anyhow::Result<Vec<RawRow>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.to_string_lossy()))?;
    read_rows(file).with_context(|| format!("failed to parse {}", path.to_string_lossy()))
}

/// Cell text for export. Numbers print in shortest round-trip form.
fn cell(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.as_f64().map(|f| f.to_string()).unwrap_or_default(),
        _ => String::new(),
    }
}

/// Weighted export. Text cells are quoted, numbers are written bare.
pub fn export_csv(records: &[Record]) -> anyhow::Result<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut header = csv::Writer::from_writer(&mut out);
        header
            .write_record(EXPORT_COLUMNS)
            .context("failed to write header row")?;
        header.flush().context("failed to write header row")?;
    }
    {
        let mut writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::NonNumeric)
            .from_writer(&mut out);
        for (i, r) in records.iter().enumerate() {
            let row = r.to_raw_row();
            writer
                .write_record(EXPORT_COLUMNS.iter().map(|c| cell(row.get(*c))))
                .with_context(|| format!("failed to write record {}", i + 1))?;
        }
        writer.flush().context("failed to flush records")?;
    }
    Ok(out)
}

pub fn write_csv(records: &[Record], out_path: &Path) -> anyhow::Result<()> {
    let bytes = export_csv(records)?;
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create directory {}", parent.to_string_lossy())
            })?;
        }
    }
    std::fs::write(out_path, bytes)
        .with_context(|| format!("failed to write {}", out_path.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{validate_rows, AnalysisMode};

    #[test]
    fn reads_header_keyed_rows_and_skips_blank_lines() {
        let text = "Subject,Task,MarkGotten,MaxMark,Weight\n\"Math\",Quiz, 45 ,50,20\n\n,,,,\nScience,Lab,9,10,30\n";
        let rows = read_rows(text.as_bytes()).expect("rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Subject"), Some(&Value::String("Math".into())));
        assert_eq!(rows[0].get("MarkGotten"), Some(&Value::String("45".into())));
        assert_eq!(rows[1].get("Task"), Some(&Value::String("Lab".into())));
    }

    #[test]
    fn short_records_leave_missing_columns_absent() {
        let text = "Subject,Period,Grade\nMath,W1\n";
        let rows = read_rows(text.as_bytes()).expect("rows");
        assert_eq!(rows.len(), 1);
        assert!(rows[0].get("Grade").is_none());
        assert!(validate_rows(&rows, AnalysisMode::TimeSeries).records.is_empty());
    }

    #[test]
    fn export_quotes_text_and_round_trips() {
        let text = "Subject,Task,MarkGotten,MaxMark,Weight\nMath,\"Quiz \"\"A\"\"\",45,50,20\nMath,Exam,80,100,80\nArt,Sketch,3,4,0\n";
        let first = validate_rows(&read_rows(text.as_bytes()).expect("rows"), AnalysisMode::Weighted);
        assert_eq!(first.dropped, 1);

        let exported = String::from_utf8(export_csv(&first.records).expect("export")).expect("utf8");
        assert!(exported.starts_with("Subject,Task,MarkGotten,MaxMark,Weight\n"));
        assert!(exported.contains("\"Math\",\"Quiz \"\"A\"\"\",45,50,20\n"));

        let again = validate_rows(&read_rows(exported.as_bytes()).expect("rows"), AnalysisMode::Weighted);
        assert_eq!(again.dropped, 0);
        assert_eq!(again.records, first.records);
    }

    #[test]
    fn numeric_looking_text_round_trips() {
        let text = "Subject,Task,MarkGotten,MaxMark,Weight\n2024,\"7\",3.5,4,12.25\n";
        let first = validate_rows(&read_rows(text.as_bytes()).expect("rows"), AnalysisMode::Weighted);
        let exported = export_csv(&first.records).expect("export");
        let text = String::from_utf8(exported).expect("utf8");
        assert_eq!(text.lines().nth(1), Some("2024,7,3.5,4,12.25"));
        let again = validate_rows(&read_rows(text.as_bytes()).expect("rows"), AnalysisMode::Weighted);
        assert_eq!(again.records, first.records);
    }
}
