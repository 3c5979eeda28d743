use crate::calc::CalcError;
use crate::records::{RawRow, Record};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use uuid::Uuid;

pub const DEFAULT_SUBJECTS: [&str; 9] = [
    "Maths (Core)",
    "Maths (Path)",
    "English",
    "Science",
    "HSIE",
    "PDHPE",
    "Electronics",
    "Music",
    "STEM",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub task_name: String,
    #[serde(default)]
    pub mark_gotten: Option<f64>,
    #[serde(default)]
    pub max_mark: Option<f64>,
    #[serde(default)]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// Partial update for one task. The outer `None` leaves a field alone; for
/// the numeric fields `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub task_name: Option<String>,
    pub mark_gotten: Option<Option<f64>>,
    pub max_mark: Option<Option<f64>>,
    pub weight: Option<Option<f64>>,
}

/// The subject/task state the front end edits between analyses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBook {
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub next_id: u64,
    /// Next task number per subject id, keyed as strings like the stored JSON.
    #[serde(default)]
    pub task_counters: BTreeMap<String, u64>,
}

fn not_found(what: &str) -> CalcError {
    CalcError::new("not_found", format!("{} not found", what))
}

impl GradeBook {
    pub fn with_default_subjects() -> Self {
        let mut book = GradeBook::default();
        for name in DEFAULT_SUBJECTS {
            book.add_subject(Some(name));
        }
        book
    }

    pub fn subject(&self, id: u64) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.id == id)
    }

    fn subject_mut(&mut self, id: u64) -> Result<&mut Subject, CalcError> {
        self.subjects
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| not_found("subject"))
    }

    pub fn add_subject(&mut self, name: Option<&str>) -> Subject {
        let id = self.next_id;
        self.next_id += 1;
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Subject {}", id));
        self.task_counters.insert(id.to_string(), 1);
        let subject = Subject {
            id,
            name,
            tasks: Vec::new(),
        };
        self.subjects.push(subject.clone());
        subject
    }

    /// Adds a preset subject unless one with the same name already exists.
    pub fn add_default_subject(&mut self, name: &str) -> Result<Subject, CalcError> {
        if self.subjects.iter().any(|s| s.name == name) {
            return Err(CalcError::new(
                "duplicate_subject",
                format!("{} already exists.", name),
            ));
        }
        Ok(self.add_subject(Some(name)))
    }

    pub fn rename_subject(&mut self, id: u64, name: &str) -> Result<Subject, CalcError> {
        let subject = self.subject_mut(id)?;
        let t = name.trim();
        subject.name = if t.is_empty() {
            format!("Subject {}", id)
        } else {
            t.to_string()
        };
        Ok(subject.clone())
    }

    pub fn remove_subject(&mut self, id: u64) -> Result<(), CalcError> {
        let before = self.subjects.len();
        self.subjects.retain(|s| s.id != id);
        if self.subjects.len() == before {
            return Err(not_found("subject"));
        }
        self.task_counters.remove(&id.to_string());
        Ok(())
    }

    pub fn add_task(&mut self, subject_id: u64) -> Result<Task, CalcError> {
        if self.subject(subject_id).is_none() {
            return Err(not_found("subject"));
        }
        let key = subject_id.to_string();
        let counter = self.task_counters.entry(key).or_insert(1);
        let n = *counter;
        *counter += 1;

        let task = Task {
            id: Uuid::new_v4().to_string(),
            task_name: format!("Task {}", n),
            mark_gotten: None,
            max_mark: None,
            weight: None,
        };
        self.subject_mut(subject_id)?.tasks.push(task.clone());
        Ok(task)
    }

    pub fn update_task(
        &mut self,
        subject_id: u64,
        task_id: &str,
        patch: &TaskPatch,
    ) -> Result<Task, CalcError> {
        let subject = self.subject_mut(subject_id)?;
        let task = subject
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| not_found("task"))?;
        if let Some(name) = patch.task_name.as_deref() {
            task.task_name = name.to_string();
        }
        if let Some(v) = patch.mark_gotten {
            task.mark_gotten = v;
        }
        if let Some(v) = patch.max_mark {
            task.max_mark = v;
        }
        if let Some(v) = patch.weight {
            task.weight = v;
        }
        Ok(task.clone())
    }

    pub fn remove_task(&mut self, subject_id: u64, task_id: &str) -> Result<(), CalcError> {
        let subject = self.subject_mut(subject_id)?;
        let before = subject.tasks.len();
        subject.tasks.retain(|t| t.id != task_id);
        if subject.tasks.len() == before {
            return Err(not_found("task"));
        }
        Ok(())
    }

    /// Raw weighted rows for every task, subjects in display order. Blank
    /// subject names are skipped here, the rest is left to the validator.
    pub fn collect_rows(&self) -> Vec<RawRow> {
        let mut rows = Vec::new();
        for s in &self.subjects {
            if s.name.trim().is_empty() {
                continue;
            }
            for t in &s.tasks {
                let row = json!({
                    "Subject": s.name,
                    "Task": t.task_name,
                    "MarkGotten": t.mark_gotten,
                    "MaxMark": t.max_mark,
                    "Weight": t.weight,
                });
                if let Some(obj) = row.as_object() {
                    rows.push(obj.clone());
                }
            }
        }
        rows
    }

    /// Replaces the book with the subjects and tasks of an imported record
    /// set, one subject per distinct name in first-seen order.
    pub fn from_records(records: &[Record]) -> Self {
        let mut book = GradeBook::default();
        for r in records {
            let subject_id = match book.subjects.iter().find(|s| s.name == r.subject) {
                Some(s) => s.id,
                None => book.add_subject(Some(&r.subject)).id,
            };
            let key = subject_id.to_string();
            let counter = book.task_counters.entry(key).or_insert(1);
            *counter += 1;
            if let Some(subject) = book.subjects.iter_mut().find(|s| s.id == subject_id) {
                subject.tasks.push(Task {
                    id: Uuid::new_v4().to_string(),
                    task_name: r.label.clone(),
                    mark_gotten: r.mark_gotten,
                    max_mark: r.max_mark,
                    weight: r.weight,
                });
            }
        }
        book
    }
}
