use serde::Serialize;
use std::collections::BTreeMap;

use crate::records::{Activity, Evidence, Track};
use crate::source::{GradeWrite, GradeWriter};
use crate::weeks;

pub const GRADE_MIN: f64 = 0.0;
pub const GRADE_MAX: f64 = 10.0;

#[derive(Debug, Clone, Serialize)]
pub struct GradeError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl GradeError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Two-decimal rounding used for displayed averages.
pub fn round_2_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Empty input (`null` or a blank string) clears the grade. Numbers and numeric
/// strings must fall in [0, 10]; nothing is clamped.
pub fn parse_grade_input(value: &serde_json::Value) -> Result<Option<f64>, GradeError> {
    let n = match value {
        serde_json::Value::Null => return Ok(None),
        serde_json::Value::String(s) if s.trim().is_empty() => return Ok(None),
        serde_json::Value::String(s) => s.trim().parse::<f64>().map_err(|_| {
            GradeError::new("validation_failed", "grade must be a number")
                .with_details(serde_json::json!({ "value": s }))
        })?,
        serde_json::Value::Number(n) => n.as_f64().ok_or_else(|| {
            GradeError::new("validation_failed", "grade must be a number")
        })?,
        other => {
            return Err(GradeError::new("validation_failed", "grade must be a number")
                .with_details(serde_json::json!({ "value": other })))
        }
    };

    if !n.is_finite() || !(GRADE_MIN..=GRADE_MAX).contains(&n) {
        return Err(GradeError::new(
            "validation_failed",
            format!("grade must be between {} and {}", GRADE_MIN, GRADE_MAX),
        )
        .with_details(serde_json::json!({ "value": value })));
    }
    Ok(Some(n))
}

/// Mean of the graded values; 0 when nothing is graded.
pub fn running_average<I>(grades: I) -> f64
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut sum = 0.0;
    let mut count: usize = 0;
    for g in grades.into_iter().flatten() {
        sum += g;
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }
    round_2_decimals(sum / count as f64)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeEntry {
    pub evidence_id: String,
    pub activity_id: String,
    pub grade: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCell {
    pub week: u32,
    pub entries: Vec<GradeEntry>,
    pub display_grade: Option<f64>,
}

impl GradeCell {
    /// Latest graded entry in received order stands for the whole cell.
    fn refresh_display(&mut self) {
        self.display_grade = self.entries.iter().rev().find_map(|e| e.grade);
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetRow {
    pub student_id: String,
    pub display_name: String,
    pub cells: Vec<GradeCell>,
    pub average: f64,
}

impl SheetRow {
    fn recompute_average(&mut self) {
        self.average = running_average(
            self.cells
                .iter()
                .flat_map(|c| c.entries.iter().map(|e| e.grade)),
        );
    }
}

pub struct SheetStudent {
    pub student_id: String,
    pub display_name: String,
    pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitOutcome {
    pub student_id: String,
    pub cell: GradeCell,
    pub average: f64,
    pub evidence: Evidence,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeSheet {
    pub id: String,
    pub track: Track,
    pub grader_id: String,
    pub rows: Vec<SheetRow>,
}

impl GradeSheet {
    pub fn build(
        id: impl Into<String>,
        track: Track,
        grader_id: impl Into<String>,
        students: Vec<SheetStudent>,
    ) -> Self {
        let rows = students
            .into_iter()
            .map(|s| {
                let mut by_week: BTreeMap<u32, GradeCell> = BTreeMap::new();
                for a in &s.activities {
                    let Some(idx) = weeks::week_index(a.semana) else {
                        continue;
                    };
                    let week = (idx + 1) as u32;
                    for e in &a.evidencias {
                        by_week
                            .entry(week)
                            .or_insert_with(|| GradeCell {
                                week,
                                entries: Vec::new(),
                                display_grade: None,
                            })
                            .entries
                            .push(GradeEntry {
                                evidence_id: e.id.clone(),
                                activity_id: a.id.clone(),
                                grade: e.grade(track),
                            });
                    }
                }
                let mut cells: Vec<GradeCell> = by_week.into_values().collect();
                for c in cells.iter_mut() {
                    c.refresh_display();
                }
                let mut row = SheetRow {
                    student_id: s.student_id,
                    display_name: s.display_name,
                    cells,
                    average: 0.0,
                };
                row.recompute_average();
                row
            })
            .collect();

        Self {
            id: id.into(),
            track,
            grader_id: grader_id.into(),
            rows,
        }
    }

    fn locate(&self, evidence_id: &str) -> Option<(usize, usize, usize)> {
        for (r, row) in self.rows.iter().enumerate() {
            for (c, cell) in row.cells.iter().enumerate() {
                if let Some(e) = cell.entries.iter().position(|e| e.evidence_id == evidence_id) {
                    return Some((r, c, e));
                }
            }
        }
        None
    }

    pub fn row(&self, student_id: &str) -> Option<&SheetRow> {
        self.rows.iter().find(|r| r.student_id == student_id)
    }

    /// Inline validation for an edit; never touches the sheet.
    pub fn validate_edit(
        &self,
        evidence_id: &str,
        value: &serde_json::Value,
    ) -> Result<Option<f64>, GradeError> {
        if self.locate(evidence_id).is_none() {
            return Err(GradeError::new("not_found", "evidence not on this sheet")
                .with_details(serde_json::json!({ "evidenceId": evidence_id })));
        }
        parse_grade_input(value)
    }

    /// Validates, writes through `writer`, then folds the stored grade into the
    /// sheet. On any failure the sheet is unchanged.
    pub fn commit<W: GradeWriter + ?Sized>(
        &mut self,
        writer: &W,
        evidence_id: &str,
        value: &serde_json::Value,
        feedback: Option<String>,
    ) -> Result<CommitOutcome, GradeError> {
        let grade = self.validate_edit(evidence_id, value)?;
        let Some((r, c, e)) = self.locate(evidence_id) else {
            return Err(GradeError::new("not_found", "evidence not on this sheet"));
        };

        let write = GradeWrite {
            calificacion: grade,
            feedback,
        };
        let stored = writer
            .write_grade(evidence_id, self.track, &write)
            .map_err(|err| {
                tracing::warn!(evidence_id, error = %err, "grade write failed");
                GradeError::new("source_failed", format!("{err:#}"))
            })?;

        let row = &mut self.rows[r];
        let cell = &mut row.cells[c];
        cell.entries[e].grade = stored.grade(self.track);
        cell.refresh_display();
        let cell = cell.clone();
        row.recompute_average();

        tracing::debug!(
            sheet_id = %self.id,
            evidence_id,
            average = row.average,
            "grade committed"
        );

        Ok(CommitOutcome {
            student_id: row.student_id.clone(),
            cell,
            average: row.average,
            evidence: stored,
        })
    }
}
