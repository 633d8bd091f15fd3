use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::records::{Activity, Evidence, PrerequisiteRecord, Track};

/// Read side of the backend of record.
pub trait RecordSource {
    fn list_prerequisites(&self, student_id: &str) -> anyhow::Result<Vec<PrerequisiteRecord>>;
    fn find_proposal(&self, student_id: &str) -> anyhow::Result<Option<String>>;
    fn list_activities(&self, proposal_id: &str) -> anyhow::Result<Vec<Activity>>;
}

impl<T: RecordSource + ?Sized> RecordSource for &T {
    fn list_prerequisites(&self, student_id: &str) -> anyhow::Result<Vec<PrerequisiteRecord>> {
        (**self).list_prerequisites(student_id)
    }

    fn find_proposal(&self, student_id: &str) -> anyhow::Result<Option<String>> {
        (**self).find_proposal(student_id)
    }

    fn list_activities(&self, proposal_id: &str) -> anyhow::Result<Vec<Activity>> {
        (**self).list_activities(proposal_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeWrite {
    pub calificacion: Option<f64>,
    pub feedback: Option<String>,
}

/// Write side used by the grading sheet. Returns the evidence as stored.
pub trait GradeWriter {
    fn write_grade(&self, evidence_id: &str, track: Track, write: &GradeWrite)
        -> anyhow::Result<Evidence>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisedStudent {
    pub student_id: String,
    pub display_name: String,
    /// Every proposal of this student the grader supervises, oldest first.
    pub proposal_ids: Vec<String>,
}

#[derive(Clone, Copy)]
pub struct SqliteSource<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSource<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// One entry per student, even when the grader supervises several of
    /// their proposals.
    pub fn list_supervised(
        &self,
        track: Track,
        grader_id: &str,
    ) -> anyhow::Result<Vec<SupervisedStudent>> {
        let column = match track {
            Track::Tutor => "tutor_id",
            Track::Instructor => "instructor_id",
        };
        let sql = format!(
            "SELECT s.id, s.display_name, p.id FROM proposals p
             JOIN students s ON s.id = p.student_id
             WHERE p.{} = ?
             ORDER BY s.display_name, s.id, p.created_at, p.rowid",
            column
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([grader_id], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("list supervised students")?;

        let mut out: Vec<SupervisedStudent> = Vec::new();
        for (student_id, display_name, proposal_id) in rows {
            match out.last_mut() {
                Some(last) if last.student_id == student_id => last.proposal_ids.push(proposal_id),
                _ => out.push(SupervisedStudent {
                    student_id,
                    display_name,
                    proposal_ids: vec![proposal_id],
                }),
            }
        }
        Ok(out)
    }

    pub fn get_evidence(&self, evidence_id: &str) -> anyhow::Result<Option<Evidence>> {
        self.conn
            .query_row(
                "SELECT id, fecha_entrega, archivo_url, contenido,
                        calificacion_tutor, calificacion_docente, retro_tutor, retro_docente
                 FROM evidences WHERE id = ?",
                [evidence_id],
                evidence_from_row,
            )
            .optional()
            .context("load evidence")
    }

    fn list_evidences(&self, activity_id: &str) -> anyhow::Result<Vec<Evidence>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, fecha_entrega, archivo_url, contenido,
                    calificacion_tutor, calificacion_docente, retro_tutor, retro_docente
             FROM evidences WHERE activity_id = ? ORDER BY seq, rowid",
        )?;
        let rows = stmt
            .query_map([activity_id], evidence_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn parse_timestamp(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn evidence_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Evidence> {
    Ok(Evidence {
        id: r.get(0)?,
        fecha_entrega: parse_timestamp(r.get(1)?),
        archivo_url: r.get(2)?,
        contenido: r.get(3)?,
        calificacion_tutor: r.get(4)?,
        calificacion_docente: r.get(5)?,
        retroalimentacion_tutor: r.get(6)?,
        retroalimentacion_docente: r.get(7)?,
    })
}

impl RecordSource for SqliteSource<'_> {
    fn list_prerequisites(&self, student_id: &str) -> anyhow::Result<Vec<PrerequisiteRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, nombre, cumplido, archivo_url, enviado, kind
             FROM prerequisites WHERE student_id = ? ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map([student_id], |r| {
                Ok(PrerequisiteRecord {
                    id: Some(r.get(0)?),
                    nombre: r.get(1)?,
                    cumplido: r.get::<_, i64>(2)? == 1,
                    archivo_url: r.get(3)?,
                    enviado: r.get::<_, i64>(4)? == 1,
                    tipo: r.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("list prerequisites")?;
        Ok(rows)
    }

    fn find_proposal(&self, student_id: &str) -> anyhow::Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT id FROM proposals WHERE student_id = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
                [student_id],
                |r| r.get(0),
            )
            .optional()
            .context("find proposal")
    }

    fn list_activities(&self, proposal_id: &str) -> anyhow::Result<Vec<Activity>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, nombre, descripcion, semana, tipo
             FROM activities WHERE proposal_id = ? ORDER BY semana, sort_order, rowid",
        )?;
        let rows = stmt
            .query_map([proposal_id], |r| {
                let tipo: String = r.get(4)?;
                Ok(Activity {
                    id: r.get(0)?,
                    nombre: r.get(1)?,
                    descripcion: r.get(2)?,
                    semana: r.get(3)?,
                    tipo: Track::parse(&tipo).unwrap_or_default(),
                    evidencias: Vec::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("list activities")?;

        let mut activities = rows;
        for a in activities.iter_mut() {
            a.evidencias = self.list_evidences(&a.id)?;
        }
        Ok(activities)
    }
}

impl GradeWriter for SqliteSource<'_> {
    fn write_grade(
        &self,
        evidence_id: &str,
        track: Track,
        write: &GradeWrite,
    ) -> anyhow::Result<Evidence> {
        let sql = match track {
            Track::Tutor => {
                "UPDATE evidences SET calificacion_tutor = ?, retro_tutor = COALESCE(?, retro_tutor) WHERE id = ?"
            }
            Track::Instructor => {
                "UPDATE evidences SET calificacion_docente = ?, retro_docente = COALESCE(?, retro_docente) WHERE id = ?"
            }
        };
        let changed = self
            .conn
            .execute(sql, (write.calificacion, write.feedback.as_deref(), evidence_id))
            .context("update evidence grade")?;
        if changed == 0 {
            anyhow::bail!("evidence not found: {}", evidence_id);
        }
        self.get_evidence(evidence_id)?
            .ok_or_else(|| anyhow::anyhow!("evidence vanished after update: {}", evidence_id))
    }
}
