use rusqlite::Connection;
use std::path::Path;

use crate::prereq::{self, PrerequisiteKey};

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("thesis.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS proposals(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            title TEXT NOT NULL,
            tutor_id TEXT,
            instructor_id TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_proposals_student ON proposals(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS prerequisites(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            nombre TEXT,
            archivo_url TEXT,
            enviado INTEGER NOT NULL DEFAULT 0,
            cumplido INTEGER NOT NULL DEFAULT 0,
            verified_by TEXT,
            verified_at TEXT,
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_prerequisites_student ON prerequisites(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS activities(
            id TEXT PRIMARY KEY,
            proposal_id TEXT NOT NULL,
            nombre TEXT NOT NULL,
            descripcion TEXT,
            semana INTEGER NOT NULL,
            tipo TEXT NOT NULL,
            sort_order INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(proposal_id) REFERENCES proposals(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_activities_proposal ON activities(proposal_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS evidences(
            id TEXT PRIMARY KEY,
            activity_id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            fecha_entrega TEXT,
            archivo_url TEXT,
            contenido TEXT,
            calificacion_tutor REAL,
            calificacion_docente REAL,
            retro_tutor TEXT,
            retro_docente TEXT,
            FOREIGN KEY(activity_id) REFERENCES activities(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_evidences_activity ON evidences(activity_id, seq)",
        [],
    )?;

    // Prerequisite kinds used to be inferred from the name on every read.
    // Store them explicitly and backfill older rows once.
    ensure_prerequisites_kind(&conn)?;
    backfill_prerequisite_kinds(&conn)?;

    Ok(conn)
}

fn ensure_prerequisites_kind(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "prerequisites", "kind")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE prerequisites ADD COLUMN kind TEXT", [])?;
    Ok(())
}

/// Returns how many rows received a kind.
pub fn backfill_prerequisite_kinds(conn: &Connection) -> anyhow::Result<usize> {
    let mut stmt =
        conn.prepare("SELECT id, nombre FROM prerequisites WHERE kind IS NULL AND nombre IS NOT NULL")?;
    let rows = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut updated = 0;
    for (id, nombre) in rows {
        let key = prereq::classify_name(&nombre);
        if key == PrerequisiteKey::Other {
            continue;
        }
        conn.execute(
            "UPDATE prerequisites SET kind = ? WHERE id = ?",
            (key.as_str(), &id),
        )?;
        updated += 1;
    }
    if updated > 0 {
        tracing::info!(updated, "backfilled prerequisite kinds from names");
    }
    Ok(updated)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
