use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{db, ensure_exists, now_rfc3339, optional_str, required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::prereq::{self, PrerequisiteKey};
use crate::records::Role;
use crate::source::{RecordSource, SqliteSource};
use serde_json::json;
use uuid::Uuid;

fn handle_prerequisites_declare(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let conn = db(state)?;
        let student_id = required_str(req, "studentId")?;
        let nombre = required_str(req, "nombre")?;
        let archivo_url = optional_str(req, "archivoUrl");
        ensure_exists(conn, "students", "student", &student_id)?;

        // The kind is fixed here, at the data-entry boundary. Name matching only
        // fills it in when the caller did not say.
        let kind = match optional_str(req, "tipo") {
            Some(raw) => Some(PrerequisiteKey::parse(&raw).ok_or_else(|| {
                HandlerErr::bad_params("tipo must be one of: english, internship, community")
            })?),
            None => match prereq::classify_name(&nombre) {
                PrerequisiteKey::Other => None,
                key => Some(key),
            },
        };

        let prerequisite_id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO prerequisites(id, student_id, nombre, archivo_url, enviado, cumplido, kind)
             VALUES(?, ?, ?, ?, 1, 0, ?)",
            (
                &prerequisite_id,
                &student_id,
                &nombre,
                archivo_url.as_deref(),
                kind.map(|k| k.as_str()),
            ),
        )
        .map_err(|e| HandlerErr::db("db_insert_failed", e))?;

        Ok(json!({
            "prerequisiteId": prerequisite_id,
            "kind": kind.unwrap_or(PrerequisiteKey::Other),
            "status": "pending"
        }))
    })
}

fn handle_prerequisites_verify(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let conn = db(state)?;
        let prerequisite_id = required_str(req, "prerequisiteId")?;
        let role_raw = required_str(req, "role")?;
        let role = Role::parse(&role_raw)
            .ok_or_else(|| HandlerErr::bad_params(format!("unknown role: {}", role_raw)))?;
        if !role.can_verify_prerequisites() {
            return Err(HandlerErr::new(
                "forbidden",
                format!("role {} cannot verify prerequisites", role_raw),
            ));
        }
        let Some(approve) = req.params.get("approve").and_then(|v| v.as_bool()) else {
            return Err(HandlerErr::bad_params("missing approve"));
        };

        let changed = conn
            .execute(
                "UPDATE prerequisites SET cumplido = ?, verified_by = ?, verified_at = ? WHERE id = ?",
                (approve as i64, &role_raw, now_rfc3339(), &prerequisite_id),
            )
            .map_err(|e| HandlerErr::db("db_update_failed", e))?;
        if changed == 0 {
            return Err(HandlerErr::not_found("prerequisite", &prerequisite_id));
        }
        tracing::info!(prerequisite_id = %prerequisite_id, approve, role = %role_raw, "prerequisite verified");
        Ok(json!({
            "prerequisiteId": prerequisite_id,
            "status": if approve { "approved" } else { "pending" }
        }))
    })
}

fn handle_prerequisites_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let conn = db(state)?;
        let student_id = required_str(req, "studentId")?;
        let records = SqliteSource::new(conn)
            .list_prerequisites(&student_id)
            .map_err(|e| HandlerErr::new("source_failed", format!("{e:#}")))?;
        let statuses = prereq::normalize(&records);
        Ok(json!({
            "records": records,
            "statuses": statuses,
            "approvedCount": statuses.approved_count(),
            "approved": prereq::prerequisites_approved(&statuses)
        }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "prerequisites.declare" => Some(handle_prerequisites_declare(state, req)),
        "prerequisites.verify" => Some(handle_prerequisites_verify(state, req)),
        "prerequisites.list" => Some(handle_prerequisites_list(state, req)),
        _ => None,
    }
}
