use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{db, ensure_exists, now_rfc3339, optional_str, required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::records::Track;
use crate::source::{RecordSource, SqliteSource};
use crate::weeks;
use chrono::DateTime;
use serde_json::json;
use uuid::Uuid;

fn handle_activities_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let conn = db(state)?;
        let proposal_id = required_str(req, "proposalId")?;
        let nombre = required_str(req, "nombre")?;
        let descripcion = optional_str(req, "descripcion");
        let Some(semana) = req.params.get("semana").and_then(|v| v.as_i64()) else {
            return Err(HandlerErr::bad_params("missing/invalid semana"));
        };
        let tipo = match optional_str(req, "tipo") {
            Some(raw) => Track::parse(&raw)
                .ok_or_else(|| HandlerErr::bad_params("tipo must be one of: tutor, docente"))?,
            None => Track::Tutor,
        };
        ensure_exists(conn, "proposals", "proposal", &proposal_id)?;

        // Stored as given; weeks outside 1..16 are simply never counted.
        if weeks::week_index(semana).is_none() {
            tracing::warn!(proposal_id = %proposal_id, semana, "activity created outside weeks 1..16");
        }

        let activity_id = Uuid::new_v4().to_string();
        let sort_order: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM activities WHERE proposal_id = ? AND semana = ?",
                (&proposal_id, semana),
                |r| r.get(0),
            )
            .map_err(|e| HandlerErr::db("db_query_failed", e))?;
        conn.execute(
            "INSERT INTO activities(id, proposal_id, nombre, descripcion, semana, tipo, sort_order)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            (
                &activity_id,
                &proposal_id,
                &nombre,
                descripcion.as_deref(),
                semana,
                tipo.as_str(),
                sort_order,
            ),
        )
        .map_err(|e| HandlerErr::db("db_insert_failed", e))?;
        Ok(json!({ "activityId": activity_id }))
    })
}

fn handle_activities_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let conn = db(state)?;
        let proposal_id = required_str(req, "proposalId")?;
        let activities = SqliteSource::new(conn)
            .list_activities(&proposal_id)
            .map_err(|e| HandlerErr::new("source_failed", format!("{e:#}")))?;
        Ok(json!({ "activities": activities }))
    })
}

fn handle_evidences_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let conn = db(state)?;
        let activity_id = required_str(req, "activityId")?;
        let archivo_url = optional_str(req, "archivoUrl");
        let contenido = optional_str(req, "contenido");
        let fecha_entrega = match optional_str(req, "fechaEntrega") {
            Some(raw) => {
                let parsed = DateTime::parse_from_rfc3339(&raw).map_err(|_| {
                    HandlerErr::bad_params("fechaEntrega must be an RFC 3339 timestamp")
                })?;
                parsed
                    .with_timezone(&chrono::Utc)
                    .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
            }
            None => now_rfc3339(),
        };
        ensure_exists(conn, "activities", "activity", &activity_id)?;

        let seq: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(seq) + 1, 0) FROM evidences WHERE activity_id = ?",
                [&activity_id],
                |r| r.get(0),
            )
            .map_err(|e| HandlerErr::db("db_query_failed", e))?;
        let evidence_id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO evidences(id, activity_id, seq, fecha_entrega, archivo_url, contenido)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                &evidence_id,
                &activity_id,
                seq,
                &fecha_entrega,
                archivo_url.as_deref(),
                contenido.as_deref(),
            ),
        )
        .map_err(|e| HandlerErr::db("db_insert_failed", e))?;
        Ok(json!({ "evidenceId": evidence_id, "fechaEntrega": fecha_entrega }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "activities.create" => Some(handle_activities_create(state, req)),
        "activities.list" => Some(handle_activities_list(state, req)),
        "evidences.submit" => Some(handle_evidences_submit(state, req)),
        _ => None,
    }
}
