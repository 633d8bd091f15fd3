use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{db, ensure_exists, now_rfc3339, optional_str, required_str, respond};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let conn = db(state)?;
        let display_name = required_str(req, "displayName")?;
        let student_id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO students(id, display_name, created_at) VALUES(?, ?, ?)",
            (&student_id, &display_name, now_rfc3339()),
        )
        .map_err(|e| HandlerErr::db("db_insert_failed", e))?;
        Ok(json!({ "studentId": student_id }))
    })
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let conn = db(state)?;
        let mut stmt = conn
            .prepare("SELECT id, display_name FROM students ORDER BY display_name, id")
            .map_err(|e| HandlerErr::db("db_query_failed", e))?;
        let students = stmt
            .query_map([], |r| {
                Ok(json!({
                    "id": r.get::<_, String>(0)?,
                    "displayName": r.get::<_, String>(1)?
                }))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            .map_err(|e| HandlerErr::db("db_query_failed", e))?;
        Ok(json!({ "students": students }))
    })
}

fn handle_proposals_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let conn = db(state)?;
        let student_id = required_str(req, "studentId")?;
        let title = required_str(req, "title")?;
        let tutor_id = optional_str(req, "tutorId");
        let instructor_id = optional_str(req, "instructorId");
        ensure_exists(conn, "students", "student", &student_id)?;

        let proposal_id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO proposals(id, student_id, title, tutor_id, instructor_id, created_at)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                &proposal_id,
                &student_id,
                &title,
                tutor_id.as_deref(),
                instructor_id.as_deref(),
                now_rfc3339(),
            ),
        )
        .map_err(|e| HandlerErr::db("db_insert_failed", e))?;
        Ok(json!({ "proposalId": proposal_id }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.create" => Some(handle_students_create(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        "proposals.create" => Some(handle_proposals_create(state, req)),
        _ => None,
    }
}
