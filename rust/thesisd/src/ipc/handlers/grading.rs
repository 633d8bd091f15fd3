use crate::grading::{GradeSheet, SheetStudent};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{optional_str, required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::records::Role;
use crate::source::{RecordSource, SqliteSource};
use serde_json::json;
use uuid::Uuid;

const GRADING_SHEET_MAX_STUDENTS: usize = 500;

fn open_sheet(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr::new("no_workspace", "select a workspace first"));
    };
    let role_raw = required_str(req, "role")?;
    let grader_id = required_str(req, "graderId")?;
    let Some(track) = Role::parse(&role_raw).and_then(|r| r.grading_track()) else {
        return Err(HandlerErr::new(
            "forbidden",
            format!("role {} does not grade evidences", role_raw),
        ));
    };

    let source = SqliteSource::new(conn);
    let supervised = source
        .list_supervised(track, &grader_id)
        .map_err(|e| HandlerErr::new("source_failed", format!("{e:#}")))?;
    if supervised.len() > GRADING_SHEET_MAX_STUDENTS {
        return Err(HandlerErr {
            code: "bad_params",
            message: "too many students for one grading sheet".to_string(),
            details: Some(json!({
                "students": supervised.len(),
                "max": GRADING_SHEET_MAX_STUDENTS
            })),
        });
    }

    let mut students = Vec::with_capacity(supervised.len());
    for s in supervised {
        let mut activities = Vec::new();
        for proposal_id in &s.proposal_ids {
            let listed = source
                .list_activities(proposal_id)
                .map_err(|e| HandlerErr::new("source_failed", format!("{e:#}")))?;
            activities.extend(listed);
        }
        students.push(SheetStudent {
            student_id: s.student_id,
            display_name: s.display_name,
            activities,
        });
    }

    let sheet = GradeSheet::build(Uuid::new_v4().to_string(), track, grader_id.as_str(), students);
    tracing::debug!(sheet_id = %sheet.id, track = track.as_str(), rows = sheet.rows.len(), "grading sheet opened");
    let result = json!({ "sheet": &sheet });

    // One open sheet per grader and track; reopening replaces the old one.
    state
        .sheets
        .retain(|_, open| !(open.track == track && open.grader_id == grader_id));
    state.sheets.insert(sheet.id.clone(), sheet);
    Ok(result)
}

fn sheet_id(req: &Request) -> Result<String, HandlerErr> {
    required_str(req, "sheetId")
}

fn handle_grading_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || open_sheet(state, req))
}

fn handle_grading_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let id = sheet_id(req)?;
        let sheet = state
            .sheets
            .get(&id)
            .ok_or_else(|| HandlerErr::not_found("sheet", &id))?;
        Ok(json!({ "sheet": sheet }))
    })
}

fn handle_grading_validate(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let id = sheet_id(req)?;
        let evidence_id = required_str(req, "evidenceId")?;
        let sheet = state
            .sheets
            .get(&id)
            .ok_or_else(|| HandlerErr::not_found("sheet", &id))?;
        let Some(value) = req.params.get("value") else {
            return Err(HandlerErr::bad_params("missing value"));
        };
        let grade = sheet.validate_edit(&evidence_id, value)?;
        Ok(json!({ "evidenceId": evidence_id, "grade": grade }))
    })
}

fn set_grade(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let id = sheet_id(req)?;
    let evidence_id = required_str(req, "evidenceId")?;
    let feedback = optional_str(req, "feedback");
    let Some(value) = req.params.get("value") else {
        return Err(HandlerErr::bad_params("missing value"));
    };
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr::new("no_workspace", "select a workspace first"));
    };
    let sheet = state
        .sheets
        .get_mut(&id)
        .ok_or_else(|| HandlerErr::not_found("sheet", &id))?;

    let outcome = sheet.commit(&SqliteSource::new(conn), &evidence_id, value, feedback)?;
    Ok(json!(outcome))
}

fn handle_grading_set_grade(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || set_grade(state, req))
}

fn handle_grading_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let id = sheet_id(req)?;
        if state.sheets.remove(&id).is_none() {
            return Err(HandlerErr::not_found("sheet", &id));
        }
        tracing::debug!(sheet_id = %id, "grading sheet closed");
        Ok(json!({ "sheetId": id, "closed": true }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grading.open" => Some(handle_grading_open(state, req)),
        "grading.get" => Some(handle_grading_get(state, req)),
        "grading.validate" => Some(handle_grading_validate(state, req)),
        "grading.setGrade" => Some(handle_grading_set_grade(state, req)),
        "grading.close" => Some(handle_grading_close(state, req)),
        _ => None,
    }
}
