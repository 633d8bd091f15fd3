use crate::access::Section;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{db, required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::service::{ProgressReport, ProgressService};
use crate::source::{RecordSource, SqliteSource};
use crate::weeks;
use serde_json::json;

/// Re-runs the whole pipeline for one student. A failed fetch is reported as a
/// banner next to the previous (stale) report instead of an error response.
fn refresh(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(req, "studentId")?;
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr::new("no_workspace", "select a workspace first"));
    };

    let previous = state.progress.remove(&student_id).unwrap_or_default();
    let mut service = ProgressService::with_report(SqliteSource::new(conn), student_id.clone(), previous);
    let stale = service.refresh().is_err();
    let banner = service.last_error().map(str::to_string);
    let report = service.into_report();

    let result = json!({
        "studentId": student_id,
        "report": report,
        "stale": stale,
        "error": banner
    });
    state.progress.insert(student_id, report);
    Ok(result)
}

fn cached_report<'a>(state: &'a AppState, student_id: &str) -> std::borrow::Cow<'a, ProgressReport> {
    match state.progress.get(student_id) {
        Some(r) => std::borrow::Cow::Borrowed(r),
        None => std::borrow::Cow::Owned(ProgressReport::default()),
    }
}

fn handle_progress_refresh(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || refresh(state, req))
}

fn handle_progress_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let student_id = required_str(req, "studentId")?;
        let report = cached_report(state, &student_id);
        Ok(json!({
            "studentId": student_id,
            "summary": report.summary,
            "computed": state.progress.contains_key(&student_id)
        }))
    })
}

fn handle_progress_weeks(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let conn = db(state)?;
        let student_id = required_str(req, "studentId")?;
        let source = SqliteSource::new(conn);
        let fetched = source
            .find_proposal(&student_id)
            .and_then(|p| match p {
                Some(proposal_id) => source.list_activities(&proposal_id).map(Some),
                None => Ok(None),
            })
            .map_err(|e| HandlerErr::new("source_failed", format!("{e:#}")))?;

        let Some(activities) = fetched else {
            return Ok(json!({
                "studentId": student_id,
                "hasProposal": false,
                "weeks": weeks::empty_week_slots()
            }));
        };
        let slots = weeks::week_slots(&activities);
        Ok(json!({
            "studentId": student_id,
            "hasProposal": true,
            "weeks": slots
        }))
    })
}

/// Evaluated against the current report every time; decisions are never stored.
fn handle_access_check(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, || {
        let student_id = required_str(req, "studentId")?;
        let section = Section::parse(&required_str(req, "section")?);
        let report = cached_report(state, &student_id);
        let decision = crate::access::check_access(&report.summary, &section);
        Ok(json!({
            "studentId": student_id,
            "section": section.as_str(),
            "allowed": decision.allowed,
            "reason": decision.reason
        }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "progress.refresh" => Some(handle_progress_refresh(state, req)),
        "progress.summary" => Some(handle_progress_summary(state, req)),
        "progress.weeks" => Some(handle_progress_weeks(state, req)),
        "access.check" => Some(handle_access_check(state, req)),
        _ => None,
    }
}
