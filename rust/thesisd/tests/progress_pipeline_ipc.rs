mod support;

use serde_json::json;
use support::Sidecar;

fn summary_of(refresh: &serde_json::Value) -> serde_json::Value {
    refresh
        .get("report")
        .and_then(|r| r.get("summary"))
        .cloned()
        .expect("summary")
}

fn sheet_id(open: &serde_json::Value) -> String {
    open.get("sheet")
        .and_then(|s| s.get("id"))
        .and_then(|v| v.as_str())
        .expect("sheet id")
        .to_string()
}

#[test]
fn student_without_proposal_is_zero_state() {
    let mut sc = Sidecar::with_workspace("thesisd-progress-zero");
    let student = sc.create_student("Ana");
    sc.approve_all_prerequisites(&student);

    let r = sc.ok("progress.refresh", json!({ "studentId": student }));
    let summary = summary_of(&r);
    assert_eq!(summary.get("prerequisitesApproved").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(summary.get("consecutiveCompletedWeeks").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(summary.get("totalCompletedWeeks").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(r.get("stale").and_then(|v| v.as_bool()), Some(false));

    let weeks = sc.ok("progress.weeks", json!({ "studentId": student }));
    assert_eq!(weeks.get("hasProposal").and_then(|v| v.as_bool()), Some(false));
    let slots = weeks.get("weeks").and_then(|v| v.as_array()).cloned().expect("weeks");
    assert_eq!(slots.len(), 16);
    assert!(slots
        .iter()
        .all(|s| s.get("complete").and_then(|v| v.as_bool()) == Some(false)));
    assert_eq!(
        r.get("report").and_then(|r| r.get("weeks")).and_then(|v| v.as_array()).map(|a| a.len()),
        Some(16)
    );

    let defense = sc.ok("access.check", json!({ "studentId": student, "section": "defense" }));
    assert_eq!(defense.get("allowed").and_then(|v| v.as_bool()), Some(false));
    assert!(defense
        .get("reason")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .contains("16 remaining"));
}

#[test]
fn access_before_any_refresh_denies_gated_sections() {
    let mut sc = Sidecar::with_workspace("thesisd-progress-unrefreshed");
    let student = sc.create_student("Ana");
    sc.approve_all_prerequisites(&student);

    let summary = sc.ok("progress.summary", json!({ "studentId": student }));
    assert_eq!(summary.get("computed").and_then(|v| v.as_bool()), Some(false));

    let r = sc.ok("access.check", json!({ "studentId": student, "section": "advances" }));
    assert_eq!(r.get("allowed").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        r.get("reason").and_then(|v| v.as_str()),
        Some("prerequisites not approved")
    );
    let r = sc.ok("access.check", json!({ "studentId": student, "section": "profile" }));
    assert_eq!(r.get("allowed").and_then(|v| v.as_bool()), Some(true));
    assert!(r.get("reason").map(|v| v.is_null()).unwrap_or(false));
}

#[test]
fn consecutive_weeks_follow_grading_across_both_tracks() {
    let mut sc = Sidecar::with_workspace("thesisd-progress-pipeline");
    let student = sc.create_student("Ana");
    let proposal = sc.create_proposal(&student, "tutor-1", "docente-1");

    let a1 = sc.create_activity(&proposal, 1);
    let a2 = sc.create_activity(&proposal, 2);
    let a3 = sc.create_activity(&proposal, 3);
    // Outside the semester; never counted.
    let stray = sc.create_activity(&proposal, 17);
    let e1 = sc.submit_evidence(&a1);
    let e2 = sc.submit_evidence(&a2);
    let e3 = sc.submit_evidence(&a3);
    sc.submit_evidence(&stray);

    // Prerequisites still missing: advances blocked even with progress.
    let r = sc.ok("progress.refresh", json!({ "studentId": student }));
    assert_eq!(
        summary_of(&r).get("consecutiveCompletedWeeks").and_then(|v| v.as_u64()),
        Some(0)
    );
    let gate = sc.ok("access.check", json!({ "studentId": student, "section": "advances" }));
    assert_eq!(gate.get("allowed").and_then(|v| v.as_bool()), Some(false));

    sc.approve_all_prerequisites(&student);

    let tutor_sheet = sc.ok("grading.open", json!({ "role": "tutor", "graderId": "tutor-1" }));
    let tutor_sheet = sheet_id(&tutor_sheet);
    sc.ok("grading.setGrade", json!({ "sheetId": tutor_sheet, "evidenceId": e1, "value": 8 }));
    sc.ok("grading.setGrade", json!({ "sheetId": tutor_sheet, "evidenceId": e3, "value": "9" }));

    let r = sc.ok("progress.refresh", json!({ "studentId": student }));
    let summary = summary_of(&r);
    assert_eq!(summary.get("prerequisitesApproved").and_then(|v| v.as_bool()), Some(true));
    // Week 2 is the gap; weeks 3..16 are done but do not count.
    assert_eq!(summary.get("consecutiveCompletedWeeks").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(summary.get("totalCompletedWeeks").and_then(|v| v.as_u64()), Some(15));

    let defense = sc.ok("access.check", json!({ "studentId": student, "section": "defense" }));
    assert_eq!(defense.get("allowed").and_then(|v| v.as_bool()), Some(false));
    assert!(defense
        .get("reason")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .contains("15 remaining"));
    let advances = sc.ok("access.check", json!({ "studentId": student, "section": "advances" }));
    assert_eq!(advances.get("allowed").and_then(|v| v.as_bool()), Some(true));

    // An instructor grade alone clears week 2.
    let docente_sheet = sc.ok(
        "grading.open",
        json!({ "role": "integration_instructor", "graderId": "docente-1" }),
    );
    let docente_sheet = sheet_id(&docente_sheet);
    sc.ok("grading.setGrade", json!({ "sheetId": docente_sheet, "evidenceId": e2, "value": 7 }));

    let r = sc.ok("progress.refresh", json!({ "studentId": student }));
    let summary = summary_of(&r);
    assert_eq!(summary.get("consecutiveCompletedWeeks").and_then(|v| v.as_u64()), Some(16));

    let cached = sc.ok("progress.summary", json!({ "studentId": student }));
    assert_eq!(cached.get("computed").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(
        cached
            .get("summary")
            .and_then(|s| s.get("consecutiveCompletedWeeks"))
            .and_then(|v| v.as_u64()),
        Some(16)
    );

    let defense = sc.ok("access.check", json!({ "studentId": student, "section": "defense" }));
    assert_eq!(defense.get("allowed").and_then(|v| v.as_bool()), Some(true));

    let weeks = sc.ok("progress.weeks", json!({ "studentId": student }));
    let slots = weeks.get("weeks").and_then(|v| v.as_array()).cloned().expect("weeks");
    assert_eq!(slots.len(), 16);
    let stored: usize = slots
        .iter()
        .map(|s| s.get("activities").and_then(|v| v.as_array()).map(|a| a.len()).unwrap_or(0))
        .sum();
    assert_eq!(stored, 3);
}

#[test]
fn resubmission_without_grade_reopens_the_week() {
    let mut sc = Sidecar::with_workspace("thesisd-progress-resubmit");
    let student = sc.create_student("Ana");
    let proposal = sc.create_proposal(&student, "tutor-1", "docente-1");
    sc.approve_all_prerequisites(&student);

    let a1 = sc.create_activity(&proposal, 1);
    let e1 = sc.submit_evidence(&a1);
    let open = sc.ok("grading.open", json!({ "role": "tutor", "graderId": "tutor-1" }));
    let sid = sheet_id(&open);
    sc.ok("grading.setGrade", json!({ "sheetId": sid, "evidenceId": e1, "value": 6 }));

    let r = sc.ok("progress.refresh", json!({ "studentId": student }));
    assert_eq!(
        summary_of(&r).get("consecutiveCompletedWeeks").and_then(|v| v.as_u64()),
        Some(16)
    );

    // A newer evidence with no grade yet becomes the one that counts.
    sc.ok(
        "evidences.submit",
        json!({ "activityId": a1, "fechaEntrega": "2099-01-01T00:00:00Z" }),
    );
    let r = sc.ok("progress.refresh", json!({ "studentId": student }));
    assert_eq!(
        summary_of(&r).get("consecutiveCompletedWeeks").and_then(|v| v.as_u64()),
        Some(0)
    );
}
