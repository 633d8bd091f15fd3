use serde::Serialize;

use crate::access::{self, AccessDecision, Section};
use crate::prereq::{self, CanonicalStatuses};
use crate::records::{Activity, PrerequisiteRecord};
use crate::source::RecordSource;
use crate::weeks::{self, WEEK_COUNT};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub prerequisites_approved: bool,
    pub consecutive_completed_weeks: u32,
    pub total_completed_weeks: u32,
}

/// Everything one refresh derives for a student.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub summary: ProgressSummary,
    pub prerequisites: CanonicalStatuses,
    pub prerequisites_approved_count: usize,
    pub has_proposal: bool,
    pub weeks: [bool; WEEK_COUNT],
}

/// `activities` is `None` when the student has no proposal on record; that is
/// the zero state, not sixteen vacuously complete weeks.
pub fn compute_report(
    prerequisites: &[PrerequisiteRecord],
    activities: Option<&[Activity]>,
) -> ProgressReport {
    let statuses = prereq::normalize(prerequisites);
    let approved = prereq::prerequisites_approved(&statuses);
    let approved_count = statuses.approved_count();

    let Some(activities) = activities else {
        return ProgressReport {
            summary: ProgressSummary {
                prerequisites_approved: approved,
                ..Default::default()
            },
            prerequisites: statuses,
            prerequisites_approved_count: approved_count,
            has_proposal: false,
            weeks: [false; WEEK_COUNT],
        };
    };

    let weeks = weeks::completeness(activities);
    ProgressReport {
        summary: ProgressSummary {
            prerequisites_approved: approved,
            consecutive_completed_weeks: weeks::consecutive_completed_weeks(&weeks),
            total_completed_weeks: weeks::total_completed_weeks(&weeks),
        },
        prerequisites: statuses,
        prerequisites_approved_count: approved_count,
        has_proposal: true,
        weeks,
    }
}

/// Per-student progress state with an explicit refresh. The report is only
/// replaced by a refresh that fetched everything successfully.
pub struct ProgressService<S> {
    source: S,
    student_id: String,
    report: ProgressReport,
    last_error: Option<String>,
}

impl<S: RecordSource> ProgressService<S> {
    pub fn new(source: S, student_id: impl Into<String>) -> Self {
        Self::with_report(source, student_id, ProgressReport::default())
    }

    pub fn with_report(source: S, student_id: impl Into<String>, report: ProgressReport) -> Self {
        Self {
            source,
            student_id: student_id.into(),
            report,
            last_error: None,
        }
    }

    pub fn refresh(&mut self) -> anyhow::Result<&ProgressReport> {
        match self.fetch() {
            Ok(report) => {
                self.report = report;
                self.last_error = None;
                tracing::debug!(
                    student_id = %self.student_id,
                    consecutive = self.report.summary.consecutive_completed_weeks,
                    approved = self.report.summary.prerequisites_approved,
                    "progress refreshed"
                );
                Ok(&self.report)
            }
            Err(e) => {
                tracing::warn!(student_id = %self.student_id, error = %e, "progress refresh failed; keeping previous summary");
                self.last_error = Some(format!("{e:#}"));
                Err(e)
            }
        }
    }

    fn fetch(&self) -> anyhow::Result<ProgressReport> {
        let prerequisites = self.source.list_prerequisites(&self.student_id)?;
        let activities = match self.source.find_proposal(&self.student_id)? {
            Some(proposal_id) => Some(self.source.list_activities(&proposal_id)?),
            None => None,
        };
        Ok(compute_report(&prerequisites, activities.as_deref()))
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn report(&self) -> &ProgressReport {
        &self.report
    }

    pub fn summary(&self) -> ProgressSummary {
        self.report.summary
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn check_access(&self, section: &Section) -> AccessDecision {
        access::check_access(&self.report.summary, section)
    }

    pub fn into_report(self) -> ProgressReport {
        self.report
    }
}
