use serde::Serialize;

use crate::service::ProgressSummary;
use crate::weeks::WEEK_COUNT;

pub const PREREQUISITES_NOT_APPROVED: &str = "prerequisites not approved";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    Dashboard,
    Prerequisites,
    Profile,
    Proposal,
    Advances,
    Documents,
    Defense,
    Other(String),
}

impl Section {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "dashboard" => Self::Dashboard,
            "prerequisites" => Self::Prerequisites,
            "profile" => Self::Profile,
            "proposal" => Self::Proposal,
            "advances" => Self::Advances,
            "documents" => Self::Documents,
            "defense" | "defense-scheduling" => Self::Defense,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Prerequisites => "prerequisites",
            Self::Profile => "profile",
            Self::Proposal => "proposal",
            Self::Advances => "advances",
            Self::Documents => "documents",
            Self::Defense => "defense",
            Self::Other(s) => s.as_str(),
        }
    }

    pub fn always_reachable(&self) -> bool {
        matches!(self, Self::Dashboard | Self::Prerequisites | Self::Profile)
    }

    pub fn requires_full_progress(&self) -> bool {
        matches!(self, Self::Defense)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl AccessDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

pub fn check_access(summary: &ProgressSummary, section: &Section) -> AccessDecision {
    if section.always_reachable() {
        return AccessDecision::allow();
    }
    if !summary.prerequisites_approved {
        return AccessDecision::deny(PREREQUISITES_NOT_APPROVED);
    }
    if section.requires_full_progress() {
        let required = WEEK_COUNT as u32;
        let done = summary.consecutive_completed_weeks.min(required);
        if done < required {
            let remaining = required - done;
            return AccessDecision::deny(format!(
                "{} requires {} consecutive completed weeks; {} remaining",
                section.as_str(),
                required,
                remaining
            ));
        }
    }
    AccessDecision::allow()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(approved: bool, weeks: u32) -> ProgressSummary {
        ProgressSummary {
            prerequisites_approved: approved,
            consecutive_completed_weeks: weeks,
            total_completed_weeks: weeks,
        }
    }

    #[test]
    fn allow_list_is_always_reachable() {
        for name in ["dashboard", "prerequisites", "profile"] {
            let d = check_access(&summary(false, 0), &Section::parse(name));
            assert!(d.allowed, "{name} should be reachable");
            assert_eq!(d.reason, None);
        }
    }

    #[test]
    fn unapproved_prerequisites_deny_everything_else() {
        for name in ["proposal", "advances", "documents", "defense", "anything-else"] {
            let d = check_access(&summary(false, 16), &Section::parse(name));
            assert!(!d.allowed);
            assert_eq!(d.reason.as_deref(), Some(PREREQUISITES_NOT_APPROVED));
        }
    }

    #[test]
    fn defense_reports_remaining_weeks() {
        let d = check_access(&summary(true, 10), &Section::Defense);
        assert!(!d.allowed);
        let reason = d.reason.expect("reason");
        assert!(reason.contains("6 remaining"), "{reason}");

        let d = check_access(&summary(true, 0), &Section::parse("defense-scheduling"));
        assert!(d.reason.expect("reason").contains("16 remaining"));

        assert!(check_access(&summary(true, 16), &Section::Defense).allowed);
    }

    #[test]
    fn other_sections_ignore_week_count_once_approved() {
        let d = check_access(&summary(true, 0), &Section::Advances);
        assert!(d.allowed);
        assert!(check_access(&summary(true, 0), &Section::parse("reviews")).allowed);
    }
}
